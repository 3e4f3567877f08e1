use anyhow::Result;
use std::path::Path;

use crate::cli::OutputFormat;

pub mod formatters;

pub use formatters::*;

/// Render a transcript document in the requested format
pub fn render(doc: &TranscriptDocument<'_>, format: &OutputFormat, include_timestamps: bool) -> Result<String> {
    let content = match format {
        OutputFormat::Text => format_as_text(doc.transcript, include_timestamps),
        OutputFormat::Json => format_as_json(doc)?,
        OutputFormat::Srt => format_as_srt(doc.transcript),
        OutputFormat::Vtt => format_as_vtt(doc.transcript),
    };
    Ok(content)
}

/// Save transcript to file
pub fn save_to_file(
    doc: &TranscriptDocument<'_>,
    path: &Path,
    format: &OutputFormat,
    include_timestamps: bool,
) -> Result<()> {
    let content = render(doc, format, include_timestamps)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print transcript to console
pub fn print_to_console(
    doc: &TranscriptDocument<'_>,
    format: &OutputFormat,
    include_timestamps: bool,
) -> Result<()> {
    let content = render(doc, format, include_timestamps)?;
    println!("{}", content);
    Ok(())
}
