use anyhow::Result;
use serde::Serialize;

use crate::extractors::TranscriptSegment;
use crate::utils::{format_duration, format_timestamp};

/// Transcript plus the identifiers it was fetched for
#[derive(Debug, Serialize)]
pub struct TranscriptDocument<'a> {
    pub video_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<&'a str>,
    pub segments: usize,
    pub transcript: &'a [TranscriptSegment],
}

/// Plain text, one cue per line
pub fn format_as_text(segments: &[TranscriptSegment], include_timestamps: bool) -> String {
    segments
        .iter()
        .map(|s| {
            if include_timestamps {
                format!("[{}] {}", format_duration(s.start), s.text)
            } else {
                s.text.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_as_json(doc: &TranscriptDocument<'_>) -> Result<String> {
    Ok(serde_json::to_string_pretty(doc)?)
}

pub fn format_as_srt(segments: &[TranscriptSegment]) -> String {
    let mut out = String::new();
    for (i, s) in segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_timestamp(s.start, ','),
            format_timestamp(s.start + s.duration, ','),
            s.text
        ));
    }
    out
}

pub fn format_as_vtt(segments: &[TranscriptSegment]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for s in segments {
        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_timestamp(s.start, '.'),
            format_timestamp(s.start + s.duration, '.'),
            s.text
        ));
    }
    out
}
