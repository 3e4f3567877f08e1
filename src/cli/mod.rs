use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::PORT_VAR;

#[derive(Parser)]
#[command(
    name = "transcript-service",
    about = "Transcript Service - fetch YouTube transcripts over HTTP with retries and proxy support",
    version,
    long_about = "Serves YouTube transcripts as JSON. Remote fetches are retried with a jittered delay, can be routed through HTTP/HTTPS proxies and rotate their user agent on every attempt."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to bind (overrides config)
        #[arg(long, value_name = "ADDR")]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long, env = PORT_VAR, value_name = "PORT")]
        port: Option<u16>,
    },

    /// Fetch a single transcript and print or save it
    Fetch {
        /// Video ID or YouTube URL
        #[arg(value_name = "VIDEO_OR_URL")]
        video: String,

        /// Preferred language codes, in order (repeatable)
        #[arg(short, long = "language", value_name = "LANG")]
        languages: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Include timestamps in text output
        #[arg(long)]
        timestamps: bool,
    },

    /// Show or initialise the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write the default configuration file
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON with timestamps
    Json,
    /// SRT subtitle format
    Srt,
    /// WebVTT format
    Vtt,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Srt => write!(f, "srt"),
            OutputFormat::Vtt => write!(f, "vtt"),
        }
    }
}
