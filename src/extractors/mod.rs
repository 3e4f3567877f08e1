use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod captions;
pub mod youtube;

use crate::proxy::ProxyConfig;
use crate::transcribe::FailureKind;

/// A single caption cue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Cue text, HTML entities decoded
    pub text: String,

    /// Start time in seconds
    pub start: f64,

    /// Duration in seconds
    pub duration: f64,
}

/// Ordered caption segments for one video
pub type Transcript = Vec<TranscriptSegment>;

/// What to fetch for one inbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Opaque platform video identifier
    pub video_id: String,

    /// Preferred language codes in order; empty means the source default
    pub language_preferences: Vec<String>,
}

impl FetchRequest {
    pub fn new(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            language_preferences: Vec::new(),
        }
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.language_preferences = languages.into_iter().map(Into::into).collect();
        self
    }

    /// Language preferences, or `None` when the caller named none
    pub fn languages(&self) -> Option<&[String]> {
        if self.language_preferences.is_empty() {
            None
        } else {
            Some(&self.language_preferences)
        }
    }
}

/// Errors raised by a transcript source, classified at the boundary
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Transcripts are disabled for video {0}")]
    TranscriptsDisabled(String),

    #[error("No transcript found for video {video_id} in languages [{}] (available: [{}])", .languages.join(", "), .available.join(", "))]
    NoTranscriptFound {
        video_id: String,
        languages: Vec<String>,
        available: Vec<String>,
    },

    #[error("Video {0} is unavailable")]
    VideoUnavailable(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::TranscriptsDisabled(_) => FailureKind::Disabled,
            FetchError::NoTranscriptFound { .. } => FailureKind::NotFound,
            FetchError::VideoUnavailable(_) => FailureKind::Unavailable,
            FetchError::Other(_) => FailureKind::Other,
        }
    }

    /// Whether another attempt cannot change the result
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            FetchError::TranscriptsDisabled(_) | FetchError::VideoUnavailable(_)
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Other(format!("HTTP request failed: {}", err))
    }
}

/// The remote operation that retrieves a transcript from a video platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fetch the transcript for `request`, routing through `proxy` when given
    async fn fetch(
        &self,
        request: &FetchRequest,
        proxy: Option<ProxyConfig>,
    ) -> Result<Transcript, FetchError>;

    /// Get the name of this platform
    fn platform_name(&self) -> &'static str;
}
