use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::extractors::Transcript;
use crate::transcribe::{FailureKind, FetchOutcome};

#[derive(Debug, Serialize)]
pub struct TranscriptBody {
    pub video_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    pub transcript: Transcript,
    pub status: &'static str,
    pub segments: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub video_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, video_id: &str, language_code: Option<&str>) -> Self {
        Self {
            error: error.into(),
            video_id: video_id.to_string(),
            language_code: language_code.map(str::to_string),
            status: "error",
            kind: None,
            suggestion: None,
        }
    }
}

/// HTTP status for a classified failure
pub fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::Disabled => StatusCode::BAD_REQUEST,
        FailureKind::NotFound | FailureKind::Unavailable => StatusCode::NOT_FOUND,
        FailureKind::Other => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn suggestion_for(kind: FailureKind, language_code: Option<&str>) -> String {
    match (kind, language_code) {
        (FailureKind::Disabled, _) => "The uploader has disabled captions for this video".to_string(),
        (FailureKind::Unavailable, _) => "Check that the video ID is correct and the video is public".to_string(),
        (_, Some(lang)) => format!(
            "Try again in a few minutes or check if the video has transcripts in {}",
            lang
        ),
        (_, None) => {
            "Try again in a few minutes or check if the video has transcripts available".to_string()
        }
    }
}

/// Turn a fetch outcome into the JSON response for a transcript route
pub fn transcript_response(video_id: &str, language_code: Option<&str>, outcome: FetchOutcome) -> Response {
    match outcome {
        FetchOutcome::Success { transcript } => {
            let body = TranscriptBody {
                video_id: video_id.to_string(),
                language_code: language_code.map(str::to_string),
                segments: transcript.len(),
                transcript,
                status: "success",
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        FetchOutcome::Failure { reason, kind, .. } => {
            let mut body = ErrorBody::new(reason, video_id, language_code);
            body.kind = Some(kind);
            body.suggestion = Some(suggestion_for(kind, language_code));
            (status_for(kind), Json(body)).into_response()
        }
    }
}
