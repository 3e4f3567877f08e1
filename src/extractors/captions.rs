use html_escape::decode_html_entities;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::{FetchError, Transcript, TranscriptSegment};

/// A caption track listed in the player response
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionTrack {
    pub language_code: String,
    pub name: String,
    pub is_generated: bool,
    pub base_url: String,
}

fn api_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("static regex"))
}

fn cue_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?s)<text\b([^>]*)>(.*?)</text>"#).expect("static regex"))
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(\w+)="([^"]*)""#).expect("static regex"))
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

/// Pull the InnerTube API key out of a watch page
pub fn extract_api_key(html: &str) -> Option<String> {
    api_key_regex()
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether the watch page is a bot check instead of the video
pub fn is_bot_check(html: &str) -> bool {
    html.contains("g-recaptcha")
}

/// Map a non-OK `playabilityStatus` to an error
pub fn check_playability(video_id: &str, player: &Value) -> Result<(), FetchError> {
    let Some(playability) = player.get("playabilityStatus") else {
        return Ok(());
    };

    let status = playability.get("status").and_then(Value::as_str).unwrap_or("");
    if status == "OK" {
        return Ok(());
    }

    let reason = playability.get("reason").and_then(Value::as_str).unwrap_or("");

    match status {
        "ERROR" if reason.to_lowercase().contains("unavailable") => {
            Err(FetchError::VideoUnavailable(video_id.to_string()))
        }
        "LOGIN_REQUIRED" if reason.contains("not a bot") => Err(FetchError::Other(format!(
            "Request for video {} was blocked by a bot check",
            video_id
        ))),
        _ => Err(FetchError::Other(format!(
            "Video {} is unplayable: {}",
            video_id,
            if reason.is_empty() { status } else { reason }
        ))),
    }
}

/// List caption tracks from an InnerTube player response
pub fn caption_tracks(video_id: &str, player: &Value) -> Result<Vec<CaptionTrack>, FetchError> {
    let tracks = player
        .get("captions")
        .and_then(|c| c.get("playerCaptionsTracklistRenderer"))
        .and_then(|r| r.get("captionTracks"))
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::TranscriptsDisabled(video_id.to_string()))?;

    let tracks: Vec<CaptionTrack> = tracks
        .iter()
        .filter_map(|track| {
            let language_code = track.get("languageCode")?.as_str()?.to_string();
            let base_url = track.get("baseUrl")?.as_str()?.replace("&fmt=srv3", "");
            let name = track
                .get("name")
                .and_then(|n| n.get("runs"))
                .and_then(Value::as_array)
                .and_then(|runs| runs.first())
                .and_then(|r| r.get("text"))
                .or_else(|| track.get("name").and_then(|n| n.get("simpleText")))
                .and_then(Value::as_str)
                .unwrap_or(&language_code)
                .to_string();
            let is_generated = track.get("kind").and_then(Value::as_str) == Some("asr");

            Some(CaptionTrack {
                language_code,
                name,
                is_generated,
                base_url,
            })
        })
        .collect();

    if tracks.is_empty() {
        return Err(FetchError::TranscriptsDisabled(video_id.to_string()));
    }

    Ok(tracks)
}

/// Pick the first track matching `languages` in order, preferring manually
/// created tracks over generated ones for the same code
pub fn select_track<'a>(
    video_id: &str,
    tracks: &'a [CaptionTrack],
    languages: &[String],
) -> Result<&'a CaptionTrack, FetchError> {
    for lang in languages {
        let mut candidates = tracks.iter().filter(|t| &t.language_code == lang);
        let manual = candidates.clone().find(|t| !t.is_generated);
        if let Some(track) = manual.or_else(|| candidates.next()) {
            return Ok(track);
        }
    }

    Err(FetchError::NoTranscriptFound {
        video_id: video_id.to_string(),
        languages: languages.to_vec(),
        available: tracks.iter().map(|t| t.language_code.clone()).collect(),
    })
}

/// Parse a timedtext body, treating a document without cues as a failed fetch
pub fn transcript_from_timedtext(video_id: &str, xml: &str) -> Result<Transcript, FetchError> {
    let transcript = parse_timedtext(xml);
    if transcript.is_empty() {
        return Err(FetchError::Other(format!(
            "Empty transcript returned for video {}",
            video_id
        )));
    }
    Ok(transcript)
}

/// Parse a timedtext XML document into segments
pub fn parse_timedtext(xml: &str) -> Transcript {
    cue_regex()
        .captures_iter(xml)
        .filter_map(|cue| {
            let attrs = cue.get(1)?.as_str();
            let body = cue.get(2)?.as_str();

            let mut start = None;
            let mut duration = 0.0;
            for attr in attr_regex().captures_iter(attrs) {
                match &attr[1] {
                    "start" => start = attr[2].parse::<f64>().ok(),
                    "dur" => duration = attr[2].parse::<f64>().unwrap_or(0.0),
                    _ => {}
                }
            }

            // Cue bodies arrive entity-escaped twice
            let once = decode_html_entities(body).to_string();
            let text = decode_html_entities(&tag_regex().replace_all(&once, "")).trim().to_string();
            if text.is_empty() {
                return None;
            }

            Some(TranscriptSegment {
                text,
                start: start?,
                duration,
            })
        })
        .collect()
}
