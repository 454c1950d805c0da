//! Transcript scraping.
//!
//! The watch page embeds the list of caption tracks in its player config;
//! each track points at a timed-text XML document with one `<text>` element
//! per caption segment.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::{Result, YoutubeError};

const WATCH_PAGE_URL: &str = "https://www.youtube.com/watch";
const CAPTION_TRACKS_MARKER: &str = "\"captionTracks\":";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

static TEXT_SEGMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<text start="[^"]*" dur="[^"]*"[^>]*>(.*?)</text>"#)
        .expect("valid timed text regex")
});

static ENTITY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|(amp|lt|gt|quot|apos));")
        .expect("valid entity regex")
});

#[derive(Debug, Clone, Deserialize)]
pub struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "languageCode", default)]
    pub language_code: String,
}

pub async fn fetch_transcript(http: &reqwest::Client, video_id: &str) -> Result<String> {
    let page = http
        .get(WATCH_PAGE_URL)
        .query(&[("v", video_id)])
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let tracks = parse_caption_tracks(&page);
    let track = pick_track(&tracks)
        .ok_or_else(|| YoutubeError::TranscriptUnavailable(video_id.to_string()))?;

    tracing::debug!("Fetching {} captions for video {}", track.language_code, video_id);

    let xml = http
        .get(&track.base_url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let transcript = parse_timed_text(&xml).join(" ");
    if transcript.trim().is_empty() {
        return Err(YoutubeError::TranscriptUnavailable(video_id.to_string()));
    }

    Ok(transcript)
}

/// Reads the caption track list out of a watch page.
pub fn parse_caption_tracks(page: &str) -> Vec<CaptionTrack> {
    let Some(start) = page.find(CAPTION_TRACKS_MARKER) else {
        return vec![];
    };
    let rest = &page[start + CAPTION_TRACKS_MARKER.len()..];

    serde_json::Deserializer::from_str(rest)
        .into_iter::<Vec<CaptionTrack>>()
        .next()
        .and_then(|res| res.ok())
        .unwrap_or_default()
}

// english first, otherwise whatever comes first
fn pick_track(tracks: &[CaptionTrack]) -> Option<&CaptionTrack> {
    tracks
        .iter()
        .find(|t| t.language_code.starts_with("en"))
        .or_else(|| tracks.first())
}

/// Extracts the decoded text of every caption segment.
pub fn parse_timed_text(xml: &str) -> Vec<String> {
    TEXT_SEGMENT_REGEX
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str()))
        .filter(|text| !text.is_empty())
        .collect()
}

fn decode_entities(text: &str) -> String {
    // timed text is escaped twice: strip the outer &amp; layer, then decode
    let unescaped = text.replace("&amp;", "&");

    ENTITY_REGEX
        .replace_all(&unescaped, |caps: &regex::Captures| {
            let decoded = if let Some(decimal) = caps.get(1) {
                decimal.as_str().parse().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else {
                match caps.get(3).map(|name| name.as_str()) {
                    Some("amp") => Some('&'),
                    Some("lt") => Some('<'),
                    Some("gt") => Some('>'),
                    Some("quot") => Some('"'),
                    Some("apos") => Some('\''),
                    _ => None,
                }
            };

            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .replace('\n', " ")
        .trim()
        .to_string()
}
