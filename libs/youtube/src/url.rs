use std::sync::LazyLock;

use regex::Regex;

use crate::{Result, YoutubeError};

static PLAYLIST_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[&?]list=([^&]+)").expect("valid playlist id regex"));

static VIDEO_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/)([a-zA-Z0-9_-]{11})")
        .expect("valid video id regex")
});

static VIDEO_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.)?(youtube\.com/watch\?v=|youtu\.be/)[a-zA-Z0-9_-]{11}(&.*)?$")
        .expect("valid video url regex")
});

static PLAYLIST_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.)?youtube\.com/playlist\?list=[a-zA-Z0-9_-]+(&.*)?$")
        .expect("valid playlist url regex")
});

static ISO_DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?").expect("valid duration regex")
});

/// Pulls the `list=` parameter out of a playlist URL.
///
/// The URL is not normalized: any string carrying a `?list=` or `&list=`
/// parameter is accepted.
pub fn extract_playlist_id(url: &str) -> Option<String> {
    PLAYLIST_ID_REGEX
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extracts the 11 character video id from a `watch?v=` or `youtu.be/` URL.
pub fn extract_video_id(url: &str) -> Result<String> {
    VIDEO_ID_REGEX
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(YoutubeError::InvalidUrl)
}

/// Lenient variant of [`extract_video_id`]: anything that does not look like
/// a YouTube URL is taken to already be a video id.
pub fn video_id_from_input(input: &str) -> String {
    if input.contains("youtube.com") || input.contains("youtu.be") {
        if let Some(id) = input.split("v=").nth(1).and_then(|rest| rest.split('&').next()) {
            if !id.is_empty() {
                return id.to_string();
            }
        }
        if let Some(id) = input.split("youtu.be/").nth(1).and_then(|rest| rest.split('?').next()) {
            if !id.is_empty() {
                return id.to_string();
            }
        }
    }
    input.to_string()
}

pub fn is_valid_youtube_url(url: &str) -> bool {
    VIDEO_URL_REGEX.is_match(url) || PLAYLIST_URL_REGEX.is_match(url)
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

pub fn embed_url(video_id: &str) -> String {
    format!("https://www.youtube.com/embed/{}?enablejsapi=1", video_id)
}

pub fn default_thumbnail(video_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{}/mqdefault.jpg", video_id)
}

/// Formats an ISO 8601 duration (`PT1H2M3S`) as `1:02:03`, or `2:03` when
/// there are no hours.
pub fn format_duration(iso_duration: &str) -> String {
    let Some(caps) = ISO_DURATION_REGEX.captures(iso_duration) else {
        return "00:00".to_string();
    };

    let part = |idx: usize| -> u64 {
        caps.get(idx)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    let (hours, minutes, seconds) = (part(1), part(2), part(3));

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
