//! YouTube helpers shared by the web and worker services.
//!
//! Covers URL parsing, the Data API v3 calls used during playlist ingestion
//! and video processing, and transcript scraping.

mod api;
mod links;
mod url;

pub mod transcript;

pub use api::{PlaylistDetails, PlaylistVideo, VideoDetails, YoutubeClient, YoutubePlaylist};
pub use links::{RefLink, extract_links};
pub use url::{
    default_thumbnail, embed_url, extract_playlist_id, extract_video_id, format_duration,
    is_valid_youtube_url, video_id_from_input, watch_url,
};

#[derive(Debug, thiserror::Error)]
pub enum YoutubeError {
    #[error("Invalid YouTube URL format")]
    InvalidUrl,
    #[error("YouTube API key is not configured")]
    MissingApiKey,
    #[error("YouTube API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Playlist not found")]
    PlaylistNotFound,
    #[error("Could not fetch transcript for video {0}")]
    TranscriptUnavailable(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, YoutubeError>;
