use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use youtube::{YoutubeError, YoutubePlaylist};

use super::{present, AppState};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistQuery {
    playlist_id: Option<String>,
}

/// Playlist title, creator and videos with durations, straight from the
/// YouTube Data API, for the course configuration step.
pub async fn playlist_metadata(
    State(state): State<AppState>,
    Query(query): Query<PlaylistQuery>,
) -> ApiResult<Json<YoutubePlaylist>> {
    let playlist_id = present(query.playlist_id).ok_or_else(|| ApiError::bad_request("Playlist ID is required"))?;

    state
        .youtube
        .playlist(&playlist_id)
        .await
        .map(Json)
        .map_err(youtube_error)
}

fn youtube_error(err: YoutubeError) -> ApiError {
    match err {
        YoutubeError::MissingApiKey => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "YouTube API key is not configured. Please set a valid API key.",
        ),
        YoutubeError::Api { status, message } => {
            tracing::error!("YouTube API error ({}): {}", status, message);
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            ApiError::new(status, format!("Failed to fetch playlist data: {}", message))
        }
        YoutubeError::PlaylistNotFound => ApiError::not_found("Playlist not found"),
        err => {
            tracing::error!("Error fetching YouTube data: {}", err);
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch playlist data. Please ensure you have a valid YouTube API key and the playlist exists.",
            )
        }
    }
}
