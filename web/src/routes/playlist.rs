use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{present, AppState};
use crate::db::{self, NewPlaylist};
use crate::error::{internal, queue_error, ApiError, ApiResult};
use crate::model::{Playlist, PlaylistUrlRequest, ProcessVideosRequest};

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    url: Option<String>,
}

pub async fn check_playlist(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Json<Value>> {
    let url = present(query.url).ok_or_else(|| ApiError::bad_request("Missing playlist URL"))?;

    let playlist = db::run(&state.pool, move |conn| db::find_playlist_by_link(conn, &url))
        .await
        .map_err(internal("Failed to check playlist"))?;

    Ok(Json(json!({
        "exists": playlist.is_some(),
        "playlistId": playlist.map(|playlist| playlist.id),
    })))
}

/// Import a playlist as a course.
///
/// A link that is already stored answers with the existing id; otherwise the
/// playlist metadata is fetched from YouTube (placeholder values when that
/// fails) and a new row is inserted.
pub async fn create_playlist(
    State(state): State<AppState>,
    payload: Result<Json<PlaylistUrlRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = payload?;

    let playlist_url = present(request.playlist_url).ok_or_else(|| ApiError::bad_request("Missing playlist URL"))?;
    let youtube_playlist_id = youtube::extract_playlist_id(&playlist_url)
        .ok_or_else(|| ApiError::bad_request("Invalid YouTube playlist URL"))?;

    let link = playlist_url.clone();
    let existing = db::run(&state.pool, move |conn| db::find_playlist_by_link(conn, &link))
        .await
        .map_err(internal("Failed to create playlist"))?;

    if let Some(playlist) = existing {
        return Ok(already_exists(playlist.id));
    }

    let details = state.youtube.playlist_details(&youtube_playlist_id).await;

    let new_playlist = NewPlaylist {
        id: Uuid::new_v4().to_string(),
        link: playlist_url.clone(),
        title: Some(details.title),
        creator: Some(details.creator),
        description: Some(details.description),
        thumbnail: Some(details.thumbnail),
        video_count: Some(details.video_count),
        category: Some(String::new()),
    };

    let (playlist_id, created) = db::run(&state.pool, move |conn| db::insert_playlist(conn, &new_playlist))
        .await
        .map_err(internal("Failed to create playlist"))?;

    if !created {
        return Ok(already_exists(playlist_id));
    }

    tracing::info!("Playlist {} added as course {}", playlist_url, playlist_id);
    Ok(Json(json!({
        "success": true,
        "message": "Playlist added to database",
        "playlistId": playlist_id,
    })))
}

fn already_exists(playlist_id: String) -> Json<Value> {
    Json(json!({
        "exists": true,
        "message": "Playlist already exists in the database",
        "playlistId": playlist_id,
    }))
}

/// Queue the selected videos of a playlist and enroll the requesting user.
pub async fn process_videos(
    State(state): State<AppState>,
    payload: Result<Json<ProcessVideosRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = payload?;

    let (Some(playlist_url), Some(selection), Some(playlist_id)) = (
        present(request.playlist_url),
        request.playlist_data,
        present(request.playlist_id),
    ) else {
        return Err(ApiError::bad_request("Missing required data"));
    };

    let video_urls = selection.selected_urls();
    let user_id = present(request.credentials.user_id.clone());

    let mut metadata = Map::new();
    metadata.insert("playlistLink".to_string(), Value::String(playlist_url.clone()));
    metadata.insert("playlistId".to_string(), Value::String(playlist_id));
    if let Some(user_email) = present(request.credentials.user_email.clone()) {
        metadata.insert("userEmail".to_string(), Value::String(user_email));
    }

    state
        .queue
        .add_playlist_videos_to_queue(&video_urls, &playlist_url, user_id.as_deref(), metadata)
        .await
        .map_err(queue_error("Failed to queue videos"))?;

    let enrollment = match request.credentials.present() {
        Some((user_id, user_email)) => enroll_requesting_user(&state, user_id, user_email, playlist_url).await,
        None => None,
    };

    Ok(Json(json!({
        "success": true,
        "message": "Videos added to processing queue",
        "videoCount": video_urls.len(),
        "enrollment": enrollment,
    })))
}

// queueing already succeeded, so enrollment problems are logged and reported as a null enrollment
async fn enroll_requesting_user(
    state: &AppState,
    user_id: String,
    user_email: String,
    playlist_url: String,
) -> Option<Value> {
    let result = db::run(&state.pool, move |conn| {
        if !db::user_matches(conn, &user_id, &user_email)? {
            tracing::warn!("Not enrolling {}: credentials do not match a user", user_id);
            return Ok(None);
        }
        if db::find_playlist_by_link(conn, &playlist_url)?.is_none() {
            tracing::warn!("Not enrolling {}: course {} does not exist", user_id, playlist_url);
            return Ok(None);
        }

        let (enrollment, _) = db::enroll(conn, &user_id, &playlist_url)?;
        Ok(Some((enrollment.id, playlist_url)))
    })
    .await;

    match result {
        Ok(Some((enrollment_id, course_id))) => Some(json!({
            "courseId": course_id,
            "message": "Successfully enrolled in course",
            "enrollmentId": enrollment_id,
        })),
        Ok(None) => None,
        Err(err) => {
            tracing::error!("Error enrolling user in course: {}", err);
            None
        }
    }
}

pub async fn list_playlists(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let playlists = db::run(&state.pool, db::list_playlists)
        .await
        .map_err(internal("Failed to fetch playlists"))?;

    let playlists: Vec<Playlist> = playlists.into_iter().map(Playlist::from).collect();
    Ok(Json(json!({ "success": true, "data": playlists })))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;

    use axum::http::StatusCode;

    #[tokio::test]
    async fn check_requires_url() {
        let (status, body) = send(get("/api/playlist")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing playlist URL");
    }

    #[tokio::test]
    async fn create_requires_url() {
        let (status, body) = send(post_json("/api/playlist/create", "{}")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing playlist URL");
    }

    // the pool in the offline app cannot connect, so reaching the database would answer 500
    #[tokio::test]
    async fn invalid_playlist_url_is_rejected_before_any_lookup() {
        let (status, body) = send(post_json(
            "/api/playlist/create",
            r#"{"playlistUrl":"https://www.youtube.com/watch?v=dQw4w9WgXcQ"}"#,
        ))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid YouTube playlist URL");
    }

    #[tokio::test]
    async fn process_videos_requires_playlist_data() {
        let (status, body) = send(post_json(
            "/api/playlist/process-videos",
            r#"{"playlistUrl":"https://www.youtube.com/playlist?list=PL1","playlistId":"p1"}"#,
        ))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required data");
    }

    #[tokio::test]
    async fn process_videos_with_empty_selection() {
        let (status, body) = send(post_json(
            "/api/playlist/process-videos",
            r#"{
                "playlistUrl": "https://www.youtube.com/playlist?list=PL1",
                "playlistId": "p1",
                "playlistData": { "videos": [{ "videoId": "dQw4w9WgXcQ" }], "selectedIndices": [] }
            }"#,
        ))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No video URLs provided");
    }
}
