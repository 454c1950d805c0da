use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use video_queue::QueueInfo;

use super::{present, AppState};
use crate::error::{internal, queue_error, ApiError, ApiResult};
use crate::model::{QueueBulkRequest, QueueVideoRequest};

pub async fn add_video(
    State(state): State<AppState>,
    payload: Result<Json<QueueVideoRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(request) = payload?;
    let video_id = present(request.video_id).ok_or_else(|| ApiError::bad_request("Video ID is required"))?;
    let playlist_url = present(request.playlist_url);

    let job_id = state
        .queue
        .add_video_job(&video_id, playlist_url.as_deref())
        .await
        .map_err(queue_error("Failed to add job to queue"))?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "jobId": job_id }))))
}

pub async fn add_videos(
    State(state): State<AppState>,
    payload: Result<Json<QueueBulkRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(request) = payload?;
    let video_ids = request
        .video_ids
        .filter(|video_ids| !video_ids.is_empty())
        .ok_or_else(|| ApiError::bad_request("Valid videoIds array is required"))?;
    let playlist_url = present(request.playlist_url);

    let job_ids = state
        .queue
        .add_video_jobs(&video_ids, playlist_url.as_deref())
        .await
        .map_err(queue_error("Failed to add jobs to queue"))?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "jobCount": job_ids.len() }))))
}

pub async fn queue_info(State(state): State<AppState>) -> ApiResult<Json<QueueInfo>> {
    let info = state
        .queue
        .get_queue_info()
        .await
        .map_err(internal("Failed to get queue info"))?;

    Ok(Json(info))
}

pub async fn clear_queue(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state
        .queue
        .clear_queue()
        .await
        .map_err(internal("Failed to clear queue"))?;

    tracing::info!("Queue {} cleared", state.queue.name());
    Ok(Json(json!({ "success": true, "message": "Queue cleared successfully" })))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;

    use axum::http::StatusCode;

    #[tokio::test]
    async fn single_job_requires_video_id() {
        let (status, body) = send(post_json("/api/queue/video", r#"{"playlistUrl":"https://www.youtube.com/playlist?list=PL1"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Video ID is required");
    }

    #[tokio::test]
    async fn invalid_video_id_is_rejected_before_sending() {
        let (status, body) = send(post_json("/api/queue/video", r#"{"videoId":"short"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid YouTube video ID: short");
    }

    #[tokio::test]
    async fn bulk_requires_ids() {
        let (status, body) = send(post_json("/api/queue/video/bulk", r#"{"videoIds":[]}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Valid videoIds array is required");
    }

    #[tokio::test]
    async fn bulk_with_one_bad_id_is_rejected_whole() {
        let (status, body) = send(post_json(
            "/api/queue/video/bulk",
            r#"{"videoIds":["dQw4w9WgXcQ","short"]}"#,
        ))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid YouTube video ID: short");
    }

    #[tokio::test]
    async fn bulk_rejects_non_array() {
        let (status, _) = send(post_json("/api/queue/video/bulk", r#"{"videoIds":"abc"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
