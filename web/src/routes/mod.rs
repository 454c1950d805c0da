mod courses;
mod explore;
mod feedback;
mod home;
mod playlist;
mod queue;
mod youtube_proxy;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;

use auth_check::{auth_middleware, optional_auth_middleware, PgPool};
use video_queue::VideoQueue;
use youtube::YoutubeClient;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub queue: VideoQueue,
    pub youtube: YoutubeClient,
}

// non-empty string field of a request body
fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

pub fn router(state: AppState) -> Router {
    let session_routes = Router::new()
        .route("/api/courses/enroll", post(courses::enroll))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(state.pool.clone(), auth_middleware))
        );

    let optional_session_routes = Router::new()
        .route("/api/feedback", post(feedback::submit_feedback))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(state.pool.clone(), optional_auth_middleware))
        );

    Router::new()
        .route("/api/health", get(|| async { "ok" }))
        .route("/api/playlist", get(playlist::check_playlist))
        .route("/api/playlist/create", post(playlist::create_playlist))
        .route("/api/playlist/process-videos", post(playlist::process_videos))
        .route("/api/playlists", get(playlist::list_playlists))
        .route("/api/courses/exists", post(courses::course_exists))
        .route("/api/courses/{course_id}", post(courses::course_detail))
        .route("/api/courses/{course_id}/progress", post(courses::update_progress))
        .route("/api/courses/{course_id}/quiz/{video_id}", get(courses::quiz))
        .route("/api/home", get(home::enrolled_courses))
        .route(
            "/api/explore/{course_id}",
            get(explore::course_overview).post(explore::enroll_by_course_id),
        )
        .route("/api/youtube", get(youtube_proxy::playlist_metadata))
        .route("/api/queue", delete(queue::clear_queue))
        .route("/api/queue/info", get(queue::queue_info))
        .route("/api/queue/video", post(queue::add_video))
        .route("/api/queue/video/bulk", post(queue::add_videos))
        .merge(session_routes)
        .merge(optional_session_routes)
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    use std::time::Duration;

    use aws_sdk_sqs::config::{BehaviorVersion, Region};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use diesel::r2d2::{ConnectionManager, Pool};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    /// App wired to a pool that never connects and a queue client that
    /// never sends, for requests that must be rejected before any I/O.
    pub fn offline_app() -> Router {
        let pool = Pool::builder()
            .connection_timeout(Duration::from_millis(250))
            .build_unchecked(ConnectionManager::new("postgres://localhost:1/unreachable"));

        let sqs_config = aws_sdk_sqs::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        let queue = VideoQueue::new(
            aws_sdk_sqs::Client::from_conf(sqs_config),
            "http://localhost:1/000000000000/youtube-video-processing".to_string(),
            None,
        );

        let youtube = YoutubeClient::new(None).unwrap();

        router(AppState { pool, queue, youtube })
    }

    pub async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = offline_app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }
}
