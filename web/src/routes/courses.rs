use std::collections::HashSet;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    Json,
};
use diesel::prelude::*;
use serde_json::{json, Value};

use auth_check::UserInfo;

use super::{present, AppState};
use crate::db;
use crate::error::{internal, ApiError, ApiResult};
use crate::model::{CourseDetail, CourseVideo, PlaylistUrlRequest, ProgressUpdateRequest, UserCredentials};
use crate::progress::COMPLETE;

pub async fn course_exists(
    State(state): State<AppState>,
    payload: Result<Json<PlaylistUrlRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = payload?;
    let playlist_url = present(request.playlist_url).ok_or_else(|| ApiError::bad_request("Playlist URL is required"))?;

    let playlist = db::run(&state.pool, move |conn| db::find_playlist_by_link(conn, &playlist_url))
        .await
        .map_err(internal("Failed to check if course exists"))?;

    Ok(Json(json!({ "exists": playlist.is_some() })))
}

/// Enroll the signed-in user in the course imported from `playlistUrl`.
///
/// Enrolling again is a no-op that answers the same way.
pub async fn enroll(
    State(state): State<AppState>,
    Extension(user_info): Extension<UserInfo>,
    payload: Result<Json<PlaylistUrlRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = payload?;
    let playlist_url = present(request.playlist_url).ok_or_else(|| ApiError::bad_request("Playlist URL is required"))?;

    let user_id = user_info.user_id.clone();
    let outcome = db::run(&state.pool, move |conn| {
        let Some(playlist) = db::find_playlist_by_link(conn, &playlist_url)? else {
            return Ok(None);
        };
        let (_, created) = db::enroll(conn, &user_id, &playlist.link)?;
        Ok(Some((playlist.link, created)))
    })
    .await
    .map_err(internal("Failed to enroll in course"))?;

    let (course_id, created) = outcome.ok_or_else(|| ApiError::not_found("Course not found"))?;
    if created {
        tracing::info!("User {} enrolled in {}", user_info.user_id, course_id);
    }

    Ok(Json(json!({
        "courseId": course_id,
        "message": "Successfully enrolled in course",
    })))
}

// the outer result is the database, the inner one is what the client gets told
fn enrolled_course(
    conn: &mut PgConnection,
    course_id: &str,
    user_id: &str,
    user_email: &str,
) -> QueryResult<ApiResult<(db::Playlist, db::Enrollment)>> {
    if !db::user_matches(conn, user_id, user_email)? {
        return Ok(Err(ApiError::unauthorized("Invalid user credentials")));
    }

    let Some(playlist) = db::find_playlist(conn, course_id)? else {
        return Ok(Err(ApiError::not_found("Course not found")));
    };

    match db::find_enrollment(conn, user_id, &playlist.link)? {
        Some(enrollment) => Ok(Ok((playlist, enrollment))),
        None => Ok(Err(ApiError::forbidden("You are not enrolled in this course"))),
    }
}

/// Course page of an enrolled user: the videos split into completed and
/// remaining, with the enrollment progress recomputed on the way.
pub async fn course_detail(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    payload: Result<Json<UserCredentials>, JsonRejection>,
) -> ApiResult<Json<CourseDetail>> {
    let Json(credentials) = payload?;
    let (user_id, user_email) = credentials
        .present()
        .ok_or_else(|| ApiError::bad_request("User information required"))?;

    let detail = db::run(&state.pool, move |conn| {
        let (playlist, enrollment) = match enrolled_course(conn, &course_id, &user_id, &user_email)? {
            Ok(found) => found,
            Err(err) => return Ok(Err(err)),
        };

        let videos = db::videos_for_playlist(conn, &playlist.link)?;
        let completed_ids: HashSet<String> = db::completed_video_ids(conn, &enrollment.id)?.into_iter().collect();
        let enrollment = db::recompute_progress(conn, &enrollment.id)?;

        let (completed_videos, remaining_videos): (Vec<CourseVideo>, Vec<CourseVideo>) = videos
            .into_iter()
            .map(|video| {
                let completed = completed_ids.contains(&video.id);
                CourseVideo::new(video, completed)
            })
            .partition(|video| video.completed);

        Ok(Ok(CourseDetail {
            course_id: playlist.id,
            title: playlist
                .title
                .filter(|title| !title.is_empty())
                .unwrap_or_else(|| "Untitled Course".to_string()),
            creator: "YouTube",
            completed_videos,
            remaining_videos,
            enrollment: enrollment.into(),
        }))
    })
    .await
    .map_err(internal("Failed to fetch course data"))??;

    tracing::debug!(
        "Course {}: {} completed, {} remaining",
        detail.course_id,
        detail.completed_videos.len(),
        detail.remaining_videos.len()
    );
    Ok(Json(detail))
}

/// Mark one video of an enrolled course as completed or not.
pub async fn update_progress(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    payload: Result<Json<ProgressUpdateRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = payload?;
    let (user_id, user_email) = request
        .credentials
        .present()
        .ok_or_else(|| ApiError::bad_request("User information required"))?;

    let (Some(video_id), Some(completed)) = (present(request.video_id), request.completed) else {
        return Err(ApiError::bad_request("Video ID and completion status required"));
    };

    let progress_video_id = video_id.clone();
    let enrollment = db::run(&state.pool, move |conn| {
        let (playlist, enrollment) = match enrolled_course(conn, &course_id, &user_id, &user_email)? {
            Ok(found) => found,
            Err(err) => return Ok(Err(err)),
        };

        match db::find_video(conn, &progress_video_id)? {
            Some(video) if video.link == playlist.link => {}
            _ => return Ok(Err(ApiError::not_found("Video not found in this course"))),
        }

        db::record_video_progress(conn, &enrollment.id, &progress_video_id, completed).map(Ok)
    })
    .await
    .map_err(internal("Failed to update progress"))??;

    tracing::info!(
        "Enrollment {}: video {} completed={} progress={}%",
        enrollment.id,
        video_id,
        completed,
        enrollment.progress
    );

    Ok(Json(json!({
        "success": true,
        "progress": enrollment.progress,
        "completed": enrollment.progress == COMPLETE,
        "videoId": video_id,
        "videoCompleted": completed,
    })))
}

pub async fn quiz(
    State(state): State<AppState>,
    Path((_course_id, video_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let video = db::run(&state.pool, move |conn| db::find_video(conn, &video_id))
        .await
        .map_err(internal("Failed to fetch quiz questions"))?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    Ok(Json(json!({ "questions": quiz_questions(video.quiz) })))
}

/// The stored quiz as a list of questions.
///
/// Older rows hold the quiz as a JSON string or as an object keyed by
/// position; anything unreadable is an empty quiz.
pub fn quiz_questions(quiz: Option<Value>) -> Vec<Value> {
    match quiz {
        Some(Value::Array(questions)) => questions,
        Some(Value::String(raw)) => match serde_json::from_str(&raw) {
            Ok(Value::Array(questions)) => questions,
            Ok(_) => Vec::new(),
            Err(err) => {
                tracing::warn!("Stored quiz is not valid JSON: {}", err);
                Vec::new()
            }
        },
        Some(Value::Object(questions)) => {
            let mut entries: Vec<(String, Value)> = questions.into_iter().collect();
            // integer keys first in numeric order, the rest keep map order
            entries.sort_by_key(|(key, _)| array_index(key).map_or((1, 0), |index| (0, index)));
            entries.into_iter().map(|(_, question)| question).collect()
        }
        _ => Vec::new(),
    }
}

fn array_index(key: &str) -> Option<u32> {
    key.parse::<u32>().ok().filter(|index| index.to_string() == key)
}
