use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::{present, AppState};
use crate::db;
use crate::error::{internal, ApiError, ApiResult};
use crate::model::{CourseWithVideos, ExploreEnrollRequest, Playlist, Video};

/// Public course page. Enrollment is not looked up here, the page always
/// starts out as not enrolled.
pub async fn course_overview(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let course = db::run(&state.pool, move |conn| {
        let Some(playlist) = db::find_playlist(conn, &course_id)? else {
            return Ok(None);
        };
        let videos = db::videos_for_playlist(conn, &playlist.link)?;
        Ok(Some(CourseWithVideos {
            playlist: Playlist::from(playlist),
            videos: videos.into_iter().map(Video::from).collect(),
        }))
    })
    .await
    .map_err(internal("Failed to fetch course"))?
    .ok_or_else(|| ApiError::not_found("Course not found"))?;

    Ok(Json(json!({
        "course": course,
        "isEnrolled": false,
        "enrollmentId": null,
    })))
}

enum Outcome {
    UnknownUser,
    UnknownCourse,
    Enrolled { enrollment_id: String, created: bool },
}

pub async fn enroll_by_course_id(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    payload: Result<Json<ExploreEnrollRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(request) = payload?;
    let user_id = present(request.user_id).ok_or_else(|| ApiError::bad_request("User ID is required"))?;

    let outcome = db::run(&state.pool, move |conn| {
        if !db::user_exists(conn, &user_id)? {
            return Ok(Outcome::UnknownUser);
        }
        let Some(playlist) = db::find_playlist(conn, &course_id)? else {
            return Ok(Outcome::UnknownCourse);
        };
        let (enrollment, created) = db::enroll(conn, &user_id, &playlist.link)?;
        Ok(Outcome::Enrolled {
            enrollment_id: enrollment.id,
            created,
        })
    })
    .await
    .map_err(internal("Failed to enroll in course"))?;

    match outcome {
        Outcome::UnknownUser => Err(ApiError::not_found("User not found")),
        Outcome::UnknownCourse => Err(ApiError::not_found("Course not found")),
        Outcome::Enrolled { enrollment_id, created: false } => Ok((
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Already enrolled in this course",
                "enrollmentId": enrollment_id,
            })),
        )),
        Outcome::Enrolled { enrollment_id, created: true } => {
            tracing::info!("New enrollment {}", enrollment_id);
            Ok((
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": "Enrolled successfully",
                    "enrollmentId": enrollment_id,
                })),
            ))
        }
    }
}
