use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::{present, AppState};
use crate::db;
use crate::error::{internal, ApiError, ApiResult};
use crate::model::EnrolledCourse;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeQuery {
    user_id: Option<String>,
}

pub async fn enrolled_courses(
    State(state): State<AppState>,
    Query(query): Query<HomeQuery>,
) -> ApiResult<Json<Vec<EnrolledCourse>>> {
    let user_id = present(query.user_id).ok_or_else(|| ApiError::bad_request("User ID required"))?;

    let courses = db::run(&state.pool, move |conn| db::enrolled_courses(conn, &user_id))
        .await
        .map_err(internal("Failed to fetch enrollments"))?;

    Ok(Json(courses.into_iter().map(EnrolledCourse::from).collect()))
}
