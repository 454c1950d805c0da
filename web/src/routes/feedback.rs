use std::convert::Infallible;
use std::net::IpAddr;

use axum::{
    extract::{rejection::JsonRejection, Extension, FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use axum_client_ip::{RightmostXForwardedFor, XRealIp};
use chrono::Utc;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use auth_check::UserInfo;

use super::AppState;
use crate::db::{self, NewFeedback};
use crate::error::{internal, ApiError, ApiResult};

const MIN_RATING: f64 = 1.0;
const MAX_RATING: f64 = 5.0;
const MIN_COMMENT_CHARS: usize = 5;
const MAX_COMMENT_CHARS: usize = 500;

#[derive(Debug, PartialEq)]
pub struct FeedbackInput {
    pub category: String,
    pub rating: i32,
    pub comment: String,
}

/// Address of the client as reported by the proxy in front of us:
/// `X-Real-IP` first, then the rightmost `X-Forwarded-For` entry.
#[derive(Debug, PartialEq)]
pub struct ClientAddress(pub Option<IpAddr>);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddress {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Ok(XRealIp(ip)) = XRealIp::from_request_parts(parts, state).await {
            return Ok(ClientAddress(Some(ip)));
        }

        let forwarded = RightmostXForwardedFor::from_request_parts(parts, state)
            .await
            .ok()
            .map(|RightmostXForwardedFor(ip)| ip);
        Ok(ClientAddress(forwarded))
    }
}

/// Store a piece of feedback, attributed to the session user when there is one.
pub async fn submit_feedback(
    State(state): State<AppState>,
    user_info: Option<Extension<UserInfo>>,
    ClientAddress(client_ip): ClientAddress,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(body) = payload?;

    let input = validate_feedback(&body)
        .map_err(|details| ApiError::bad_request("Invalid feedback data").with_details(details))?;

    let new_feedback = NewFeedback {
        id: Uuid::new_v4().to_string(),
        user_id: user_info.map(|Extension(user_info)| user_info.user_id),
        category: input.category,
        rating: input.rating,
        comment: input.comment,
        created_at: Utc::now().naive_utc(),
        ip_address: client_ip.map(|ip| ip.to_string()),
        user_agent: header_value(&headers, "user-agent"),
    };

    db::run(&state.pool, move |conn| db::insert_feedback(conn, &new_feedback))
        .await
        .map_err(internal("Failed to submit feedback"))?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true }))))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Checks the feedback body field by field.
///
/// On failure the error holds every problem found, keyed by field name.
pub fn validate_feedback(body: &Value) -> Result<FeedbackInput, Value> {
    let mut details = Map::new();
    let mut problem = |field: &str, message: &str| {
        details.insert(field.to_string(), json!([message]));
    };

    let category = match body.get("category") {
        Some(Value::String(category)) => Some(category.clone()),
        Some(_) => {
            problem("category", "Expected string");
            None
        }
        None => {
            problem("category", "Required");
            None
        }
    };

    let rating = match body.get("rating").and_then(as_number) {
        Some(rating) if rating.fract() != 0.0 => {
            problem("rating", "Expected integer");
            None
        }
        Some(rating) if rating < MIN_RATING => {
            problem("rating", "Number must be greater than or equal to 1");
            None
        }
        Some(rating) if rating > MAX_RATING => {
            problem("rating", "Number must be less than or equal to 5");
            None
        }
        Some(rating) => Some(rating as i32),
        None => {
            problem("rating", "Expected number");
            None
        }
    };

    let comment = match body.get("comment") {
        Some(Value::String(comment)) => {
            let chars = comment.chars().count();
            if chars < MIN_COMMENT_CHARS {
                problem("comment", "String must contain at least 5 character(s)");
                None
            } else if chars > MAX_COMMENT_CHARS {
                problem("comment", "String must contain at most 500 character(s)");
                None
            } else {
                Some(comment.clone())
            }
        }
        Some(_) => {
            problem("comment", "Expected string");
            None
        }
        None => {
            problem("comment", "Required");
            None
        }
    };

    match (category, rating, comment) {
        (Some(category), Some(rating), Some(comment)) => Ok(FeedbackInput { category, rating, comment }),
        _ => Err(Value::Object(details)),
    }
}

// ratings arrive as numbers or as numeric strings from form fields
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|number| number.is_finite()),
        _ => None,
    }
}
