use axum_extra::extract::CookieJar;

use axum::{
    extract::{
        Request,
        State,
    },
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PoolError};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("failed to get a database connection: {0}")]
    Pool(#[from] PoolError),
    #[error("session query failed: {0}")]
    Diesel(#[from] diesel::result::Error),
    #[error("session lookup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

// session cookie set by the sign-in flow; its value is `<token>.<signature>`
const SESSION_COOKIE: &str = "better-auth.session_token";
const SECURE_SESSION_COOKIE: &str = "__Secure-better-auth.session_token";
const PLAIN_SESSION_COOKIE: &str = "session";

mod schema {
    diesel::table! {
        #[sql_name = "user"]
        users (id) {
            id -> Text,
            name -> Text,
            email -> Text,
        }
    }

    diesel::table! {
        session (id) {
            id -> Text,
            expires_at -> Timestamp,
            token -> Text,
            user_id -> Text,
        }
    }

    diesel::joinable!(session -> users (user_id));
    diesel::allow_tables_to_appear_in_same_query!(users, session);
}

/// The signed-in user, inserted into the request extensions by the middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub user_id: String,
    pub email: String,
}

// implement a tower middleware that fetches the session token from the Authorization header or the cookies,
// and then resolves it against the session table

pub async fn auth_middleware(State(pool): State<PgPool>, mut req: Request, next: Next) -> Response {
    let Some(token) = session_token(req.headers()) else {
        return error_response(StatusCode::UNAUTHORIZED, "Authentication required");
    };

    match lookup_session(&pool, &token).await {
        Ok(Some(user_info)) => {
            req.extensions_mut().insert(user_info);
            next.run(req).await
        }
        Ok(None) => error_response(StatusCode::UNAUTHORIZED, "Authentication required"),
        Err(err) => {
            tracing::error!("Session lookup failed: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to verify session")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Same lookup as [`auth_middleware`], but anonymous requests pass through
/// without a `UserInfo` extension.
pub async fn optional_auth_middleware(State(pool): State<PgPool>, mut req: Request, next: Next) -> Response {
    if let Some(token) = session_token(req.headers()) {
        match lookup_session(&pool, &token).await {
            Ok(Some(user_info)) => {
                req.extensions_mut().insert(user_info);
            }
            Ok(None) => tracing::debug!("Ignoring unknown or expired session"),
            Err(err) => tracing::error!("Session lookup failed: {}", err),
        }
    }

    next.run(req).await
}

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get("Authorization") {
        if let Ok(auth_value) = auth_header.to_str() {
            if let Some(token) = auth_value.strip_prefix("Bearer ") {
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    let cookie_jar = CookieJar::from_headers(headers);
    [SESSION_COOKIE, SECURE_SESSION_COOKIE, PLAIN_SESSION_COOKIE]
        .iter()
        .find_map(|name| cookie_jar.get(name))
        .map(|cookie| unsigned_token(cookie.value()))
        .filter(|token| !token.is_empty())
}

// signed cookies carry `<token>.<signature>`, the session table stores only the token
fn unsigned_token(value: &str) -> String {
    let decoded = urlencoding::decode(value).map(|decoded| decoded.into_owned()).unwrap_or_else(|_| value.to_string());
    match decoded.split_once('.') {
        Some((token, _signature)) => token.to_string(),
        None => decoded,
    }
}

async fn lookup_session(pool: &PgPool, token: &str) -> Result<Option<UserInfo>, AuthError> {
    let pool = pool.clone();
    let token = token.to_string();

    tokio::task::spawn_blocking(move || -> Result<Option<UserInfo>, AuthError> {
        use schema::{session, users};

        let mut conn = pool.get()?;

        let row = session::table
            .inner_join(users::table)
            .filter(session::token.eq(&token))
            .filter(session::expires_at.gt(chrono::Utc::now().naive_utc()))
            .select((users::id, users::email))
            .first::<(String, String)>(&mut conn)
            .optional()?;

        Ok(row.map(|(user_id, email)| UserInfo { user_id, email }))
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer abc123"));
        headers.insert("Cookie", HeaderValue::from_static("better-auth.session_token=zzz.sig"));

        assert_eq!(session_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn signed_cookie_is_stripped_of_signature() {
        let mut headers = HeaderMap::new();
        headers.insert("Cookie", HeaderValue::from_static("theme=dark; better-auth.session_token=tok%2Esignature"));

        assert_eq!(session_token(&headers), Some("tok".to_string()));
    }

    #[test]
    fn cookie_value_is_percent_decoded() {
        let mut headers = HeaderMap::new();
        headers.insert("Cookie", HeaderValue::from_static("better-auth.session_token=a%2Bb%3D%2esig"));

        assert_eq!(session_token(&headers), Some("a+b=".to_string()));
    }

    #[test]
    fn malformed_escape_keeps_raw_value() {
        // %FF alone is not valid UTF-8
        assert_eq!(unsigned_token("tok%FF"), "tok%FF");
    }

    #[tokio::test]
    async fn unreachable_database_is_a_pool_error() {
        let pool = Pool::builder()
            .connection_timeout(std::time::Duration::from_millis(250))
            .build_unchecked(ConnectionManager::new("postgres://localhost:1/unreachable"));

        let err = lookup_session(&pool, "tok").await.unwrap_err();
        assert!(matches!(err, AuthError::Pool(_)));
    }

    #[test]
    fn plain_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("Cookie", HeaderValue::from_static("session=plain"));

        assert_eq!(session_token(&headers), Some("plain".to_string()));
    }

    #[test]
    fn no_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Basic dXNlcjpwYXNz"));

        assert_eq!(session_token(&headers), None);
    }
}
