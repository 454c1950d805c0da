mod schema;

use chrono::{NaiveDateTime, Utc};
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PoolError};
use serde_json::Value;
use uuid::Uuid;

use schema::*;

use crate::progress::{completion_time, progress_percentage};

pub use auth_check::PgPool;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("failed to get a database connection: {0}")]
    Pool(#[from] PoolError),
    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub fn create_pool(database_url: &str, max_size: u32) -> Result<PgPool, PoolError> {
    Pool::builder()
        .max_size(max_size)
        .build(ConnectionManager::<PgConnection>::new(database_url))
}

/// Runs blocking diesel work on the blocking thread pool with a pooled connection.
pub async fn run<T, F>(pool: &PgPool, f: F) -> Result<T, DbError>
where
    F: FnOnce(&mut PgConnection) -> QueryResult<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<T, DbError> {
        let mut conn = pool.get()?;
        Ok(f(&mut conn)?)
    })
    .await?
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = playlists)]
pub struct Playlist {
    pub id: String,
    pub link: String,
    pub title: Option<String>,
    pub creator: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub video_count: Option<i32>,
    pub view_count: Option<i32>,
    pub category: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = playlists)]
pub struct NewPlaylist {
    pub id: String,
    pub link: String,
    pub title: Option<String>,
    pub creator: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub video_count: Option<i32>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = videos)]
pub struct Video {
    pub id: String,
    pub video_id: String,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub link: String,
    pub summary: Option<String>,
    pub quiz: Option<Value>,
    pub ref_link: Option<Value>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = enrollments)]
pub struct Enrollment {
    pub id: String,
    pub user_id: String,
    pub playlist_link: String,
    pub enrolled_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub progress: i32,
}

#[derive(Insertable)]
#[diesel(table_name = enrollments)]
struct NewEnrollment<'a> {
    id: String,
    user_id: &'a str,
    playlist_link: &'a str,
    enrolled_at: NaiveDateTime,
    progress: i32,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = video_progress)]
#[allow(dead_code)]
struct VideoProgress {
    id: String,
    completed: bool,
    completed_at: Option<NaiveDateTime>,
}

#[derive(Insertable)]
#[diesel(table_name = video_progress)]
struct NewVideoProgress<'a> {
    id: String,
    user_id: &'a str,
    video_id: &'a str,
    enrollment_id: &'a str,
    completed: bool,
    completed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = feedback)]
pub struct NewFeedback {
    pub id: String,
    pub user_id: Option<String>,
    pub category: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: NaiveDateTime,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub fn find_playlist(conn: &mut PgConnection, playlist_id: &str) -> QueryResult<Option<Playlist>> {
    playlists::table
        .find(playlist_id)
        .select(Playlist::as_select())
        .first(conn)
        .optional()
}

// links are compared as raw strings, two spellings of the same playlist are two courses
pub fn find_playlist_by_link(conn: &mut PgConnection, link: &str) -> QueryResult<Option<Playlist>> {
    playlists::table
        .filter(playlists::link.eq(link))
        .select(Playlist::as_select())
        .first(conn)
        .optional()
}

pub fn list_playlists(conn: &mut PgConnection) -> QueryResult<Vec<Playlist>> {
    playlists::table
        .order(playlists::created_at.desc())
        .select(Playlist::as_select())
        .load(conn)
}

/// Inserts the playlist unless its link is already stored.
///
/// Returns the id of the stored row, which belongs to a concurrent request
/// when that one won the insert, and whether this call created it.
pub fn insert_playlist(conn: &mut PgConnection, new_playlist: &NewPlaylist) -> QueryResult<(String, bool)> {
    let inserted = diesel::insert_into(playlists::table)
        .values(new_playlist)
        .on_conflict(playlists::link)
        .do_nothing()
        .execute(conn)?;

    let id = playlists::table
        .filter(playlists::link.eq(&new_playlist.link))
        .select(playlists::id)
        .first::<String>(conn)?;

    Ok((id, inserted == 1))
}

pub fn user_exists(conn: &mut PgConnection, user_id: &str) -> QueryResult<bool> {
    diesel::select(exists(users::table.filter(users::id.eq(user_id)))).get_result(conn)
}

/// True when the id names a user whose email is `email`.
pub fn user_matches(conn: &mut PgConnection, user_id: &str, email: &str) -> QueryResult<bool> {
    diesel::select(exists(
        users::table
            .filter(users::id.eq(user_id))
            .filter(users::email.eq(email)),
    ))
    .get_result(conn)
}

pub fn find_enrollment(
    conn: &mut PgConnection,
    user_id: &str,
    playlist_link: &str,
) -> QueryResult<Option<Enrollment>> {
    enrollments::table
        .filter(enrollments::user_id.eq(user_id))
        .filter(enrollments::playlist_link.eq(playlist_link))
        .select(Enrollment::as_select())
        .first(conn)
        .optional()
}

/// Enrolls the user in the playlist unless they already are.
///
/// Returns the enrollment row together with whether this call created it.
/// The unique index on `(user_id, playlist_link)` keeps concurrent calls
/// from producing two rows.
pub fn enroll(conn: &mut PgConnection, user_id: &str, playlist_link: &str) -> QueryResult<(Enrollment, bool)> {
    let new_enrollment = NewEnrollment {
        id: Uuid::new_v4().to_string(),
        user_id,
        playlist_link,
        enrolled_at: Utc::now().naive_utc(),
        progress: 0,
    };

    let inserted = diesel::insert_into(enrollments::table)
        .values(&new_enrollment)
        .on_conflict((enrollments::user_id, enrollments::playlist_link))
        .do_nothing()
        .execute(conn)?;

    let enrollment = enrollments::table
        .filter(enrollments::user_id.eq(user_id))
        .filter(enrollments::playlist_link.eq(playlist_link))
        .select(Enrollment::as_select())
        .first(conn)?;

    Ok((enrollment, inserted == 1))
}

pub fn enrolled_courses(conn: &mut PgConnection, user_id: &str) -> QueryResult<Vec<(Enrollment, Playlist)>> {
    enrollments::table
        .inner_join(playlists::table.on(playlists::link.eq(enrollments::playlist_link)))
        .filter(enrollments::user_id.eq(user_id))
        .order(enrollments::enrolled_at.desc())
        .select((Enrollment::as_select(), Playlist::as_select()))
        .load(conn)
}

pub fn videos_for_playlist(conn: &mut PgConnection, playlist_link: &str) -> QueryResult<Vec<Video>> {
    videos::table
        .filter(videos::link.eq(playlist_link))
        .order(videos::id.asc())
        .select(Video::as_select())
        .load(conn)
}

pub fn find_video(conn: &mut PgConnection, video_id: &str) -> QueryResult<Option<Video>> {
    videos::table
        .find(video_id)
        .select(Video::as_select())
        .first(conn)
        .optional()
}

pub fn completed_video_ids(conn: &mut PgConnection, enrollment_id: &str) -> QueryResult<Vec<String>> {
    video_progress::table
        .filter(video_progress::enrollment_id.eq(enrollment_id))
        .filter(video_progress::completed.eq(true))
        .select(video_progress::video_id)
        .load(conn)
}

/// Records the completion state of one video and recomputes the enrollment
/// progress in the same transaction.
///
/// A video that is marked incomplete keeps the time it was first completed.
pub fn record_video_progress(
    conn: &mut PgConnection,
    enrollment_id: &str,
    video_id: &str,
    completed: bool,
) -> QueryResult<Enrollment> {
    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let enrollment = lock_enrollment(conn, enrollment_id)?;
        let now = Utc::now().naive_utc();

        let existing = video_progress::table
            .filter(video_progress::user_id.eq(&enrollment.user_id))
            .filter(video_progress::video_id.eq(video_id))
            .filter(video_progress::enrollment_id.eq(&enrollment.id))
            .select(VideoProgress::as_select())
            .first(conn)
            .optional()?;

        match existing {
            Some(row) => {
                let completed_at = if completed { Some(now) } else { row.completed_at };
                diesel::update(video_progress::table.find(&row.id))
                    .set((
                        video_progress::completed.eq(completed),
                        video_progress::completed_at.eq(completed_at),
                    ))
                    .execute(conn)?;
            }
            None => {
                diesel::insert_into(video_progress::table)
                    .values(&NewVideoProgress {
                        id: Uuid::new_v4().to_string(),
                        user_id: &enrollment.user_id,
                        video_id,
                        enrollment_id: &enrollment.id,
                        completed,
                        completed_at: completed.then_some(now),
                    })
                    .execute(conn)?;
            }
        }

        update_progress(conn, enrollment)
    })
}

/// Recomputes the stored progress of an enrollment from its video progress rows.
pub fn recompute_progress(conn: &mut PgConnection, enrollment_id: &str) -> QueryResult<Enrollment> {
    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let enrollment = lock_enrollment(conn, enrollment_id)?;
        update_progress(conn, enrollment)
    })
}

// row lock serialises concurrent recomputations of the same enrollment
fn lock_enrollment(conn: &mut PgConnection, enrollment_id: &str) -> QueryResult<Enrollment> {
    enrollments::table
        .find(enrollment_id)
        .select(Enrollment::as_select())
        .for_update()
        .first(conn)
}

fn update_progress(conn: &mut PgConnection, enrollment: Enrollment) -> QueryResult<Enrollment> {
    let total: i64 = videos::table
        .filter(videos::link.eq(&enrollment.playlist_link))
        .count()
        .get_result(conn)?;

    let completed: i64 = video_progress::table
        .inner_join(videos::table)
        .filter(video_progress::enrollment_id.eq(&enrollment.id))
        .filter(video_progress::completed.eq(true))
        .filter(videos::link.eq(&enrollment.playlist_link))
        .count()
        .get_result(conn)?;

    let progress = progress_percentage(completed, total);
    let completed_at = completion_time(progress, enrollment.completed_at, Utc::now().naive_utc());

    tracing::debug!(
        "Enrollment {} progress: {}/{} videos ({}%)",
        enrollment.id,
        completed,
        total,
        progress
    );

    diesel::update(enrollments::table.find(&enrollment.id))
        .set((
            enrollments::progress.eq(progress),
            enrollments::completed_at.eq(completed_at),
        ))
        .returning(Enrollment::as_returning())
        .get_result(conn)
}

pub fn insert_feedback(conn: &mut PgConnection, new_feedback: &NewFeedback) -> QueryResult<usize> {
    diesel::insert_into(feedback::table)
        .values(new_feedback)
        .execute(conn)
}
