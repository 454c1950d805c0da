mod schema;

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PoolError};
use serde_json::Value;
use uuid::Uuid;

use schema::*;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("failed to get a database connection: {0}")]
    Pool(#[from] PoolError),
    #[error("{0}")]
    Query(#[from] diesel::result::Error),
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub fn create_pool(database_url: &str) -> Result<PgPool, PoolError> {
    // jobs run one at a time
    Pool::builder()
        .max_size(2)
        .build(ConnectionManager::<PgConnection>::new(database_url))
}

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

#[derive(Insertable)]
#[diesel(table_name = playlists)]
struct NewPlaylist<'a> {
    id: String,
    link: &'a str,
    title: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = videos)]
pub struct NewVideo {
    pub id: String,
    pub video_id: String,
    pub title: String,
    pub thumbnail: String,
    pub link: String,
    pub summary: String,
    pub quiz: Value,
    pub ref_link: Value,
}

/// Returns the id of the playlist stored under `link`, creating a bare one
/// when the video arrives before its playlist was imported.
pub fn find_or_create_playlist(conn: &mut PgConnection, link: &str) -> QueryResult<String> {
    let inserted = diesel::insert_into(playlists::table)
        .values(&NewPlaylist {
            id: Uuid::new_v4().to_string(),
            link,
            title: format!("Playlist from {}", link),
        })
        .on_conflict(playlists::link)
        .do_nothing()
        .execute(conn)?;

    let playlist_id = playlists::table
        .filter(playlists::link.eq(link))
        .select(playlists::id)
        .first::<String>(conn)?;

    if inserted == 1 {
        tracing::info!("Created playlist {} for {}", playlist_id, link);
    }
    Ok(playlist_id)
}

/// Stores a processed video under its playlist. A video that is already
/// stored violates the unique `videoId` index and fails.
pub fn save_video(conn: &mut PgConnection, new_video: &NewVideo) -> QueryResult<String> {
    conn.transaction(|conn| {
        find_or_create_playlist(conn, &new_video.link)?;

        diesel::insert_into(videos::table)
            .values(new_video)
            .returning(videos::id)
            .get_result(conn)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::env;

    use serde_json::json;

    fn connection() -> PgConnection {
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set for database tests");
        PgConnection::establish(&database_url).expect("Failed to connect to the test database")
    }

    fn new_video(video_id: &str, link: &str) -> NewVideo {
        NewVideo {
            id: Uuid::new_v4().to_string(),
            video_id: video_id.to_string(),
            title: "Ownership".to_string(),
            thumbnail: String::new(),
            link: link.to_string(),
            summary: "Moves and borrows".to_string(),
            quiz: json!([]),
            ref_link: json!([]),
        }
    }

    #[test]
    #[ignore = "needs a migrated database in DATABASE_URL"]
    fn video_creates_missing_playlist() {
        connection().test_transaction::<_, diesel::result::Error, _>(|conn| {
            let link = "https://www.youtube.com/playlist?list=PLworker";
            save_video(conn, &new_video("wwwwwwwwwww", link))?;

            let title: Option<String> = playlists::table
                .filter(playlists::link.eq(link))
                .select(playlists::title)
                .first(conn)?;
            assert_eq!(title.as_deref(), Some("Playlist from https://www.youtube.com/playlist?list=PLworker"));

            // a second video reuses the playlist
            save_video(conn, &new_video("xxxxxxxxxxx", link))?;
            let playlists: i64 = playlists::table
                .filter(playlists::link.eq(link))
                .count()
                .get_result(conn)?;
            assert_eq!(playlists, 1);
            Ok(())
        });
    }

    #[test]
    #[ignore = "needs a migrated database in DATABASE_URL"]
    fn duplicate_video_fails() {
        connection().test_transaction::<_, diesel::result::Error, _>(|conn| {
            let link = "https://www.youtube.com/playlist?list=PLdup";
            save_video(conn, &new_video("yyyyyyyyyyy", link))?;

            let err = save_video(conn, &new_video("yyyyyyyyyyy", link)).unwrap_err();
            assert!(matches!(
                err,
                diesel::result::Error::DatabaseError(diesel::result::DatabaseErrorKind::UniqueViolation, _)
            ));
            Ok(())
        });
    }
}
