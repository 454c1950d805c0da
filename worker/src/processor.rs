use uuid::Uuid;

use video_queue::Job;
use youtube::{YoutubeClient, YoutubeError};

use crate::db::{self, DbError, NewVideo, PgPool};
use crate::model::{ModelBackend, ModelError, ProcessedVideo};

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    InvalidVideo(#[from] YoutubeError),
    #[error("Playlist link is required. Videos must belong to a playlist.")]
    MissingPlaylist,
    #[error("Model processing failed: {0}")]
    Model(#[from] ModelError),
    #[error("Database operation failed: {0}")]
    Database(#[from] DbError),
    #[error("Could not encode processed video: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Turns one queued video into a stored course video.
pub struct Processor {
    pool: PgPool,
    youtube: YoutubeClient,
    model: ModelBackend,
}

impl Processor {
    pub fn new(pool: PgPool, youtube: YoutubeClient, model: ModelBackend) -> Self {
        Processor { pool, youtube, model }
    }

    /// Runs the whole job. Nothing is stored unless every step succeeds, so
    /// a failed attempt can simply be retried from the start.
    ///
    /// Returns the id of the stored video row.
    pub async fn process(&self, job: &Job) -> Result<String, JobError> {
        let data = &job.data;

        let video_id = youtube::extract_video_id(&data.video_url)?;
        let playlist_link = data.playlist_link().ok_or(JobError::MissingPlaylist)?.to_string();

        tracing::info!("Sending video {} to the {} model", data.video_url, self.model.name());
        let processed = self.model.process(&self.youtube, &data.video_url).await?;
        log_result(&video_id, &processed);

        let details = self.youtube.video_details(&video_id).await;
        if details.is_none() {
            tracing::warn!("No YouTube details for {}, storing without title and thumbnail", video_id);
        }
        let (title, thumbnail) = details
            .map(|details| (details.title, details.thumbnail))
            .unwrap_or_default();

        let new_video = NewVideo {
            id: Uuid::new_v4().to_string(),
            video_id,
            title,
            thumbnail,
            link: playlist_link,
            summary: processed.summary,
            quiz: serde_json::to_value(&processed.questions)?,
            ref_link: serde_json::to_value(&processed.references)?,
        };

        let stored_id = db::run(&self.pool, move |conn| db::save_video(conn, &new_video)).await?;
        Ok(stored_id)
    }
}

fn log_result(video_id: &str, processed: &ProcessedVideo) {
    let preview: String = processed.summary.chars().take(100).collect();
    tracing::info!(
        "Model output for {}: {} characters of summary, {} questions, {} links",
        video_id,
        processed.summary.len(),
        processed.questions.len(),
        processed.references.len()
    );
    tracing::debug!("Summary preview: {}...", preview);
    if let Some(first) = processed.questions.first() {
        tracing::debug!("First question: {}", first.question);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use diesel::r2d2::{ConnectionManager, Pool};
    use serde_json::{json, Map, Value};
    use video_queue::VideoJobData;

    use crate::config::ModelConfig;

    fn processor() -> Processor {
        let pool = Pool::builder()
            .build_unchecked(ConnectionManager::new("postgres://localhost:1/unreachable"));
        let model = ModelBackend::new(&ModelConfig::Remote {
            api_url: "http://127.0.0.1:1".to_string(),
        })
        .unwrap();

        Processor::new(pool, YoutubeClient::new(None).unwrap(), model)
    }

    fn job(video_url: &str, playlist_link: Option<&str>) -> Job {
        let metadata = playlist_link.map(|link| {
            let mut metadata = Map::new();
            metadata.insert("playlistLink".to_string(), Value::String(link.to_string()));
            metadata
        });

        Job::new(VideoJobData {
            video_url: video_url.to_string(),
            playlist_url: None,
            user_id: None,
            metadata,
        })
    }

    #[tokio::test]
    async fn invalid_video_url_fails_before_the_model_call() {
        let err = processor()
            .process(&job("https://example.com/video", Some("https://www.youtube.com/playlist?list=PL1")))
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::InvalidVideo(YoutubeError::InvalidUrl)));
    }

    #[tokio::test]
    async fn job_without_playlist_fails() {
        let err = processor()
            .process(&job("https://www.youtube.com/watch?v=dQw4w9WgXcQ", None))
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::MissingPlaylist));
        assert_eq!(err.to_string(), "Playlist link is required. Videos must belong to a playlist.");
    }

    #[tokio::test]
    async fn unreachable_model_is_a_model_error() {
        let err = processor()
            .process(&job(
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                Some("https://www.youtube.com/playlist?list=PL1"),
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Model(ModelError::Http(_))));
    }

    #[test]
    fn stored_quiz_shape() {
        let questions = vec![crate::model::QuizQuestion {
            question: "Q".to_string(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            answer: "a".to_string(),
            explanation: "e".to_string(),
        }];

        assert_eq!(
            serde_json::to_value(&questions).unwrap(),
            json!([{ "question": "Q", "options": ["a", "b", "c", "d"], "answer": "a", "explanation": "e" }])
        );
    }
}
