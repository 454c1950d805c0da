mod config;
mod db;
mod model;
mod processor;

use std::time::Duration;

use tracing_subscriber::EnvFilter;

use video_queue::{RetryDecision, VideoQueue};
use youtube::YoutubeClient;

use config::Config;
use model::ModelBackend;
use processor::Processor;

// SQS long poll upper bound
const RECEIVE_WAIT: Duration = Duration::from_secs(20);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("Starting video processing worker");

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url)?;
    let queue = VideoQueue::from_env(config.queue_url.clone(), config.failed_queue_url.clone()).await;
    let youtube = YoutubeClient::new(config.youtube_api_key.clone())?;
    let model = ModelBackend::new(&config.model)?;

    tracing::info!("Listening on queue {} with model {}", queue.name(), model.name());
    let processor = Processor::new(pool, youtube, model);

    loop {
        let received = queue
            .receive_job(RECEIVE_WAIT, config.visibility_timeout)
            .await
            .unwrap_or_else(|err| {
                tracing::error!("Error receiving job: {}", err);
                None
            });

        let Some(received) = received else {
            tokio::time::sleep(config.poll_interval).await;
            continue;
        };

        tracing::info!(
            "Processing job {} (attempt {}): {}",
            received.id,
            received.attempts_made,
            received.job.data.video_url
        );

        match processor.process(&received.job).await {
            Ok(stored_id) => {
                tracing::info!("Job {} stored video {}", received.id, stored_id);
                queue.complete_job(&received).await.unwrap_or_else(|err| {
                    tracing::error!("Failed to complete job {}: {}", received.id, err);
                });

                // throttles calls to the model API
                tracing::info!("Waiting {:?} before the next job", config.job_throttle);
                tokio::time::sleep(config.job_throttle).await;
            }
            Err(err) => {
                tracing::error!("Job {} failed: {}", received.id, err);
                match queue.fail_job(&received, &err.to_string()).await {
                    Ok(RetryDecision::Retry(_)) => {}
                    Ok(RetryDecision::Fail) => {
                        tracing::error!("Job {} moved to failed jobs", received.id);
                    }
                    Err(queue_err) => {
                        tracing::error!("Failed to record failure of job {}: {}", received.id, queue_err);
                    }
                }
            }
        }
    }
}
