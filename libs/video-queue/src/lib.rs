//! Producer and consumer side of the `youtube-video-processing` queue.
//!
//! Jobs are JSON envelopes on an SQS queue. Attempts are counted by SQS
//! (`ApproximateReceiveCount`); a failed attempt is retried by shortening the
//! message's visibility timeout to the backoff delay. Jobs that run out of
//! attempts are copied to an optional failed queue for inspection.

mod job;
#[cfg(test)]
mod mock_sqs;

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_sqs::Client;
use aws_sdk_sqs::types::{MessageSystemAttributeName, QueueAttributeName};
use serde_json::{Map, Value};

pub use job::{
    Backoff, JOB_NAME, Job, JobOptions, QueueInfo, ReceivedJob, RetryDecision, VideoJobData,
};

use job::visibility_seconds;

pub const QUEUE_NAME: &str = "youtube-video-processing";

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("{0}")]
    Validation(String),
    #[error("SQS error: {0}")]
    Sqs(#[from] aws_sdk_sqs::Error),
    #[error("Invalid job payload: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;

#[derive(Debug, Clone)]
pub struct VideoQueue {
    client: Client,
    queue_url: String,
    failed_queue_url: Option<String>,
}

impl VideoQueue {
    pub fn new(client: Client, queue_url: String, failed_queue_url: Option<String>) -> Self {
        VideoQueue {
            client,
            queue_url,
            failed_queue_url,
        }
    }

    /// Builds the SQS client from the standard AWS environment.
    pub async fn from_env(queue_url: String, failed_queue_url: Option<String>) -> Self {
        let client = Client::new(&aws_config::load_from_env().await);
        VideoQueue::new(client, queue_url, failed_queue_url)
    }

    pub fn name(&self) -> &'static str {
        QUEUE_NAME
    }

    /// Add a YouTube video URL to the processing queue.
    ///
    /// Both URLs are required and the video URL must look like a YouTube
    /// video or playlist URL. Returns the id of the created job.
    pub async fn add_youtube_video_to_queue(
        &self,
        video_url: &str,
        playlist_url: &str,
        user_id: Option<&str>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<String> {
        self.add(youtube_video_job(video_url, playlist_url, user_id, metadata)?).await
    }

    /// Add every video of a playlist selection, one job per URL.
    ///
    /// `metadata.playlistLink` is always set to `playlist_url`. Every URL is
    /// checked before the first job is sent, so an invalid selection queues
    /// nothing.
    pub async fn add_playlist_videos_to_queue(
        &self,
        video_urls: &[String],
        playlist_url: &str,
        user_id: Option<&str>,
        mut metadata: Map<String, Value>,
    ) -> Result<Vec<String>> {
        if video_urls.is_empty() {
            return Err(QueueError::Validation("No video URLs provided".to_string()));
        }

        metadata.insert("playlistLink".to_string(), Value::String(playlist_url.to_string()));

        let jobs = video_urls
            .iter()
            .map(|video_url| youtube_video_job(video_url, playlist_url, user_id, Some(metadata.clone())))
            .collect::<Result<Vec<_>>>()?;

        let job_ids = self.add_all(jobs).await?;
        tracing::info!("Added {} videos from playlist to queue: {}", job_ids.len(), playlist_url);
        Ok(job_ids)
    }

    /// Queue a single video by its id. The playlist is optional here; a job
    /// without one fails in the worker.
    pub async fn add_video_job(&self, video_id: &str, playlist_url: Option<&str>) -> Result<String> {
        self.add(video_id_job(video_id, playlist_url)?).await
    }

    /// Queue several videos by id. Nothing is sent unless every id is valid.
    pub async fn add_video_jobs(&self, video_ids: &[String], playlist_url: Option<&str>) -> Result<Vec<String>> {
        let jobs = video_ids
            .iter()
            .map(|video_id| video_id_job(video_id, playlist_url))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!("Adding {} jobs in bulk", jobs.len());
        self.add_all(jobs).await
    }

    async fn add_all(&self, jobs: Vec<VideoJobData>) -> Result<Vec<String>> {
        let mut job_ids = Vec::with_capacity(jobs.len());
        for data in jobs {
            job_ids.push(self.add(data).await?);
        }
        Ok(job_ids)
    }

    async fn add(&self, data: VideoJobData) -> Result<String> {
        let video_url = data.video_url.clone();
        let body = serde_json::to_string(&Job::new(data))?;

        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(aws_sdk_sqs::Error::from)?;

        let job_id = output.message_id().unwrap_or_default().to_string();
        tracing::info!("Added YouTube video to queue: {}, Job ID: {}", video_url, job_id);
        Ok(job_id)
    }

    /// Job counts. Completed jobs are deleted, so `completed` is always 0.
    pub async fn get_queue_info(&self) -> Result<QueueInfo> {
        let main = self
            .queue_attributes(
                &self.queue_url,
                &[
                    QueueAttributeName::ApproximateNumberOfMessages,
                    QueueAttributeName::ApproximateNumberOfMessagesDelayed,
                    QueueAttributeName::ApproximateNumberOfMessagesNotVisible,
                ],
            )
            .await?;

        let failed = match &self.failed_queue_url {
            Some(url) => {
                let attrs = self
                    .queue_attributes(url, &[QueueAttributeName::ApproximateNumberOfMessages])
                    .await?;
                count(&attrs, &QueueAttributeName::ApproximateNumberOfMessages)
            }
            None => 0,
        };

        Ok(QueueInfo {
            waiting: count(&main, &QueueAttributeName::ApproximateNumberOfMessages)
                + count(&main, &QueueAttributeName::ApproximateNumberOfMessagesDelayed),
            active: count(&main, &QueueAttributeName::ApproximateNumberOfMessagesNotVisible),
            completed: 0,
            failed,
        })
    }

    async fn queue_attributes(
        &self,
        queue_url: &str,
        names: &[QueueAttributeName],
    ) -> Result<HashMap<QueueAttributeName, String>> {
        let mut request = self.client.get_queue_attributes().queue_url(queue_url);
        for name in names {
            request = request.attribute_names(name.clone());
        }

        let output = request.send().await.map_err(aws_sdk_sqs::Error::from)?;
        Ok(output.attributes().cloned().unwrap_or_default())
    }

    /// Remove every waiting job and every retained failed job.
    pub async fn clear_queue(&self) -> Result<()> {
        for url in std::iter::once(&self.queue_url).chain(self.failed_queue_url.iter()) {
            self.client
                .purge_queue()
                .queue_url(url)
                .send()
                .await
                .map_err(aws_sdk_sqs::Error::from)?;
            tracing::info!("Purged queue {}", url);
        }
        Ok(())
    }

    /// Lease at most one job. Messages that cannot be parsed are moved to
    /// the failed queue right away, they would never succeed.
    pub async fn receive_job(&self, wait: Duration, visibility: Duration) -> Result<Option<ReceivedJob>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(wait.as_secs().min(20) as i32)
            .visibility_timeout(visibility_seconds(visibility))
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(aws_sdk_sqs::Error::from)?;

        for message in output.messages.unwrap_or_default() {
            let attempts_made = message
                .attributes()
                .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
                .and_then(|value| value.parse::<u32>().ok())
                .unwrap_or(1);
            let receipt_handle = message.receipt_handle.unwrap_or_default();

            let body = match message.body {
                Some(body) => body,
                None => {
                    tracing::warn!("Received message with no body, skipping.");
                    self.delete(&receipt_handle).await?;
                    continue;
                }
            };

            let job: Job = match serde_json::from_str(&body) {
                Ok(job) => job,
                Err(err) => {
                    tracing::error!("Failed to parse message body as JSON: {}", err);
                    self.retain_failed(serde_json::json!({
                        "rawBody": body,
                        "failedReason": format!("Invalid job payload: {}", err),
                    }))
                    .await?;
                    self.delete(&receipt_handle).await?;
                    continue;
                }
            };

            return Ok(Some(ReceivedJob {
                id: message.message_id.unwrap_or_default(),
                job,
                attempts_made,
                receipt_handle,
            }));
        }

        Ok(None)
    }

    /// Acknowledge a processed job.
    pub async fn complete_job(&self, job: &ReceivedJob) -> Result<()> {
        self.delete(&job.receipt_handle).await?;
        tracing::info!("Job {} completed successfully", job.id);
        Ok(())
    }

    /// Record a failed attempt and schedule a retry, or give up on the job
    /// once its attempts are exhausted.
    pub async fn fail_job(&self, job: &ReceivedJob, reason: &str) -> Result<RetryDecision> {
        let decision = job.job.opts.decide(job.attempts_made);

        match decision {
            RetryDecision::Retry(delay) => {
                tracing::warn!(
                    "Job {} failed (attempt {}/{}), retrying in {:?}: {}",
                    job.id,
                    job.attempts_made,
                    job.job.opts.attempts,
                    delay,
                    reason
                );
                self.client
                    .change_message_visibility()
                    .queue_url(&self.queue_url)
                    .receipt_handle(&job.receipt_handle)
                    .visibility_timeout(visibility_seconds(delay))
                    .send()
                    .await
                    .map_err(aws_sdk_sqs::Error::from)?;
            }
            RetryDecision::Fail => {
                tracing::error!(
                    "Job {} failed permanently after {} attempts: {}",
                    job.id,
                    job.attempts_made,
                    reason
                );
                if !job.job.opts.remove_on_fail {
                    let mut record = serde_json::to_value(&job.job)?;
                    if let Value::Object(fields) = &mut record {
                        fields.insert("id".to_string(), Value::String(job.id.clone()));
                        fields.insert("failedReason".to_string(), Value::String(reason.to_string()));
                        fields.insert("attemptsMade".to_string(), Value::from(job.attempts_made));
                        fields.insert(
                            "finishedOn".to_string(),
                            Value::from(chrono::Utc::now().timestamp_millis()),
                        );
                    }
                    self.retain_failed(record).await?;
                }
                self.delete(&job.receipt_handle).await?;
            }
        }

        Ok(decision)
    }

    async fn retain_failed(&self, record: Value) -> Result<()> {
        let Some(url) = &self.failed_queue_url else {
            tracing::warn!("No failed queue configured, dropping failed job");
            return Ok(());
        };

        self.client
            .send_message()
            .queue_url(url)
            .message_body(record.to_string())
            .send()
            .await
            .map_err(aws_sdk_sqs::Error::from)?;
        Ok(())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(aws_sdk_sqs::Error::from)?;
        Ok(())
    }
}

fn youtube_video_job(
    video_url: &str,
    playlist_url: &str,
    user_id: Option<&str>,
    metadata: Option<Map<String, Value>>,
) -> Result<VideoJobData> {
    if video_url.is_empty() {
        return Err(QueueError::Validation("Video URL is required".to_string()));
    }
    if playlist_url.is_empty() {
        return Err(QueueError::Validation("Playlist URL is required".to_string()));
    }
    if !youtube::is_valid_youtube_url(video_url) {
        return Err(QueueError::Validation("Invalid YouTube URL format".to_string()));
    }

    Ok(VideoJobData {
        video_url: video_url.to_string(),
        playlist_url: Some(playlist_url.to_string()),
        user_id: user_id.map(str::to_string),
        metadata,
    })
}

fn video_id_job(video_id: &str, playlist_url: Option<&str>) -> Result<VideoJobData> {
    if video_id.is_empty() {
        return Err(QueueError::Validation("Video ID is required".to_string()));
    }

    let video_url = youtube::watch_url(video_id);
    if !youtube::is_valid_youtube_url(&video_url) {
        return Err(QueueError::Validation(format!("Invalid YouTube video ID: {}", video_id)));
    }

    Ok(VideoJobData {
        video_url,
        playlist_url: playlist_url.map(str::to_string),
        user_id: None,
        metadata: None,
    })
}

fn count(attrs: &HashMap<QueueAttributeName, String>, name: &QueueAttributeName) -> u64 {
    attrs.get(name).and_then(|v| v.parse().ok()).unwrap_or(0)
}
