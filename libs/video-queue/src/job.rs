use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const JOB_NAME: &str = "process-video";

// SQS caps a message's visibility timeout at 12 hours
const MAX_VISIBILITY_SECONDS: u64 = 12 * 60 * 60;

/// Payload of a video job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoJobData {
    pub video_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl VideoJobData {
    /// The playlist the processed video is attached to: `metadata.playlistLink`
    /// when present, the job's playlist URL otherwise.
    pub fn playlist_link(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("playlistLink"))
            .and_then(Value::as_str)
            .filter(|link| !link.is_empty())
            .or(self.playlist_url.as_deref())
            .filter(|link| !link.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Backoff {
    Fixed { delay: u64 },
    Exponential { delay: u64 },
}

impl Backoff {
    /// Delay before the next attempt, given how many attempts were made so far.
    pub fn delay_for(&self, attempts_made: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay } => Duration::from_millis(delay),
            Backoff::Exponential { delay } => {
                let exponent = attempts_made.saturating_sub(1).min(31);
                Duration::from_millis(delay.saturating_mul(1u64 << exponent))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    pub attempts: u32,
    pub backoff: Backoff,
    /// Drop failed jobs instead of keeping them on the failed queue.
    pub remove_on_fail: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        JobOptions {
            attempts: 3,
            backoff: Backoff::Exponential { delay: 1000 },
            remove_on_fail: false,
        }
    }
}

impl JobOptions {
    pub fn decide(&self, attempts_made: u32) -> RetryDecision {
        if attempts_made < self.attempts {
            RetryDecision::Retry(self.backoff.delay_for(attempts_made))
        } else {
            RetryDecision::Fail
        }
    }
}

/// Envelope written as the queue message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub data: VideoJobData,
    #[serde(default)]
    pub opts: JobOptions,
    pub timestamp: i64,
}

impl Job {
    pub fn new(data: VideoJobData) -> Self {
        Job {
            name: JOB_NAME.to_string(),
            data,
            opts: JobOptions::default(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// A job leased from the queue by a consumer.
#[derive(Debug, Clone)]
pub struct ReceivedJob {
    pub id: String,
    pub job: Job,
    pub attempts_made: u32,
    pub receipt_handle: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QueueInfo {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
}

pub(crate) fn visibility_seconds(delay: Duration) -> i32 {
    let secs = delay.as_millis().div_ceil(1000) as u64;
    secs.clamp(1, MAX_VISIBILITY_SECONDS) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> VideoJobData {
        VideoJobData {
            video_url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
            playlist_url: Some("https://www.youtube.com/playlist?list=PL1".into()),
            user_id: None,
            metadata: None,
        }
    }

    #[test]
    fn exponential_backoff_doubles() {
        let backoff = Backoff::Exponential { delay: 1000 };
        assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(4));
        assert_eq!(Backoff::Fixed { delay: 500 }.delay_for(3), Duration::from_millis(500));
    }

    #[test]
    fn three_attempts_then_failed() {
        let opts = JobOptions::default();
        assert_eq!(opts.decide(1), RetryDecision::Retry(Duration::from_secs(1)));
        assert_eq!(opts.decide(2), RetryDecision::Retry(Duration::from_secs(2)));
        assert_eq!(opts.decide(3), RetryDecision::Fail);
        assert_eq!(opts.decide(7), RetryDecision::Fail);
    }

    #[test]
    fn envelope_wire_format() {
        let job = Job::new(data());
        let json = serde_json::to_value(&job).unwrap();

        assert_eq!(json["name"], "process-video");
        assert_eq!(json["data"]["videoUrl"], "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert!(json["data"].get("userId").is_none());
        assert_eq!(json["opts"]["attempts"], 3);
        assert_eq!(json["opts"]["backoff"]["type"], "exponential");
        assert_eq!(json["opts"]["backoff"]["delay"], 1000);
        assert_eq!(json["opts"]["removeOnFail"], false);
    }

    #[test]
    fn envelope_without_options_uses_defaults() {
        let job: Job = serde_json::from_str(
            r#"{"name":"process-video","data":{"videoUrl":"https://youtu.be/dQw4w9WgXcQ"},"timestamp":1}"#,
        )
        .unwrap();
        assert_eq!(job.opts, JobOptions::default());
        assert_eq!(job.data.playlist_link(), None);
    }

    #[test]
    fn playlist_link_prefers_metadata() {
        let mut job_data = data();
        assert_eq!(job_data.playlist_link(), Some("https://www.youtube.com/playlist?list=PL1"));

        let mut metadata = Map::new();
        metadata.insert("playlistLink".into(), Value::String("https://www.youtube.com/playlist?list=PL2".into()));
        job_data.metadata = Some(metadata);
        assert_eq!(job_data.playlist_link(), Some("https://www.youtube.com/playlist?list=PL2"));
    }

    #[test]
    fn empty_metadata_link_falls_back_to_playlist_url() {
        let mut job_data = data();
        let mut metadata = Map::new();
        metadata.insert("playlistLink".into(), Value::String(String::new()));
        job_data.metadata = Some(metadata);

        assert_eq!(job_data.playlist_link(), Some("https://www.youtube.com/playlist?list=PL1"));

        job_data.playlist_url = Some(String::new());
        assert_eq!(job_data.playlist_link(), None);
    }

    #[test]
    fn visibility_rounds_up_to_whole_seconds() {
        assert_eq!(visibility_seconds(Duration::from_millis(1)), 1);
        assert_eq!(visibility_seconds(Duration::from_millis(1500)), 2);
        assert_eq!(visibility_seconds(Duration::from_secs(4)), 4);
        assert_eq!(visibility_seconds(Duration::from_secs(10 * 24 * 3600)), 43200);
    }
}
