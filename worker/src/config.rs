use std::env;
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("no model backend configured, set GEMINI_API_KEY or MODEL_API_URL")]
    NoModelBackend,
}

/// Where summaries and quizzes come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelConfig {
    Gemini { api_key: String, model: String },
    Remote { api_url: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub queue_url: String,
    pub failed_queue_url: Option<String>,
    pub youtube_api_key: Option<String>,
    pub model: ModelConfig,
    pub job_throttle: Duration,
    pub poll_interval: Duration,
    pub visibility_timeout: Duration,
}

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));
        let seconds = |name: &'static str, default: u64| -> Result<Duration, ConfigError> {
            match optional(name) {
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| ConfigError::Invalid { name, value }),
                None => Ok(Duration::from_secs(default)),
            }
        };

        // a Gemini key wins when both backends are configured
        let model = match (optional("GEMINI_API_KEY"), optional("MODEL_API_URL")) {
            (Some(api_key), _) => ModelConfig::Gemini {
                api_key,
                model: optional("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            },
            (None, Some(api_url)) => ModelConfig::Remote {
                api_url: api_url.trim_end_matches('/').to_string(),
            },
            (None, None) => return Err(ConfigError::NoModelBackend),
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            queue_url: required("VIDEO_QUEUE_URL")?,
            failed_queue_url: optional("VIDEO_FAILED_QUEUE_URL"),
            youtube_api_key: optional("YOUTUBE_API_KEY"),
            model,
            job_throttle: seconds("JOB_THROTTLE_SECONDS", 15)?,
            poll_interval: seconds("POLL_INTERVAL_SECONDS", 5)?,
            visibility_timeout: seconds("JOB_VISIBILITY_TIMEOUT_SECONDS", 900)?,
        })
    }
}
