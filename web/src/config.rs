use std::env;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_pool_size: u32,
    pub queue_url: String,
    pub failed_queue_url: Option<String>,
    pub youtube_api_key: Option<String>,
    pub bind_address: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));

        let database_pool_size = match optional("DATABASE_POOL_SIZE") {
            Some(value) => value
                .parse::<u32>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or(ConfigError::Invalid { name: "DATABASE_POOL_SIZE", value })?,
            None => 10,
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            database_pool_size,
            queue_url: required("VIDEO_QUEUE_URL")?,
            failed_queue_url: optional("VIDEO_FAILED_QUEUE_URL"),
            youtube_api_key: optional("YOUTUBE_API_KEY"),
            bind_address: optional("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        })
    }
}
