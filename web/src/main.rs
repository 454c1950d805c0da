mod config;
mod db;
mod error;
mod model;
mod progress;
mod routes;

use tracing_subscriber::EnvFilter;

use video_queue::VideoQueue;
use youtube::YoutubeClient;

use config::Config;
use routes::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url, config.database_pool_size)?;
    let queue = VideoQueue::from_env(config.queue_url.clone(), config.failed_queue_url.clone()).await;
    let youtube = YoutubeClient::new(config.youtube_api_key.clone())?;

    if !youtube.has_api_key() {
        tracing::warn!("YOUTUBE_API_KEY not set, imported playlists get placeholder details");
    }

    let app = routes::router(AppState { pool, queue, youtube });

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!("Listening on {}", config.bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
