use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::url::format_duration;
use crate::{Result, YoutubeError};

const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";
const PLACEHOLDER_API_KEY: &str = "your_youtube_api_key_here";
const UNTITLED_PLAYLIST: &str = "Untitled Playlist";
const MAX_PLAYLIST_ITEMS: &str = "50";

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
    maxres: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl Thumbnails {
    fn first(order: &[&Option<Thumbnail>]) -> String {
        order
            .iter()
            .find_map(|thumb| thumb.as_ref().map(|t| t.url.clone()))
            .unwrap_or_default()
    }

    fn best(&self) -> String {
        Self::first(&[&self.maxres, &self.high, &self.medium, &self.default])
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistResource {
    snippet: PlaylistSnippet,
    #[serde(rename = "contentDetails")]
    content_details: Option<PlaylistContentDetails>,
}

#[derive(Debug, Deserialize)]
struct PlaylistSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "channelTitle", default)]
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
struct PlaylistContentDetails {
    #[serde(rename = "itemCount", default)]
    item_count: i32,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemResource {
    snippet: PlaylistItemSnippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
    #[serde(rename = "resourceId")]
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
struct ResourceId {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
    snippet: Option<VideoSnippet>,
    #[serde(rename = "contentDetails")]
    content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Playlist metadata stored when a playlist is first imported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDetails {
    pub title: String,
    pub thumbnail: String,
    pub description: String,
    pub creator: String,
    pub video_count: i32,
}

impl PlaylistDetails {
    pub fn placeholder() -> Self {
        PlaylistDetails {
            title: UNTITLED_PLAYLIST.to_string(),
            thumbnail: String::new(),
            description: String::new(),
            creator: String::new(),
            video_count: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistVideo {
    pub title: String,
    pub thumbnail: String,
    pub duration: String,
    pub video_id: String,
}

/// Playlist with its videos, as shown before a course is configured.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YoutubePlaylist {
    pub title: String,
    pub creator: String,
    pub video_count: usize,
    pub thumbnail: String,
    pub videos: Vec<PlaylistVideo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoDetails {
    pub title: String,
    pub thumbnail: String,
}

/// Thin client over the YouTube Data API v3.
///
/// The API key is optional; calls that cannot work without one either fail
/// with [`YoutubeError::MissingApiKey`] or fall back to empty data, depending
/// on what the caller needs.
#[derive(Debug, Clone)]
pub struct YoutubeClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl YoutubeClient {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let api_key = api_key.filter(|key| !key.is_empty() && key != PLACEHOLDER_API_KEY);

        Ok(YoutubeClient {
            http,
            api_key,
            base_url: YOUTUBE_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    async fn list<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Vec<T>> {
        let api_key = self.api_key.as_deref().ok_or(YoutubeError::MissingApiKey)?;

        let response = self
            .http
            .get(format!("{}/{}", self.base_url, endpoint))
            .query(query)
            .query(&[("key", api_key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .map(|e| e.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
            tracing::error!("YouTube API error on {}: {} {}", endpoint, status, message);
            return Err(YoutubeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let list: ListResponse<T> = response.json().await?;
        Ok(list.items)
    }

    /// Fetch the metadata stored for a newly imported playlist.
    ///
    /// Never fails: a missing key, an API error or an unknown playlist all
    /// yield [`PlaylistDetails::placeholder`].
    pub async fn playlist_details(&self, playlist_id: &str) -> PlaylistDetails {
        if !self.has_api_key() {
            tracing::warn!("YOUTUBE_API_KEY not set, using placeholder playlist details");
            return PlaylistDetails::placeholder();
        }

        let items = match self
            .list::<PlaylistResource>(
                "playlists",
                &[("part", "snippet,contentDetails"), ("id", playlist_id)],
            )
            .await
        {
            Ok(items) => items,
            Err(err) => {
                tracing::error!("Error fetching playlist details for {}: {}", playlist_id, err);
                return PlaylistDetails::placeholder();
            }
        };

        match items.into_iter().next() {
            Some(playlist) => PlaylistDetails {
                title: if playlist.snippet.title.is_empty() {
                    UNTITLED_PLAYLIST.to_string()
                } else {
                    playlist.snippet.title.clone()
                },
                thumbnail: playlist.snippet.thumbnails.best(),
                description: playlist.snippet.description,
                creator: playlist.snippet.channel_title,
                video_count: playlist.content_details.map(|d| d.item_count).unwrap_or(0),
            },
            None => PlaylistDetails::placeholder(),
        }
    }

    /// Fetch a playlist with up to 50 of its videos and their durations.
    pub async fn playlist(&self, playlist_id: &str) -> Result<YoutubePlaylist> {
        let playlist = self
            .list::<PlaylistResource>("playlists", &[("part", "snippet"), ("id", playlist_id)])
            .await?
            .into_iter()
            .next()
            .ok_or(YoutubeError::PlaylistNotFound)?;

        let items = self
            .list::<PlaylistItemResource>(
                "playlistItems",
                &[
                    ("part", "snippet"),
                    ("maxResults", MAX_PLAYLIST_ITEMS),
                    ("playlistId", playlist_id),
                ],
            )
            .await?;

        let video_ids = items
            .iter()
            .map(|item| item.snippet.resource_id.video_id.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let durations: HashMap<String, String> = self
            .list::<VideoResource>("videos", &[("part", "contentDetails"), ("id", &video_ids)])
            .await?
            .into_iter()
            .filter_map(|video| {
                video
                    .content_details
                    .map(|details| (video.id, format_duration(&details.duration)))
            })
            .collect();

        let videos: Vec<PlaylistVideo> = items
            .into_iter()
            .map(|item| {
                let video_id = item.snippet.resource_id.video_id;
                PlaylistVideo {
                    title: item.snippet.title,
                    thumbnail: Thumbnails::first(&[
                        &item.snippet.thumbnails.medium,
                        &item.snippet.thumbnails.default,
                    ]),
                    duration: durations
                        .get(&video_id)
                        .cloned()
                        .unwrap_or_else(|| "00:00".to_string()),
                    video_id,
                }
            })
            .collect();

        let thumbnails = &playlist.snippet.thumbnails;
        Ok(YoutubePlaylist {
            title: playlist.snippet.title.clone(),
            creator: playlist.snippet.channel_title.clone(),
            video_count: videos.len(),
            thumbnail: Thumbnails::first(&[&thumbnails.high, &thumbnails.medium, &thumbnails.default]),
            videos,
        })
    }

    async fn video_snippet(&self, video_id: &str) -> Result<Option<VideoSnippet>> {
        let video = self
            .list::<VideoResource>("videos", &[("part", "snippet"), ("id", video_id)])
            .await?
            .into_iter()
            .next();
        Ok(video.and_then(|v| v.snippet))
    }

    /// Title and thumbnail of a video, `None` when unavailable.
    pub async fn video_details(&self, video_id: &str) -> Option<VideoDetails> {
        if !self.has_api_key() {
            tracing::warn!("YouTube API key not configured, using default video metadata");
            return None;
        }

        match self.video_snippet(video_id).await {
            Ok(Some(snippet)) => Some(VideoDetails {
                thumbnail: Thumbnails::first(&[&snippet.thumbnails.high, &snippet.thumbnails.default]),
                title: snippet.title,
            }),
            Ok(None) => {
                tracing::warn!("No video found with ID: {}", video_id);
                None
            }
            Err(err) => {
                tracing::error!("Error fetching YouTube video details for {}: {}", video_id, err);
                None
            }
        }
    }

    pub async fn video_description(&self, video_id: &str) -> String {
        match self.video_snippet(video_id).await {
            Ok(snippet) => snippet.map(|s| s.description).unwrap_or_default(),
            Err(err) => {
                tracing::error!("Error fetching video description for {}: {}", video_id, err);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // Serves each canned (status, body) pair to one connection, in order.
    async fn serve(responses: Vec<(u16, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 8192];
                let _ = socket.read(&mut buf).await.unwrap();
                let response = format!(
                    "HTTP/1.1 {} STATUS\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn placeholder_without_api_key() {
        let client = YoutubeClient::new(None).unwrap();
        assert_eq!(client.playlist_details("PL1").await, PlaylistDetails::placeholder());
        assert!(client.video_details("abc").await.is_none());
        assert!(matches!(client.playlist("PL1").await, Err(YoutubeError::MissingApiKey)));
    }

    #[tokio::test]
    async fn placeholder_key_counts_as_missing() {
        let client = YoutubeClient::new(Some(PLACEHOLDER_API_KEY.to_string())).unwrap();
        assert!(!client.has_api_key());
    }

    #[tokio::test]
    async fn playlist_details_prefers_largest_thumbnail() {
        let base = serve(vec![(
            200,
            r#"{"items":[{"snippet":{"title":"Rust course","description":"desc","channelTitle":"Ferris",
                "thumbnails":{"default":{"url":"d"},"high":{"url":"h"}}},
                "contentDetails":{"itemCount":12}}]}"#,
        )])
        .await;

        let client = YoutubeClient::new(Some("key".into())).unwrap().with_base_url(base);
        let details = client.playlist_details("PL1").await;

        assert_eq!(details.title, "Rust course");
        assert_eq!(details.creator, "Ferris");
        assert_eq!(details.thumbnail, "h");
        assert_eq!(details.video_count, 12);
    }

    #[tokio::test]
    async fn playlist_details_falls_back_on_api_error() {
        let base = serve(vec![(403, r#"{"error":{"message":"quota exceeded"}}"#)]).await;
        let client = YoutubeClient::new(Some("key".into())).unwrap().with_base_url(base);

        assert_eq!(client.playlist_details("PL1").await, PlaylistDetails::placeholder());
    }

    #[tokio::test]
    async fn playlist_proxy_reports_upstream_status() {
        let base = serve(vec![(404, r#"{"error":{"message":"playlist gone"}}"#)]).await;
        let client = YoutubeClient::new(Some("key".into())).unwrap().with_base_url(base);

        match client.playlist("PL1").await {
            Err(YoutubeError::Api { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "playlist gone");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn playlist_proxy_joins_durations() {
        let base = serve(vec![
            (200, r#"{"items":[{"snippet":{"title":"Course","channelTitle":"Chan","thumbnails":{"medium":{"url":"m"}}}}]}"#),
            (
                200,
                r#"{"items":[
                    {"snippet":{"title":"One","thumbnails":{"default":{"url":"d1"}},"resourceId":{"videoId":"aaaaaaaaaaa"}}},
                    {"snippet":{"title":"Two","thumbnails":{},"resourceId":{"videoId":"bbbbbbbbbbb"}}}
                ]}"#,
            ),
            (200, r#"{"items":[{"id":"aaaaaaaaaaa","contentDetails":{"duration":"PT3M7S"}}]}"#),
        ])
        .await;
        let client = YoutubeClient::new(Some("key".into())).unwrap().with_base_url(base);

        let playlist = client.playlist("PL1").await.unwrap();
        assert_eq!(playlist.title, "Course");
        assert_eq!(playlist.thumbnail, "m");
        assert_eq!(playlist.video_count, 2);
        assert_eq!(playlist.videos[0].duration, "3:07");
        assert_eq!(playlist.videos[0].thumbnail, "d1");
        assert_eq!(playlist.videos[1].duration, "00:00");
    }
}
