use crate::db;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const NO_SUMMARY: &str = "No summary available yet.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    #[serde(rename = "playlist_link")]
    pub playlist_link: String,
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

impl From<db::Playlist> for Playlist {
    fn from(playlist: db::Playlist) -> Self {
        Playlist {
            id: playlist.id,
            playlist_link: playlist.link,
            title: playlist.title,
            creator: playlist.creator,
            description: playlist.description,
            thumbnail: playlist.thumbnail,
            video_count: playlist.video_count,
            view_count: playlist.view_count,
            category: playlist.category,
            created_at: playlist.created_at,
            updated_at: playlist.updated_at,
        }
    }
}

/// A stored video as listed on the explore page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub video_id: String,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(rename = "playlist_link")]
    pub playlist_link: String,
    pub summary: Option<String>,
    pub quizzes: Option<Value>,
    pub ref_link: Option<Value>,
}

impl From<db::Video> for Video {
    fn from(video: db::Video) -> Self {
        Video {
            id: video.id,
            video_id: video.video_id,
            title: video.title,
            thumbnail: video.thumbnail,
            playlist_link: video.link,
            summary: video.summary,
            quizzes: video.quiz,
            ref_link: video.ref_link,
        }
    }
}

/// A video inside an enrolled course, ready for the player.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseVideo {
    pub id: String,
    pub title: Option<String>,
    pub url: String,
    pub video_id: String,
    pub summary: String,
    pub thumbnail: String,
    pub completed: bool,
}

impl CourseVideo {
    pub fn new(video: db::Video, completed: bool) -> Self {
        CourseVideo {
            url: youtube::embed_url(&video.video_id),
            summary: video
                .summary
                .filter(|summary| !summary.is_empty())
                .unwrap_or_else(|| NO_SUMMARY.to_string()),
            thumbnail: video
                .thumbnail
                .filter(|thumbnail| !thumbnail.is_empty())
                .unwrap_or_else(|| youtube::default_thumbnail(&video.video_id)),
            id: video.id,
            title: video.title,
            video_id: video.video_id,
            completed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentSummary {
    pub id: String,
    pub progress: i32,
    pub enrolled_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl From<db::Enrollment> for EnrollmentSummary {
    fn from(enrollment: db::Enrollment) -> Self {
        EnrollmentSummary {
            id: enrollment.id,
            progress: enrollment.progress,
            enrolled_at: enrollment.enrolled_at,
            completed_at: enrollment.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail {
    pub course_id: String,
    pub title: String,
    pub creator: &'static str,
    pub completed_videos: Vec<CourseVideo>,
    pub remaining_videos: Vec<CourseVideo>,
    pub enrollment: EnrollmentSummary,
}

/// Entry of the home page: the course plus the user's standing in it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledCourse {
    pub id: String,
    pub title: Option<String>,
    pub creator: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub video_count: Option<i32>,
    pub view_count: Option<i32>,
    pub category: Option<String>,
    pub progress: i32,
    pub enrolled_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl From<(db::Enrollment, db::Playlist)> for EnrolledCourse {
    fn from((enrollment, playlist): (db::Enrollment, db::Playlist)) -> Self {
        EnrolledCourse {
            id: playlist.id,
            title: playlist.title,
            creator: playlist.creator,
            description: playlist.description,
            thumbnail: playlist.thumbnail,
            video_count: playlist.video_count,
            view_count: playlist.view_count,
            category: playlist.category,
            progress: enrollment.progress,
            enrolled_at: enrollment.enrolled_at,
            completed_at: enrollment.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CourseWithVideos {
    #[serde(flatten)]
    pub playlist: Playlist,
    pub videos: Vec<Video>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistUrlRequest {
    pub playlist_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCredentials {
    pub user_id: Option<String>,
    pub user_email: Option<String>,
}

impl UserCredentials {
    pub fn present(&self) -> Option<(String, String)> {
        match (&self.user_id, &self.user_email) {
            (Some(user_id), Some(user_email)) if !user_id.is_empty() && !user_email.is_empty() => {
                Some((user_id.clone(), user_email.clone()))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdateRequest {
    #[serde(flatten)]
    pub credentials: UserCredentials,
    pub video_id: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessVideosRequest {
    pub playlist_url: Option<String>,
    pub playlist_data: Option<PlaylistSelection>,
    pub playlist_id: Option<String>,
    #[serde(flatten)]
    pub credentials: UserCredentials,
}

/// The playlist as shown to the user, with the indices they picked.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSelection {
    #[serde(default)]
    pub videos: Vec<SelectedVideo>,
    #[serde(default)]
    pub selected_indices: Vec<usize>,
}

impl PlaylistSelection {
    /// Watch URLs of the selected videos, in playlist order.
    pub fn selected_urls(&self) -> Vec<String> {
        self.videos
            .iter()
            .enumerate()
            .filter(|(index, _)| self.selected_indices.contains(index))
            .map(|(_, video)| youtube::watch_url(&video.video_id))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedVideo {
    pub video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExploreEnrollRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueVideoRequest {
    pub video_id: Option<String>,
    pub playlist_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueBulkRequest {
    pub video_ids: Option<Vec<String>>,
    pub playlist_url: Option<String>,
}
