use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the configured API key.
pub const API_KEY_ENV: &str = "YOUTUBE_DATA_API_KEY";

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivacyStatus {
    Public,
    Unlisted,
    Private,
    Unknown,
}

impl PrivacyStatus {
    pub fn from_api(value: &str) -> Self {
        match value {
            "public" => Self::Public,
            "unlisted" => Self::Unlisted,
            "private" => Self::Private,
            _ => Self::Unknown,
        }
    }
}

/// Processing state of an upload. Only `Processed` videos are complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Processed,
    Uploaded,
    Failed,
    Rejected,
    Deleted,
    Unknown,
}

impl UploadStatus {
    pub fn from_api(value: &str) -> Self {
        match value {
            "processed" => Self::Processed,
            "uploaded" => Self::Uploaded,
            "failed" => Self::Failed,
            "rejected" => Self::Rejected,
            "deleted" => Self::Deleted,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveBroadcast {
    None,
    Upcoming,
    Live,
    /// An archived broadcast: it has both an actual start and an actual end.
    Ended {
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    },
}

/// One video as returned by `videos.list`. Defaults for missing fields are
/// applied once, by the API parser.
#[derive(Debug, Clone)]
pub struct RawVideoItem {
    pub id: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub duration: String,
    pub privacy: PrivacyStatus,
    pub upload: UploadStatus,
    pub live: LiveBroadcast,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoKind {
    Ordinary,
    Short,
    Live,
}

impl VideoKind {
    /// Label written to the `type` column of the record log.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ordinary => "video",
            Self::Short => "short",
            Self::Live => "live",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifiedVideo {
    pub item: RawVideoItem,
    pub kind: VideoKind,
    pub duration_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: String,
    pub title: String,
    pub created_at: Option<DateTime<Utc>>,
    pub subscriber_count: u64,
    pub video_count: u64,
    pub view_count: u64,
    pub uploads_playlist_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: String,
    pub title: String,
    pub item_count: u64,
}

/// The (title, views) pair that window aggregation works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoStat {
    pub id: String,
    pub title: String,
    pub view_count: u64,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<&ClassifiedVideo> for VideoStat {
    fn from(video: &ClassifiedVideo) -> Self {
        Self {
            id: video.item.id.clone(),
            title: video.item.title.clone(),
            view_count: video.item.view_count,
            published_at: video.item.published_at,
        }
    }
}

/// One search result: just enough to page through a publish-time window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub video_id: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub youtube_api_key: Option<String>,
    pub api_base_url: String,
    /// Offset used for every rendered timestamp. `None` means the local offset.
    pub utc_offset_hours: Option<i32>,
    pub record_limit: usize,
    pub record_comment_count: bool,
    pub record_table: String,
    pub status_table: String,
    pub routine_channels: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            youtube_api_key: None,
            api_base_url: DEFAULT_API_BASE.to_string(),
            utc_offset_hours: None,
            record_limit: 50,
            record_comment_count: false,
            record_table: "record".to_string(),
            status_table: "status".to_string(),
            routine_channels: Vec::new(),
        }
    }
}

impl Config {
    /// API key from the environment, falling back to the config file.
    pub fn effective_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.youtube_api_key.clone())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn display_offset(&self) -> FixedOffset {
        self.utc_offset_hours
            .and_then(|h| FixedOffset::east_opt(h * 3600))
            .unwrap_or_else(|| Local::now().offset().fix())
    }
}
