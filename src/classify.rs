use std::fmt;

use crate::duration::parse_iso8601_duration;
use crate::models::{
    ClassifiedVideo, LiveBroadcast, PrivacyStatus, RawVideoItem, UploadStatus, VideoKind,
};

/// Longest duration (inclusive) that still counts as a short.
pub const SHORT_MAX_SECONDS: u64 = 60;

/// Why a video is left out of every log and aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    NotPublic,
    NotProcessed,
    NotArchived,
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::NotPublic => "video is not public",
            Self::NotProcessed => "video is still processing",
            Self::NotArchived => "video is live or scheduled and not yet archived",
        };
        f.write_str(reason)
    }
}

/// Decides whether a video is logged and under which kind. First match wins:
/// availability, then live state, then duration.
pub fn classify(item: &RawVideoItem, duration_seconds: u64) -> Result<VideoKind, Ineligible> {
    if item.privacy != PrivacyStatus::Public {
        return Err(Ineligible::NotPublic);
    }
    if item.upload != UploadStatus::Processed {
        return Err(Ineligible::NotProcessed);
    }

    match item.live {
        LiveBroadcast::Upcoming | LiveBroadcast::Live => Err(Ineligible::NotArchived),
        LiveBroadcast::Ended { .. } => Ok(VideoKind::Live),
        // Zero means the duration was missing or unparsable, which is never a short.
        LiveBroadcast::None if (1..=SHORT_MAX_SECONDS).contains(&duration_seconds) => {
            Ok(VideoKind::Short)
        }
        LiveBroadcast::None => Ok(VideoKind::Ordinary),
    }
}

pub fn classify_item(item: RawVideoItem) -> Result<ClassifiedVideo, Ineligible> {
    let duration_seconds = parse_iso8601_duration(&item.duration);
    let kind = classify(&item, duration_seconds)?;
    Ok(ClassifiedVideo {
        item,
        kind,
        duration_seconds,
    })
}

/// Drops ineligible videos and orders the rest oldest first.
pub fn eligible_videos(items: Vec<RawVideoItem>) -> Vec<ClassifiedVideo> {
    let mut videos: Vec<ClassifiedVideo> = items
        .into_iter()
        .filter_map(|item| {
            let id = item.id.clone();
            classify_item(item)
                .inspect_err(|reason| tracing::debug!(video_id = %id, %reason, "skipping video"))
                .ok()
        })
        .collect();
    videos.sort_by(|a, b| a.item.published_at.cmp(&b.item.published_at));
    videos
}
