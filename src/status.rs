use crate::models::{ChannelInfo, Playlist, VideoStat};
use crate::quota::QuotaUsage;
use crate::youtube_api::{self, VideoSource};

use chrono::{DateTime, TimeDelta, Utc};

pub const SHORT_WINDOW_DAYS: i64 = 10;
pub const LONG_WINDOW_DAYS: i64 = 30;

/// The status log always has exactly this many playlist columns.
pub const TOP_PLAYLISTS: usize = 5;

// ---------------------------------------------------------------------------
// Window aggregation
// ---------------------------------------------------------------------------

/// Recent performance over a trailing window of `days` days.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSummary {
    pub days: i64,
    pub total_views: u64,
    pub video_count: usize,
    pub top_title: String,
    pub top_views: u64,
    /// Top video's views over the window total.
    pub top_share: f64,
    pub avg_views: f64,
    pub views_per_sub: f64,
}

pub fn summarize_window(days: i64, videos: &[VideoStat], subscribers: u64) -> WindowSummary {
    let total_views: u64 = videos.iter().map(|v| v.view_count).sum();
    let video_count = videos.len();

    // Strictly greater, so ties keep the first one seen.
    let top = videos.iter().fold(None::<&VideoStat>, |best, v| match best {
        Some(b) if b.view_count >= v.view_count => Some(b),
        _ => Some(v),
    });
    let (top_title, top_views) = top.map_or((String::new(), 0), |v| (v.title.clone(), v.view_count));

    WindowSummary {
        days,
        total_views,
        video_count,
        top_title,
        top_views,
        top_share: round_to(ratio(top_views, total_views), 4),
        avg_views: round_to(ratio(total_views, video_count as u64), 2),
        views_per_sub: round_to(ratio(total_views, subscribers), 5),
    }
}

// ---------------------------------------------------------------------------
// Playlists
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSlot {
    pub title: String,
    pub item_count: u64,
}

/// The `n` largest playlists by item count, padded with `None` to exactly
/// `n` slots. Equal counts keep the source's order.
pub fn top_playlists(playlists: &[Playlist], n: usize) -> Vec<Option<PlaylistSlot>> {
    let mut ranked: Vec<&Playlist> = playlists.iter().collect();
    ranked.sort_by(|a, b| b.item_count.cmp(&a.item_count));

    let mut slots: Vec<Option<PlaylistSlot>> = ranked
        .into_iter()
        .take(n)
        .map(|p| {
            Some(PlaylistSlot {
                title: p.title.clone(),
                item_count: p.item_count,
            })
        })
        .collect();
    slots.resize(n, None);
    slots
}

// ---------------------------------------------------------------------------
// Cumulative ratios
// ---------------------------------------------------------------------------

/// Whole days since creation divided by 30, to two decimals.
pub fn months_active(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<f64> {
    let days = (now - created_at?).num_days();
    Some(round_to(days as f64 / 30.0, 2))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRatios {
    pub subs_per_month: f64,
    pub subs_per_video: f64,
    pub views_per_video: f64,
    pub views_per_sub: f64,
    pub subs_per_view: f64,
    pub playlists_per_video: f64,
    pub videos_per_month: f64,
    pub videos_per_sub: f64,
}

pub fn channel_ratios(
    channel: &ChannelInfo,
    months_active: Option<f64>,
    playlist_count: usize,
) -> ChannelRatios {
    let subs = channel.subscriber_count;
    let videos = channel.video_count;
    let views = channel.view_count;
    let per_month = |n: u64| match months_active {
        Some(m) if m > 0.0 => round_to(n as f64 / m, 2),
        _ => 0.0,
    };

    ChannelRatios {
        subs_per_month: per_month(subs),
        subs_per_video: round_to(ratio(subs, videos), 2),
        views_per_video: round_to(ratio(views, videos), 2),
        views_per_sub: round_to(ratio(views, subs), 2),
        subs_per_view: round_to(ratio(subs, views), 5),
        playlists_per_video: round_to(ratio(playlist_count as u64, videos), 5),
        videos_per_month: per_month(videos),
        videos_per_sub: round_to(ratio(videos, subs), 5),
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One point-in-time record of a channel's full metric set.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSnapshot {
    pub taken_at: DateTime<Utc>,
    pub channel_id: String,
    pub channel_title: String,
    pub subscribers: u64,
    pub total_videos: u64,
    pub total_views: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub months_active: Option<f64>,
    pub playlist_count: usize,
    pub ratios: ChannelRatios,
    pub top_playlists: Vec<Option<PlaylistSlot>>,
    pub last_10_days: WindowSummary,
    pub last_30_days: WindowSummary,
}

/// Builds a snapshot from already-fetched facts. `recent` holds the videos of
/// the long window; the short window is the subset within its own cutoff.
pub fn build_snapshot(
    channel: &ChannelInfo,
    playlists: &[Playlist],
    recent: &[VideoStat],
    now: DateTime<Utc>,
) -> ChannelSnapshot {
    let months = months_active(channel.created_at, now);
    let subs = channel.subscriber_count;

    let short_cutoff = now - TimeDelta::days(SHORT_WINDOW_DAYS);
    let last_10: Vec<VideoStat> = recent
        .iter()
        .filter(|v| v.published_at.is_some_and(|p| p >= short_cutoff))
        .cloned()
        .collect();

    ChannelSnapshot {
        taken_at: now,
        channel_id: channel.id.clone(),
        channel_title: channel.title.clone(),
        subscribers: subs,
        total_videos: channel.video_count,
        total_views: channel.view_count,
        created_at: channel.created_at,
        months_active: months,
        playlist_count: playlists.len(),
        ratios: channel_ratios(channel, months, playlists.len()),
        top_playlists: top_playlists(playlists, TOP_PLAYLISTS),
        last_10_days: summarize_window(SHORT_WINDOW_DAYS, &last_10, subs),
        last_30_days: summarize_window(LONG_WINDOW_DAYS, recent, subs),
    }
}

/// Fetches everything a snapshot needs and computes it.
///
/// Returns `None` when the channel itself cannot be fetched; that is a no-op
/// for the caller, not something to retry. Playlist and search failures are
/// reported and the snapshot is built from what was collected.
pub fn fetch_snapshot<S: VideoSource + ?Sized>(
    source: &S,
    channel_id: &str,
    now: DateTime<Utc>,
    quota: &mut QuotaUsage,
) -> Option<ChannelSnapshot> {
    let channel = fetch_channel(source, channel_id, quota)?;
    Some(snapshot_for(source, &channel, now, quota))
}

/// Channel details, or `None` with a warning when the request fails.
pub fn fetch_channel<S: VideoSource + ?Sized>(
    source: &S,
    channel_id: &str,
    quota: &mut QuotaUsage,
) -> Option<ChannelInfo> {
    match source.channel(channel_id, quota) {
        Ok(channel) => channel,
        Err(e) => {
            youtube_api::warn("failed to fetch channel details", &e);
            None
        }
    }
}

/// Builds a snapshot for a channel whose details are already in hand.
pub fn snapshot_for<S: VideoSource + ?Sized>(
    source: &S,
    channel: &ChannelInfo,
    now: DateTime<Utc>,
    quota: &mut QuotaUsage,
) -> ChannelSnapshot {
    let playlists = youtube_api::channel_playlists(source, &channel.id, quota);
    let cutoff = now - TimeDelta::days(LONG_WINDOW_DAYS);
    let recent = youtube_api::videos_published_since(source, &channel.id, cutoff, quota);

    let snapshot = build_snapshot(channel, &playlists, &recent, now);
    tracing::info!(
        channel = %snapshot.channel_id,
        subscribers = snapshot.subscribers,
        videos_30d = snapshot.last_30_days.video_count,
        "computed channel snapshot"
    );
    snapshot
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `num / den`, or 0.0 when the denominator is zero.
fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
