use std::collections::HashSet;

use crate::classify::eligible_videos;
use crate::models::{
    ChannelInfo, ClassifiedVideo, LiveBroadcast, Playlist, PrivacyStatus, RawVideoItem,
    SearchHit, UploadStatus, VideoStat,
};
use crate::paginate::{Collected, PAGE_SIZE, Page, collect_pages, collect_pages_while};
use crate::quota::{Endpoint, QuotaUsage};
use crate::youtube::ChannelInput;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use colored::Colorize;
use serde_json::Value;

/// Maximum number of video IDs per `videos.list` request (YouTube API limit).
pub const BATCH_SIZE: usize = 50;

const VIDEO_PARTS: &str = "snippet,contentDetails,statistics,status,liveStreamingDetails";

/// The calls this tool makes against a YouTube-like data source. Every call
/// charges its estimated cost to the caller's `quota`.
pub trait VideoSource {
    fn channel(&self, channel_id: &str, quota: &mut QuotaUsage) -> Result<Option<ChannelInfo>>;

    fn channel_for_handle(&self, handle: &str, quota: &mut QuotaUsage) -> Result<Option<String>>;

    fn search_channel(&self, query: &str, quota: &mut QuotaUsage) -> Result<Option<String>>;

    /// One page of video IDs from a playlist (e.g., a channel's uploads).
    fn playlist_items_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
        max_results: usize,
        quota: &mut QuotaUsage,
    ) -> Result<Page<String>>;

    /// Full metadata for at most [`BATCH_SIZE`] videos.
    fn videos(&self, ids: &[String], quota: &mut QuotaUsage) -> Result<Vec<RawVideoItem>>;

    /// One page of a channel's videos published at or after `published_after`,
    /// newest first.
    fn search_page(
        &self,
        channel_id: &str,
        published_after: DateTime<Utc>,
        page_token: Option<&str>,
        max_results: usize,
        quota: &mut QuotaUsage,
    ) -> Result<Page<SearchHit>>;

    fn playlists_page(
        &self,
        channel_id: &str,
        page_token: Option<&str>,
        max_results: usize,
        quota: &mut QuotaUsage,
    ) -> Result<Page<Playlist>>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

pub struct YouTubeClient {
    api_key: String,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn get(
        &self,
        endpoint: Endpoint,
        params: &[(&str, &str)],
        quota: &mut QuotaUsage,
    ) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint.path());
        tracing::debug!(endpoint = endpoint.name(), ?params, "calling YouTube Data API");

        // Charged up front: a failed request still costs quota.
        quota.record(endpoint);

        let mut request = ureq::get(&url);
        for (key, value) in params {
            request = request.query(*key, *value);
        }
        request = request.query("key", &self.api_key);

        // ureq 3.x returns Err for non-2xx status codes
        let mut response = match request.call() {
            Ok(resp) => resp,
            Err(ureq::Error::StatusCode(403)) => {
                bail!(
                    "YouTube API returned 403 Forbidden for {}. Check your API key, \
                     quota, and that the YouTube Data API v3 is enabled.",
                    endpoint.name()
                );
            }
            Err(ureq::Error::StatusCode(code)) => {
                bail!("YouTube API returned HTTP {code} for {}", endpoint.name());
            }
            Err(e) => {
                return Err(anyhow::anyhow!(e).context("failed to reach YouTube Data API"));
            }
        };

        let body: Value = response
            .body_mut()
            .read_json()
            .with_context(|| format!("failed to parse {} response", endpoint.name()))?;

        Ok(body)
    }
}

impl VideoSource for YouTubeClient {
    fn channel(&self, channel_id: &str, quota: &mut QuotaUsage) -> Result<Option<ChannelInfo>> {
        let body = self.get(
            Endpoint::Channels,
            &[
                ("part", "snippet,statistics,contentDetails"),
                ("id", channel_id),
                ("maxResults", "1"),
            ],
            quota,
        )?;
        Ok(first_item(&body).and_then(parse_channel))
    }

    fn channel_for_handle(&self, handle: &str, quota: &mut QuotaUsage) -> Result<Option<String>> {
        let body = self.get(
            Endpoint::Channels,
            &[("part", "id"), ("forHandle", handle), ("maxResults", "1")],
            quota,
        )?;
        Ok(first_item(&body)
            .and_then(|item| item["id"].as_str())
            .map(String::from))
    }

    fn search_channel(&self, query: &str, quota: &mut QuotaUsage) -> Result<Option<String>> {
        let body = self.get(
            Endpoint::Search,
            &[
                ("part", "id,snippet"),
                ("q", query),
                ("type", "channel"),
                ("maxResults", "3"),
            ],
            quota,
        )?;
        Ok(first_item(&body)
            .and_then(|item| item["id"]["channelId"].as_str())
            .map(String::from))
    }

    fn playlist_items_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
        max_results: usize,
        quota: &mut QuotaUsage,
    ) -> Result<Page<String>> {
        let max = max_results.min(PAGE_SIZE).to_string();
        let mut params = vec![
            ("part", "contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", max.as_str()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let body = self.get(Endpoint::PlaylistItems, &params, quota)?;
        parse_page(&body, |item| {
            item["contentDetails"]["videoId"].as_str().map(String::from)
        })
    }

    fn videos(&self, ids: &[String], quota: &mut QuotaUsage) -> Result<Vec<RawVideoItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if ids.len() > BATCH_SIZE {
            bail!("at most {BATCH_SIZE} video IDs per request, got {}", ids.len());
        }
        let id_param = ids.join(",");
        let max = ids.len().to_string();
        let body = self.get(
            Endpoint::Videos,
            &[
                ("part", VIDEO_PARTS),
                ("id", id_param.as_str()),
                ("maxResults", max.as_str()),
            ],
            quota,
        )?;
        Ok(parse_page(&body, parse_video)?.items)
    }

    fn search_page(
        &self,
        channel_id: &str,
        published_after: DateTime<Utc>,
        page_token: Option<&str>,
        max_results: usize,
        quota: &mut QuotaUsage,
    ) -> Result<Page<SearchHit>> {
        let after = published_after.to_rfc3339_opts(SecondsFormat::Secs, true);
        let max = max_results.min(PAGE_SIZE).to_string();
        let mut params = vec![
            ("part", "id,snippet"),
            ("channelId", channel_id),
            ("publishedAfter", after.as_str()),
            ("type", "video"),
            ("order", "date"),
            ("maxResults", max.as_str()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let body = self.get(Endpoint::Search, &params, quota)?;
        parse_page(&body, parse_search_hit)
    }

    fn playlists_page(
        &self,
        channel_id: &str,
        page_token: Option<&str>,
        max_results: usize,
        quota: &mut QuotaUsage,
    ) -> Result<Page<Playlist>> {
        let max = max_results.min(PAGE_SIZE).to_string();
        let mut params = vec![
            ("part", "snippet,contentDetails"),
            ("channelId", channel_id),
            ("maxResults", max.as_str()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let body = self.get(Endpoint::Playlists, &params, quota)?;
        parse_page(&body, parse_playlist)
    }
}

// ---------------------------------------------------------------------------
// Response parsing: defaults for missing fields are applied here only
// ---------------------------------------------------------------------------

fn first_item(body: &Value) -> Option<&Value> {
    body["items"].as_array().and_then(|items| items.first())
}

fn parse_page<T>(body: &Value, parse: impl Fn(&Value) -> Option<T>) -> Result<Page<T>> {
    let items = body["items"]
        .as_array()
        .context("unexpected API response: missing 'items' array")?;
    let next_page_token = body["nextPageToken"]
        .as_str()
        .filter(|t| !t.is_empty())
        .map(String::from);
    Ok(Page {
        items: items.iter().filter_map(parse).collect(),
        next_page_token,
    })
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(|s| s.parse::<DateTime<Utc>>().ok())
}

/// Statistics arrive as decimal strings ("12345"); accept plain numbers too.
fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

pub fn parse_channel(item: &Value) -> Option<ChannelInfo> {
    let id = item["id"].as_str()?.to_string();
    let snippet = &item["snippet"];
    let stats = &item["statistics"];

    Some(ChannelInfo {
        id,
        title: snippet["title"].as_str().unwrap_or_default().to_string(),
        created_at: parse_timestamp(&snippet["publishedAt"]),
        subscriber_count: parse_count(&stats["subscriberCount"]).unwrap_or(0),
        video_count: parse_count(&stats["videoCount"]).unwrap_or(0),
        view_count: parse_count(&stats["viewCount"]).unwrap_or(0),
        uploads_playlist_id: item["contentDetails"]["relatedPlaylists"]["uploads"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(String::from),
    })
}

pub fn parse_video(item: &Value) -> Option<RawVideoItem> {
    let id = item["id"].as_str()?.to_string();
    let snippet = &item["snippet"];
    let status = &item["status"];
    let stats = &item["statistics"];

    let live_details = &item["liveStreamingDetails"];
    let live = match snippet["liveBroadcastContent"].as_str() {
        Some("live") => LiveBroadcast::Live,
        Some("upcoming") => LiveBroadcast::Upcoming,
        _ => match (
            parse_timestamp(&live_details["actualStartTime"]),
            parse_timestamp(&live_details["actualEndTime"]),
        ) {
            (Some(started_at), Some(ended_at)) => LiveBroadcast::Ended {
                started_at,
                ended_at,
            },
            _ => LiveBroadcast::None,
        },
    };

    Some(RawVideoItem {
        id,
        title: snippet["title"].as_str().unwrap_or_default().to_string(),
        published_at: parse_timestamp(&snippet["publishedAt"]),
        duration: item["contentDetails"]["duration"]
            .as_str()
            .unwrap_or("PT0S")
            .to_string(),
        privacy: PrivacyStatus::from_api(status["privacyStatus"].as_str().unwrap_or_default()),
        upload: UploadStatus::from_api(status["uploadStatus"].as_str().unwrap_or_default()),
        live,
        view_count: parse_count(&stats["viewCount"]).unwrap_or(0),
        like_count: parse_count(&stats["likeCount"]).unwrap_or(0),
        comment_count: parse_count(&stats["commentCount"]),
    })
}

pub fn parse_playlist(item: &Value) -> Option<Playlist> {
    Some(Playlist {
        id: item["id"].as_str()?.to_string(),
        title: item["snippet"]["title"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        item_count: parse_count(&item["contentDetails"]["itemCount"]).unwrap_or(0),
    })
}

pub fn parse_search_hit(item: &Value) -> Option<SearchHit> {
    Some(SearchHit {
        video_id: item["id"]["videoId"].as_str()?.to_string(),
        published_at: parse_timestamp(&item["snippet"]["publishedAt"]),
    })
}

// ---------------------------------------------------------------------------
// Composite queries
// ---------------------------------------------------------------------------

/// Prints a non-fatal failure; the caller carries on with partial data.
pub fn warn(what: &str, err: &anyhow::Error) {
    eprintln!("{} {what}: {err:#}", "Warning:".yellow());
}

fn report_partial<T>(what: &str, collected: &Collected<T>) {
    tracing::debug!(
        pages = collected.pages,
        items = collected.items.len(),
        stop = ?collected.stop,
        "{what}: page loop finished"
    );
    if let Some(err) = &collected.error {
        warn(what, err);
        if !collected.items.is_empty() {
            eprintln!(
                "  Continuing with the {} item(s) fetched before the failure.",
                collected.items.len()
            );
        }
    }
}

/// Resolves a channel argument to a channel ID. Returns `Ok(None)` when the
/// lookup succeeded but nothing matched.
pub fn resolve_channel<S: VideoSource + ?Sized>(
    source: &S,
    input: &ChannelInput,
    quota: &mut QuotaUsage,
) -> Result<Option<String>> {
    match input {
        ChannelInput::Id(id) => Ok(Some(id.clone())),
        ChannelInput::Handle(handle) => source
            .channel_for_handle(handle, quota)
            .with_context(|| format!("failed to look up handle {handle}")),
        ChannelInput::Query(query) => source
            .search_channel(query, quota)
            .with_context(|| format!("failed to search for channel '{query}'")),
    }
}

/// Fetches full metadata for any number of IDs, chunked into batches of 50.
/// A failed batch is reported and skipped; the remaining batches still run.
/// Videos that are deleted or unavailable are silently absent.
pub fn fetch_videos<S: VideoSource + ?Sized>(
    source: &S,
    ids: &[String],
    quota: &mut QuotaUsage,
) -> Vec<RawVideoItem> {
    let mut all = Vec::with_capacity(ids.len());
    let total = ids.len();

    for (chunk_idx, chunk) in ids.chunks(BATCH_SIZE).enumerate() {
        let start = chunk_idx * BATCH_SIZE + 1;
        let end = (start + chunk.len() - 1).min(total);
        tracing::debug!("fetching videos {start}-{end} of {total}");

        match source.videos(chunk, quota) {
            Ok(items) => all.extend(items),
            Err(e) => warn(&format!("failed to fetch videos {start}-{end}"), &e),
        }
    }

    all
}

/// Eligible videos among the newest `limit` uploads of a channel, oldest first.
///
/// Fails only when the channel itself cannot be looked up.
pub fn recent_uploads<S: VideoSource + ?Sized>(
    source: &S,
    channel_id: &str,
    limit: usize,
    quota: &mut QuotaUsage,
) -> Result<Vec<ClassifiedVideo>> {
    let channel = source
        .channel(channel_id, quota)
        .context("failed to fetch channel details")?
        .with_context(|| format!("channel {channel_id} not found"))?;
    uploads_of(source, &channel, limit, quota)
}

/// [`recent_uploads`] for a channel whose details are already in hand.
pub fn uploads_of<S: VideoSource + ?Sized>(
    source: &S,
    channel: &ChannelInfo,
    limit: usize,
    quota: &mut QuotaUsage,
) -> Result<Vec<ClassifiedVideo>> {
    let uploads = channel
        .uploads_playlist_id
        .as_deref()
        .with_context(|| format!("channel {} has no uploads playlist", channel.id))?;

    let collected = collect_pages(Some(limit), |token, size| {
        source.playlist_items_page(uploads, token, size, quota)
    });
    report_partial("failed to list uploads", &collected);

    let ids = dedup_ids(collected.items);
    let items = fetch_videos(source, &ids, quota);
    Ok(eligible_videos(items))
}

/// Eligible videos a channel published at or after `cutoff`, oldest first.
///
/// The search runs newest first and stops at the first result older than the
/// cutoff; every result is re-checked against the cutoff after fetching.
pub fn videos_published_since<S: VideoSource + ?Sized>(
    source: &S,
    channel_id: &str,
    cutoff: DateTime<Utc>,
    quota: &mut QuotaUsage,
) -> Vec<VideoStat> {
    let in_window = |published: Option<DateTime<Utc>>| published.is_none_or(|p| p >= cutoff);

    let collected = collect_pages_while(
        None,
        |hit: &SearchHit| in_window(hit.published_at),
        |token, size| source.search_page(channel_id, cutoff, token, size, quota),
    );
    report_partial("failed to search recent videos", &collected);

    let ids = dedup_ids(collected.items.into_iter().map(|hit| hit.video_id));
    let items = fetch_videos(source, &ids, quota);

    eligible_videos(items)
        .iter()
        .filter(|video| video.item.published_at.is_some_and(|p| p >= cutoff))
        .map(VideoStat::from)
        .collect()
}

/// Every playlist of a channel, in the order the API lists them.
pub fn channel_playlists<S: VideoSource + ?Sized>(
    source: &S,
    channel_id: &str,
    quota: &mut QuotaUsage,
) -> Vec<Playlist> {
    let collected = collect_pages(None, |token, size| {
        source.playlists_page(channel_id, token, size, quota)
    });
    report_partial("failed to list playlists", &collected);
    collected.items
}

/// Removes repeated IDs, keeping the first occurrence.
fn dedup_ids(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
