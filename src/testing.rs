//! In-memory `VideoSource` for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::models::{
    ChannelInfo, LiveBroadcast, Playlist, PrivacyStatus, RawVideoItem, SearchHit, UploadStatus,
};
use crate::paginate::Page;
use crate::quota::{Endpoint, QuotaUsage};
use crate::youtube_api::VideoSource;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};

pub fn fake_video(id: &str, published_at: DateTime<Utc>, duration: &str, views: u64) -> RawVideoItem {
    RawVideoItem {
        id: id.to_string(),
        title: format!("Title for {id}"),
        published_at: Some(published_at),
        duration: duration.to_string(),
        privacy: PrivacyStatus::Public,
        upload: UploadStatus::Processed,
        live: LiveBroadcast::None,
        view_count: views,
        like_count: views / 10,
        comment_count: None,
    }
}

#[derive(Default)]
pub struct FakeSource {
    channel: RefCell<Option<ChannelInfo>>,
    handles: RefCell<HashMap<String, String>>,
    videos: RefCell<HashMap<String, RawVideoItem>>,
    /// Upload order, newest first, as the uploads playlist lists them.
    uploads: RefCell<Vec<String>>,
    playlists: RefCell<Vec<Playlist>>,
    batches: RefCell<Vec<usize>>,
    failing_batch: Cell<Option<usize>>,
    fail_channel: Cell<bool>,
    fail_search: Cell<bool>,
    fail_playlists: Cell<bool>,
}

impl FakeSource {
    pub fn with_channel(
        id: &str,
        subscribers: u64,
        videos: u64,
        views: u64,
        created_at: Option<DateTime<Utc>>,
    ) -> Self {
        let source = Self::default();
        source.channel.replace(Some(ChannelInfo {
            id: id.to_string(),
            title: format!("Channel {id}"),
            created_at,
            subscriber_count: subscribers,
            video_count: videos,
            view_count: views,
            uploads_playlist_id: Some("uploads".to_string()),
        }));
        source
    }

    pub fn add_video(&self, video: RawVideoItem) {
        self.videos.borrow_mut().insert(video.id.clone(), video);
    }

    /// Adds a video that also shows up in the uploads playlist and in search.
    pub fn add_upload(&self, video: RawVideoItem) {
        self.uploads.borrow_mut().push(video.id.clone());
        self.add_video(video);
    }

    pub fn add_handle(&self, handle: &str, channel_id: &str) {
        self.handles
            .borrow_mut()
            .insert(handle.to_string(), channel_id.to_string());
    }

    pub fn add_playlist(&self, title: &str, item_count: u64) {
        let mut playlists = self.playlists.borrow_mut();
        let id = format!("PL{}", playlists.len());
        playlists.push(Playlist {
            id,
            title: title.to_string(),
            item_count,
        });
    }

    pub fn fail_video_batch(&self, index: usize) {
        self.failing_batch.set(Some(index));
    }

    pub fn fail_channel(&self) {
        self.fail_channel.set(true);
    }

    pub fn fail_search(&self) {
        self.fail_search.set(true);
    }

    pub fn fail_playlists(&self) {
        self.fail_playlists.set(true);
    }

    /// Sizes of every `videos` request made so far.
    pub fn video_batches(&self) -> Vec<usize> {
        self.batches.borrow().clone()
    }

    fn page_of<T: Clone>(all: &[T], page_token: Option<&str>, max_results: usize) -> Page<T> {
        let start: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (start + max_results).min(all.len());
        Page {
            items: all[start.min(end)..end].to_vec(),
            next_page_token: (end < all.len()).then(|| end.to_string()),
        }
    }
}

impl VideoSource for FakeSource {
    fn channel(&self, channel_id: &str, quota: &mut QuotaUsage) -> Result<Option<ChannelInfo>> {
        quota.record(Endpoint::Channels);
        if self.fail_channel.get() {
            bail!("HTTP 500");
        }
        Ok(self
            .channel
            .borrow()
            .clone()
            .filter(|c| c.id == channel_id))
    }

    fn channel_for_handle(&self, handle: &str, quota: &mut QuotaUsage) -> Result<Option<String>> {
        quota.record(Endpoint::Channels);
        Ok(self.handles.borrow().get(handle).cloned())
    }

    fn search_channel(&self, _query: &str, quota: &mut QuotaUsage) -> Result<Option<String>> {
        quota.record(Endpoint::Search);
        Ok(self.channel.borrow().as_ref().map(|c| c.id.clone()))
    }

    fn playlist_items_page(
        &self,
        _playlist_id: &str,
        page_token: Option<&str>,
        max_results: usize,
        quota: &mut QuotaUsage,
    ) -> Result<Page<String>> {
        quota.record(Endpoint::PlaylistItems);
        Ok(Self::page_of(self.uploads.borrow().as_slice(), page_token, max_results))
    }

    fn videos(&self, ids: &[String], quota: &mut QuotaUsage) -> Result<Vec<RawVideoItem>> {
        quota.record(Endpoint::Videos);
        let batch_index = {
            let mut batches = self.batches.borrow_mut();
            batches.push(ids.len());
            batches.len() - 1
        };
        if self.failing_batch.get() == Some(batch_index) {
            bail!("HTTP 503");
        }
        let videos = self.videos.borrow();
        Ok(ids.iter().filter_map(|id| videos.get(id).cloned()).collect())
    }

    /// Lists every upload newest first and ignores `published_after`, so the
    /// caller's own cutoff check is what ends the window.
    fn search_page(
        &self,
        _channel_id: &str,
        _published_after: DateTime<Utc>,
        page_token: Option<&str>,
        max_results: usize,
        quota: &mut QuotaUsage,
    ) -> Result<Page<SearchHit>> {
        quota.record(Endpoint::Search);
        if self.fail_search.get() {
            bail!("HTTP 500");
        }
        let videos = self.videos.borrow();
        let mut hits: Vec<SearchHit> = self
            .uploads
            .borrow()
            .iter()
            .filter_map(|id| videos.get(id))
            .map(|v| SearchHit {
                video_id: v.id.clone(),
                published_at: v.published_at,
            })
            .collect();
        hits.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(Self::page_of(hits.as_slice(), page_token, max_results))
    }

    fn playlists_page(
        &self,
        _channel_id: &str,
        page_token: Option<&str>,
        max_results: usize,
        quota: &mut QuotaUsage,
    ) -> Result<Page<Playlist>> {
        quota.record(Endpoint::Playlists);
        if self.fail_playlists.get() {
            bail!("HTTP 500");
        }
        Ok(Self::page_of(self.playlists.borrow().as_slice(), page_token, max_results))
    }
}
