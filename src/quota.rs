use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// YouTube Data API endpoints this tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Channels,
    PlaylistItems,
    Videos,
    Search,
    Playlists,
}

impl Endpoint {
    pub fn name(self) -> &'static str {
        match self {
            Self::Channels => "channels.list",
            Self::PlaylistItems => "playlistItems.list",
            Self::Videos => "videos.list",
            Self::Search => "search.list",
            Self::Playlists => "playlists.list",
        }
    }

    /// URL path segment under the API base.
    pub fn path(self) -> &'static str {
        match self {
            Self::Channels => "channels",
            Self::PlaylistItems => "playlistItems",
            Self::Videos => "videos",
            Self::Search => "search",
            Self::Playlists => "playlists",
        }
    }

    /// Approximate quota cost of one request.
    pub fn units(self) -> u64 {
        match self {
            Self::Search => 100,
            _ => 1,
        }
    }
}

/// Estimated quota spent, in API units. Owned by whoever issues the requests.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaUsage {
    pub total: u64,
    pub by_endpoint: BTreeMap<String, u64>,
}

impl QuotaUsage {
    pub fn record(&mut self, endpoint: Endpoint) {
        let units = endpoint.units();
        self.total += units;
        *self
            .by_endpoint
            .entry(endpoint.name().to_string())
            .or_default() += units;
    }

    pub fn merge(&mut self, other: &QuotaUsage) {
        self.total += other.total;
        for (name, units) in &other.by_endpoint {
            *self.by_endpoint.entry(name.clone()).or_default() += units;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Endpoints ordered by units spent, most expensive first.
    pub fn ranked(&self) -> Vec<(&str, u64)> {
        let mut rows: Vec<(&str, u64)> = self
            .by_endpoint
            .iter()
            .map(|(name, units)| (name.as_str(), *units))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        rows
    }
}
