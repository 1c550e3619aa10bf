use std::sync::LazyLock;

use anyhow::{Result, anyhow, bail};
use regex::Regex;
use url::Url;

/// YouTube IDs are exactly 11 characters,
/// containing A-Z, a-z, 0-9, - (hyphen), and _ (underscore).
static VIDEO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").unwrap());

/// Channel IDs are "UC" followed by 22 ID characters.
static CHANNEL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^UC[a-zA-Z0-9_-]{22}$").unwrap());

static HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@[\w.\-]{1,100}$").unwrap());

pub fn extract_video_id(input: &str) -> Result<String> {
    let input = input.trim();

    // handle video IDs directly
    if is_valid_id_format(input) {
        return Ok(input.to_string());
    }

    let parsed = parse_loose_url(input)?;

    let id = if let Some(host) = parsed.host_str() {
        if host.contains("youtu.be") {
            // Case: youtu.be/ID
            first_segment(&parsed).unwrap_or_default()
        } else if host.contains("youtube.com") {
            let segments: Vec<&str> = parsed
                .path_segments()
                .map(|s| s.filter(|p| !p.is_empty()).collect())
                .unwrap_or_default();
            match segments.as_slice() {
                // Case: youtube.com/shorts/ID, youtube.com/live/ID
                ["shorts" | "live" | "embed", id, ..] => id.to_string(),
                // Case: youtube.com/watch?v=ID
                _ => parsed
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.to_string())
                    .ok_or_else(|| anyhow!("Could not find 'v' parameter in YouTube URL"))?,
            }
        } else {
            bail!("Not a YouTube domain");
        }
    } else {
        bail!("Invalid URL");
    };

    // catch empty IDs or invalid formats
    if is_valid_id_format(&id) {
        Ok(id)
    } else {
        Err(anyhow!("Extracted ID '{}' is invalid", id))
    }
}

pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

fn is_valid_id_format(id: &str) -> bool {
    VIDEO_ID_RE.is_match(id)
}

/// What a channel argument refers to before any API lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelInput {
    Id(String),
    Handle(String),
    Query(String),
}

/// Classifies a channel argument: a raw `UC…` ID, a `/channel/UC…` URL,
/// an `@handle` (bare or in a URL), or free text to search for.
pub fn parse_channel_input(input: &str) -> Result<ChannelInput> {
    let input = input.trim();
    if input.is_empty() {
        bail!("channel URL, ID, or name is empty");
    }

    if CHANNEL_ID_RE.is_match(input) {
        return Ok(ChannelInput::Id(input.to_string()));
    }
    if HANDLE_RE.is_match(input) {
        return Ok(ChannelInput::Handle(input.to_string()));
    }

    let looks_like_url = input.contains("youtube.com") || input.contains("://");
    if looks_like_url && let Ok(parsed) = parse_loose_url(input) {
        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        match segments.as_slice() {
            ["channel", id, ..] if CHANNEL_ID_RE.is_match(id) => {
                return Ok(ChannelInput::Id(id.to_string()));
            }
            [handle, ..] if HANDLE_RE.is_match(handle) => {
                return Ok(ChannelInput::Handle(handle.to_string()));
            }
            // /c/Name and /user/Name are legacy vanity URLs; search by name.
            ["c" | "user", name, ..] => return Ok(ChannelInput::Query(name.to_string())),
            _ => {}
        }
    }

    Ok(ChannelInput::Query(input.to_string()))
}

/// Handles partial links such as "youtube.com/watch?v=…".
fn parse_loose_url(input: &str) -> Result<Url> {
    let url_string = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };
    Url::parse(&url_string).map_err(|_| anyhow!("Invalid URL format"))
}

fn first_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .find(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_video_id() {
        assert_eq!(extract_video_id("dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
        assert_eq!(extract_video_id("  dQw4w9WgXcQ ").unwrap(), "dQw4w9WgXcQ");
    }

    #[test]
    fn watch_urls() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("youtube.com/watch?v=dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn short_links_and_shorts() {
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=abc").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/live/dQw4w9WgXcQ?feature=share").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn rejects_other_domains_and_bad_ids() {
        assert!(extract_video_id("https://vimeo.com/123").is_err());
        assert!(extract_video_id("https://www.youtube.com/watch?v=short").is_err());
        assert!(extract_video_id("https://www.youtube.com/feed").is_err());
    }

    #[test]
    fn watch_url_is_canonical() {
        assert_eq!(
            watch_url("dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn channel_raw_id() {
        assert_eq!(
            parse_channel_input("UC_x5XG1OV2P6uZZ5FSM9Ttw").unwrap(),
            ChannelInput::Id("UC_x5XG1OV2P6uZZ5FSM9Ttw".to_string())
        );
    }

    #[test]
    fn channel_url() {
        assert_eq!(
            parse_channel_input("https://www.youtube.com/channel/UC_x5XG1OV2P6uZZ5FSM9Ttw/videos")
                .unwrap(),
            ChannelInput::Id("UC_x5XG1OV2P6uZZ5FSM9Ttw".to_string())
        );
    }

    #[test]
    fn channel_handles() {
        assert_eq!(
            parse_channel_input("@GoogleDevelopers").unwrap(),
            ChannelInput::Handle("@GoogleDevelopers".to_string())
        );
        assert_eq!(
            parse_channel_input("https://www.youtube.com/@GoogleDevelopers/featured").unwrap(),
            ChannelInput::Handle("@GoogleDevelopers".to_string())
        );
    }

    #[test]
    fn channel_free_text_is_a_query() {
        assert_eq!(
            parse_channel_input("Google for Developers").unwrap(),
            ChannelInput::Query("Google for Developers".to_string())
        );
        assert_eq!(
            parse_channel_input("youtube.com/c/GoogleDevelopers").unwrap(),
            ChannelInput::Query("GoogleDevelopers".to_string())
        );
    }

    #[test]
    fn channel_empty_is_an_error() {
        assert!(parse_channel_input("   ").is_err());
    }
}
