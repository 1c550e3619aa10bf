use crate::models::ClassifiedVideo;
use crate::status::{ChannelSnapshot, PlaylistSlot, WindowSummary};
use crate::youtube::watch_url;

use chrono::{DateTime, FixedOffset, Utc};

pub const RECORD_HEADER: [&str; 7] = [
    "logged_at",
    "type",
    "title",
    "published_at",
    "duration_sec",
    "view_count",
    "like_count",
];

pub const RECORD_COMMENT_COLUMN: &str = "comment_count";

pub const STATUS_HEADER: [&str; 35] = [
    "logged_at",
    "channel_id",
    "channel_title",
    "subscriber_count",
    "video_count",
    "view_count",
    "channel_published_at",
    "months_active",
    "subs_per_month",
    "subs_per_video",
    "views_per_video",
    "views_per_sub",
    "subs_per_total_view",
    "playlists_per_video",
    "videos_per_month",
    "videos_per_subscriber",
    "top_playlist_1",
    "top_playlist_2",
    "top_playlist_3",
    "top_playlist_4",
    "top_playlist_5",
    "total_views_last10",
    "num_videos_last10",
    "top_title_last10",
    "top_views_last10",
    "top_share_last10",
    "avg_views_per_video_last10",
    "views_per_sub_last10",
    "total_views_last30",
    "num_videos_last30",
    "top_title_last30",
    "top_views_last30",
    "top_share_last30",
    "avg_views_per_video_last30",
    "views_per_sub_last30",
];

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y/%m/%d";

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

/// Collapses each run of line breaks into one space and trims the result.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_break = false;
    for c in text.chars() {
        if c == '\n' || c == '\r' {
            if !in_break {
                out.push(' ');
                in_break = true;
            }
        } else {
            out.push(c);
            in_break = false;
        }
    }
    out.trim().to_string()
}

/// Escapes text for use inside a double-quoted formula string.
pub fn quote_escape(text: &str) -> String {
    text.replace('"', "\"\"")
}

/// A spreadsheet `HYPERLINK` formula.
pub fn hyperlink(url: &str, label: &str) -> String {
    format!(
        "=HYPERLINK(\"{}\",\"{}\")",
        quote_escape(url),
        quote_escape(&clean_text(label))
    )
}

/// Renders a float with at least one decimal place ("2.0", "0.4").
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

fn format_optional_float(value: Option<f64>) -> String {
    value.map(format_float).unwrap_or_default()
}

fn format_local(ts: Option<DateTime<Utc>>, offset: &FixedOffset, fmt: &str) -> String {
    ts.map(|t| t.with_timezone(offset).format(fmt).to_string())
        .unwrap_or_default()
}

/// Joins cells into one tab-separated line; tabs and breaks inside cells
/// become spaces.
pub fn tsv_line(row: &[String]) -> String {
    row.iter()
        .map(|cell| clean_text(&cell.replace('\t', " ")))
        .collect::<Vec<_>>()
        .join("\t")
}

// ---------------------------------------------------------------------------
// Record log
// ---------------------------------------------------------------------------

pub fn record_header(with_comments: bool) -> Vec<&'static str> {
    let mut header = RECORD_HEADER.to_vec();
    if with_comments {
        header.push(RECORD_COMMENT_COLUMN);
    }
    header
}

pub fn record_row(
    video: &ClassifiedVideo,
    logged_at: DateTime<Utc>,
    offset: &FixedOffset,
    with_comments: bool,
) -> Vec<String> {
    let item = &video.item;
    let mut row = vec![
        format_local(Some(logged_at), offset, TIMESTAMP_FORMAT),
        video.kind.label().to_string(),
        hyperlink(&watch_url(&item.id), &item.title),
        format_local(item.published_at, offset, TIMESTAMP_FORMAT),
        video.duration_seconds.to_string(),
        item.view_count.to_string(),
        item.like_count.to_string(),
    ];
    if with_comments {
        row.push(item.comment_count.map(|c| c.to_string()).unwrap_or_default());
    }
    row
}

// ---------------------------------------------------------------------------
// Status log
// ---------------------------------------------------------------------------

/// `title (N)` for a playlist, `-` for an empty slot.
fn playlist_cell(slot: &Option<PlaylistSlot>) -> String {
    match slot {
        Some(p) => format!("{} ({})", clean_text(&p.title), p.item_count),
        None => "-".to_string(),
    }
}

fn playlist_title(slot: &Option<PlaylistSlot>) -> String {
    match slot {
        Some(p) => clean_text(&p.title),
        None => "-".to_string(),
    }
}

fn playlist_count(slot: &Option<PlaylistSlot>) -> u64 {
    slot.as_ref().map_or(0, |p| p.item_count)
}

fn window_cells(window: &WindowSummary) -> [String; 7] {
    [
        window.total_views.to_string(),
        window.video_count.to_string(),
        clean_text(&window.top_title),
        window.top_views.to_string(),
        format_float(window.top_share),
        format_float(window.avg_views),
        format_float(window.views_per_sub),
    ]
}

/// Cumulative figures shared by the row and both text reports, in column order.
fn cumulative_cells(s: &ChannelSnapshot) -> [String; 9] {
    let r = &s.ratios;
    [
        format_optional_float(s.months_active),
        format_float(r.subs_per_month),
        format_float(r.subs_per_video),
        format_float(r.views_per_video),
        format_float(r.views_per_sub),
        format_float(r.subs_per_view),
        format_float(r.playlists_per_video),
        format_float(r.videos_per_month),
        format_float(r.videos_per_sub),
    ]
}

/// One status log row; always `STATUS_HEADER.len()` cells.
pub fn status_row(s: &ChannelSnapshot, offset: &FixedOffset) -> Vec<String> {
    let mut row = vec![
        format_local(Some(s.taken_at), offset, DATE_FORMAT),
        s.channel_id.clone(),
        clean_text(&s.channel_title),
        s.subscribers.to_string(),
        s.total_videos.to_string(),
        s.total_views.to_string(),
        format_local(s.created_at, offset, DATE_FORMAT),
    ];
    row.extend(cumulative_cells(s));
    row.extend(s.top_playlists.iter().map(playlist_cell));
    row.extend(window_cells(&s.last_10_days));
    row.extend(window_cells(&s.last_30_days));
    row
}

/// A labeled report meant to be read, or pasted somewhere for analysis.
pub fn summary_text(s: &ChannelSnapshot, offset: &FixedOffset) -> String {
    let cumulative = cumulative_cells(s);
    let mut lines: Vec<String> = Vec::new();

    lines.push("=== Channel status ===".to_string());
    lines.push(String::new());

    lines.push("# Basics".to_string());
    lines.push(format!(
        "Logged at: {}",
        format_local(Some(s.taken_at), offset, DATE_FORMAT)
    ));
    lines.push(format!("Channel ID: {}", s.channel_id));
    lines.push(format!("Channel name: {}", clean_text(&s.channel_title)));
    lines.push(format!("Subscribers (current): {}", s.subscribers));
    lines.push(format!("Videos (public uploads): {}", s.total_videos));
    lines.push(format!("Total views (all public videos): {}", s.total_views));
    lines.push(format!(
        "Channel created: {}",
        format_local(s.created_at, offset, DATE_FORMAT)
    ));
    lines.push(format!(
        "Months active (days since creation / 30): {}",
        cumulative[0]
    ));
    lines.push(String::new());

    lines.push("# Cumulative ratios".to_string());
    let labels = [
        "Subscribers per month active",
        "Subscribers per video",
        "Views per video",
        "Views per subscriber",
        "Subscribers per view",
        "Playlists per video",
        "Videos per month active",
        "Videos per subscriber",
    ];
    for (label, value) in labels.iter().zip(&cumulative[1..]) {
        lines.push(format!("{label}: {value}"));
    }
    lines.push(String::new());

    lines.push("# Top playlists (by video count)".to_string());
    for (i, slot) in s.top_playlists.iter().enumerate() {
        lines.push(format!(
            "{}. {} ({} videos)",
            i + 1,
            playlist_title(slot),
            playlist_count(slot)
        ));
    }

    for window in [&s.last_10_days, &s.last_30_days] {
        let d = window.days;
        let cells = window_cells(window);
        lines.push(String::new());
        lines.push(format!("# Last {d} days (videos published in the window)"));
        lines.push(format!("Total views: {}", cells[0]));
        lines.push(format!("Videos published: {}", cells[1]));
        lines.push(format!("Top video (most viewed): {}", cells[2]));
        lines.push(format!("Top video views: {}", cells[3]));
        lines.push(format!("Top video share of window views: {}", cells[4]));
        lines.push(format!("Average views per video: {}", cells[5]));
        lines.push(format!("Window views per subscriber: {}", cells[6]));
    }

    lines.join("\n")
}

/// The same values as [`summary_text`], one per line, without labels.
pub fn numeric_text(s: &ChannelSnapshot, offset: &FixedOffset) -> String {
    let mut lines = vec![
        format_local(Some(s.taken_at), offset, DATE_FORMAT),
        s.channel_id.clone(),
        clean_text(&s.channel_title),
        s.subscribers.to_string(),
        s.total_videos.to_string(),
        s.total_views.to_string(),
        format_local(s.created_at, offset, "%Y-%m-%d"),
    ];
    lines.extend(cumulative_cells(s));
    lines.extend(
        s.top_playlists
            .iter()
            .map(|slot| format!("{}→{}", playlist_title(slot), playlist_count(slot))),
    );
    lines.extend(window_cells(&s.last_10_days));
    lines.extend(window_cells(&s.last_30_days));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::{LiveBroadcast, PrivacyStatus, RawVideoItem, UploadStatus, VideoKind};
    use crate::status::{ChannelRatios, TOP_PLAYLISTS};

    use chrono::TimeZone;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn window(days: i64, top_title: &str) -> WindowSummary {
        WindowSummary {
            days,
            total_views: 400,
            video_count: 2,
            top_title: top_title.to_string(),
            top_views: 300,
            top_share: 0.75,
            avg_views: 200.0,
            views_per_sub: 0.4,
        }
    }

    fn snapshot() -> ChannelSnapshot {
        let mut top_playlists = vec![Some(PlaylistSlot {
            title: "Best of\n2024".to_string(),
            item_count: 12,
        })];
        top_playlists.resize(TOP_PLAYLISTS, None);

        ChannelSnapshot {
            taken_at: Utc.with_ymd_and_hms(2025, 6, 30, 20, 0, 0).unwrap(),
            channel_id: "UC_x5XG1OV2P6uZZ5FSM9Ttw".to_string(),
            channel_title: "My \"Great\" Channel".to_string(),
            subscribers: 1000,
            total_videos: 30,
            total_views: 123456,
            created_at: Some(Utc.with_ymd_and_hms(2022, 5, 1, 16, 0, 0).unwrap()),
            months_active: Some(38.0),
            playlist_count: 1,
            ratios: ChannelRatios {
                subs_per_month: 26.32,
                subs_per_video: 33.33,
                views_per_video: 4115.2,
                views_per_sub: 123.46,
                subs_per_view: 0.0081,
                playlists_per_video: 0.03333,
                videos_per_month: 0.79,
                videos_per_sub: 0.03,
            },
            top_playlists,
            last_10_days: window(10, "Line one\r\nline two"),
            last_30_days: window(30, "Thirty"),
        }
    }

    fn video(title: &str) -> ClassifiedVideo {
        ClassifiedVideo {
            item: RawVideoItem {
                id: "dQw4w9WgXcQ".to_string(),
                title: title.to_string(),
                published_at: Some(Utc.with_ymd_and_hms(2025, 3, 1, 15, 30, 0).unwrap()),
                duration: "PT3M33S".to_string(),
                privacy: PrivacyStatus::Public,
                upload: UploadStatus::Processed,
                live: LiveBroadcast::None,
                view_count: 1234,
                like_count: 56,
                comment_count: Some(7),
            },
            kind: VideoKind::Ordinary,
            duration_seconds: 213,
        }
    }

    #[test]
    fn clean_text_collapses_breaks() {
        assert_eq!(clean_text("a\nb"), "a b");
        assert_eq!(clean_text("a\r\n\r\nb"), "a b");
        assert_eq!(clean_text("\n  padded \n"), "padded");
        assert_eq!(clean_text("plain"), "plain");
    }

    #[test]
    fn hyperlink_doubles_quotes() {
        assert_eq!(
            hyperlink("https://example.com", "Say \"hi\"\nnow"),
            "=HYPERLINK(\"https://example.com\",\"Say \"\"hi\"\" now\")"
        );
    }

    #[test]
    fn floats_keep_a_decimal() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(0.0), "0.0");
        assert_eq!(format_float(0.4), "0.4");
        assert_eq!(format_float(0.00012), "0.00012");
        assert_eq!(format_float(4115.2), "4115.2");
    }

    #[test]
    fn record_row_matches_header() {
        let row = record_row(
            &video("Never \"Gonna\"\nGive"),
            Utc.with_ymd_and_hms(2025, 6, 30, 20, 0, 0).unwrap(),
            &jst(),
            false,
        );
        assert_eq!(row.len(), RECORD_HEADER.len());
        assert_eq!(row[0], "2025/07/01 05:00:00");
        assert_eq!(row[1], "video");
        assert_eq!(
            row[2],
            "=HYPERLINK(\"https://www.youtube.com/watch?v=dQw4w9WgXcQ\",\"Never \"\"Gonna\"\" Give\")"
        );
        assert_eq!(row[3], "2025/03/02 00:30:00");
        assert_eq!(row[4], "213");
        assert_eq!(row[5], "1234");
        assert_eq!(row[6], "56");
    }

    #[test]
    fn record_row_optional_comment_column() {
        let now = Utc::now();
        let header = record_header(true);
        let row = record_row(&video("t"), now, &jst(), true);
        assert_eq!(row.len(), header.len());
        assert_eq!(header.last(), Some(&RECORD_COMMENT_COLUMN));
        assert_eq!(row.last().map(String::as_str), Some("7"));

        let mut no_comments = video("t");
        no_comments.item.comment_count = None;
        let row = record_row(&no_comments, now, &jst(), true);
        assert_eq!(row.last().map(String::as_str), Some(""));
    }

    #[test]
    fn status_row_has_every_column() {
        let row = status_row(&snapshot(), &jst());
        assert_eq!(row.len(), STATUS_HEADER.len());

        let cell = |name: &str| {
            let i = STATUS_HEADER.iter().position(|h| *h == name).unwrap();
            row[i].as_str()
        };
        assert_eq!(cell("logged_at"), "2025/07/01");
        assert_eq!(cell("channel_title"), "My \"Great\" Channel");
        assert_eq!(cell("channel_published_at"), "2022/05/02");
        assert_eq!(cell("months_active"), "38.0");
        assert_eq!(cell("subs_per_total_view"), "0.0081");
        assert_eq!(cell("top_playlist_1"), "Best of 2024 (12)");
        assert_eq!(cell("top_playlist_5"), "-");
        assert_eq!(cell("top_title_last10"), "Line one line two");
        assert_eq!(cell("top_share_last10"), "0.75");
        assert_eq!(cell("avg_views_per_video_last30"), "200.0");
        assert_eq!(cell("views_per_sub_last30"), "0.4");
    }

    #[test]
    fn untitled_empty_playlist_is_not_padding() {
        let mut s = snapshot();
        s.top_playlists[1] = Some(PlaylistSlot {
            title: String::new(),
            item_count: 0,
        });
        let row = status_row(&s, &jst());
        assert_eq!(row[17], " (0)");
        assert_eq!(row[18], "-");
        assert!(summary_text(&s, &jst()).contains("2.  (0 videos)"));
    }

    #[test]
    fn status_row_without_creation_date() {
        let mut s = snapshot();
        s.created_at = None;
        s.months_active = None;
        let row = status_row(&s, &jst());
        assert_eq!(row[6], "");
        assert_eq!(row[7], "");
    }

    #[test]
    fn numeric_text_carries_the_row_values() {
        let s = snapshot();
        let row = status_row(&s, &jst());
        let numeric = numeric_text(&s, &jst());
        let lines: Vec<&str> = numeric.lines().collect();
        assert_eq!(lines.len(), STATUS_HEADER.len());

        for (i, name) in STATUS_HEADER.iter().enumerate() {
            match *name {
                "channel_published_at" => assert_eq!(lines[i], "2022-05-02"),
                n if n.starts_with("top_playlist") => {}
                _ => assert_eq!(lines[i], row[i], "column {name}"),
            }
        }
        assert_eq!(lines[16], "Best of 2024→12");
        assert_eq!(lines[20], "-→0");
    }

    #[test]
    fn summary_text_labels_the_same_values() {
        let s = snapshot();
        let text = summary_text(&s, &jst());
        assert!(text.contains("Channel name: My \"Great\" Channel"));
        assert!(text.contains("Months active (days since creation / 30): 38.0"));
        assert!(text.contains("Subscribers per view: 0.0081"));
        assert!(text.contains("1. Best of 2024 (12 videos)"));
        assert!(text.contains("5. - (0 videos)"));
        assert!(text.contains("# Last 10 days"));
        assert!(text.contains("Top video (most viewed): Line one line two"));
        assert!(text.contains("# Last 30 days"));
        assert!(text.contains("Top video share of window views: 0.75"));
        assert!(!text.contains('\r'));
    }

    #[test]
    fn tsv_line_flattens_cells() {
        let row = vec!["a\tb".to_string(), "c\nd".to_string(), String::new()];
        assert_eq!(tsv_line(&row), "a b\tc d\t");
    }
}
