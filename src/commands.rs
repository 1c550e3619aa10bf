use std::fs;
use std::path::Path;

use crate::classify::{Ineligible, classify_item};
use crate::duration::format_duration;
use crate::models::{ClassifiedVideo, Config};
use crate::paginate::PAGE_SIZE;
use crate::paths::AppPaths;
use crate::quota::QuotaUsage;
use crate::status::ChannelSnapshot;
use crate::store::{JsonlTables, Row, TableSink};
use crate::youtube_api::{VideoSource, YouTubeClient};
use crate::{report, status, store, youtube, youtube_api};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use colored::Colorize;

/// Video used by `check`; any public video works.
const CHECK_VIDEO_ID: &str = "dQw4w9WgXcQ";

const CONFIG_KEYS: &str = "'youtube_api_key', 'api_base_url', 'utc_offset_hours', \
     'record_limit', 'record_comment_count', 'record_table', 'status_table', 'routine_channels'";

pub fn record(channel: &str, limit: Option<usize>) -> Result<()> {
    let paths = AppPaths::init()?;
    let cfg = store::load_config(&paths.config_file);
    let client = client(&cfg)?;
    let tables = JsonlTables::open(&paths);

    let limit = record_limit(limit.unwrap_or(cfg.record_limit))?;
    let mut quota = QuotaUsage::default();
    let result = record_channel(&client, &tables, &cfg, channel, limit, Utc::now(), &mut quota);
    save_run_quota(&paths, &quota)?;

    let count = result?;
    if count == 0 {
        println!("{}", "No eligible videos found.".yellow());
    } else {
        println!(
            "{} Logged {count} video(s) to table '{}'.",
            "Done.".green(),
            cfg.record_table
        );
    }
    Ok(())
}

pub fn video(input: &str) -> Result<()> {
    let paths = AppPaths::init()?;
    let cfg = store::load_config(&paths.config_file);
    let client = client(&cfg)?;
    let tables = JsonlTables::open(&paths);

    let mut quota = QuotaUsage::default();
    let result = record_video(&client, &tables, &cfg, input, Utc::now(), &mut quota);
    save_run_quota(&paths, &quota)?;

    match result? {
        VideoOutcome::Logged(video) => println!(
            "{} [{}] {} ({})",
            "Logged:".green(),
            video.kind.label(),
            report::clean_text(&video.item.title),
            format_duration(video.duration_seconds)
        ),
        VideoOutcome::Skipped(reason) => {
            println!("{} {reason}; nothing logged.", "Skipped:".yellow())
        }
    }
    Ok(())
}

pub fn status(channel: &str, text: bool, out: Option<&Path>, no_append: bool) -> Result<()> {
    let paths = AppPaths::init()?;
    let cfg = store::load_config(&paths.config_file);
    let client = client(&cfg)?;
    let tables = JsonlTables::open(&paths);
    let offset = cfg.display_offset();

    let mut quota = QuotaUsage::default();
    let result = snapshot_channel(
        &client,
        &tables,
        &cfg,
        channel,
        Utc::now(),
        !no_append,
        &mut quota,
    );
    save_run_quota(&paths, &quota)?;

    let Some(snapshot) = result? else {
        println!("{}", "Could not build a channel snapshot.".yellow());
        return Ok(());
    };

    let row = report::status_row(&snapshot, &offset);
    println!("{}", report::clean_text(&snapshot.channel_title).bold());
    for (name, value) in report::STATUS_HEADER.iter().zip(&row) {
        println!("  {name:<28} {value}");
    }

    if text {
        println!();
        println!("{}", report::summary_text(&snapshot, &offset));
        println!();
        println!("{}", report::numeric_text(&snapshot, &offset));
    }

    if let Some(out) = out {
        fs::write(out, report::numeric_text(&snapshot, &offset))
            .with_context(|| format!("failed to write {}", out.display()))?;
        println!("Numeric report written to {}", out.display());
    }

    if no_append {
        println!("{}", "Not appended (--no-append).".dimmed());
    } else {
        println!(
            "{} Appended to table '{}'.",
            "Done.".green(),
            cfg.status_table
        );
    }
    Ok(())
}

pub fn routine(with_record: bool) -> Result<()> {
    let paths = AppPaths::init()?;
    let cfg = store::load_config(&paths.config_file);

    if cfg.routine_channels.is_empty() {
        println!(
            "{} Add some with {}.",
            "No routine channels configured.".yellow(),
            "`ytlog config routine_channels <a,b,...>`".bold()
        );
        return Ok(());
    }

    let client = client(&cfg)?;
    let tables = JsonlTables::open(&paths);

    let mut quota = QuotaUsage::default();
    let summary = run_routine(&client, &tables, &cfg, with_record, Utc::now(), &mut quota);
    save_run_quota(&paths, &quota)?;

    let total = summary.succeeded + summary.failed.len();
    println!(
        "{} {} of {total} channel(s) logged.",
        "Done.".green(),
        summary.succeeded
    );
    if !summary.failed.is_empty() {
        bail!("routine failed for: {}", summary.failed.join(", "));
    }
    Ok(())
}

pub fn table(name: &str, tail: Option<usize>) -> Result<()> {
    let paths = AppPaths::init()?;
    let tables = JsonlTables::open(&paths);

    let rows = tables.read_rows(name)?;
    if rows.is_empty() {
        println!("{}", format!("Table '{name}' is empty.").yellow());
        return Ok(());
    }

    for row in tail_rows(&rows, tail) {
        println!("{}", report::tsv_line(row));
    }
    Ok(())
}

pub fn quota(reset: bool) -> Result<()> {
    let paths = AppPaths::init()?;

    if reset {
        store::save_quota(&paths.quota_file, &QuotaUsage::default())?;
        println!("{}", "Quota counter reset.".green());
        return Ok(());
    }

    let usage = store::load_quota(&paths.quota_file);
    if usage.is_empty() {
        println!("No quota used since the last reset.");
        return Ok(());
    }

    println!(
        "{} ~{} unit(s) since the last reset (default daily quota is 10,000)",
        "Estimated quota:".bold(),
        usage.total
    );
    for (endpoint, units) in usage.ranked() {
        println!("  {endpoint:<20} {units:>8}");
    }
    Ok(())
}

pub fn check() -> Result<()> {
    let paths = AppPaths::init()?;
    let cfg = store::load_config(&paths.config_file);
    let tables = JsonlTables::open(&paths);
    let mut ok = true;

    let mut quota = QuotaUsage::default();
    match client(&cfg) {
        Ok(client) => match client.videos(&[CHECK_VIDEO_ID.to_string()], &mut quota) {
            Ok(_) => println!("{} API key works.", "OK".green()),
            Err(e) => {
                ok = false;
                println!("{} API request failed: {e:#}", "FAIL".red());
            }
        },
        Err(e) => {
            ok = false;
            println!("{} {e:#}", "FAIL".red());
        }
    }
    save_run_quota(&paths, &quota)?;

    match tables.check_writable() {
        Ok(()) => println!(
            "{} Tables directory is writable: {}",
            "OK".green(),
            paths.tables_dir.display()
        ),
        Err(e) => {
            ok = false;
            println!("{} {e:#}", "FAIL".red());
        }
    }

    if !ok {
        bail!("check failed");
    }
    Ok(())
}

pub fn config(key: &str, value: &str) -> Result<()> {
    let paths = AppPaths::init()?;
    let mut cfg = store::load_config(&paths.config_file);
    apply_config(&mut cfg, key, value)?;
    store::save_config(&paths.config_file, &cfg)?;
    println!("{}", "Config updated.".green());
    Ok(())
}

pub fn info() -> Result<()> {
    let paths = AppPaths::init()?;
    let cfg = store::load_config(&paths.config_file);
    let tables = JsonlTables::open(&paths);

    println!("{}", "Data Paths".bold());
    println!("---------------");
    println!("Config:     {}", paths.config_file.display());
    println!("Quota:      {}", paths.quota_file.display());
    println!("Tables:     {}", paths.tables_dir.display());

    println!();
    println!("{}", "Settings".bold());
    println!("---------------");
    let key_state = match cfg.effective_api_key() {
        Some(_) => "set",
        None => "missing",
    };
    println!("API key:    {key_state}");
    println!("API base:   {}", cfg.api_base_url);
    println!("UTC offset: {}", cfg.display_offset());
    println!("Routine:    {}", cfg.routine_channels.join(", "));

    println!();
    println!("{}", "Tables".bold());
    println!("---------------");
    for name in [&cfg.record_table, &cfg.status_table] {
        let rows = tables.read_rows(name)?.len().saturating_sub(1);
        println!("{name:<11} {rows} row(s)");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Runs, independent of where data comes from or goes to
// ---------------------------------------------------------------------------

pub enum VideoOutcome {
    Logged(ClassifiedVideo),
    Skipped(Ineligible),
}

pub struct RoutineSummary {
    pub succeeded: usize,
    pub failed: Vec<String>,
}

/// Logs a channel's newest eligible uploads. Returns how many rows were added.
pub fn record_channel<S, T>(
    source: &S,
    sink: &T,
    cfg: &Config,
    channel: &str,
    limit: usize,
    now: DateTime<Utc>,
    quota: &mut QuotaUsage,
) -> Result<usize>
where
    S: VideoSource + ?Sized,
    T: TableSink + ?Sized,
{
    let channel_id = resolve_channel_id(source, channel, quota)?;
    let videos = youtube_api::recent_uploads(source, &channel_id, limit, quota)?;
    append_videos(sink, cfg, &videos, now)
}

/// Logs one video, or reports why it is not eligible.
pub fn record_video<S, T>(
    source: &S,
    sink: &T,
    cfg: &Config,
    input: &str,
    now: DateTime<Utc>,
    quota: &mut QuotaUsage,
) -> Result<VideoOutcome>
where
    S: VideoSource + ?Sized,
    T: TableSink + ?Sized,
{
    let id = youtube::extract_video_id(input)?;
    let item = source
        .videos(std::slice::from_ref(&id), quota)
        .context("failed to fetch video")?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("video {id} not found"))?;

    match classify_item(item) {
        Ok(video) => {
            append_videos(sink, cfg, std::slice::from_ref(&video), now)?;
            Ok(VideoOutcome::Logged(video))
        }
        Err(reason) => Ok(VideoOutcome::Skipped(reason)),
    }
}

/// Takes a channel snapshot and, when `append` is set, logs it as one status
/// row. `Ok(None)` means the channel details could not be fetched.
pub fn snapshot_channel<S, T>(
    source: &S,
    sink: &T,
    cfg: &Config,
    channel: &str,
    now: DateTime<Utc>,
    append: bool,
    quota: &mut QuotaUsage,
) -> Result<Option<ChannelSnapshot>>
where
    S: VideoSource + ?Sized,
    T: TableSink + ?Sized,
{
    let channel_id = resolve_channel_id(source, channel, quota)?;
    let Some(snapshot) = status::fetch_snapshot(source, &channel_id, now, quota) else {
        return Ok(None);
    };
    if append {
        append_snapshot(sink, cfg, &snapshot)?;
    }
    Ok(Some(snapshot))
}

/// Status (and optionally record) for every routine channel. A failing
/// channel is reported and the rest still run.
pub fn run_routine<S, T>(
    source: &S,
    sink: &T,
    cfg: &Config,
    with_record: bool,
    now: DateTime<Utc>,
    quota: &mut QuotaUsage,
) -> RoutineSummary
where
    S: VideoSource + ?Sized,
    T: TableSink + ?Sized,
{
    let mut summary = RoutineSummary {
        succeeded: 0,
        failed: Vec::new(),
    };

    for channel in &cfg.routine_channels {
        println!("{} {channel}", "Channel:".blue());
        let result = routine_channel(source, sink, cfg, channel, with_record, now, quota);
        match result {
            Ok(()) => summary.succeeded += 1,
            Err(e) => {
                eprintln!("{} {channel}: {e:#}", "Error:".red());
                summary.failed.push(channel.clone());
            }
        }
    }

    summary
}

fn routine_channel<S, T>(
    source: &S,
    sink: &T,
    cfg: &Config,
    channel: &str,
    with_record: bool,
    now: DateTime<Utc>,
    quota: &mut QuotaUsage,
) -> Result<()>
where
    S: VideoSource + ?Sized,
    T: TableSink + ?Sized,
{
    let channel_id = resolve_channel_id(source, channel, quota)?;
    let info = status::fetch_channel(source, &channel_id, quota);

    match &info {
        Some(info) => {
            let snapshot = status::snapshot_for(source, info, now, quota);
            append_snapshot(sink, cfg, &snapshot)?;
            println!(
                "  status: {} subscribers, {} video(s) in the last {} days",
                snapshot.subscribers,
                snapshot.last_30_days.video_count,
                snapshot.last_30_days.days
            );
        }
        None => println!(
            "  {}",
            "status: could not fetch channel details, no row logged".yellow()
        ),
    }

    if with_record {
        let limit = record_limit(cfg.record_limit)?;
        let videos = match &info {
            Some(info) => youtube_api::uploads_of(source, info, limit, quota)?,
            None => youtube_api::recent_uploads(source, &channel_id, limit, quota)?,
        };
        let count = append_videos(sink, cfg, &videos, now)?;
        println!("  record: {count} video(s)");
    }
    Ok(())
}

fn resolve_channel_id<S: VideoSource + ?Sized>(
    source: &S,
    channel: &str,
    quota: &mut QuotaUsage,
) -> Result<String> {
    let input = youtube::parse_channel_input(channel)?;
    youtube_api::resolve_channel(source, &input, quota)?
        .ok_or_else(|| anyhow!("no channel found for '{channel}'"))
}

fn append_snapshot<T: TableSink + ?Sized>(
    sink: &T,
    cfg: &Config,
    snapshot: &ChannelSnapshot,
) -> Result<()> {
    let row = report::status_row(snapshot, &cfg.display_offset());
    sink.ensure_table(&cfg.status_table, &report::STATUS_HEADER)?;
    sink.append_rows(&cfg.status_table, &[row])
}

fn append_videos<T: TableSink + ?Sized>(
    sink: &T,
    cfg: &Config,
    videos: &[ClassifiedVideo],
    now: DateTime<Utc>,
) -> Result<usize> {
    if videos.is_empty() {
        return Ok(0);
    }

    let offset = cfg.display_offset();
    let with_comments = cfg.record_comment_count;
    let rows: Vec<Row> = videos
        .iter()
        .map(|v| report::record_row(v, now, &offset, with_comments))
        .collect();

    sink.ensure_table(&cfg.record_table, &report::record_header(with_comments))?;
    sink.append_rows(&cfg.record_table, &rows)?;
    Ok(rows.len())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn client(cfg: &Config) -> Result<YouTubeClient> {
    let api_key = cfg.effective_api_key().ok_or_else(|| {
        anyhow!(
            "no YouTube Data API key configured.\n\
             Set it via: ytlog config youtube_api_key <key>\n\
             Or set the YOUTUBE_DATA_API_KEY environment variable."
        )
    })?;
    Ok(YouTubeClient::new(api_key, cfg.api_base_url.clone()))
}

/// Adds this run's usage to the stored counter and reports it.
fn save_run_quota(paths: &AppPaths, run: &QuotaUsage) -> Result<()> {
    if run.is_empty() {
        return Ok(());
    }
    let mut stored = store::load_quota(&paths.quota_file);
    stored.merge(run);
    store::save_quota(&paths.quota_file, &stored)?;
    eprintln!(
        "{}",
        format!(
            "Quota: ~{} unit(s) this run, ~{} since the last reset.",
            run.total, stored.total
        )
        .dimmed()
    );
    Ok(())
}

/// Caps a requested count at one API page.
fn record_limit(requested: usize) -> Result<usize> {
    if requested == 0 {
        bail!("limit must be at least 1");
    }
    if requested > PAGE_SIZE {
        eprintln!(
            "{} limit capped at {PAGE_SIZE} (requested {requested})",
            "Warning:".yellow()
        );
    }
    Ok(requested.min(PAGE_SIZE))
}

/// The header plus the last `tail` data rows, or every row.
fn tail_rows(rows: &[Row], tail: Option<usize>) -> Vec<&Row> {
    let Some((header, data)) = rows.split_first() else {
        return Vec::new();
    };
    let skip = tail.map_or(0, |n| data.len().saturating_sub(n));
    std::iter::once(header).chain(&data[skip..]).collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("invalid {key} value '{value}': use 'true' or 'false'"),
    }
}

fn apply_config(cfg: &mut Config, key: &str, value: &str) -> Result<()> {
    let value = value.trim();
    match key {
        "youtube_api_key" => {
            cfg.youtube_api_key = (!value.is_empty()).then(|| value.to_string());
        }
        "api_base_url" => {
            let base = value.trim_end_matches('/');
            url::Url::parse(base).with_context(|| format!("invalid URL '{value}'"))?;
            cfg.api_base_url = base.to_string();
        }
        "utc_offset_hours" => {
            cfg.utc_offset_hours = match value.to_lowercase().as_str() {
                "" | "local" => None,
                hours => {
                    let hours: i32 = hours
                        .parse()
                        .with_context(|| format!("invalid offset '{value}': use hours like 9 or -5"))?;
                    if !(-23..=23).contains(&hours) {
                        bail!("invalid offset '{value}': must be between -23 and 23");
                    }
                    Some(hours)
                }
            };
        }
        "record_limit" => {
            let limit: usize = value
                .parse()
                .with_context(|| format!("invalid record_limit '{value}'"))?;
            if !(1..=PAGE_SIZE).contains(&limit) {
                bail!("invalid record_limit '{value}': must be between 1 and {PAGE_SIZE}");
            }
            cfg.record_limit = limit;
        }
        "record_comment_count" => cfg.record_comment_count = parse_bool(key, value)?,
        "record_table" => {
            store::validate_table_name(value)?;
            cfg.record_table = value.to_string();
        }
        "status_table" => {
            store::validate_table_name(value)?;
            cfg.status_table = value.to_string();
        }
        "routine_channels" => {
            cfg.routine_channels = value
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
        }
        _ => bail!("unknown config key '{key}': available keys are {CONFIG_KEYS}"),
    }
    Ok(())
}
