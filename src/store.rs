use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::models::Config;
use crate::paths::AppPaths;
use crate::quota::QuotaUsage;

use anyhow::{Context, Result, bail};
use fd_lock::RwLock;
use regex::Regex;

static TABLE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

pub type Row = Vec<String>;

pub fn validate_table_name(name: &str) -> Result<()> {
    if !TABLE_NAME_RE.is_match(name) {
        bail!("invalid table name '{name}': use letters, digits, '-' and '_' only");
    }
    Ok(())
}

/// Somewhere rows can be appended to and read back from, addressed by table
/// name. Row 0 of every table is its header.
pub trait TableSink {
    /// Writes `header` into an empty table. An existing header that is a
    /// strict prefix of `header` is extended with the missing columns.
    fn ensure_table(&self, name: &str, header: &[&str]) -> Result<()>;

    fn append_rows(&self, name: &str, rows: &[Row]) -> Result<()>;

    /// Every row including the header. A table that does not exist yet is empty.
    fn read_rows(&self, name: &str) -> Result<Vec<Row>>;

    /// Overwrites one cell. Short rows are padded with empty cells.
    fn update_cell(&self, name: &str, row: usize, col: usize, value: &str) -> Result<()>;
}

/// Tables stored as `<dir>/<name>.jsonl`, one JSON array of strings per line.
///
/// Every operation holds a lock on `lock_file`: exclusive for writes, shared
/// for reads.
pub struct JsonlTables {
    dir: PathBuf,
    lock_file: PathBuf,
}

impl JsonlTables {
    pub fn new(dir: impl Into<PathBuf>, lock_file: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock_file: lock_file.into(),
        }
    }

    pub fn open(paths: &AppPaths) -> Self {
        Self::new(&paths.tables_dir, &paths.lock_file)
    }

    pub fn table_path(&self, name: &str) -> Result<PathBuf> {
        validate_table_name(name)?;
        Ok(self.dir.join(format!("{name}.jsonl")))
    }

    /// Creates and removes a probe file to prove the directory is writable.
    pub fn check_writable(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let probe = self.dir.join(".write-check");
        fs::write(&probe, b"ok")
            .with_context(|| format!("cannot write to {}", self.dir.display()))?;
        fs::remove_file(&probe)?;
        Ok(())
    }

    fn lock(&self) -> Result<RwLock<fs::File>> {
        if let Some(parent) = self.lock_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_file)
            .with_context(|| format!("failed to open {}", self.lock_file.display()))?;
        Ok(RwLock::new(file))
    }

    /// Runs `f` on the table's rows under an exclusive lock and writes the
    /// result back.
    fn with_rows<T, F>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Row>) -> Result<T>,
    {
        let path = self.table_path(name)?;
        fs::create_dir_all(&self.dir)?;
        let mut lock = self.lock()?;
        let _guard = lock.write()?;

        let mut rows = load_rows(&path)?;
        let result = f(&mut rows)?;
        save_rows(&path, &rows)?;
        Ok(result)
    }
}

impl TableSink for JsonlTables {
    fn ensure_table(&self, name: &str, header: &[&str]) -> Result<()> {
        self.with_rows(name, |rows| {
            let Some(existing) = rows.first() else {
                rows.push(header.iter().map(|h| h.to_string()).collect());
                tracing::debug!(table = name, "created table");
                return Ok(());
            };

            let shared = existing.len().min(header.len());
            if existing[..shared].iter().zip(&header[..shared]).any(|(a, b)| a != b) {
                bail!(
                    "table '{name}' has a different header: {}",
                    existing.join(", ")
                );
            }

            for (col, title) in header.iter().enumerate().skip(existing.len()) {
                set_cell(rows, 0, col, title)?;
            }
            Ok(())
        })
    }

    fn append_rows(&self, name: &str, rows: &[Row]) -> Result<()> {
        let path = self.table_path(name)?;
        fs::create_dir_all(&self.dir)?;
        let mut lock = self.lock()?;
        let _guard = lock.write()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        for row in rows {
            writeln!(file, "{}", serde_json::to_string(row)?)?;
        }
        Ok(())
    }

    fn read_rows(&self, name: &str) -> Result<Vec<Row>> {
        let path = self.table_path(name)?;
        let lock = self.lock()?;
        let _guard = lock.read()?;
        load_rows(&path)
    }

    fn update_cell(&self, name: &str, row: usize, col: usize, value: &str) -> Result<()> {
        self.with_rows(name, |rows| set_cell(rows, row, col, value))
    }
}

fn set_cell(rows: &mut [Row], row: usize, col: usize, value: &str) -> Result<()> {
    let Some(cells) = rows.get_mut(row) else {
        bail!("row {row} does not exist");
    };
    if cells.len() <= col {
        cells.resize(col + 1, String::new());
    }
    cells[col] = value.to_string();
    Ok(())
}

/// Lines that are not a JSON array of strings are skipped.
fn load_rows(path: &Path) -> Result<Vec<Row>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("failed to open {}", path.display())),
    };

    let mut rows = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Row>(&line) {
            Ok(row) => rows.push(row),
            Err(e) => tracing::warn!("skipping {}:{}: {e}", path.display(), idx + 1),
        }
    }
    Ok(rows)
}

fn save_rows(path: &Path, rows: &[Row]) -> Result<()> {
    let mut data = String::new();
    for row in rows {
        data.push_str(&serde_json::to_string(row)?);
        data.push('\n');
    }
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn load_config(path: &Path) -> Config {
    if let Ok(data) = fs::read_to_string(path) {
        serde_json::from_str(&data).unwrap_or_default()
    } else {
        Config::default()
    }
}

pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let data = serde_json::to_string_pretty(config)?;
    fs::write(path, data)?;
    Ok(())
}

pub fn load_quota(path: &Path) -> QuotaUsage {
    if let Ok(data) = fs::read_to_string(path) {
        serde_json::from_str(&data).unwrap_or_default()
    } else {
        QuotaUsage::default()
    }
}

pub fn save_quota(path: &Path, usage: &QuotaUsage) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(usage)?;
    fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::quota::Endpoint;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ytlog-store-{}-{tag}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn tables(tag: &str) -> JsonlTables {
        let dir = scratch_dir(tag);
        JsonlTables::new(dir.join("tables"), dir.join("tables.lock"))
    }

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn missing_table_reads_empty() {
        let t = tables("missing");
        assert!(t.read_rows("record").unwrap().is_empty());
    }

    #[test]
    fn ensure_then_append_then_read() {
        let t = tables("append");
        t.ensure_table("record", &["a", "b"]).unwrap();
        t.append_rows("record", &[row(&["1", "x\ty"]), row(&["2", "\"q\""])])
            .unwrap();

        let rows = t.read_rows("record").unwrap();
        assert_eq!(rows, vec![row(&["a", "b"]), row(&["1", "x\ty"]), row(&["2", "\"q\""])]);
    }

    #[test]
    fn ensure_is_idempotent() {
        let t = tables("idempotent");
        t.ensure_table("status", &["a", "b"]).unwrap();
        t.ensure_table("status", &["a", "b"]).unwrap();
        t.ensure_table("status", &["a"]).unwrap();
        assert_eq!(t.read_rows("status").unwrap(), vec![row(&["a", "b"])]);
    }

    #[test]
    fn ensure_extends_prefix_header() {
        let t = tables("extend");
        t.ensure_table("record", &["a", "b"]).unwrap();
        t.append_rows("record", &[row(&["1", "2"])]).unwrap();
        t.ensure_table("record", &["a", "b", "comment_count"]).unwrap();

        let rows = t.read_rows("record").unwrap();
        assert_eq!(rows[0], row(&["a", "b", "comment_count"]));
        assert_eq!(rows[1], row(&["1", "2"]));
    }

    #[test]
    fn ensure_rejects_conflicting_header() {
        let t = tables("conflict");
        t.ensure_table("record", &["a", "b"]).unwrap();
        assert!(t.ensure_table("record", &["a", "c"]).is_err());
    }

    #[test]
    fn update_cell_pads_short_rows() {
        let t = tables("update");
        t.ensure_table("t", &["a", "b", "c"]).unwrap();
        t.append_rows("t", &[row(&["1"])]).unwrap();
        t.update_cell("t", 1, 2, "z").unwrap();
        assert_eq!(t.read_rows("t").unwrap()[1], row(&["1", "", "z"]));
        assert!(t.update_cell("t", 5, 0, "nope").is_err());
    }

    #[test]
    fn rejects_unsafe_table_names() {
        let t = tables("names");
        assert!(t.table_path("../etc").is_err());
        assert!(t.table_path("a b").is_err());
        assert!(t.table_path("").is_err());
        assert!(t.table_path("status_2024-q1").is_ok());
    }

    #[test]
    fn skips_corrupt_lines() {
        let t = tables("corrupt");
        t.ensure_table("t", &["a"]).unwrap();
        let path = t.table_path("t").unwrap();
        let mut data = fs::read_to_string(&path).unwrap();
        data.push_str("not json\n\n[\"ok\"]\n");
        fs::write(&path, data).unwrap();
        assert_eq!(t.read_rows("t").unwrap(), vec![row(&["a"]), row(&["ok"])]);
    }

    #[test]
    fn writable_check_leaves_nothing_behind() {
        let t = tables("writable");
        t.check_writable().unwrap();
        assert_eq!(fs::read_dir(&t.dir).unwrap().count(), 0);
    }

    #[test]
    fn config_round_trip_and_defaults() {
        let dir = scratch_dir("config");
        let path = dir.join("config.json");
        assert_eq!(load_config(&path).record_limit, Config::default().record_limit);

        let cfg = Config {
            routine_channels: vec!["@a".to_string(), "@b".to_string()],
            utc_offset_hours: Some(9),
            ..Config::default()
        };
        save_config(&path, &cfg).unwrap();

        let loaded = load_config(&path);
        assert_eq!(loaded.routine_channels, cfg.routine_channels);
        assert_eq!(loaded.utc_offset_hours, Some(9));

        fs::write(&path, "{ broken").unwrap();
        assert!(load_config(&path).routine_channels.is_empty());
    }

    #[test]
    fn quota_accumulates_across_saves() {
        let dir = scratch_dir("quota");
        let path = dir.join("nested").join("quota.json");
        assert!(load_quota(&path).is_empty());

        let mut run = QuotaUsage::default();
        run.record(Endpoint::Search);
        run.record(Endpoint::Videos);

        let mut stored = load_quota(&path);
        stored.merge(&run);
        save_quota(&path, &stored).unwrap();

        let mut stored = load_quota(&path);
        stored.merge(&run);
        save_quota(&path, &stored).unwrap();

        let loaded = load_quota(&path);
        assert_eq!(loaded.total, 202);
        assert_eq!(loaded.by_endpoint["search.list"], 200);
    }
}
