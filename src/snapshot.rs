//! snapshot.rs — persisted record of already-notified items.
//!
//! The file is a small CSV (`key,timestamp,title,link,state`) rewritten in full
//! after the first run and after every run that recorded something. Rows are
//! kept newest-first and capped, so the file never grows past the retention
//! limit.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::ingest::types::Item;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotRow {
    pub key: String,
    /// Written as `YYYY-MM-DD`.
    pub timestamp: NaiveDate,
    pub title: String,
    pub link: String,
    /// Last observed value of the tracked field (transition policy only).
    #[serde(default)]
    pub state: Option<String>,
}

impl SnapshotRow {
    /// Keyless items never become rows.
    pub fn from_item(item: &Item, tracked_field: Option<&str>) -> Option<Self> {
        let key = item.dedup_key()?;
        Some(Self {
            key: key.to_string(),
            timestamp: item.timestamp,
            title: item.title.clone(),
            link: item.link.clone(),
            state: tracked_field.and_then(|f| item.field(f)),
        })
    }
}

/// Rows loaded from disk, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    rows: Vec<SnapshotRow>,
}

impl Snapshot {
    pub fn from_rows(rows: Vec<SnapshotRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[SnapshotRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&SnapshotRow> {
        if key.trim().is_empty() {
            return None;
        }
        self.rows.iter().find(|r| r.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Read the snapshot at `path`.
///
/// A missing file is `Ok(None)`: the first run is a distinct, valid state and
/// callers decide what it means.
pub fn load(path: &Path) -> Result<Option<Snapshot>, CacheError> {
    let mut reader = match csv::Reader::from_path(path) {
        Ok(r) => r,
        Err(e) if is_not_found(&e) => return Ok(None),
        Err(source) => {
            return Err(CacheError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut rows = Vec::new();
    for rec in reader.deserialize::<SnapshotRow>() {
        let row = rec.map_err(|source| CacheError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if !row.key.trim().is_empty() {
            rows.push(row);
        }
    }
    tracing::debug!(path = %path.display(), rows = rows.len(), "snapshot loaded");
    Ok(Some(Snapshot { rows }))
}

/// Union `incoming` into `existing` (incoming wins on key collision), order by
/// timestamp descending, keep the newest `cap` rows and atomically replace the
/// file at `path`. Returns what was written.
pub fn merge_and_save(
    path: &Path,
    existing: Option<&Snapshot>,
    incoming: Vec<SnapshotRow>,
    cap: usize,
) -> Result<Snapshot, CacheError> {
    let merged = merge(existing, incoming, cap);
    write_atomic(path, &merged.rows)?;
    tracing::debug!(path = %path.display(), rows = merged.len(), "snapshot saved");
    Ok(merged)
}

/// Pure part of [`merge_and_save`].
pub fn merge(existing: Option<&Snapshot>, incoming: Vec<SnapshotRow>, cap: usize) -> Snapshot {
    let mut rows: Vec<SnapshotRow> =
        Vec::with_capacity(incoming.len() + existing.map_or(0, Snapshot::len));

    for row in incoming {
        if row.key.trim().is_empty() || rows.iter().any(|r| r.key == row.key) {
            continue;
        }
        rows.push(row);
    }
    if let Some(old) = existing {
        for row in &old.rows {
            if !rows.iter().any(|r| r.key == row.key) {
                rows.push(row.clone());
            }
        }
    }

    // Stable sort: on equal dates incoming rows stay ahead of older ones.
    rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    rows.truncate(cap);
    Snapshot { rows }
}

fn write_atomic(path: &Path, rows: &[SnapshotRow]) -> Result<(), CacheError> {
    let io_err = |source: io::Error| CacheError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err)?;
    }

    let tmp = tmp_path(path);
    let file = fs::File::create(&tmp).map_err(io_err)?;
    let mut writer = csv::Writer::from_writer(file);
    for row in rows {
        writer.serialize(row).map_err(|source| CacheError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
    }
    // Header-only file for an empty table, so the next load sees "existing".
    if rows.is_empty() {
        writer
            .write_record(["key", "timestamp", "title", "link", "state"])
            .map_err(|source| CacheError::Encode {
                path: path.to_path_buf(),
                source,
            })?;
    }
    let mut file = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
    file.flush().map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);

    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "snapshot.csv".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn is_not_found(e: &csv::Error) -> bool {
    matches!(e.kind(), csv::ErrorKind::Io(err) if err.kind() == io::ErrorKind::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, date: &str) -> SnapshotRow {
        SnapshotRow {
            key: key.into(),
            timestamp: date.parse().unwrap(),
            title: format!("title {key}"),
            link: format!("https://example.com/{key}"),
            state: None,
        }
    }

    #[test]
    fn missing_file_is_explicitly_empty() {
        let dir = tempfile::tempdir().unwrap();
        let out = load(&dir.path().join("nope.csv")).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn round_trip_keeps_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("book.csv");

        let mut with_state = row("B", "2024-01-05");
        with_state.title = "Commas, \"quotes\" & <tags>".into();
        with_state.state = Some("true".into());
        let saved = merge_and_save(&path, None, vec![row("A", "2024-01-01"), with_state], 50).unwrap();

        let loaded = load(&path).unwrap().expect("file exists");
        assert_eq!(loaded, saved);
        assert_eq!(loaded.rows()[0].key, "B");
        assert_eq!(loaded.rows()[0].timestamp, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(loaded.rows()[0].state.as_deref(), Some("true"));
        assert_eq!(loaded.rows()[1].state, None);
    }

    #[test]
    fn incoming_wins_on_key_collision() {
        let existing = Snapshot::from_rows(vec![row("A", "2024-01-01")]);
        let mut newer = row("A", "2024-02-01");
        newer.title = "renamed".into();
        let merged = merge(Some(&existing), vec![newer], 50);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.rows()[0].title, "renamed");
    }

    #[test]
    fn cap_drops_oldest_rows() {
        let existing = Snapshot::from_rows(vec![row("old1", "2023-01-01"), row("old2", "2023-06-01")]);
        let merged = merge(
            Some(&existing),
            vec![row("n1", "2024-01-01"), row("n2", "2024-01-02")],
            3,
        );
        let keys: Vec<&str> = merged.rows().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["n2", "n1", "old2"]);
    }

    #[test]
    fn blank_keys_never_enter_the_table() {
        let merged = merge(None, vec![row("", "2024-01-01"), row("  ", "2024-01-02"), row("K", "2024-01-03")], 50);
        assert_eq!(merged.len(), 1);
        assert!(!merged.contains(""));
    }

    #[test]
    fn save_replaces_file_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.csv");
        merge_and_save(&path, None, vec![row("A", "2024-01-01")], 50).unwrap();
        let first = load(&path).unwrap().unwrap();
        merge_and_save(&path, Some(&first), vec![row("B", "2024-01-02")], 50).unwrap();

        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn empty_table_still_counts_as_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        merge_and_save(&path, None, vec![], 50).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, Some(Snapshot::default()));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "key,timestamp,title,link,state\nA,not-a-date,t,l,\n").unwrap();
        assert!(matches!(load(&path), Err(CacheError::Read { .. })));
    }
}
