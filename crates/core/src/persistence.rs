// Store file persistence
// Decision: One JSON document holds every event plus the id counter
// Decision: Writes go to a sibling temp file, fsync, then rename over the target
//
// File layout:
//   {"events": {"<id>": <event>, ...}, "next_id": <int>}

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::event::{Event, EventId};

/// The first id handed out by an empty store.
pub const FIRST_EVENT_ID: EventId = 1;

fn first_event_id() -> EventId {
    FIRST_EVENT_ID
}

/// Complete persisted state of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Events keyed by id. serde_json writes the integer keys as strings.
    #[serde(default)]
    pub events: BTreeMap<EventId, Event>,
    /// Id assigned to the next created event.
    #[serde(default = "first_event_id")]
    pub next_id: EventId,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            events: BTreeMap::new(),
            next_id: FIRST_EVENT_ID,
        }
    }
}

impl StoreSnapshot {
    /// Make the snapshot internally consistent after loading.
    ///
    /// Map keys are authoritative for ids, and `next_id` must be past every
    /// stored id so a create never overwrites an existing event. Fails when
    /// the largest stored id leaves no room for another one.
    fn repair(&mut self) -> std::result::Result<(), serde_json::Error> {
        for (id, event) in self.events.iter_mut() {
            if event.id != *id {
                tracing::warn!(
                    key = id,
                    stored_id = event.id,
                    "Event id disagrees with its key, using key"
                );
                event.id = *id;
            }
        }

        let min_next = match self.events.keys().next_back() {
            Some(max) => max.checked_add(1).ok_or_else(|| {
                <serde_json::Error as serde::de::Error>::custom(format!(
                    "event id {max} leaves no room for further ids"
                ))
            })?,
            None => FIRST_EVENT_ID,
        };
        if self.next_id < min_next {
            tracing::warn!(
                next_id = self.next_id,
                repaired = min_next,
                "Stored next_id would reuse an existing id, advancing it"
            );
            self.next_id = min_next;
        }
        Ok(())
    }
}

/// Load the snapshot at `path`.
///
/// Returns `Ok(None)` when the file does not exist (fresh start).
pub fn load_snapshot(path: &Path) -> Result<Option<StoreSnapshot>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::Io(e)),
    };

    let corrupt = |source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    };
    let mut snapshot: StoreSnapshot = serde_json::from_slice(&bytes).map_err(corrupt)?;
    snapshot.repair().map_err(corrupt)?;

    Ok(Some(snapshot))
}

/// Atomically replace the file at `path` with `snapshot`.
///
/// Writes `<path>.tmp`, syncs it, renames it over `path` and syncs the parent
/// directory so the rename itself is durable.
pub fn save_snapshot_atomic(path: &Path, snapshot: &StoreSnapshot) -> Result<()> {
    let parent = parent_dir(path);
    fs::create_dir_all(parent)?;

    let tmp_path = tmp_path_for(path);
    let bytes = serde_json::to_vec_pretty(snapshot)?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bytes)?;
        fsync_file(&file)?;
    }

    fs::rename(&tmp_path, path)?;
    fsync_dir(parent)?;

    Ok(())
}

/// Move an unreadable store file aside so it is never overwritten.
///
/// Returns the new location, e.g. `events.json.corrupt-20240115T100000Z`.
pub fn quarantine(path: &Path) -> io::Result<PathBuf> {
    let suffix = Utc::now().format("corrupt-%Y%m%dT%H%M%SZ");
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{suffix}"));

    let target = path.with_file_name(name);
    fs::rename(path, &target)?;
    Ok(target)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

fn fsync_dir(dir: &Path) -> io::Result<()> {
    // Directories cannot be opened for syncing on Windows
    if cfg!(windows) {
        return Ok(());
    }
    File::open(dir)?.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::tempdir;

    fn event(id: EventId, title: &str) -> Event {
        Event {
            id,
            title: title.to_string(),
            description: String::new(),
            start_time: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            recurring: json!({"freq": "daily"}),
            created_at: Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
            updated_at: Some(Utc.with_ymd_and_hms(2024, 2, 2, 9, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_missing_file_is_fresh_start() {
        let dir = tempdir().unwrap();
        let loaded = load_snapshot(&dir.path().join("events.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.json");

        let mut snapshot = StoreSnapshot::default();
        snapshot.events.insert(1, event(1, "One"));
        snapshot.events.insert(3, event(3, "Three"));
        snapshot.next_id = 4;

        save_snapshot_atomic(&path, &snapshot).unwrap();
        let loaded = load_snapshot(&path).unwrap().unwrap();

        assert_eq!(loaded, snapshot);
        assert!(!tmp_path_for(&path).exists(), "temp file should be renamed away");
    }

    #[test]
    fn test_file_uses_string_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.json");

        let mut snapshot = StoreSnapshot::default();
        snapshot.events.insert(12, event(12, "Twelve"));
        snapshot.next_id = 13;
        save_snapshot_atomic(&path, &snapshot).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["next_id"], 13);
        assert_eq!(raw["events"]["12"]["title"], "Twelve");
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("events.json");

        save_snapshot_atomic(&path, &StoreSnapshot::default()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let err = load_snapshot(&path).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, b"{}").unwrap();

        let loaded = load_snapshot(&path).unwrap().unwrap();
        assert_eq!(loaded, StoreSnapshot::default());
    }

    #[test]
    fn test_load_repairs_stale_counter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.json");

        let mut snapshot = StoreSnapshot::default();
        snapshot.events.insert(5, event(5, "Five"));
        snapshot.next_id = 2;
        std::fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

        let loaded = load_snapshot(&path).unwrap().unwrap();
        assert_eq!(loaded.next_id, 6);
    }

    #[test]
    fn test_max_id_key_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.json");

        let mut snapshot = StoreSnapshot::default();
        snapshot.events.insert(u64::MAX, event(u64::MAX, "Last"));
        std::fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

        let err = load_snapshot(&path).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }), "got {err}");
    }

    #[test]
    fn test_max_next_id_still_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, format!(r#"{{"events": {{}}, "next_id": {}}}"#, u64::MAX)).unwrap();

        let loaded = load_snapshot(&path).unwrap().unwrap();
        assert_eq!(loaded.next_id, u64::MAX);
    }

    #[test]
    fn test_quarantine_moves_file_aside() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, b"garbage").unwrap();

        let moved = quarantine(&path).unwrap();

        assert!(!path.exists());
        assert_eq!(std::fs::read(&moved).unwrap(), b"garbage");
        let name = moved.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("events.json.corrupt-"), "got {name}");
    }
}
