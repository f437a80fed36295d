//! Bounded, deduplicated clipboard history persisted as a JSON file
//!
//! Entries are kept most-recent-first. Every mutation is written straight
//! back to disk through [`atomic_write`], so a crash mid-save leaves the
//! previous file intact.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use super::types::{ClipboardEntry, ContentKind};
use crate::config::HistoryLimits;
use crate::utils::atomic_write;

/// History persistence errors
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("failed to access history file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse history file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize history: {0}")]
    Serialize(#[source] serde_json::Error),
}

#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    limits: HistoryLimits,
    entries: Vec<ClipboardEntry>,
}

impl HistoryStore {
    /// Empty store bound to `path`. Nothing is read or written.
    pub fn new(path: impl Into<PathBuf>, limits: HistoryLimits) -> Self {
        Self {
            path: path.into(),
            limits,
            entries: Vec::new(),
        }
    }

    /// Create a store and hydrate it from `path`.
    pub fn open(path: impl Into<PathBuf>, limits: HistoryLimits) -> Self {
        let mut store = Self::new(path, limits);
        store.load();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn limits(&self) -> HistoryLimits {
        self.limits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace the in-memory list with the file contents.
    ///
    /// Never fails: a missing file yields an empty history, an unreadable
    /// one is logged, and a malformed one is moved aside before proceeding
    /// empty. Returns the number of entries loaded.
    #[instrument(name = "history_load", skip(self), fields(path = %self.path.display()))]
    pub fn load(&mut self) -> usize {
        self.entries = match read_history_file(&self.path) {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                debug!("No history file, starting empty");
                Vec::new()
            }
            Err(e @ HistoryError::Parse { .. }) => {
                error!(error = %e, "History file is corrupt, starting empty");
                quarantine_corrupt_file(&self.path);
                Vec::new()
            }
            Err(e) => {
                error!(error = %e, "Failed to read history file, starting empty");
                Vec::new()
            }
        };

        if self.entries.len() > self.limits.max_items {
            warn!(
                loaded = self.entries.len(),
                max_items = self.limits.max_items,
                "History file holds more entries than allowed, trimming"
            );
            self.entries.truncate(self.limits.max_items);
        }

        info!(count = self.entries.len(), "Clipboard history loaded");
        self.entries.len()
    }

    /// Record a capture.
    ///
    /// Returns `None` without touching the history for blank content or
    /// content whose character count is outside the configured bounds.
    /// An exact (content, kind) duplicate moves to the front and keeps its
    /// original `captured_at`; anything else is inserted fresh. The tail is
    /// trimmed to `max_items` and the list is persisted.
    pub fn record(&mut self, content: &str, kind: ContentKind) -> Option<ClipboardEntry> {
        if content.trim().is_empty() {
            return None;
        }

        let length = content.chars().count();
        if length < self.limits.min_text_length || length > self.limits.max_text_length {
            debug!(
                length,
                min = self.limits.min_text_length,
                max = self.limits.max_text_length,
                "Content length outside accepted range"
            );
            return None;
        }

        let entry = match self.entries.iter().position(|e| e.matches(content, &kind)) {
            Some(index) => {
                debug!(from = index, "Promoting duplicate entry to top");
                self.entries.remove(index)
            }
            None => ClipboardEntry::new(content, kind),
        };
        self.entries.insert(0, entry.clone());
        self.trim_tail();

        self.persist();
        debug!(preview = %entry.preview(), count = self.entries.len(), "Recorded clipboard entry");
        Some(entry)
    }

    /// Remove every entry and persist the empty list.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
        info!("Clipboard history cleared");
    }

    /// Copy of the entries, most-recent-first, optionally capped.
    pub fn items(&self, limit: Option<usize>) -> Vec<ClipboardEntry> {
        let count = limit.map_or(self.entries.len(), |l| l.min(self.entries.len()));
        self.entries[..count].to_vec()
    }

    /// Write the full ordered list to disk.
    pub fn save(&self) -> Result<(), HistoryError> {
        let json =
            serde_json::to_string_pretty(&self.entries).map_err(HistoryError::Serialize)?;
        atomic_write(&self.path, json.as_bytes()).map_err(|source| HistoryError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(count = self.entries.len(), "Saved clipboard history");
        Ok(())
    }

    /// Swap in new limits. A smaller maximum trims the tail immediately.
    pub fn set_limits(&mut self, limits: HistoryLimits) {
        let previous = self.limits;
        self.limits = limits;
        if previous != limits {
            info!(
                max_items = limits.max_items,
                min_text_length = limits.min_text_length,
                max_text_length = limits.max_text_length,
                "History limits updated"
            );
        }
        if self.trim_tail() > 0 {
            self.persist();
        }
    }

    /// Drop entries past `max_items`, returning how many were removed.
    fn trim_tail(&mut self) -> usize {
        let excess = self.entries.len().saturating_sub(self.limits.max_items);
        if excess > 0 {
            self.entries.truncate(self.limits.max_items);
            debug!(removed = excess, "Trimmed old entries from history");
        }
        excess
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            error!(error = %e, "Failed to save clipboard history");
        }
    }
}

/// Read and parse the history file. `Ok(None)` when it does not exist.
fn read_history_file(path: &Path) -> Result<Option<Vec<ClipboardEntry>>, HistoryError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(HistoryError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| HistoryError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Move a malformed history file to `<name>.corrupt-<unix-seconds>`.
fn quarantine_corrupt_file(path: &Path) -> Option<PathBuf> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut name = path.file_name()?.to_os_string();
    name.push(format!(".corrupt-{}", seconds));
    let target = path.with_file_name(name);

    match fs::rename(path, &target) {
        Ok(()) => {
            warn!(moved_to = %target.display(), "Moved corrupt history file aside");
            Some(target)
        }
        Err(e) => {
            error!(error = %e, "Failed to move corrupt history file aside");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn limits(max_items: usize) -> HistoryLimits {
        HistoryLimits {
            max_items,
            ..HistoryLimits::default()
        }
    }

    fn store_in(temp_dir: &TempDir, max_items: usize) -> HistoryStore {
        HistoryStore::open(temp_dir.path().join("history.json"), limits(max_items))
    }

    fn contents(store: &HistoryStore) -> Vec<String> {
        store.items(None).into_iter().map(|e| e.content).collect()
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir, 25);
        assert!(store.is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_scenario_max_three_evicts_oldest() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 3);
        for content in ["a", "b", "c", "d"] {
            assert!(store.record(content, ContentKind::Text).is_some());
        }
        assert_eq!(contents(&store), vec!["d", "c", "b"]);
    }

    #[test]
    fn test_length_never_exceeds_max() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 5);
        for i in 0..40 {
            store.record(&format!("item {}", i % 9), ContentKind::Text);
            assert!(store.len() <= 5);
        }
    }

    #[test]
    fn test_duplicate_promotes_and_keeps_captured_at() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 25);

        let first = store.record("hello", ContentKind::Text).unwrap();
        store.record("other", ContentKind::Text);
        let again = store.record("hello", ContentKind::Text).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(contents(&store), vec!["hello", "other"]);
        assert_eq!(again.captured_at, first.captured_at);
        assert_eq!(store.items(None)[0].captured_at, first.captured_at);
    }

    #[test]
    fn test_same_content_different_kind_is_distinct() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 25);
        store.record("<b>x</b>", ContentKind::Text);
        store.record("<b>x</b>", ContentKind::Html);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_rejects_blank_and_out_of_range_content() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = HistoryStore::open(
            temp_dir.path().join("history.json"),
            HistoryLimits {
                max_items: 25,
                min_text_length: 3,
                max_text_length: 100,
            },
        );

        assert!(store.record("", ContentKind::Text).is_none());
        assert!(store.record("   \n\t", ContentKind::Text).is_none());
        assert!(store.record("ab", ContentKind::Text).is_none());
        assert!(store.record(&"z".repeat(101), ContentKind::Text).is_none());
        assert!(store.is_empty());
        assert!(!store.path().exists());

        // Bounds are inclusive and counted in characters
        assert!(store.record("äöü", ContentKind::Text).is_some());
        assert!(store.record(&"z".repeat(100), ContentKind::Text).is_some());
    }

    #[test]
    fn test_trimming_removes_from_tail() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 5);
        for content in ["1", "2", "3", "4", "5"] {
            store.record(content, ContentKind::Text);
        }
        store.record("6", ContentKind::Text);

        let items = contents(&store);
        assert_eq!(items.len(), 5);
        assert_eq!(items[0], "6");
        assert_eq!(items[1], "5");
        assert!(!items.contains(&"1".to_string()));
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 25);
        store.record("first", ContentKind::Text);
        store.record("  spaced\n out  ", ContentKind::Text);
        store.record("https://example.com", ContentKind::Uri);
        store.record("blob", ContentKind::from("x-custom"));

        let reloaded = store_in(&temp_dir, 25);
        let before = store.items(None);
        let after = reloaded.items(None);
        assert_eq!(before, after);
        for (a, b) in before.iter().zip(after.iter()) {
            assert_eq!(a.preview(), b.preview());
        }
    }

    #[test]
    fn test_file_format_fields() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 25);
        store.record("hello   world", ContentKind::Text);

        let raw = fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let record = &value[0];
        assert_eq!(record["content"], "hello   world");
        assert_eq!(record["content_type"], "text");
        assert_eq!(record["preview"], "hello world");
        assert!(record["timestamp"].is_string());
    }

    #[test]
    fn test_corrupt_file_is_moved_aside() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("history.json");
        fs::write(&path, "[{\"content\": ").unwrap();

        let mut store = HistoryStore::open(&path, limits(25));
        assert!(store.is_empty());
        assert!(!path.exists());

        let quarantined: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with("history.json.corrupt-"))
            .collect();
        assert_eq!(quarantined.len(), 1);

        // The next save does not clobber the quarantined copy
        store.record("fresh", ContentKind::Text);
        assert!(path.exists());
        assert!(temp_dir.path().join(&quarantined[0]).exists());
    }

    #[test]
    fn test_clear_persists_empty_list() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 25);
        store.record("x", ContentKind::Text);
        store.clear();
        assert!(store.is_empty());

        let reloaded = store_in(&temp_dir, 25);
        assert!(reloaded.is_empty());
        assert_eq!(fs::read_to_string(store.path()).unwrap().trim(), "[]");
    }

    #[test]
    fn test_items_limit() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 25);
        for content in ["a", "b", "c"] {
            store.record(content, ContentKind::Text);
        }
        assert_eq!(store.items(Some(2)).len(), 2);
        assert_eq!(store.items(Some(10)).len(), 3);
        assert_eq!(store.items(Some(0)).len(), 0);
    }

    #[test]
    fn test_set_limits_trims_immediately() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 10);
        for i in 0..8 {
            store.record(&format!("entry {}", i), ContentKind::Text);
        }

        store.set_limits(limits(5));
        assert_eq!(store.len(), 5);
        assert_eq!(store.items(None)[0].content, "entry 7");

        let reloaded = store_in(&temp_dir, 10);
        assert_eq!(reloaded.len(), 5);
    }

    #[test]
    fn test_load_trims_oversized_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 10);
        for i in 0..8 {
            store.record(&format!("entry {}", i), ContentKind::Text);
        }

        let smaller = store_in(&temp_dir, 5);
        assert_eq!(smaller.len(), 5);
        assert_eq!(smaller.items(None)[0].content, "entry 7");
    }
}
