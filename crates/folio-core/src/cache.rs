//! Small preference file kept under the cache directory.
//!
//! Stored as `<cache dir>/preferences.toml`, one top-level key per preference.
//! Reads fall back to defaults and writes only log on failure so a read-only
//! cache never interrupts a session.

use crate::explain::ExplainSortMode;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const PREFERENCES_FILE: &str = "preferences.toml";
pub const SORT_MODE_KEY: &str = "explain-chat-sort-mode";

pub fn preferences_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(PREFERENCES_FILE)
}

/// Stored explanation sort mode, `Updated` when absent or unrecognized.
pub fn load_sort_mode(cache_dir: &Path) -> ExplainSortMode {
    let Some(table) = read_preferences(cache_dir) else {
        return ExplainSortMode::default();
    };
    table
        .get(SORT_MODE_KEY)
        .and_then(toml::Value::as_str)
        .map(ExplainSortMode::from_preference)
        .unwrap_or_default()
}

pub fn save_sort_mode(cache_dir: &Path, mode: ExplainSortMode) {
    if let Err(err) = write_preference(cache_dir, SORT_MODE_KEY, mode.as_str()) {
        warn!(cache_dir = %cache_dir.display(), "Failed to save sort preference: {err:#}");
    }
}

fn read_preferences(cache_dir: &Path) -> Option<toml::Table> {
    let path = preferences_path(cache_dir);
    let data = fs::read_to_string(&path).ok()?;
    match toml::from_str::<toml::Table>(&data) {
        Ok(table) => Some(table),
        Err(err) => {
            warn!(path = %path.display(), "Ignoring unreadable preferences: {err}");
            None
        }
    }
}

fn write_preference(cache_dir: &Path, key: &str, value: &str) -> Result<()> {
    let path = preferences_path(cache_dir);
    let mut table = read_preferences(cache_dir).unwrap_or_default();
    table.insert(key.to_string(), toml::Value::String(value.to_string()));

    fs::create_dir_all(cache_dir)
        .with_context(|| format!("failed to create {}", cache_dir.display()))?;
    let contents = toml::to_string(&table).context("failed to serialize preferences")?;
    fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    debug!(path = %path.display(), key, value, "Saved preference");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_cache_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("folio_cache_{name}_{nanos}"))
    }

    #[test]
    fn sort_mode_round_trips_through_preferences_file() {
        let dir = unique_cache_dir("round_trip");

        assert_eq!(load_sort_mode(&dir), ExplainSortMode::Updated);
        save_sort_mode(&dir, ExplainSortMode::Play);

        assert_eq!(load_sort_mode(&dir), ExplainSortMode::Play);
        let raw = fs::read_to_string(preferences_path(&dir)).expect("read preferences");
        assert!(raw.contains("explain-chat-sort-mode"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unknown_or_corrupt_values_read_as_default() {
        let dir = unique_cache_dir("corrupt");
        fs::create_dir_all(&dir).expect("create cache dir");

        fs::write(preferences_path(&dir), "\"explain-chat-sort-mode\" = \"shuffle\"\n")
            .expect("write preferences");
        assert_eq!(load_sort_mode(&dir), ExplainSortMode::Updated);

        fs::write(preferences_path(&dir), "not = [valid").expect("write preferences");
        assert_eq!(load_sort_mode(&dir), ExplainSortMode::Updated);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn saving_keeps_unrelated_keys() {
        let dir = unique_cache_dir("keeps_keys");
        fs::create_dir_all(&dir).expect("create cache dir");
        fs::write(preferences_path(&dir), "theme = \"sepia\"\n").expect("write preferences");

        save_sort_mode(&dir, ExplainSortMode::Created);

        let table = read_preferences(&dir).expect("preferences");
        assert_eq!(table.get("theme").and_then(toml::Value::as_str), Some("sepia"));
        assert_eq!(load_sort_mode(&dir), ExplainSortMode::Created);
        let _ = fs::remove_dir_all(dir);
    }
}
