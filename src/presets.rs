//! Preset storage: named frames persisted as hardware-ordered hex.
//!
//! Presets live in a JSON file tagged with a storage format:
//!
//! ```json
//! {"__format": "hardware-layout-v1", "entries": {"smile": "FF0000..."}}
//! ```
//!
//! Older installs wrote a plain `{name: hex}` object in grid (row-major)
//! order to a separate legacy file. Loading migrates that file once and
//! removes it.
//!
//! ## Rust concepts
//! - `serde_json::Value` for inspecting JSON of unknown shape
//! - `BTreeMap` for entries that iterate in sorted order
//! - `thiserror` for a typed error enum with `#[from]` conversions

use crate::Color;
use crate::codec::{self, FrameError};
use crate::mapping::IndexMaps;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Format tag written with every preset file.
pub const PRESET_STORAGE_FORMAT: &str = "hardware-layout-v1";

/// File name of the current preset store.
pub const PRESET_FILE: &str = "visor-presets.v2.json";

/// File name of the pre-mapping (row-major) preset store.
pub const LEGACY_PRESET_FILE: &str = "visor-presets.v1.json";

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("preset storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("preset file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("preset name is empty")]
    EmptyName,
    #[error("preset not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Where the current and legacy preset files live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresetPaths {
    pub current: PathBuf,
    pub legacy: PathBuf,
}

impl PresetPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            current: dir.join(PRESET_FILE),
            legacy: dir.join(LEGACY_PRESET_FILE),
        }
    }
}

/// On-disk layout of the current store.
#[derive(Serialize, Deserialize)]
struct TaggedPresets {
    #[serde(rename = "__format")]
    format: String,
    entries: BTreeMap<String, String>,
}

/// Named frames, kept in memory and written through to disk on every change.
pub struct PresetStore {
    paths: PresetPaths,
    maps: Arc<IndexMaps>,
    entries: BTreeMap<String, String>,
}

impl PresetStore {
    /// Open the store, migrating legacy data if that is all there is.
    ///
    /// Lookup order:
    /// 1. current file tagged with [`PRESET_STORAGE_FORMAT`]
    /// 2. current file holding an untagged object (assumed hardware order)
    /// 3. legacy file, migrated from row-major order, persisted, then removed
    ///
    /// Nothing here is fatal. Unreadable files are logged and the store
    /// starts out empty.
    pub fn load(paths: PresetPaths, maps: Arc<IndexMaps>) -> Self {
        let mut store = Self {
            paths,
            maps,
            entries: BTreeMap::new(),
        };

        match read_current(&store.paths.current) {
            Ok(Some(entries)) => {
                tracing::info!("Loaded {} presets", entries.len());
                store.entries = entries;
                return store;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Preset load failed: {}", e),
        }

        match store.migrate_legacy() {
            Ok(true) => tracing::info!("Migrated legacy presets to the updated visor layout."),
            Ok(false) => {}
            Err(e) => tracing::warn!("Legacy preset migration failed: {}", e),
        }

        store
    }

    /// Migrate the legacy file if present. Returns whether a migration ran.
    fn migrate_legacy(&mut self) -> Result<bool, PresetError> {
        let raw = match fs::read_to_string(&self.paths.legacy) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let Value::Object(legacy) = serde_json::from_str::<Value>(&raw)? else {
            return Ok(false);
        };

        self.entries = migrate_legacy_entries(&self.maps, &legacy);
        self.persist()?;
        fs::remove_file(&self.paths.legacy)?;
        Ok(true)
    }

    /// Preset names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The stored hardware-order payload for a preset.
    pub fn get_hex(&self, name: &str) -> Option<&str> {
        self.entries.get(name.trim()).map(String::as_str)
    }

    /// Encode a grid frame and store it under `name` (trimmed).
    ///
    /// Returns the name the preset was stored under.
    pub fn save(&mut self, name: &str, grid_colors: &[Color]) -> Result<String, PresetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PresetError::EmptyName);
        }

        let hex = codec::encode_frame(&self.maps, grid_colors)?;
        self.entries.insert(name.to_string(), hex);
        self.persist()?;
        tracing::info!("Saved preset \"{}\"", name);
        Ok(name.to_string())
    }

    /// Decode a stored preset back into grid order.
    pub fn load_preset(&self, name: &str) -> Result<Vec<Color>, PresetError> {
        let hex = self
            .get_hex(name)
            .ok_or_else(|| PresetError::NotFound(name.to_string()))?;
        Ok(codec::decode_frame(&self.maps, hex)?)
    }

    /// Remove a preset. Returns `false` if it did not exist.
    pub fn delete(&mut self, name: &str) -> Result<bool, PresetError> {
        let name = name.trim();
        if self.entries.remove(name).is_none() {
            return Ok(false);
        }
        self.persist()?;
        tracing::info!("Deleted preset \"{}\"", name);
        Ok(true)
    }

    /// Write all entries to the current file with the format tag.
    pub fn persist(&self) -> Result<(), PresetError> {
        if let Some(parent) = self.paths.current.parent() {
            fs::create_dir_all(parent)?;
        }

        let tagged = TaggedPresets {
            format: PRESET_STORAGE_FORMAT.to_string(),
            entries: self.entries.clone(),
        };
        fs::write(&self.paths.current, serde_json::to_string_pretty(&tagged)?)?;
        Ok(())
    }
}

/// Read the current store. `Ok(None)` means "not usable, try legacy".
fn read_current(path: &Path) -> Result<Option<BTreeMap<String, String>>, PresetError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let Value::Object(object) = serde_json::from_str::<Value>(&raw)? else {
        return Ok(None);
    };

    if is_untagged(object.get("__format")) {
        // No usable version marker: an early build of this layout, already hardware ordered.
        return Ok(Some(untagged_entries(object)));
    }

    match (object.get("__format"), object.get("entries")) {
        (Some(Value::String(format)), Some(Value::Object(entries)))
            if format == PRESET_STORAGE_FORMAT =>
        {
            Ok(Some(string_entries(entries)))
        }
        _ => Ok(None),
    }
}

/// A missing or falsy `__format` (`null`, `false`, `0`, `""`).
fn is_untagged(tag: Option<&Value>) -> bool {
    match tag {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(format)) => format.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

fn untagged_entries(mut object: Map<String, Value>) -> BTreeMap<String, String> {
    object.remove("__format");
    string_entries(&object)
}

fn string_entries(object: &Map<String, Value>) -> BTreeMap<String, String> {
    object
        .iter()
        .filter_map(|(name, value)| match value {
            Value::String(hex) => Some((name.clone(), hex.clone())),
            _ => {
                tracing::warn!("Skipping preset \"{}\": value is not a string", name);
                None
            }
        })
        .collect()
}

/// Convert every legacy (row-major) entry to hardware order.
///
/// Entries that fail validation are logged and dropped; the rest still
/// migrate.
pub fn migrate_legacy_entries(
    maps: &IndexMaps,
    legacy: &Map<String, Value>,
) -> BTreeMap<String, String> {
    let mut migrated = BTreeMap::new();
    for (name, value) in legacy {
        let Value::String(row_major) = value else {
            tracing::warn!("Dropping legacy preset \"{}\": value is not a string", name);
            continue;
        };
        match codec::migrate_legacy_frame(maps, row_major) {
            Ok(hex) => {
                migrated.insert(name.clone(), hex);
            }
            Err(e) => tracing::warn!("Dropping legacy preset \"{}\": {}", name, e),
        }
    }
    migrated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PanelGeometry;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use tempfile::TempDir;

    fn maps() -> Arc<IndexMaps> {
        Arc::new(IndexMaps::build(PanelGeometry::default()).unwrap())
    }

    fn counting_frame() -> Vec<Color> {
        (0..256u32).map(|i| Color::from_u24(i * 0x010101)).collect()
    }

    fn row_major_hex(grid: &[Color]) -> String {
        grid.iter().map(|c| c.to_hex()).collect()
    }

    fn write_json(path: &Path, value: &Value) {
        fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn empty_dir_gives_empty_store() {
        let tmp = TempDir::new().unwrap();
        let store = PresetStore::load(PresetPaths::in_dir(tmp.path()), maps());
        assert!(store.is_empty());
        assert!(!tmp.path().join(PRESET_FILE).exists());
    }

    #[test]
    fn tagged_store_loads_entries() {
        let tmp = TempDir::new().unwrap();
        let paths = PresetPaths::in_dir(tmp.path());
        let hex = "00FF00".repeat(256);
        write_json(
            &paths.current,
            &json!({ "__format": PRESET_STORAGE_FORMAT, "entries": { "green": hex } }),
        );

        let store = PresetStore::load(paths, maps());

        assert_eq!(store.names(), vec!["green"]);
        assert_eq!(store.get_hex("green"), Some(hex.as_str()));
    }

    #[test]
    fn untagged_current_store_is_assumed_hardware_order() {
        let tmp = TempDir::new().unwrap();
        let paths = PresetPaths::in_dir(tmp.path());
        let maps = maps();
        let hex = codec::encode_frame(&maps, &counting_frame()).unwrap();
        write_json(&paths.current, &json!({ "count": hex }));

        let store = PresetStore::load(paths, maps);

        assert_eq!(store.get_hex("count"), Some(hex.as_str()));
        assert_eq!(store.load_preset("count").unwrap(), counting_frame());
    }

    #[test]
    fn current_store_wins_over_legacy() {
        let tmp = TempDir::new().unwrap();
        let paths = PresetPaths::in_dir(tmp.path());
        write_json(
            &paths.current,
            &json!({ "__format": PRESET_STORAGE_FORMAT, "entries": {} }),
        );
        write_json(&paths.legacy, &json!({ "old": "000000".repeat(256) }));

        let store = PresetStore::load(paths.clone(), maps());

        assert!(store.is_empty());
        assert!(paths.legacy.exists());
    }

    #[rstest]
    #[case(json!(null))]
    #[case(json!(""))]
    #[case(json!(false))]
    #[case(json!(0))]
    fn falsy_format_tag_counts_as_untagged(#[case] tag: Value) {
        let tmp = TempDir::new().unwrap();
        let paths = PresetPaths::in_dir(tmp.path());
        let hex = "00FF00".repeat(256);
        write_json(&paths.current, &json!({ "__format": tag, "green": hex }));
        write_json(&paths.legacy, &json!({ "old": "000000".repeat(256) }));

        let store = PresetStore::load(paths.clone(), maps());

        assert_eq!(store.names(), vec!["green"]);
        assert_eq!(store.get_hex("green"), Some(hex.as_str()));
        assert!(paths.legacy.exists());
    }

    #[test]
    fn untagged_current_store_wins_over_legacy() {
        let tmp = TempDir::new().unwrap();
        let paths = PresetPaths::in_dir(tmp.path());
        let hex = "0000FF".repeat(256);
        write_json(&paths.current, &json!({ "blue": hex }));
        write_json(&paths.legacy, &json!({ "old": "000000".repeat(256) }));
        let legacy_before = fs::read_to_string(&paths.legacy).unwrap();

        let store = PresetStore::load(paths.clone(), maps());

        assert_eq!(store.names(), vec!["blue"]);
        assert_eq!(fs::read_to_string(&paths.legacy).unwrap(), legacy_before);
    }

    #[test]
    fn lookups_ignore_surrounding_whitespace() {
        let tmp = TempDir::new().unwrap();
        let mut store = PresetStore::load(PresetPaths::in_dir(tmp.path()), maps());
        let grid = counting_frame();

        store.save(" heart ", &grid).unwrap();

        assert_eq!(store.load_preset(" heart ").unwrap(), grid);
        assert!(store.get_hex("heart ").is_some());
        assert!(store.delete("  heart").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn legacy_store_is_migrated_once() {
        let tmp = TempDir::new().unwrap();
        let paths = PresetPaths::in_dir(tmp.path());
        let maps = maps();
        let grid = counting_frame();
        write_json(
            &paths.legacy,
            &json!({
                "good": row_major_hex(&grid),
                "short": "FF0000",
                "number": 42,
            }),
        );

        let store = PresetStore::load(paths.clone(), maps.clone());

        assert_eq!(store.names(), vec!["good"]);
        assert_eq!(
            store.get_hex("good").unwrap(),
            codec::encode_frame(&maps, &grid).unwrap()
        );
        assert_eq!(store.load_preset("good").unwrap(), grid);
        assert!(!paths.legacy.exists());

        let written = read_json(&paths.current);
        assert_eq!(written["__format"], PRESET_STORAGE_FORMAT);
        assert_eq!(written["entries"]["good"], json!(store.get_hex("good").unwrap()));
    }

    #[test]
    fn corrupt_current_store_falls_back_to_legacy() {
        let tmp = TempDir::new().unwrap();
        let paths = PresetPaths::in_dir(tmp.path());
        fs::write(&paths.current, "{ not json").unwrap();
        write_json(&paths.legacy, &json!({ "blank": "000000".repeat(256) }));

        let store = PresetStore::load(paths, maps());

        assert_eq!(store.names(), vec!["blank"]);
    }

    #[test]
    fn unknown_format_tag_falls_back_to_legacy() {
        let tmp = TempDir::new().unwrap();
        let paths = PresetPaths::in_dir(tmp.path());
        write_json(
            &paths.current,
            &json!({ "__format": "something-else", "entries": { "x": "000000".repeat(256) } }),
        );

        let store = PresetStore::load(paths, maps());

        assert!(store.is_empty());
    }

    #[test]
    fn save_load_delete_persist() {
        let tmp = TempDir::new().unwrap();
        let paths = PresetPaths::in_dir(tmp.path());
        let mut store = PresetStore::load(paths.clone(), maps());
        let grid = counting_frame();

        let name = store.save("  wave ", &grid).unwrap();
        assert_eq!(name, "wave");
        assert_eq!(store.load_preset("wave").unwrap(), grid);

        let reopened = PresetStore::load(paths.clone(), maps());
        assert_eq!(reopened.names(), vec!["wave"]);

        let mut store = reopened;
        assert!(store.delete("wave").unwrap());
        assert!(!store.delete("wave").unwrap());
        assert!(PresetStore::load(paths, maps()).is_empty());
    }

    #[test]
    fn save_rejects_blank_name_and_bad_frame() {
        let tmp = TempDir::new().unwrap();
        let mut store = PresetStore::load(PresetPaths::in_dir(tmp.path()), maps());

        assert!(matches!(
            store.save("   ", &counting_frame()),
            Err(PresetError::EmptyName)
        ));
        assert!(matches!(
            store.save("tiny", &[Color::BLACK; 4]),
            Err(PresetError::Frame(FrameError::PixelCount { .. }))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn load_preset_reports_missing_and_invalid() {
        let tmp = TempDir::new().unwrap();
        let paths = PresetPaths::in_dir(tmp.path());
        write_json(&paths.current, &json!({ "broken": "ABC" }));
        let store = PresetStore::load(paths, maps());

        assert!(matches!(
            store.load_preset("missing"),
            Err(PresetError::NotFound(_))
        ));
        assert!(matches!(
            store.load_preset("broken"),
            Err(PresetError::Frame(FrameError::Length { actual: 3, .. }))
        ));
    }

    #[test]
    fn migrate_entries_keeps_valid_alongside_invalid() {
        let maps = maps();
        let grid = counting_frame();
        let legacy = json!({ "a": "bad", "b": row_major_hex(&grid) });

        let migrated = migrate_legacy_entries(&maps, legacy.as_object().unwrap());

        assert_eq!(migrated.len(), 1);
        assert_eq!(migrated["b"], codec::encode_frame(&maps, &grid).unwrap());
    }
}
