use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Display preferences the negotiator reads and corrects.
///
/// Setters only change the in-memory value; `save` persists.
pub trait PreferenceStore {
    /// Index into the mode catalog. May be out of range on disk.
    fn resolution_index(&self) -> i32;
    fn set_resolution_index(&mut self, index: i32);

    fn fullscreen(&self) -> bool;
    fn set_fullscreen(&mut self, fullscreen: bool);

    /// Frame-rate cap level (see [`FrameRateCap`](super::FrameRateCap)).
    fn frame_rate_cap(&self) -> i32;
    fn set_frame_rate_cap(&mut self, level: i32);

    fn save(&mut self) -> Result<()>;
}

/// The persisted preference record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayPreferences {
    pub resolution: i32,
    pub fullscreen: bool,
    pub target_fps: i32,
}

impl Default for DisplayPreferences {
    fn default() -> Self {
        Self {
            resolution: 0,
            fullscreen: false,
            target_fps: 0,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    current: DisplayPreferences,
    saved: Option<DisplayPreferences>,
    save_count: usize,
}

/// In-memory store. Clones share state, so a caller can keep a handle after
/// giving one to the negotiator.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryPreferences {
    pub fn new(prefs: DisplayPreferences) -> Self {
        Self {
            inner: Rc::new(RefCell::new(MemoryInner {
                current: prefs,
                ..MemoryInner::default()
            })),
        }
    }

    pub fn current(&self) -> DisplayPreferences {
        self.inner.borrow().current.clone()
    }

    /// The record as of the last `save`.
    pub fn saved(&self) -> Option<DisplayPreferences> {
        self.inner.borrow().saved.clone()
    }

    pub fn save_count(&self) -> usize {
        self.inner.borrow().save_count
    }
}

impl PreferenceStore for MemoryPreferences {
    fn resolution_index(&self) -> i32 {
        self.inner.borrow().current.resolution
    }

    fn set_resolution_index(&mut self, index: i32) {
        self.inner.borrow_mut().current.resolution = index;
    }

    fn fullscreen(&self) -> bool {
        self.inner.borrow().current.fullscreen
    }

    fn set_fullscreen(&mut self, fullscreen: bool) {
        self.inner.borrow_mut().current.fullscreen = fullscreen;
    }

    fn frame_rate_cap(&self) -> i32 {
        self.inner.borrow().current.target_fps
    }

    fn set_frame_rate_cap(&mut self, level: i32) {
        self.inner.borrow_mut().current.target_fps = level;
    }

    fn save(&mut self) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.saved = Some(inner.current.clone());
        inner.save_count += 1;
        Ok(())
    }
}

/// TOML file store.
#[derive(Debug, Clone)]
pub struct FilePreferences {
    path: PathBuf,
    prefs: DisplayPreferences,
}

impl FilePreferences {
    /// Reads `path`; a missing file yields defaults.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let prefs = match fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text)
                .with_context(|| format!("parse preferences {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no preferences at {}, using defaults", path.display());
                DisplayPreferences::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("read preferences {}", path.display()));
            }
        };
        Ok(Self { path, prefs })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn preferences(&self) -> &DisplayPreferences {
        &self.prefs
    }
}

impl PreferenceStore for FilePreferences {
    fn resolution_index(&self) -> i32 {
        self.prefs.resolution
    }

    fn set_resolution_index(&mut self, index: i32) {
        self.prefs.resolution = index;
    }

    fn fullscreen(&self) -> bool {
        self.prefs.fullscreen
    }

    fn set_fullscreen(&mut self, fullscreen: bool) {
        self.prefs.fullscreen = fullscreen;
    }

    fn frame_rate_cap(&self) -> i32 {
        self.prefs.target_fps
    }

    fn set_frame_rate_cap(&mut self, level: i32) {
        self.prefs.target_fps = level;
    }

    fn save(&mut self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        let text = toml::to_string_pretty(&self.prefs).context("serialize preferences")?;
        fs::write(&self.path, text).with_context(|| format!("write {}", self.path.display()))?;
        log::debug!("saved preferences to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_clones_share_state() {
        let prefs = MemoryPreferences::default();
        let mut handle = prefs.clone();
        handle.set_fullscreen(true);
        handle.save().unwrap();

        assert!(prefs.fullscreen());
        assert_eq!(prefs.save_count(), 1);
        assert_eq!(prefs.saved().map(|p| p.fullscreen), Some(true));
    }

    #[test]
    fn file_missing_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = FilePreferences::load(dir.path().join("display.toml")).unwrap();
        assert_eq!(prefs.preferences(), &DisplayPreferences::default());
    }

    #[test]
    fn file_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("display.toml");

        let mut prefs = FilePreferences::load(&path).unwrap();
        prefs.set_resolution_index(4);
        prefs.set_fullscreen(true);
        prefs.set_frame_rate_cap(2);
        prefs.save().unwrap();

        let reloaded = FilePreferences::load(&path).unwrap();
        assert_eq!(reloaded.resolution_index(), 4);
        assert!(reloaded.fullscreen());
        assert_eq!(reloaded.frame_rate_cap(), 2);
    }

    #[test]
    fn file_partial_record_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("display.toml");
        fs::write(&path, "fullscreen = true\n").unwrap();

        let prefs = FilePreferences::load(&path).unwrap();
        assert!(prefs.fullscreen());
        assert_eq!(prefs.resolution_index(), 0);
    }

    #[test]
    fn file_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("display.toml");
        fs::write(&path, "resolution = \"high\"\n").unwrap();
        assert!(FilePreferences::load(&path).is_err());
    }
}
