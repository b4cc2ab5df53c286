use crate::core::feed::{GameRecord, InstalledApp};
use crate::core::input::InputConfig;
use crate::core::profile::{default_profiles, Profile};
use crate::core::shell::ShellConfig;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

// ── Paths ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    root: PathBuf,
}

impl ConfigPaths {
    /// `<config dir>/aether`, or `./aether` when the platform has none.
    pub fn default_root() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aether")
    }

    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root: root.unwrap_or_else(Self::default_root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("creating {}", self.root.display()))
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    pub fn profiles_file(&self) -> PathBuf {
        self.root.join("profiles.json")
    }

    pub fn library_file(&self) -> PathBuf {
        self.root.join("library.json")
    }

    pub fn editor_file(&self) -> PathBuf {
        self.root.join("editor.json")
    }

    /// Where the text editor saves.
    pub fn documents_dir(&self) -> PathBuf {
        self.root.join("documents")
    }
}

// ── JSON helpers ──────────────────────────────────────────────────────────────

pub fn load_json<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> T {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

// ── Settings ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_dead_zone")]
    pub dead_zone: f32,
    #[serde(default = "default_wheel_threshold")]
    pub wheel_threshold: f32,
    #[serde(default = "default_tap_slop")]
    pub tap_slop_px: f32,
    #[serde(default = "default_swipe_min")]
    pub swipe_min_px: f32,
    #[serde(default = "default_true")]
    pub haptics: bool,
}

const fn default_debounce_ms() -> u64 {
    150
}

const fn default_dead_zone() -> f32 {
    0.5
}

const fn default_wheel_threshold() -> f32 {
    5.0
}

const fn default_tap_slop() -> f32 {
    10.0
}

const fn default_swipe_min() -> f32 {
    50.0
}

const fn default_true() -> bool {
    true
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            dead_zone: default_dead_zone(),
            wheel_threshold: default_wheel_threshold(),
            tap_slop_px: default_tap_slop(),
            swipe_min_px: default_swipe_min(),
            haptics: true,
        }
    }
}

impl InputSettings {
    pub fn to_input_config(&self) -> InputConfig {
        InputConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            dead_zone: self.dead_zone,
            wheel_threshold: self.wheel_threshold,
            tap_slop: self.tap_slop_px,
            swipe_min: self.swipe_min_px,
            haptics: self.haptics,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_boot_ms")]
    pub boot_ms: u64,
    #[serde(default = "default_idle_lock_secs")]
    pub idle_lock_secs: Option<u64>,
    #[serde(default = "default_column")]
    pub default_column: usize,
    #[serde(default)]
    pub show_taskbar: bool,
    #[serde(default = "default_theme_hue")]
    pub theme_hue: u16,
    #[serde(default)]
    pub input: InputSettings,
}

const fn default_boot_ms() -> u64 {
    1500
}

fn default_idle_lock_secs() -> Option<u64> {
    Some(300)
}

const fn default_column() -> usize {
    2
}

const fn default_theme_hue() -> u16 {
    210
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            boot_ms: default_boot_ms(),
            idle_lock_secs: default_idle_lock_secs(),
            default_column: default_column(),
            show_taskbar: false,
            theme_hue: default_theme_hue(),
            input: InputSettings::default(),
        }
    }
}

impl Settings {
    /// Desk bounds and window metrics stay at their defaults; the front-end
    /// sizes them to the screen.
    pub fn shell_config(&self) -> ShellConfig {
        ShellConfig {
            input: self.input.to_input_config(),
            boot: Duration::from_millis(self.boot_ms),
            idle_lock: self.idle_lock_secs.map(Duration::from_secs),
            default_column: self.default_column,
            show_taskbar: self.show_taskbar,
            ..ShellConfig::default()
        }
    }
}

pub fn load_settings(paths: &ConfigPaths) -> Settings {
    load_json(&paths.settings_file())
}

pub fn save_settings(paths: &ConfigPaths, settings: &Settings) -> Result<()> {
    paths.ensure()?;
    save_json(&paths.settings_file(), settings)
}

// ── Profiles ──────────────────────────────────────────────────────────────────

/// Stored profiles, or the built-in pair when the file is missing, empty or
/// holds a pattern that does not parse.
pub fn load_profiles(paths: &ConfigPaths) -> Vec<Profile> {
    let path = paths.profiles_file();
    let Ok(raw) = std::fs::read_to_string(&path) else {
        return default_profiles();
    };
    match serde_json::from_str::<Vec<Profile>>(&raw) {
        Ok(profiles) if !profiles.is_empty() => profiles,
        Ok(_) => default_profiles(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable profiles; using defaults");
            default_profiles()
        }
    }
}

pub fn save_profiles(paths: &ConfigPaths, profiles: &[Profile]) -> Result<()> {
    paths.ensure()?;
    save_json(&paths.profiles_file(), &profiles)
}

/// Replaces the stored record with the same id, or appends it.
pub fn upsert_profile(paths: &ConfigPaths, profile: &Profile) -> Result<()> {
    let mut profiles = load_profiles(paths);
    match profiles.iter_mut().find(|p| p.id == profile.id) {
        Some(existing) => *existing = profile.clone(),
        None => profiles.push(profile.clone()),
    }
    save_profiles(paths, &profiles).context("persisting profile")?;
    info!(profile = %profile.id, "profile saved");
    Ok(())
}

/// Drops the stored record with this id. Removing the last record is
/// refused, since an empty file would bring the built-in pair back.
pub fn remove_profile(paths: &ConfigPaths, profile_id: &str) -> Result<()> {
    let mut profiles = load_profiles(paths);
    let before = profiles.len();
    profiles.retain(|p| p.id != profile_id);
    if profiles.len() == before {
        return Ok(());
    }
    if profiles.is_empty() {
        bail!("refusing to remove the last profile");
    }
    save_profiles(paths, &profiles).context("removing profile")?;
    info!(profile = profile_id, "profile removed");
    Ok(())
}

// ── Documents ─────────────────────────────────────────────────────────────────

pub const DEFAULT_DOCUMENT: &str = "NewDocument.txt";

/// Remembers the editor's last saved file between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorState {
    #[serde(default)]
    pub last_document: Option<String>,
}

/// A plain file name inside the documents directory. Paths are rejected.
pub fn document_path(paths: &ConfigPaths, name: &str) -> Result<PathBuf> {
    let name = name.trim();
    let plain = Path::new(name)
        .file_name()
        .is_some_and(|f| f == std::ffi::OsStr::new(name));
    if name.is_empty() || !plain {
        bail!("invalid document name `{name}`");
    }
    Ok(paths.documents_dir().join(name))
}

pub fn save_document(paths: &ConfigPaths, name: &str, text: &str) -> Result<PathBuf> {
    let path = document_path(paths, name)?;
    let dir = paths.documents_dir();
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    let state = EditorState {
        last_document: Some(name.trim().to_string()),
    };
    save_json(&paths.editor_file(), &state)?;
    info!(path = %path.display(), bytes = text.len(), "document saved");
    Ok(path)
}

/// The last saved document as `(name, text)`, if it is still on disk.
pub fn load_last_document(paths: &ConfigPaths) -> Option<(String, String)> {
    let state: EditorState = load_json(&paths.editor_file());
    let name = state.last_document?;
    let path = document_path(paths, &name).ok()?;
    match std::fs::read_to_string(&path) {
        Ok(text) => Some((name, text)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "last document unreadable");
            None
        }
    }
}

// ── Library catalog ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryCatalog {
    #[serde(default)]
    pub apps: Vec<InstalledApp>,
    #[serde(default)]
    pub games: Vec<GameRecord>,
}

pub fn load_library(paths: &ConfigPaths) -> LibraryCatalog {
    load_json(&paths.library_file())
}
