use crate::error::PlayerError;
use crate::model::DEFAULT_VOLUME;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const APP_DIR: &str = "playdeck";
const CONFIG_FILE: &str = "config.json";

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("PLAYDECK_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn ensure_config_dir(root: &Path) -> Result<()> {
    fs::create_dir_all(root).with_context(|| format!("failed to create {}", root.display()))
}

pub fn default_config() -> Value {
    json!({
        "window_size": "800x600",
        "default_volume": 0.7,
        "supported_formats": {
            "audio": [".mp3", ".wav", ".flac", ".ogg", ".m4a"],
            "video": [".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv"]
        },
        "theme": ThemeColors::default(),
        "shortcuts": Shortcuts::default()
    })
}

/// Overlays `user` on `default` key by key. Nested objects merge
/// recursively; any other user value replaces the default outright.
pub fn merge(default: &Value, user: &Value) -> Value {
    match (default, user) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                let next = match merged.get(key) {
                    Some(existing @ Value::Object(_)) if value.is_object() => {
                        merge(existing, value)
                    }
                    _ => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        _ => user.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeColors {
    pub background: String,
    pub foreground: String,
    pub button_bg: String,
    pub button_fg: String,
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self {
            background: String::from("#2b2b2b"),
            foreground: String::from("#ffffff"),
            button_bg: String::from("#404040"),
            button_fg: String::from("#ffffff"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortcuts {
    pub play_pause: String,
    pub stop: String,
    pub next: String,
    pub previous: String,
    pub volume_up: String,
    pub volume_down: String,
    pub fullscreen: String,
}

impl Default for Shortcuts {
    fn default() -> Self {
        Self {
            play_pause: String::from("space"),
            stop: String::from("s"),
            next: String::from("right"),
            previous: String::from("left"),
            volume_up: String::from("up"),
            volume_down: String::from("down"),
            fullscreen: String::from("f11"),
        }
    }
}

/// Settings document backed by a JSON file.
#[derive(Debug, Clone)]
pub struct Config {
    path: PathBuf,
    values: Value,
}

impl Config {
    /// Loads from the default location. Never fails on a bad file; only an
    /// unresolvable home directory is an error.
    pub fn load() -> Result<Self> {
        let root = config_root()?;
        Ok(Self::load_from(&config_path(&root)))
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            let config = Self {
                path: path.to_path_buf(),
                values: default_config(),
            };
            match config.save() {
                Ok(()) => info!(path = %path.display(), "wrote default settings"),
                Err(err) => warn!("could not write default settings: {err:#}"),
            }
            return config;
        }

        let values = match read_user_config(path) {
            Ok(user) => merge(&default_config(), &user),
            Err(err) => {
                warn!("{err}; using defaults");
                default_config()
            }
        };

        Self {
            path: path.to_path_buf(),
            values,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            values: default_config(),
        }
    }

    pub fn values(&self) -> &Value {
        &self.values
    }

    pub fn save(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_config_dir(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }

    /// Looks up a dotted path such as `"theme.background"`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .try_fold(&self.values, |value, part| value.as_object()?.get(part))
    }

    /// Sets a dotted path, creating intermediate objects, then persists.
    /// A non-object value found on the way is replaced by an object.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let mut parts: Vec<&str> = key.split('.').collect();
        let Some(last) = parts.pop() else {
            anyhow::bail!("empty settings key");
        };

        let mut node = &mut self.values;
        for part in parts {
            node = object_mut(node)
                .with_context(|| format!("cannot descend into {part}"))?
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        object_mut(node)
            .with_context(|| format!("cannot assign {key}"))?
            .insert(last.to_string(), value);
        debug!(key, "settings value changed");
        self.save()
    }

    pub fn default_volume(&self) -> f32 {
        self.get("default_volume")
            .and_then(Value::as_f64)
            .map(|volume| (volume as f32).clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_VOLUME)
    }

    pub fn audio_formats(&self) -> Vec<String> {
        self.string_list("supported_formats.audio")
    }

    pub fn video_formats(&self) -> Vec<String> {
        self.string_list("supported_formats.video")
    }

    pub fn supported_formats(&self) -> Vec<String> {
        let mut formats = self.audio_formats();
        formats.extend(self.video_formats());
        formats
    }

    pub fn theme(&self) -> ThemeColors {
        self.section("theme").unwrap_or_default()
    }

    pub fn shortcuts(&self) -> Shortcuts {
        self.section("shortcuts").unwrap_or_default()
    }

    fn string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_ascii_lowercase)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Typed view of a section; `None` when the user value has the wrong shape.
    fn section<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?.clone();
        serde_json::from_value(value).ok()
    }
}

fn read_user_config(path: &Path) -> std::result::Result<Value, PlayerError> {
    let corrupt = |reason: String| PlayerError::ConfigCorruption {
        path: path.to_path_buf(),
        reason,
    };
    let raw = fs::read_to_string(path).map_err(|err| corrupt(err.to_string()))?;
    let user: Value = serde_json::from_str(&raw).map_err(|err| corrupt(err.to_string()))?;
    if !user.is_object() {
        return Err(corrupt(String::from("top level is not an object")));
    }
    Ok(user)
}

fn object_mut(value: &mut Value) -> Option<&mut Map<String, Value>> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    value.as_object_mut()
}

pub fn normalize_path(path: &Path) -> PathBuf {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    strip_windows_verbatim_prefix(&canonical)
}

pub fn strip_windows_verbatim_prefix(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();

    if let Some(trimmed) = raw.strip_prefix(r"\\?\UNC\") {
        return PathBuf::from(format!(r"\\{trimmed}"));
    }

    if let Some(trimmed) = raw.strip_prefix(r"\\?\") {
        return PathBuf::from(trimmed);
    }

    path.to_path_buf()
}
