//! Viewer preferences.
//!
//! The host owns the preference storage; the viewer only reads it through
//! `PreferencesStore`. Keys and defaults match the host's preference page,
//! including its spelling of the light intensity keys.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::locomotion::MovementMode;

pub const KEY_LINEAR_SPEED: &str = "LinearSpeed";
pub const KEY_ROTATIONAL_SPEED: &str = "RotationalSpeed";
pub const KEY_AMBIENT_LIGHT: &str = "AmbientLightIntesity";
pub const KEY_DIRECTIONAL_LIGHT: &str = "DirectionalLightIntesity";
pub const KEY_MSAA: &str = "MSAA";
pub const KEY_MOVEMENT: &str = "Movement";
pub const KEY_MIRROR: &str = "MirrorEnable";
pub const KEY_DEBUG: &str = "DebugEnable";

/// Sample counts offered by the preference page.
pub const MSAA_CHOICES: [u32; 4] = [0, 2, 4, 8];
const DEFAULT_MSAA: u32 = 4;

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Read-only key/value source.
pub trait PreferencesStore {
    fn get_int(&self, key: &str, default: i64) -> i64;
    fn get_bool(&self, key: &str, default: bool) -> bool;
    fn get_string(&self, key: &str, default: &str) -> String;
}

/// A single stored preference value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// In-memory store; what a host hands over after reading its own storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: BTreeMap<String, PrefValue>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: PrefValue) -> &mut Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn set_int(&mut self, key: impl Into<String>, value: i64) -> &mut Self {
        self.set(key, PrefValue::Int(value))
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) -> &mut Self {
        self.set(key, PrefValue::Bool(value))
    }

    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.set(key, PrefValue::Str(value.into()))
    }
}

fn lookup_int(values: &BTreeMap<String, PrefValue>, key: &str, default: i64) -> i64 {
    match values.get(key) {
        Some(PrefValue::Int(v)) => *v,
        Some(other) => {
            warn!("XR prefs: {} has non-integer value {:?}", key, other);
            default
        }
        None => default,
    }
}

fn lookup_bool(values: &BTreeMap<String, PrefValue>, key: &str, default: bool) -> bool {
    match values.get(key) {
        Some(PrefValue::Bool(v)) => *v,
        Some(other) => {
            warn!("XR prefs: {} has non-boolean value {:?}", key, other);
            default
        }
        None => default,
    }
}

fn lookup_string(values: &BTreeMap<String, PrefValue>, key: &str, default: &str) -> String {
    match values.get(key) {
        Some(PrefValue::Str(v)) => v.clone(),
        Some(other) => {
            warn!("XR prefs: {} has non-string value {:?}", key, other);
            default.to_string()
        }
        None => default.to_string(),
    }
}

impl PreferencesStore for MemoryPreferences {
    fn get_int(&self, key: &str, default: i64) -> i64 {
        lookup_int(&self.values, key, default)
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        lookup_bool(&self.values, key, default)
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        lookup_string(&self.values, key, default)
    }
}

/// Preferences read from a flat TOML table on disk.
#[derive(Debug, Clone)]
pub struct TomlPreferences {
    path: PathBuf,
    values: BTreeMap<String, PrefValue>,
}

impl TomlPreferences {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            return Err(ConfigError::UnsupportedFormat(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut prefs = Self::parse(&contents)?;
        prefs.path = path.to_path_buf();
        Ok(prefs)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let values: BTreeMap<String, PrefValue> =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(Self {
            path: PathBuf::new(),
            values,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferencesStore for TomlPreferences {
    fn get_int(&self, key: &str, default: i64) -> i64 {
        lookup_int(&self.values, key, default)
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        lookup_bool(&self.values, key, default)
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        lookup_string(&self.values, key, default)
    }
}

/// Typed view over the preference keys the viewer consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerPreferences {
    /// 0..=1
    pub linear_speed: f32,
    /// 0..=1
    pub rotational_speed: f32,
    pub ambient_light: f32,
    pub directional_light: f32,
    /// Offscreen sample count; 0 means single-sample.
    pub msaa_samples: u32,
    pub movement: MovementMode,
    pub mirror_enabled: bool,
    pub debug_enabled: bool,
}

impl Default for ViewerPreferences {
    fn default() -> Self {
        Self {
            linear_speed: 0.5,
            rotational_speed: 0.5,
            ambient_light: 0.4,
            directional_light: 0.8,
            msaa_samples: DEFAULT_MSAA,
            movement: MovementMode::Arch,
            mirror_enabled: false,
            debug_enabled: false,
        }
    }
}

fn percent(store: &dyn PreferencesStore, key: &str, default: i64) -> f32 {
    (store.get_int(key, default).clamp(0, 100) as f32) / 100.0
}

impl ViewerPreferences {
    pub fn load(store: &dyn PreferencesStore) -> Self {
        let msaa = store.get_int(KEY_MSAA, DEFAULT_MSAA as i64);
        let msaa_samples = match u32::try_from(msaa) {
            Ok(v) if MSAA_CHOICES.contains(&v) => v,
            _ => {
                warn!("XR prefs: unsupported MSAA value {}, using {}", msaa, DEFAULT_MSAA);
                DEFAULT_MSAA
            }
        };

        let movement_str = store.get_string(KEY_MOVEMENT, "ARCH");
        let movement = MovementMode::from_pref(&movement_str).unwrap_or_else(|| {
            warn!("XR prefs: unknown movement mode {:?}, using ARCH", movement_str);
            MovementMode::Arch
        });

        Self {
            linear_speed: percent(store, KEY_LINEAR_SPEED, 50),
            rotational_speed: percent(store, KEY_ROTATIONAL_SPEED, 50),
            ambient_light: percent(store, KEY_AMBIENT_LIGHT, 40),
            directional_light: percent(store, KEY_DIRECTIONAL_LIGHT, 80),
            msaa_samples,
            movement,
            mirror_enabled: store.get_bool(KEY_MIRROR, false),
            debug_enabled: store.get_bool(KEY_DEBUG, false),
        }
    }

    /// Samples to request for renderbuffer storage; below 2 means no MSAA.
    pub fn effective_samples(&self) -> u32 {
        if self.msaa_samples < 2 {
            0
        } else {
            self.msaa_samples
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_from_empty_store() {
        let prefs = ViewerPreferences::load(&MemoryPreferences::new());
        assert_eq!(prefs, ViewerPreferences::default());
    }

    #[test]
    fn test_percent_values_scale_and_clamp() {
        let mut store = MemoryPreferences::new();
        store
            .set_int(KEY_LINEAR_SPEED, 100)
            .set_int(KEY_ROTATIONAL_SPEED, 250)
            .set_int(KEY_AMBIENT_LIGHT, -4)
            .set_int(KEY_DIRECTIONAL_LIGHT, 25);
        let prefs = ViewerPreferences::load(&store);
        assert_relative_eq!(prefs.linear_speed, 1.0);
        assert_relative_eq!(prefs.rotational_speed, 1.0);
        assert_relative_eq!(prefs.ambient_light, 0.0);
        assert_relative_eq!(prefs.directional_light, 0.25);
    }

    #[test]
    fn test_msaa_falls_back_on_unsupported_value() {
        let mut store = MemoryPreferences::new();
        store.set_int(KEY_MSAA, 3);
        assert_eq!(ViewerPreferences::load(&store).msaa_samples, 4);

        store.set_int(KEY_MSAA, 8);
        assert_eq!(ViewerPreferences::load(&store).msaa_samples, 8);

        store.set_int(KEY_MSAA, 0);
        let prefs = ViewerPreferences::load(&store);
        assert_eq!(prefs.msaa_samples, 0);
        assert_eq!(prefs.effective_samples(), 0);
    }

    #[test]
    fn test_movement_mode_parsing() {
        let mut store = MemoryPreferences::new();
        store.set_string(KEY_MOVEMENT, "FREE");
        assert_eq!(ViewerPreferences::load(&store).movement, MovementMode::Free);

        store.set_string(KEY_MOVEMENT, "TELEPORT");
        assert_eq!(ViewerPreferences::load(&store).movement, MovementMode::Arch);
    }

    #[test]
    fn test_wrong_type_uses_default() {
        let mut store = MemoryPreferences::new();
        store.set_string(KEY_MIRROR, "yes");
        assert!(!ViewerPreferences::load(&store).mirror_enabled);
    }

    #[test]
    fn test_toml_preferences_parse() {
        let prefs = TomlPreferences::parse(
            r#"
            LinearSpeed = 20
            MSAA = 2
            Movement = "FREE"
            MirrorEnable = true
            "#,
        )
        .unwrap();
        let viewer = ViewerPreferences::load(&prefs);
        assert_relative_eq!(viewer.linear_speed, 0.2);
        assert_eq!(viewer.msaa_samples, 2);
        assert_eq!(viewer.movement, MovementMode::Free);
        assert!(viewer.mirror_enabled);
        assert!(!viewer.debug_enabled);
    }

    #[test]
    fn test_toml_preferences_rejects_garbage() {
        assert!(matches!(
            TomlPreferences::parse("LinearSpeed = ["),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_toml_preferences_rejects_other_formats() {
        assert!(matches!(
            TomlPreferences::load("prefs.json"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
