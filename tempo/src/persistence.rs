//! Preference persistence.
//!
//! [`PreferenceStore`] owns the live [`Preferences`] and mirrors them into a
//! [`KeyValue`] backend. Loading never fails and saving never reports an
//! error: a lost preference is not worth stopping the timer for.

use crate::preferences::{self, Preferences};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempo_ipc::PreferenceField;
use tracing::{debug, warn};

/// Key of the preferences record.
pub const PREFERENCES_KEY: &str = "preferences";

/// Minimal string key-value storage.
pub trait KeyValue {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// One JSON file per key inside a directory.
pub struct FileKeyValue {
    dir: PathBuf,
}

impl FileKeyValue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted in the platform data directory.
    pub fn in_data_dir() -> Result<Self> {
        Ok(Self::new(data_dir()?))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValue for FileKeyValue {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(contents))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.path_for(key);
        fs::write(&path, value).with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// In-process storage, used when no data directory is available.
#[derive(Default)]
pub struct MemoryKeyValue {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValue for MemoryKeyValue {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Platform directories for tempo; config and data live under the same name.
pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "tempo", "tempo")
}

pub fn data_dir() -> Result<PathBuf> {
    let proj_dirs =
        project_dirs().ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

/// The configuration store: live preferences plus their backing record.
pub struct PreferenceStore {
    backend: Box<dyn KeyValue>,
    prefs: Preferences,
}

impl PreferenceStore {
    /// Open the store and load whatever the backend holds.
    pub fn open(backend: Box<dyn KeyValue>) -> Self {
        let prefs = load(&*backend);
        Self { backend, prefs }
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    /// Replace the live preferences and persist them.
    pub fn update(&mut self, prefs: Preferences) {
        self.prefs = prefs.clamped();
        save(&*self.backend, &self.prefs);
    }
}

/// Read the preferences record, falling back field by field.
pub fn load(backend: &dyn KeyValue) -> Preferences {
    let raw = match backend.get(PREFERENCES_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("No stored preferences, using defaults");
            return Preferences::default();
        }
        Err(e) => {
            warn!("Failed to read preferences, using defaults: {:#}", e);
            return Preferences::default();
        }
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(record)) => from_record(&record),
        Ok(other) => {
            warn!("Stored preferences are not an object ({}), using defaults", kind(&other));
            Preferences::default()
        }
        Err(e) => {
            warn!("Stored preferences are malformed, using defaults: {}", e);
            Preferences::default()
        }
    }
}

/// Write the preferences record, keeping keys owned by other layers.
pub fn save(backend: &dyn KeyValue, prefs: &Preferences) {
    let mut record = match backend.get(PREFERENCES_KEY) {
        Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(record)) => record,
            _ => Map::new(),
        },
        _ => Map::new(),
    };

    let result = serde_json::to_value(prefs.clamped())
        .context("Failed to serialize preferences")
        .and_then(|fields| {
            if let Value::Object(fields) = fields {
                record.extend(fields);
            }
            let json = serde_json::to_string_pretty(&Value::Object(record))?;
            backend.set(PREFERENCES_KEY, &json)
        });
    if let Err(e) = result {
        warn!("Failed to save preferences: {:#}", e);
    }
}

fn from_record(record: &Map<String, Value>) -> Preferences {
    let defaults = Preferences::default();
    let number = |field: PreferenceField, default: u32| {
        let Some(bounds) = preferences::bounds(field) else {
            return default;
        };
        match record.get(field.key()) {
            Some(Value::Number(n)) => match n.as_i64() {
                Some(value) => bounds.clamp(value),
                None => n
                    .as_f64()
                    .map(|value| bounds.clamp_input(&value.to_string()))
                    .unwrap_or(default),
            },
            Some(Value::String(s)) if s.trim().parse::<f64>().is_ok() => bounds.clamp_input(s),
            Some(_) => {
                debug!("Ignoring stored {} of the wrong type", field);
                default
            }
            None => default,
        }
    };
    let flag = |field: PreferenceField, default: bool| match record.get(field.key()) {
        Some(Value::Bool(b)) => *b,
        _ => default,
    };

    Preferences {
        work_minutes: number(PreferenceField::WorkMinutes, defaults.work_minutes),
        break_minutes: number(PreferenceField::BreakMinutes, defaults.break_minutes),
        long_break_minutes: number(PreferenceField::LongBreakMinutes, defaults.long_break_minutes),
        long_break_every: number(PreferenceField::LongBreakEvery, defaults.long_break_every),
        auto_start_next: flag(PreferenceField::AutoStartNext, defaults.auto_start_next),
        notifications_enabled: flag(
            PreferenceField::NotificationsEnabled,
            defaults.notifications_enabled,
        ),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
