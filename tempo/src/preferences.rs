//! User preferences, their valid ranges, and the preset catalog.
//!
//! Everything in here is pure: raw input goes in, a value that is always
//! within range comes out. Persisting the result is the store's job.

use serde::{Deserialize, Serialize};
use tempo_ipc::{Phase, PreferenceField, PreferencesInfo, PresetInfo};

/// Inclusive range a numeric preference must stay within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: u32,
    pub max: u32,
}

impl Bounds {
    const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn clamp(self, value: i64) -> u32 {
        value.clamp(self.min as i64, self.max as i64) as u32
    }

    /// Clamp free-form text. Decimals are truncated toward zero and
    /// anything that is not a number becomes the minimum.
    pub fn clamp_input(self, raw: &str) -> u32 {
        let raw = raw.trim();
        if let Ok(value) = raw.parse::<i64>() {
            return self.clamp(value);
        }
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => self.clamp(value.trunc() as i64),
            Ok(value) if value == f64::INFINITY => self.max,
            _ => self.min,
        }
    }
}

pub const WORK_MINUTES: Bounds = Bounds::new(1, 180);
pub const BREAK_MINUTES: Bounds = Bounds::new(1, 120);
pub const LONG_BREAK_MINUTES: Bounds = Bounds::new(1, 180);
pub const LONG_BREAK_EVERY: Bounds = Bounds::new(0, 20);

/// Bounds of a numeric field, `None` for flags.
pub fn bounds(field: PreferenceField) -> Option<Bounds> {
    match field {
        PreferenceField::WorkMinutes => Some(WORK_MINUTES),
        PreferenceField::BreakMinutes => Some(BREAK_MINUTES),
        PreferenceField::LongBreakMinutes => Some(LONG_BREAK_MINUTES),
        PreferenceField::LongBreakEvery => Some(LONG_BREAK_EVERY),
        PreferenceField::AutoStartNext | PreferenceField::NotificationsEnabled => None,
    }
}

/// `true`, `1`, `on` and `yes` switch a flag on; everything else is off.
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Preferences {
    pub work_minutes: u32,
    pub break_minutes: u32,
    pub long_break_minutes: u32,
    pub long_break_every: u32,
    pub auto_start_next: bool,
    pub notifications_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            break_minutes: 5,
            long_break_minutes: 15,
            long_break_every: 4,
            auto_start_next: false,
            notifications_enabled: true,
        }
    }
}

impl Preferences {
    /// Full length of `phase` in seconds.
    pub fn duration_secs(&self, phase: Phase) -> u32 {
        let minutes = match phase {
            Phase::Work => self.work_minutes,
            Phase::Break => self.break_minutes,
            Phase::LongBreak => self.long_break_minutes,
        };
        minutes * 60
    }

    /// Phase whose duration `field` controls.
    pub fn phase_of(field: PreferenceField) -> Option<Phase> {
        match field {
            PreferenceField::WorkMinutes => Some(Phase::Work),
            PreferenceField::BreakMinutes => Some(Phase::Break),
            PreferenceField::LongBreakMinutes => Some(Phase::LongBreak),
            _ => None,
        }
    }

    /// Assign raw input to `field`, clamping on the way in.
    pub fn set(&mut self, field: PreferenceField, raw: &str) {
        match field {
            PreferenceField::WorkMinutes => self.work_minutes = WORK_MINUTES.clamp_input(raw),
            PreferenceField::BreakMinutes => self.break_minutes = BREAK_MINUTES.clamp_input(raw),
            PreferenceField::LongBreakMinutes => {
                self.long_break_minutes = LONG_BREAK_MINUTES.clamp_input(raw)
            }
            PreferenceField::LongBreakEvery => {
                self.long_break_every = LONG_BREAK_EVERY.clamp_input(raw)
            }
            PreferenceField::AutoStartNext => self.auto_start_next = parse_flag(raw),
            PreferenceField::NotificationsEnabled => self.notifications_enabled = parse_flag(raw),
        }
    }

    /// Current value of `field` rendered as text.
    pub fn get(&self, field: PreferenceField) -> String {
        match field {
            PreferenceField::WorkMinutes => self.work_minutes.to_string(),
            PreferenceField::BreakMinutes => self.break_minutes.to_string(),
            PreferenceField::LongBreakMinutes => self.long_break_minutes.to_string(),
            PreferenceField::LongBreakEvery => self.long_break_every.to_string(),
            PreferenceField::AutoStartNext => self.auto_start_next.to_string(),
            PreferenceField::NotificationsEnabled => self.notifications_enabled.to_string(),
        }
    }

    /// Pull every numeric field back into range.
    pub fn clamped(self) -> Self {
        Self {
            work_minutes: WORK_MINUTES.clamp(self.work_minutes as i64),
            break_minutes: BREAK_MINUTES.clamp(self.break_minutes as i64),
            long_break_minutes: LONG_BREAK_MINUTES.clamp(self.long_break_minutes as i64),
            long_break_every: LONG_BREAK_EVERY.clamp(self.long_break_every as i64),
            ..self
        }
    }

    /// Overwrite the durations and cadence with a preset's.
    pub fn apply(&mut self, preset: &Preset) {
        self.work_minutes = WORK_MINUTES.clamp(preset.work_minutes as i64);
        self.break_minutes = BREAK_MINUTES.clamp(preset.break_minutes as i64);
        self.long_break_minutes = LONG_BREAK_MINUTES.clamp(preset.long_break_minutes as i64);
        self.long_break_every = LONG_BREAK_EVERY.clamp(preset.long_break_every as i64);
    }
}

impl From<&Preferences> for PreferencesInfo {
    fn from(prefs: &Preferences) -> Self {
        Self {
            work_minutes: prefs.work_minutes,
            break_minutes: prefs.break_minutes,
            long_break_minutes: prefs.long_break_minutes,
            long_break_every: prefs.long_break_every,
            auto_start_next: prefs.auto_start_next,
            notifications_enabled: prefs.notifications_enabled,
        }
    }
}

/// A named bundle of durations and cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub label: String,
    pub work_minutes: u32,
    pub break_minutes: u32,
    pub long_break_minutes: u32,
    pub long_break_every: u32,
}

impl Preset {
    fn new(label: &str, work: u32, short: u32, long: u32, every: u32) -> Self {
        Self {
            label: label.to_string(),
            work_minutes: work,
            break_minutes: short,
            long_break_minutes: long,
            long_break_every: every,
        }
    }

    pub fn builtin() -> Vec<Preset> {
        vec![
            Preset::new("Classic", 25, 5, 15, 4),
            Preset::new("Short Focus", 15, 3, 10, 4),
            Preset::new("Deep Work", 50, 10, 30, 3),
            Preset::new("Ultradian", 90, 20, 30, 0),
        ]
    }
}

impl From<&Preset> for PresetInfo {
    fn from(preset: &Preset) -> Self {
        Self {
            label: preset.label.clone(),
            work_minutes: preset.work_minutes,
            break_minutes: preset.break_minutes,
            long_break_minutes: preset.long_break_minutes,
            long_break_every: preset.long_break_every,
        }
    }
}

/// Built-in presets followed by the user's own.
pub fn catalog(extra: &[Preset]) -> Vec<Preset> {
    let mut presets = Preset::builtin();
    presets.extend(extra.iter().cloned());
    presets
}

/// Case-insensitive lookup; the first match wins.
pub fn find_preset<'a>(presets: &'a [Preset], label: &str) -> Option<&'a Preset> {
    let label = label.trim();
    presets
        .iter()
        .find(|preset| preset.label.eq_ignore_ascii_case(label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_minutes_input_is_clamped() {
        let mut prefs = Preferences::default();
        for (raw, expected) in [("0", 1), ("-5", 1), ("9999", 180), ("abc", 1)] {
            prefs.set(PreferenceField::WorkMinutes, raw);
            assert_eq!(prefs.work_minutes, expected, "input {raw:?}");
        }
    }

    #[test]
    fn decimals_truncate_before_clamping() {
        assert_eq!(BREAK_MINUTES.clamp_input("12.7"), 12);
        assert_eq!(BREAK_MINUTES.clamp_input(" 0.9 "), 1);
        assert_eq!(BREAK_MINUTES.clamp_input("1e9"), 120);
        assert_eq!(BREAK_MINUTES.clamp_input(""), 1);
    }

    #[test]
    fn cadence_accepts_zero() {
        let mut prefs = Preferences::default();
        prefs.set(PreferenceField::LongBreakEvery, "0");
        assert_eq!(prefs.long_break_every, 0);
        prefs.set(PreferenceField::LongBreakEvery, "21");
        assert_eq!(prefs.long_break_every, 20);
    }

    #[test]
    fn flags_parse_loosely() {
        let mut prefs = Preferences::default();
        prefs.set(PreferenceField::AutoStartNext, " ON ");
        assert!(prefs.auto_start_next);
        prefs.set(PreferenceField::AutoStartNext, "maybe");
        assert!(!prefs.auto_start_next);
        prefs.set(PreferenceField::NotificationsEnabled, "no");
        assert!(!prefs.notifications_enabled);
    }

    #[test]
    fn presets_are_clamped_when_applied() {
        let mut prefs = Preferences::default();
        prefs.apply(&Preset::new("Silly", 500, 0, 15, 99));
        assert_eq!(prefs.work_minutes, 180);
        assert_eq!(prefs.break_minutes, 1);
        assert_eq!(prefs.long_break_minutes, 15);
        assert_eq!(prefs.long_break_every, 20);
        assert!(!prefs.auto_start_next);
    }

    #[test]
    fn preset_lookup_ignores_case() {
        let extra = vec![Preset::new("classic", 30, 5, 15, 4)];
        let presets = catalog(&extra);
        assert_eq!(presets.len(), 5);
        let found = find_preset(&presets, "CLASSIC").unwrap();
        assert_eq!(found.work_minutes, 25);
        assert!(find_preset(&presets, "nope").is_none());
    }
}
