use crate::persistence;
use crate::preferences::Preset;
use anyhow::{Context, Result};
use ratatui::style::Color;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tempo_ipc::Phase;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub theme: Theme,
    pub icons: Icons,
    /// Appended to the built-in preset catalog.
    pub presets: Vec<Preset>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Theme {
    #[serde(deserialize_with = "hex_to_color")]
    pub background: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub foreground: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub selection: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub black: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub gray: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub work: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub short_break: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub long_break: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub accent: Color,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Icons {
    pub timer: String,
    pub settings: String,
    pub play: String,
    pub pause: String,
    pub session: String,
    pub select: String,
    pub input_cursor: String,
    pub header_left: String,
    pub header_right: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::Rgb(9, 14, 19),
            foreground: Color::Rgb(197, 201, 199),
            selection: Color::Rgb(230, 195, 132),
            black: Color::Rgb(13, 12, 12),
            gray: Color::Rgb(164, 167, 164),
            work: Color::Rgb(228, 104, 118),
            short_break: Color::Rgb(138, 154, 123),
            long_break: Color::Rgb(127, 180, 202),
            accent: Color::Rgb(162, 146, 163),
        }
    }
}

impl Theme {
    pub fn phase(&self, phase: Phase) -> Color {
        match phase {
            Phase::Work => self.work,
            Phase::Break => self.short_break,
            Phase::LongBreak => self.long_break,
        }
    }
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            timer: "Δ".to_string(),
            settings: "⬢".to_string(),
            play: "▶".to_string(),
            pause: "⏸".to_string(),
            session: "●".to_string(),
            select: "▸".to_string(),
            input_cursor: "▊".to_string(),
            header_left: "⟪ ".to_string(),
            header_right: " ⟫".to_string(),
        }
    }
}

fn hex_to_color<'de, D>(deserializer: D) -> Result<Color, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    if !s.starts_with('#') || s.len() != 7 {
        return Err(serde::de::Error::custom("invalid hex color format"));
    }
    let r = u8::from_str_radix(&s[1..3], 16).map_err(serde::de::Error::custom)?;
    let g = u8::from_str_radix(&s[3..5], 16).map_err(serde::de::Error::custom)?;
    let b = u8::from_str_radix(&s[5..7], 16).map_err(serde::de::Error::custom)?;
    Ok(Color::Rgb(r, g, b))
}

pub fn config_path() -> Option<PathBuf> {
    persistence::project_dirs().map(|dirs| dirs.config_dir().join("tempo.toml"))
}

pub fn load_config() -> Result<Config> {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => Ok(Config::default()),
    }
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {:?}", path))?;
    toml::from_str(&config_str).with_context(|| format!("Failed to parse config file at {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("tempo.toml")).unwrap();
        assert!(config.presets.is_empty());
        assert_eq!(config.theme.work, Theme::default().work);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tempo.toml");
        fs::write(
            &path,
            r##"
[theme]
work = "#ff0000"

[icons]
play = ">"

[[presets]]
label = "Sprint"
work_minutes = 20
break_minutes = 4
long_break_minutes = 12
long_break_every = 3
"##,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.theme.work, Color::Rgb(255, 0, 0));
        assert_eq!(config.theme.long_break, Theme::default().long_break);
        assert_eq!(config.icons.play, ">");
        assert_eq!(config.icons.pause, Icons::default().pause);
        assert_eq!(config.presets.len(), 1);
        assert_eq!(config.presets[0].label, "Sprint");
    }

    #[test]
    fn config_and_data_share_one_project_directory() {
        let Some(dirs) = persistence::project_dirs() else {
            return;
        };
        assert_eq!(config_path(), Some(dirs.config_dir().join("tempo.toml")));
        assert_eq!(persistence::data_dir().unwrap(), dirs.data_dir());
    }

    #[test]
    fn bad_colors_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tempo.toml");
        fs::write(&path, "[theme]\nwork = \"red\"\n").unwrap();
        assert!(load_config_from(&path).is_err());
    }
}
