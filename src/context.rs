//! Everything the reader needs from the outside world besides the graph and
//! its text: player settings, character colors, condition flags and audio.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::errors::StringTableError;

/// An RGBA color with components in `0.0..=1.0`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
        [channel(self.r), channel(self.g), channel(self.b), channel(self.a)]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a #RRGGBB or #RRGGBBAA color", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for Color {
    type Err = ParseColorError;

    /// Parses `#RRGGBB` or `#RRGGBBAA`; the `#` is optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseColorError(s.to_string());
        let hex = s.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(err());
        }
        let mut channels = [255u8; 4];
        for (i, channel) in channels.iter_mut().take(hex.len() / 2).enumerate() {
            *channel = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| err())?;
        }
        let [r, g, b, a] = channels.map(|channel| f32::from(channel) / 255.0);
        Ok(Self { r, g, b, a })
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A per-character text color override.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CharacterColor {
    #[serde(rename = "characterId")]
    pub character_id: String,
    pub color: Color,
}

/// Loads character colors from a CSV file with `characterId,color` columns.
pub fn load_character_colors<R: io::Read>(reader: R) -> Result<Vec<CharacterColor>, StringTableError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let colors = csv_reader.deserialize()
        .collect::<Result<Vec<CharacterColor>, _>>()?;
    Ok(colors)
}

pub fn load_character_colors_from_path(path: impl AsRef<Path>) -> Result<Vec<CharacterColor>, StringTableError> {
    load_character_colors(File::open(path)?)
}

/// Player settings read by the reader. Handed over when a dialogue starts and
/// not changed while it plays.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderContext {
    pub locale_key: String,
    pub audio_locale_key: String,
    pub character_colors: Vec<CharacterColor>,
    /// When set, every line uses the default color.
    pub override_character_color: bool,
    /// Flags read by condition nodes. A missing flag reads as `false`.
    pub conditions: HashMap<String, bool>,
}

impl Default for ReaderContext {
    fn default() -> Self {
        Self::new("en")
    }
}

impl ReaderContext {
    pub fn new(locale_key: impl Into<String>) -> Self {
        let locale_key = locale_key.into();
        Self {
            audio_locale_key: locale_key.clone(),
            locale_key,
            character_colors: Vec::new(),
            override_character_color: false,
            conditions: HashMap::new(),
        }
    }

    pub fn with_audio_locale(mut self, audio_locale_key: impl Into<String>) -> Self {
        self.audio_locale_key = audio_locale_key.into();
        self
    }

    pub fn with_character_color(mut self, character_id: impl Into<String>, color: Color) -> Self {
        self.character_colors.push(CharacterColor {
            character_id: character_id.into(),
            color,
        });
        self
    }

    pub fn set_condition(&mut self, name: impl Into<String>, value: bool) {
        self.conditions.insert(name.into(), value);
    }

    pub fn condition(&self, name: &str) -> bool {
        self.conditions.get(name).copied().unwrap_or(false)
    }

    /// The color a character's lines are shown in.
    pub fn color_for(&self, character: &str, default_color: Color) -> Color {
        if self.override_character_color {
            return default_color;
        }
        self.character_colors.iter()
            .find(|entry| entry.character_id == character)
            .map_or(default_color, |entry| entry.color)
    }

    /// Key of the audio clip voicing a line in the current audio locale.
    pub fn audio_key(&self, line_id: &str) -> String {
        format!("{}_{}", line_id, self.audio_locale_key)
    }
}

/// Reader settings that do not depend on the player.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    pub default_color: Color,
    /// Seconds added to a voiced line's clip length before moving on.
    pub audio_guard: f32,
    /// Nodes played in a row without suspending before giving up.
    pub max_chain_length: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            default_color: Color::BLACK,
            audio_guard: 0.05,
            max_chain_length: 1024,
        }
    }
}

/// Voice clips the reader can trigger, keyed by `lineId_audioLocale`.
pub trait AudioLibrary {
    /// Length in seconds of the clip, if there is one.
    fn clip_duration(&self, key: &str) -> Option<f32>;
}

impl AudioLibrary for HashMap<String, f32> {
    fn clip_duration(&self, key: &str) -> Option<f32> {
        self.get(key).copied()
    }
}
