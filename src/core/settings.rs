use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::core::config::DEFAULT_ENDPOINT;
use crate::core::error::StorageError;
use crate::storage::{keys, KeyValueStore};

pub const DEFAULT_MODEL: &str = "nvidia/nemotron-3-nano-30b-a3b:free";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_ACCENT: &str = "#6366f1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User preferences. Fields are independent; none validates another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub endpoint: String,
    pub model: String,
    /// 0.0 to 2.0 by convention; not enforced.
    pub temperature: f32,
    pub voice_output: bool,
    pub theme: Theme,
    pub accent_color: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            voice_output: false,
            theme: Theme::Dark,
            accent_color: DEFAULT_ACCENT.into(),
        }
    }
}

impl Settings {
    /// Store entries for every field, keyed as `SettingsStore::load` reads them.
    pub fn to_entries(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (keys::ENDPOINT.to_string(), self.endpoint.clone()),
            (keys::MODEL.to_string(), self.model.clone()),
            (keys::TEMPERATURE.to_string(), self.temperature.to_string()),
            (keys::VOICE_OUTPUT.to_string(), self.voice_output.to_string()),
            (keys::THEME.to_string(), self.theme.as_str().to_string()),
            (keys::ACCENT_COLOR.to_string(), self.accent_color.clone()),
        ])
    }
}

fn accent_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid accent regex"))
}

/// Returns true for `#rrggbb` colors.
pub fn is_valid_accent(s: &str) -> bool {
    accent_pattern().is_match(s)
}

/// Parses `#rrggbb` into its components.
pub fn accent_rgb(s: &str) -> Option<(u8, u8, u8)> {
    if !is_valid_accent(s) {
        return None;
    }
    let r = u8::from_str_radix(&s[1..3], 16).ok()?;
    let g = u8::from_str_radix(&s[3..5], 16).ok()?;
    let b = u8::from_str_radix(&s[5..7], 16).ok()?;
    Some((r, g, b))
}

pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
    defaults: Settings,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_defaults(store, Settings::default())
    }

    /// `defaults` supplies the fallback for absent or malformed fields.
    pub fn with_defaults(store: Arc<dyn KeyValueStore>, defaults: Settings) -> Self {
        Self { store, defaults }
    }

    pub async fn load(&self) -> Result<Settings, StorageError> {
        let d = &self.defaults;

        let endpoint = self
            .store
            .get(keys::ENDPOINT)
            .await?
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| d.endpoint.clone());
        let model = self
            .store
            .get(keys::MODEL)
            .await?
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| d.model.clone());
        let temperature = self
            .store
            .get(keys::TEMPERATURE)
            .await?
            .and_then(|s| s.trim().parse::<f32>().ok())
            .filter(|t| t.is_finite())
            .unwrap_or(d.temperature);
        let voice_output = self
            .store
            .get(keys::VOICE_OUTPUT)
            .await?
            .and_then(|s| s.trim().parse::<bool>().ok())
            .unwrap_or(d.voice_output);
        let theme = self
            .store
            .get(keys::THEME)
            .await?
            .and_then(|s| Theme::parse(&s))
            .unwrap_or(d.theme);
        let accent_color = self
            .store
            .get(keys::ACCENT_COLOR)
            .await?
            .filter(|s| is_valid_accent(s))
            .unwrap_or_else(|| d.accent_color.clone());

        Ok(Settings {
            endpoint,
            model,
            temperature,
            voice_output,
            theme,
            accent_color,
        })
    }

    pub async fn save(&self, settings: &Settings) -> Result<(), StorageError> {
        self.store.set_many(&settings.to_entries()).await?;
        tracing::debug!(model = %settings.model, endpoint = %settings.endpoint, "settings saved");
        Ok(())
    }

    /// Overwrites persisted values with the factory configuration.
    pub async fn reset_to_defaults(&self) -> Result<Settings, StorageError> {
        let factory = Settings::default();
        self.save(&factory).await?;
        Ok(factory)
    }
}
