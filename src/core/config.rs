use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::error::ConfigError;

/// Backend used when neither the store nor the config names one.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the local store; relative paths resolve against the
    /// platform data dir.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_endpoint")]
    pub default_endpoint: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Number of sessions fetched for the session list.
    #[serde(default = "default_session_list_limit")]
    pub session_list_limit: u32,

    /// PIN for the backend's admin statistics endpoint.
    #[serde(default)]
    pub admin_pin: Option<String>,

    #[serde(default)]
    pub voice: VoiceConfig,

    #[serde(default)]
    pub debug: bool,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("nao-chat")
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}

fn default_request_timeout() -> u64 {
    180
}

fn default_session_list_limit() -> u32 {
    50
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
            session_list_limit: default_session_list_limit(),
            admin_pin: None,
            voice: VoiceConfig::default(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Streaming recognizer; each stdout line is a transcript fragment.
    #[serde(default)]
    pub recognizer_command: Option<Vec<String>>,

    /// Recorder writing raw 16 kHz mono s16le PCM to stdout.
    #[serde(default = "default_recorder_command")]
    pub recorder_command: Vec<String>,
}

fn default_recorder_command() -> Vec<String> {
    ["arecord", "-q", "-f", "S16_LE", "-r", "16000", "-c", "1", "-t", "raw"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            recognizer_command: None,
            recorder_command: default_recorder_command(),
        }
    }
}

pub fn load_config(working_dir: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let wd = working_dir.unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let mut config = AppConfig::default();

    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("nao-chat").join("config.json");
        if let Some(file_config) = read_config_file(&global_path)? {
            merge_config(&mut config, file_config);
        }
    }

    if let Some(file_config) = read_config_file(&wd.join("nao-chat.json"))? {
        merge_config(&mut config, file_config);
    }

    detect_env(&mut config);

    Ok(config)
}

fn read_config_file(path: &Path) -> Result<Option<AppConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::File(e.to_string()))?;
    let parsed = serde_json::from_str(&content)
        .map_err(|e| ConfigError::Invalid(format!("{}: {e}", path.display())))?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(Some(parsed))
}

fn merge_config(base: &mut AppConfig, overlay: AppConfig) {
    if overlay.data_dir != default_data_dir() {
        base.data_dir = overlay.data_dir;
    }
    if overlay.default_endpoint != default_endpoint() {
        base.default_endpoint = overlay.default_endpoint;
    }
    if overlay.request_timeout_secs != default_request_timeout() {
        base.request_timeout_secs = overlay.request_timeout_secs;
    }
    if overlay.session_list_limit != default_session_list_limit() {
        base.session_list_limit = overlay.session_list_limit;
    }
    if overlay.admin_pin.is_some() {
        base.admin_pin = overlay.admin_pin;
    }
    if overlay.voice.recognizer_command.is_some() {
        base.voice.recognizer_command = overlay.voice.recognizer_command;
    }
    if overlay.voice.recorder_command != default_recorder_command() {
        base.voice.recorder_command = overlay.voice.recorder_command;
    }
    if overlay.debug {
        base.debug = true;
    }
}

fn detect_env(config: &mut AppConfig) {
    if let Ok(url) = std::env::var("NAO_ENDPOINT") {
        if !url.is_empty() {
            config.default_endpoint = url;
        }
    }
    if let Ok(pin) = std::env::var("NAO_ADMIN_PIN") {
        if !pin.is_empty() {
            config.admin_pin = Some(pin);
        }
    }
    if let Ok(cmd) = std::env::var("NAO_RECOGNIZER") {
        let parts: Vec<String> = cmd.split_whitespace().map(str::to_string).collect();
        if !parts.is_empty() {
            config.voice.recognizer_command = Some(parts);
        }
    }
}

impl AppConfig {
    pub fn data_path(&self) -> PathBuf {
        if self.data_dir.is_absolute() {
            return self.data_dir.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(&self.data_dir)
    }
}
