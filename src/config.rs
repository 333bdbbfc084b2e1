use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

/// Keyring service name for the stored API credential.
const KEYRING_SERVICE: &str = "dictation-hotkey";
/// Keyring user slot. Single local user, so a fixed name.
const KEYRING_USER: &str = "api-key";
/// Environment override, mostly for development and tests.
const API_KEY_ENV: &str = "DICTATION_HOTKEY_API_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub hotkey: HotkeyConfig,
    pub audio: AudioConfig,
    pub api: ApiConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HotkeyConfig {
    /// Key name the gesture machine listens to (e.g. "F9", "RightCtrl")
    pub key: String,
    pub hold_threshold_ms: u64,
    pub double_tap_window_ms: u64,
    /// Minimum gap between accepted double-tap toggles
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AudioConfig {
    pub max_recording_secs: u32,
    /// Recordings whose loudest chunk stays below this RMS are discarded
    pub min_peak_rms: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub endpoint: String,
    pub model: String,
    pub language: String,
    /// Minimal prompt hinting the language; longer prompts invite the model
    /// to hallucinate content that was never spoken
    pub prompt: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub log_path: String,
}

impl Config {
    /// Load config from ~/.dictation-hotkey.toml, creating it on first run.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, created, or parsed.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default(&config_path).context("failed to create default config")?;
        }

        let contents = fs::read_to_string(&config_path).context("failed to read config file")?;
        let config: Self = toml::from_str(&contents).context("failed to parse config TOML")?;
        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        Ok(home_dir()?.join(".dictation-hotkey.toml"))
    }

    fn create_default(path: &PathBuf) -> Result<()> {
        fs::write(path, DEFAULT_CONFIG).context("failed to write default config")?;
        Ok(())
    }

    /// Expand ~ in paths to home directory
    ///
    /// # Errors
    /// Returns error if the home directory cannot be determined.
    pub fn expand_path(path: &str) -> Result<PathBuf> {
        if let Some(stripped) = path.strip_prefix("~/") {
            Ok(home_dir()?.join(stripped))
        } else {
            Ok(PathBuf::from(path))
        }
    }
}

/// Home directory from the platform environment (USERPROFILE on Windows).
fn home_dir() -> Result<PathBuf> {
    std::env::var("USERPROFILE")
        .or_else(|_| std::env::var("HOME"))
        .map(PathBuf::from)
        .context("neither USERPROFILE nor HOME is set")
}

const DEFAULT_CONFIG: &str = r#"[hotkey]
key = "F9"
hold_threshold_ms = 300
double_tap_window_ms = 400
debounce_ms = 500

[audio]
max_recording_secs = 30
min_peak_rms = 0.01

[api]
endpoint = "https://api.openai.com/v1"
model = "whisper-1"
language = "ja"
prompt = "こんにちは。"
timeout_secs = 30

[telemetry]
enabled = true
log_path = "~/.dictation-hotkey/dictation.log"
"#;

/// Where the session controller asks whether a usable API credential exists.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    /// The stored API key, if any.
    fn api_key(&self) -> Option<String>;

    /// Quick plausibility check without hitting the network.
    fn has_valid_key(&self) -> bool {
        self.api_key().as_deref().is_some_and(looks_like_api_key)
    }
}

/// Plausibility check for an API key.
#[must_use]
pub fn looks_like_api_key(key: &str) -> bool {
    key.starts_with("sk-") && key.len() > 20
}

/// API credential in the OS credential manager, with an environment override.
pub struct KeyringCredentials;

impl KeyringCredentials {
    /// Stores the key in the OS credential manager.
    ///
    /// # Errors
    /// Returns error if the keyring entry cannot be created or written.
    #[allow(dead_code)] // Settings dialog seam
    pub fn store(key: &str) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)
            .context("keyring entry init failed")?;
        entry.set_password(key).context("keyring set failed")?;
        Ok(())
    }
}

impl CredentialStore for KeyringCredentials {
    fn api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }

        let entry = match keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("keyring entry init failed: {}", e);
                return None;
            }
        };
        match entry.get_password() {
            Ok(key) if !key.trim().is_empty() => Some(key),
            Ok(_) => None,
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!("keyring read failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.hotkey.key, "F9");
        assert_eq!(config.hotkey.hold_threshold_ms, 300);
        assert_eq!(config.hotkey.double_tap_window_ms, 400);
        assert_eq!(config.hotkey.debounce_ms, 500);
        assert_eq!(config.audio.max_recording_secs, 30);
        assert!((config.audio.min_peak_rms - 0.01).abs() < f32::EPSILON);
        assert_eq!(config.api.model, "whisper-1");
        assert_eq!(config.api.language, "ja");
        assert_eq!(config.api.timeout_secs, 30);
        assert!(config.telemetry.enabled);
    }

    #[test]
    fn expand_path_with_tilde() {
        let home = home_dir().unwrap();
        let result = Config::expand_path("~/logs/dictation.log").unwrap();
        assert_eq!(result, home.join("logs/dictation.log"));
    }

    #[test]
    fn expand_path_absolute_passthrough() {
        let result = Config::expand_path("/var/log/app.log").unwrap();
        assert_eq!(result, PathBuf::from("/var/log/app.log"));
    }

    #[test]
    fn plausible_api_keys() {
        assert!(looks_like_api_key("sk-0123456789abcdef0123456789"));
        assert!(!looks_like_api_key("sk-short"));
        assert!(!looks_like_api_key("pk-0123456789abcdef0123456789"));
        assert!(!looks_like_api_key(""));
    }

    #[test]
    fn default_has_valid_key_uses_plausibility_check() {
        struct Fixed(Option<String>);
        impl CredentialStore for Fixed {
            fn api_key(&self) -> Option<String> {
                self.0.clone()
            }
        }

        assert!(Fixed(Some("sk-0123456789abcdef0123456789".to_owned())).has_valid_key());
        assert!(!Fixed(Some("not-a-key".to_owned())).has_valid_key());
        assert!(!Fixed(None).has_valid_key());
    }
}
