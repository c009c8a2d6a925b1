//! TOML configuration file loading
//!
//! Configuration comes from an explicit `--config-file`, else from
//! `<config dir>/repolens/repolens.toml` when present, else defaults.
//! Secrets (IP hash salt, Gemini API key) may also arrive via the
//! environment, which takes precedence over the file.

use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const SALT_ENV: &str = "REPOLENS_IP_HASH_SALT";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Daily scan allowance for anonymous callers
    pub anonymous_limit: i64,
    /// Hours between quota resets (also anonymous ledger retention)
    pub reset_window_hours: i64,
    /// Salt mixed into anonymous IP hashes
    pub ip_hash_salt: String,
    /// Gemini API key; required for the scan command
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// Upper bound on a single `git clone`
    pub clone_timeout_secs: u64,
    /// Upper bound on a single model call
    pub model_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            anonymous_limit: 3,
            reset_window_hours: 24,
            ip_hash_salt: "repolens-dev-salt".to_string(),
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash".to_string(),
            gemini_base_url: crate::pipeline::GeminiClient::DEFAULT_BASE_URL.to_string(),
            clone_timeout_secs: 120,
            model_timeout_secs: 90,
        }
    }
}

impl AppConfig {
    /// Load configuration, terminating the process on an unreadable or
    /// invalid file the same way an unparseable command line would.
    pub async fn load(config_file: Option<&Path>) -> Self {
        let path = match config_file {
            Some(path) => {
                // An explicitly named config file must exist
                if !path.exists() {
                    eprintln!(
                        "Error: The specified configuration file does not exist: {}",
                        path.display()
                    );
                    std::process::exit(1);
                }
                Some(path.to_path_buf())
            }
            None => Self::default_path().filter(|p| p.exists()),
        };

        let mut config = match path {
            Some(path) => match tokio::fs::read_to_string(&path).await {
                Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                    Ok(config) => config,
                    Err(e) => {
                        eprintln!("Error parsing configuration file {}: {}", path.display(), e);
                        std::process::exit(1);
                    }
                },
                Err(e) => {
                    eprintln!("Error reading configuration file {}: {}", path.display(), e);
                    std::process::exit(1);
                }
            },
            None => Self::default(),
        };

        config.apply_env();
        config
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("repolens").join("repolens.toml"))
    }

    fn apply_env(&mut self) {
        if let Ok(salt) = std::env::var(SALT_ENV) {
            self.ip_hash_salt = salt;
        }
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            self.gemini_api_key = Some(key);
        }
    }
}
