use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GuideError, Result};

/// Main configuration structure for Celestial Guide
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Credential for the generative-language API. Checked on first use only.
    #[serde(default)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub request_timeout_seconds: u64,
    pub pro: TierModels,
    pub fast: TierModels,
}

/// Primary and fallback model identifiers for one capability tier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierModels {
    pub primary: String,
    pub fallback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the session snapshot. Defaults to the platform data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    pub snapshot_key: String,
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => tracing::info!("Loaded .env from: {}", path.display()),
            Err(_) => tracing::debug!("No .env file found - continuing with env vars only"),
        }

        let config_path =
            env::var("CELESTIAL_CONFIG_PATH").unwrap_or_else(|_| "celestial.yaml".to_string());

        let mut config = Self::from_file(Path::new(&config_path));
        config.apply_env_overrides();

        // Validate configuration - log warnings but don't fail
        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    fn from_file(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("Config file not found at {} - using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to parse config file {}: {} - using defaults",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::error!(
                    "Failed to read config file {}: {} - using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Credential: first non-empty of the known variable names
        for name in ["GEMINI_API_KEY", "API_KEY", "VITE_API_KEY"] {
            if let Ok(key) = env::var(name) {
                if !key.trim().is_empty() {
                    self.gemini.api_key = Some(key);
                    break;
                }
            }
        }

        if let Ok(url) = env::var("CELESTIAL_GEMINI_BASE_URL") {
            self.gemini.base_url = url;
        }
        if let Ok(timeout) = env::var("CELESTIAL_REQUEST_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.gemini.request_timeout_seconds = secs;
            }
        }

        // Model overrides
        if let Ok(model) = env::var("CELESTIAL_PRO_MODEL") {
            self.gemini.pro.primary = model;
        }
        if let Ok(model) = env::var("CELESTIAL_PRO_FALLBACK") {
            self.gemini.pro.fallback = model;
        }
        if let Ok(model) = env::var("CELESTIAL_FAST_MODEL") {
            self.gemini.fast.primary = model;
        }
        if let Ok(model) = env::var("CELESTIAL_FAST_FALLBACK") {
            self.gemini.fast.fallback = model;
        }

        // Storage overrides
        if let Ok(dir) = env::var("CELESTIAL_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(key) = env::var("CELESTIAL_SNAPSHOT_KEY") {
            self.storage.snapshot_key = key;
        }
    }

    /// Validate configuration
    fn validate(&self) -> std::result::Result<(), Box<dyn std::error::Error>> {
        if self.gemini.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err("GEMINI_API_KEY is not set; requests will fail on first use".into());
        }

        for (tier, models) in [("pro", &self.gemini.pro), ("fast", &self.gemini.fast)] {
            if models.primary.trim().is_empty() || models.fallback.trim().is_empty() {
                return Err(format!("gemini.{tier} model identifiers cannot be empty").into());
            }
        }

        if self.gemini.request_timeout_seconds == 0 {
            return Err("gemini.request_timeout_seconds cannot be 0".into());
        }

        if self.storage.snapshot_key.trim().is_empty() {
            return Err("storage.snapshot_key cannot be empty".into());
        }

        Ok(())
    }

    /// The API credential, or a configuration error if none was supplied
    pub fn api_key(&self) -> Result<String> {
        match self.gemini.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => Err(GuideError::Configuration(
                "API key is missing (set GEMINI_API_KEY)".to_string(),
            )),
        }
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.gemini.request_timeout_seconds)
    }

    /// Directory holding the durable session snapshot
    pub fn data_dir(&self) -> PathBuf {
        self.storage.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("celestial-guide")
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini: GeminiConfig {
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                request_timeout_seconds: 120,
                pro: TierModels {
                    primary: "gemini-3.1-pro-preview".to_string(),
                    fallback: "gemini-2.5-pro".to_string(),
                },
                fast: TierModels {
                    primary: "gemini-3-flash-preview".to_string(),
                    fallback: "gemini-2.5-flash".to_string(),
                },
            },
            storage: StorageConfig {
                data_dir: None,
                snapshot_key: "celestial_guide_v6".to_string(),
            },
        }
    }
}
