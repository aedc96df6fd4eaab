use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow, Context};

use crate::api::DEFAULT_BACKEND_URL;
use crate::retry::RetryPolicy;
use crate::session::SessionSettings;
use crate::typewriter::MIN_TYPING_INTERVAL;

pub const BACKEND_URL_ENV: &str = "STUDYCHAT_BACKEND_URL";
pub const MODEL_ENV: &str = "STUDYCHAT_MODEL";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub backend_url: Option<String>,
    pub model: Option<String>,
    pub typing_interval_ms: Option<u64>,
    pub refetch_delay_ms: Option<u64>,
    pub loading_state_capacity: Option<usize>,
    pub retry_attempts: Option<u32>,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            backend_url: Some(DEFAULT_BACKEND_URL.to_string()),
            ..Self::default()
        }
    }

    /// Load from the default location. A missing file is not an error.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn save_default_model(model: &str) -> Result<()> {
        Self::save_model_to(&Self::get_config_path()?, model)
    }

    /// Record `model` in the file at `path`, leaving its other settings alone.
    pub fn save_model_to(path: &Path, model: &str) -> Result<()> {
        let mut config = Self::load_from(path)?;
        config.model = Some(model.to_string());
        config.save_to(path)
    }

    /// Non-empty values (from flags or `STUDYCHAT_*` variables) replace
    /// what the file said.
    pub fn apply_overrides(&mut self, backend_url: Option<String>, model: Option<String>) {
        if let Some(url) = backend_url.filter(|u| !u.trim().is_empty()) {
            self.backend_url = Some(url);
        }
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.model = Some(model);
        }
    }

    pub fn backend_url(&self) -> &str {
        self.backend_url.as_deref().unwrap_or(DEFAULT_BACKEND_URL)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_attempts
            .map(RetryPolicy::new)
            .unwrap_or_default()
    }

    pub fn settings(&self) -> SessionSettings {
        let defaults = SessionSettings::default();
        SessionSettings {
            model: self.model.clone().unwrap_or(defaults.model),
            typing_interval: self
                .typing_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.typing_interval)
                .max(MIN_TYPING_INTERVAL),
            refetch_delay: self
                .refetch_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.refetch_delay),
            loading_capacity: self.loading_state_capacity.unwrap_or(defaults.loading_capacity),
            retry: self.retry_policy(),
        }
    }

    /// Log file path, defaulting to `studychat.log` next to the config.
    pub fn log_file(&self) -> Result<PathBuf> {
        match &self.log_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("studychat.log")),
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("studychat"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.backend_url(), DEFAULT_BACKEND_URL);
        assert_eq!(config.settings(), SessionSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            model: Some("llama3".to_string()),
            typing_interval_ms: Some(25),
            retry_attempts: Some(0),
            ..Config::new()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        let settings = loaded.settings();
        assert_eq!(settings.model, "llama3");
        assert_eq!(settings.typing_interval, Duration::from_millis(25));
        assert_eq!(settings.retry, RetryPolicy::none());
    }

    #[test]
    fn test_zero_typing_interval_is_clamped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"typing_interval_ms": 0}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.settings().typing_interval, MIN_TYPING_INTERVAL);
    }

    #[test]
    fn test_partial_file_parses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"backend_url": "http://10.0.0.2:8000"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backend_url(), "http://10.0.0.2:8000");
        assert_eq!(config.model, None);
    }

    #[test]
    fn test_save_model_keeps_other_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.json");
        fs::write(&path, r#"{"backend_url": "http://10.0.0.2:8000", "model": "gemma2:2b"}"#).unwrap();

        Config::save_model_to(&path, "llama3").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model.as_deref(), Some("llama3"));
        assert_eq!(config.backend_url(), "http://10.0.0.2:8000");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_blank_overrides_are_ignored() {
        let mut config = Config::new();
        config.apply_overrides(Some("  ".to_string()), Some("mistral".to_string()));
        assert_eq!(config.backend_url(), DEFAULT_BACKEND_URL);
        assert_eq!(config.model.as_deref(), Some("mistral"));
    }
}
