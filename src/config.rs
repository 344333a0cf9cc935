use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HearthConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub context: ContextConfig,
    pub anticipations: AnticipationConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `info` or `hearth=debug`.
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `"http"` or `"none"`.
    pub provider: String,
    pub url: String,
    pub model: String,
    /// Name of the environment variable holding a bearer token.
    pub api_key_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ContextConfig {
    pub subject_max_facts: usize,
    pub semantic_max_facts: usize,
    pub semantic_min_score: f32,
    pub state_window_capacity: usize,
    pub state_max_age_secs: u64,
    /// IANA zone name for rendered timestamps; local time when unset.
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnticipationConfig {
    /// Cooldown applied to anticipations whose own `cooldown_seconds` is 0.
    pub default_cooldown_secs: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_hearth_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "none".into(),
            url: "http://localhost:11434/v1".into(),
            model: "nomic-embed-text".into(),
            api_key_env: None,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            subject_max_facts: 10,
            semantic_max_facts: 5,
            semantic_min_score: 0.3,
            state_window_capacity: 50,
            state_max_age_secs: 30 * 60,
            timezone: None,
        }
    }
}

impl Default for AnticipationConfig {
    fn default() -> Self {
        Self {
            default_cooldown_secs: 300,
        }
    }
}

/// Returns `~/.hearth/`, or `./.hearth` when no home directory is known.
pub fn default_hearth_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hearth")
}

/// Returns the default config file path: `~/.hearth/config.toml`
pub fn default_config_path() -> PathBuf {
    default_hearth_dir().join("config.toml")
}

impl HearthConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            HearthConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply HEARTH_DB, HEARTH_LOG_LEVEL, HEARTH_TIMEZONE, HEARTH_EMBEDDING_URL.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HEARTH_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("HEARTH_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("HEARTH_TIMEZONE") {
            self.context.timezone = Some(val);
        }
        if let Ok(val) = std::env::var("HEARTH_EMBEDDING_URL") {
            self.embedding.url = val;
            self.embedding.provider = "http".into();
        }
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn default_cooldown(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.anticipations.default_cooldown_secs)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
