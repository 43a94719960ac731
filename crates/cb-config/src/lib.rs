//! # cb-config
//!
//! Layered settings for the confession board binary. Sources, lowest
//! precedence first:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`confession-board.toml` unless told otherwise)
//! 3. `CB__*` environment variables, `__` separating sections
//!    (e.g. `CB__DATABASE__URL`, `CB__FEED__PAGE_SIZE`)
//!
//! A `.env` file in the working directory is loaded into the environment
//! first. Loading happens before logging is configured, so nothing here
//! emits tracing events; the binary reports `env_file` once it can.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cb_services::{ResolverConfig, SubmissionLimits, DEFAULT_PAGE_SIZE};
use config::{Config, Environment, File, FileFormat};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "confession-board.toml";
pub const ENV_PREFIX: &str = "CB";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub media: MediaSettings,
    pub identity: IdentitySettings,
    pub feed: FeedSettings,
    pub limits: LimitSettings,
    #[serde(default)]
    pub device: DeviceSettings,
    pub log: LogSettings,
    /// The `.env` file that was applied, if any.
    #[serde(skip)]
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(deserialize_with = "secret")]
    pub url: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct CacheSettings {
    /// JSON file holding the device cache
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct MediaSettings {
    pub root: PathBuf,
    pub url_prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct IdentitySettings {
    pub max_attempts: u32,
    pub cache_key: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedSettings {
    pub page_size: usize,
}

#[derive(Debug, Deserialize)]
pub struct LimitSettings {
    pub max_content_chars: usize,
    pub max_attachments: usize,
    pub max_attachment_bytes: usize,
}

/// Pinned device signals; unset ones are detected.
#[derive(Debug, Default, Deserialize)]
pub struct DeviceSettings {
    pub user_agent: Option<String>,
    pub language: Option<String>,
    pub platform: Option<String>,
    pub screen_resolution: Option<String>,
    pub timezone: Option<String>,
    pub canvas: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

fn secret<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

impl Settings {
    /// Loads `.env`, then the layered sources. `file` defaults to
    /// [`DEFAULT_CONFIG_FILE`] and may be absent.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let env_file = dotenvy::dotenv().ok();
        let file = file.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        let mut settings = Self::build(Some(file), None)?;
        settings.env_file = env_file;
        Ok(settings)
    }

    /// `env` replaces the process environment when given.
    fn build(file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let defaults = ResolverConfig::default();
        let limits = SubmissionLimits::default();

        let mut builder = Config::builder()
            .set_default("database.url", "sqlite:confession_board.db?mode=rwc")?
            .set_default("cache.path", ".confession-board/device.json")?
            .set_default("media.root", "./data/media")?
            .set_default("media.url_prefix", "/media")?
            .set_default("identity.max_attempts", i64::from(defaults.max_attempts))?
            .set_default("identity.cache_key", defaults.cache_key)?
            .set_default("feed.page_size", as_i64(DEFAULT_PAGE_SIZE))?
            .set_default("limits.max_content_chars", as_i64(limits.max_content_chars))?
            .set_default("limits.max_attachments", as_i64(limits.max_attachments))?
            .set_default("limits.max_attachment_bytes", as_i64(limits.max_attachment_bytes))?
            .set_default("log.level", "info")?
            .set_default("log.format", "pretty")?;

        if let Some(file) = file {
            builder = builder.add_source(File::from(file).format(FileFormat::Toml).required(false));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.identity.max_attempts == 0 {
            return Err(ConfigError::Invalid { key: "identity.max_attempts", reason: "must be at least 1".into() });
        }
        if self.identity.cache_key.trim().is_empty() {
            return Err(ConfigError::Invalid { key: "identity.cache_key", reason: "must not be empty".into() });
        }
        if self.feed.page_size == 0 {
            return Err(ConfigError::Invalid { key: "feed.page_size", reason: "must be at least 1".into() });
        }
        Ok(())
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            max_attempts: self.identity.max_attempts,
            cache_key: self.identity.cache_key.clone(),
        }
    }

    pub fn submission_limits(&self) -> SubmissionLimits {
        SubmissionLimits {
            max_content_chars: self.limits.max_content_chars,
            max_attachments: self.limits.max_attachments,
            max_attachment_bytes: self.limits.max_attachment_bytes,
        }
    }
}

fn as_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
