use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::info;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite://firstboot.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Development-only settings
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DevConfig {
    /// When set and the store has no users, bootstrap creates an admin
    /// account with this password. Never set this in production.
    #[serde(default)]
    pub auto_create_admin_password: String,
}

/// Engine used by the library scanner to read tag metadata
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Extractor {
    /// Shells out to the ffmpeg binary
    Ffmpeg,
    /// In-process tag reader, always available
    #[default]
    Taglib,
}

impl Extractor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ffmpeg => "ffmpeg",
            Self::Taglib => "taglib",
        }
    }
}

impl std::fmt::Display for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Library scanner settings
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScannerConfig {
    #[serde(default)]
    pub extractor: Extractor,
}

/// Transcoding settings
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TranscodingConfig {
    /// Explicit path to the ffmpeg binary. When unset the search path is used.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

/// Last.fm integration credentials
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LastFmConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret: String,
}

/// Spotify integration credentials
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SpotifyConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub secret: String,
}

/// A configuration change recommended by a startup probe.
///
/// Probes never touch the snapshot themselves; the startup routine applies
/// overrides before the snapshot is frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOverride {
    Extractor(Extractor),
}

/// Root application configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dev: DevConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub transcoding: TranscodingConfig,
    #[serde(default)]
    pub lastfm: LastFmConfig,
    #[serde(default)]
    pub spotify: SpotifyConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default config file
            .add_source(File::with_name("config/default").required(false))
            // Override with local config if present
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (prefix: FIRSTBOOT_)
            // e.g., FIRSTBOOT_DEV__AUTO_CREATE_ADMIN_PASSWORD, FIRSTBOOT_SCANNER__EXTRACTOR
            // Values stay strings; numeric fields are converted on deserialize.
            .add_source(
                Environment::with_prefix("FIRSTBOOT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Apply a probe recommendation to this (not yet frozen) snapshot.
    pub fn apply(&mut self, change: ConfigOverride) {
        match change {
            ConfigOverride::Extractor(extractor) => {
                if self.scanner.extractor != extractor {
                    info!(
                        "Scanner extractor changed from {} to {}",
                        self.scanner.extractor, extractor
                    );
                    self.scanner.extractor = extractor;
                }
            }
        }
    }

    /// The bootstrap admin password, if one is configured.
    pub fn bootstrap_admin_password(&self) -> Option<&str> {
        let password = self.dev.auto_create_admin_password.as_str();
        (!password.is_empty()).then_some(password)
    }

    /// Freeze this snapshot as the process-wide configuration.
    ///
    /// The first frozen snapshot wins; later calls return it unchanged.
    pub fn freeze(self) -> &'static Self {
        CONFIG.get_or_init(|| self)
    }
}
