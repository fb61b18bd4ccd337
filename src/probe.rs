//! Startup checks for optional external capabilities.
//!
//! Nothing here can fail startup. Missing capabilities are logged, and where a
//! setting depends on one, a [`ConfigOverride`] is recommended for the startup
//! routine to apply before the configuration is frozen.

use crate::config::{AppConfig, ConfigOverride, Extractor};
use crate::consts::FFMPEG_BINARY;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Locates executables by name or explicit path.
pub trait ExecutableResolver {
    fn resolve(&self, program: &Path) -> Option<PathBuf>;
}

/// Resolver backed by a list of directories, normally `$PATH`.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Directories from the `PATH` environment variable.
    pub fn from_env() -> Self {
        let dirs = std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).collect())
            .unwrap_or_default();
        Self { dirs }
    }
}

impl ExecutableResolver for SearchPath {
    fn resolve(&self, program: &Path) -> Option<PathBuf> {
        // Anything with a directory component is taken as-is.
        if program.components().count() > 1 {
            return executable_candidate(program);
        }
        self.dirs
            .iter()
            .find_map(|dir| executable_candidate(&dir.join(program)))
    }
}

fn executable_candidate(path: &Path) -> Option<PathBuf> {
    if is_executable(path) {
        return Some(path.to_path_buf());
    }
    let ext = std::env::consts::EXE_EXTENSION;
    if !ext.is_empty() && path.extension().is_none() {
        let with_ext = path.with_extension(ext);
        if is_executable(&with_ext) {
            return Some(with_ext);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Third-party integrations that need credentials in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integration {
    LastFm,
    Spotify,
}

impl Integration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastFm => "lastfm",
            Self::Spotify => "spotify",
        }
    }

    fn unavailable_message(&self) -> &'static str {
        match self {
            Self::LastFm => "Last.FM integration not available: missing ApiKey/Secret",
            Self::Spotify => {
                "Spotify integration is not enabled: artist images will not be available"
            }
        }
    }
}

impl std::fmt::Display for Integration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of looking for the transcoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscoderProbe {
    /// Where the binary was found
    pub path: Option<PathBuf>,
    /// Configuration change needed because the binary is missing
    pub recommended: Option<ConfigOverride>,
}

/// Look for ffmpeg; recommend the in-process extractor if the scanner relies on it.
pub fn check_transcoder(config: &AppConfig, resolver: &dyn ExecutableResolver) -> TranscoderProbe {
    let program = config
        .transcoding
        .ffmpeg_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(FFMPEG_BINARY));

    if let Some(path) = resolver.resolve(&program) {
        info!(path = %path.display(), "Found ffmpeg");
        return TranscoderProbe {
            path: Some(path),
            recommended: None,
        };
    }

    warn!(program = %program.display(), "Unable to find ffmpeg. Transcoding will fail if used");
    let recommended = (config.scanner.extractor == Extractor::Ffmpeg).then(|| {
        warn!("ffmpeg cannot be used for metadata extraction. Falling back to taglib");
        ConfigOverride::Extractor(Extractor::Taglib)
    });

    TranscoderProbe {
        path: None,
        recommended,
    }
}

/// Integrations that lack a key or a secret. Absence is normal, so this only
/// logs at info.
pub fn check_external_credentials(config: &AppConfig) -> Vec<Integration> {
    let mut unavailable = Vec::new();

    if config.lastfm.api_key.is_empty() || config.lastfm.secret.is_empty() {
        unavailable.push(Integration::LastFm);
    }
    if config.spotify.id.is_empty() || config.spotify.secret.is_empty() {
        unavailable.push(Integration::Spotify);
    }

    for integration in &unavailable {
        info!("{}", integration.unavailable_message());
    }
    unavailable
}

/// Everything the startup probes found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub transcoder: TranscoderProbe,
    pub unavailable_integrations: Vec<Integration>,
}

impl ProbeReport {
    /// Overrides to apply before the configuration is frozen.
    pub fn overrides(&self) -> impl Iterator<Item = ConfigOverride> + '_ {
        self.transcoder.recommended.iter().copied()
    }
}

/// Run all capability probes against a configuration snapshot.
pub fn run_probes(config: &AppConfig, resolver: &dyn ExecutableResolver) -> ProbeReport {
    ProbeReport {
        transcoder: check_transcoder(config, resolver),
        unavailable_integrations: check_external_credentials(config),
    }
}
