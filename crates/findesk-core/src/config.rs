//! Configuration management for findesk.
//!
//! Loads configuration from ${FINDESK_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::search::DEFAULT_SEARCH_TIMEOUT_SECS;

/// Environment variable that overrides `base_url`.
pub const BASE_URL_ENV: &str = "FINDESK_BASE_URL";

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for findesk configuration and data directories.
    //!
    //! FINDESK_HOME resolution order:
    //! 1. FINDESK_HOME environment variable (if set)
    //! 2. ~/.config/findesk (default)
    //! 3. ./.findesk when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the findesk home directory.
    pub fn findesk_home() -> PathBuf {
        if let Ok(home) = std::env::var("FINDESK_HOME")
            && !home.is_empty()
        {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".findesk"),
            |h| h.join(".config").join("findesk"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        findesk_home().join("config.toml")
    }

    /// Returns the directory for rolling log files.
    pub fn logs_dir() -> PathBuf {
        findesk_home().join("logs")
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when RUST_LOG is not set
    pub level: String,
    /// Write to a daily file under ${FINDESK_HOME}/logs instead of stderr
    pub file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: true,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend base URL serving /api/chat and /api/news
    pub base_url: String,

    /// News search timeout in seconds
    pub search_timeout_secs: u64,

    /// Timeout for a whole generation request in seconds (0 disables)
    pub generation_timeout_secs: u64,

    /// Seed new sessions with the assistant greeting
    pub greeting: bool,

    /// Directory for exported reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<String>,

    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            search_timeout_secs: DEFAULT_SEARCH_TIMEOUT_SECS,
            generation_timeout_secs: Self::DEFAULT_GENERATION_TIMEOUT_SECS,
            greeting: true,
            export_dir: None,
            log: LogConfig::default(),
        }
    }
}

impl Config {
    const DEFAULT_BASE_URL: &str = "http://localhost:8000";
    /// Default is disabled
    const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 0;

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Base URL, preferring a non-blank `override_url` (command line or
    /// [`BASE_URL_ENV`]).
    pub fn base_url_with_override(&self, override_url: Option<&str>) -> Result<Url> {
        match override_url.map(str::trim).filter(|v| !v.is_empty()) {
            Some(raw) => parse_base_url(raw).context("Invalid base URL override"),
            None => parse_base_url(&self.base_url).context("Invalid base_url in config"),
        }
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs.max(1))
    }

    pub fn generation_timeout(&self) -> Option<Duration> {
        if self.generation_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.generation_timeout_secs))
        }
    }

    /// Directory for exported reports: `export_dir`, else the Downloads
    /// folder, else the current directory.
    pub fn effective_export_dir(&self) -> PathBuf {
        if let Some(dir) = self.export_dir.as_deref().filter(|d| !d.trim().is_empty()) {
            return expand_home(dir);
        }
        dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Saves only the base_url field to a specific config file path.
    ///
    /// Creates the file from the default template if it doesn't exist.
    /// Preserves existing fields and comments using toml_edit.
    pub fn save_base_url_to(path: &Path, base_url: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let url = parse_base_url(base_url)?;

        let contents = if path.exists() {
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["base_url"] = value(url.as_str().trim_end_matches('/'));

        Self::write_config(path, &doc.to_string())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("'{raw}' is not a valid URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("'{raw}' must use http or https");
    }
    Ok(url)
}

fn expand_home(dir: &str) -> PathBuf {
    if let Some(rest) = dir.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(dir)
}
