//! Configuration management for the payslip downloader.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the task store inside the schedules directory.
const TASKS_FILE_NAME: &str = "tasks.json";

/// File name of the OAuth access token inside the credentials directory.
const TOKEN_FILE_NAME: &str = "token.json";

/// Largest accepted `gmail.days_back` (about a century).
pub const MAX_DAYS_BACK: u32 = 36_500;

/// Log levels accepted in `general.log_level` (case-insensitive).
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "warning", "error", "critical"];

/// Main application configuration.
///
/// This is loaded from `~/.config/payslip/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General application settings
    pub general: GeneralConfig,
    /// Filesystem locations
    pub paths: PathsConfig,
    /// Gmail API access settings
    pub gmail: GmailConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults if absent.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides, then validate.
    ///
    /// Supports the following environment variables:
    /// - `PAYSLIP_TOKEN_PATH` (or `GMAIL_CREDS_PATH`): OAuth token file
    /// - `DOWNLOAD_BASE_PATH`: root directory for downloaded PDFs
    /// - `PAYSLIP_DATA_DIR`: directory holding credentials, schedules and logs
    /// - `TIMEZONE`: scheduling timezone
    /// - `LOG_LEVEL`: log verbosity
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (normally the process environment).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("PAYSLIP_TOKEN_PATH").or_else(|| lookup("GMAIL_CREDS_PATH")) {
            tracing::debug!("Override paths.token_path from env: {}", val);
            self.paths.token_path = Some(PathBuf::from(val));
        }

        if let Some(val) = lookup("DOWNLOAD_BASE_PATH") {
            tracing::debug!("Override paths.download_root from env: {}", val);
            self.paths.download_root = Some(PathBuf::from(val));
        }

        if let Some(val) = lookup("PAYSLIP_DATA_DIR") {
            tracing::debug!("Override paths.data_dir from env: {}", val);
            self.paths.data_dir = Some(PathBuf::from(val));
        }

        if let Some(val) = lookup("TIMEZONE") {
            tracing::debug!("Override general.timezone from env: {}", val);
            self.general.timezone = val;
        }

        if let Some(val) = lookup("LOG_LEVEL") {
            tracing::debug!("Override general.log_level from env: {}", val);
            self.general.log_level = val;
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for an unknown log level, a
    /// timezone not shaped like `Area/City`, non-positive rate limits, or a
    /// search window longer than [`MAX_DAYS_BACK`].
    pub fn validate(&self) -> ConfigResult<()> {
        let level = self.general.log_level.to_ascii_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_string(),
                reason: format!(
                    "'{}' is not one of {}",
                    self.general.log_level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        if !self.general.timezone.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "general.timezone".to_string(),
                reason: format!(
                    "'{}' is not in Area/City form (e.g. Asia/Jerusalem)",
                    self.general.timezone
                ),
            });
        }

        for (field, rate) in [
            ("gmail.search_calls_per_second", self.gmail.search_calls_per_second),
            ("gmail.download_calls_per_second", self.gmail.download_calls_per_second),
        ] {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("must be a positive number, got {rate}"),
                });
            }
        }

        if self.gmail.days_back > MAX_DAYS_BACK {
            return Err(ConfigError::InvalidValue {
                field: "gmail.days_back".to_string(),
                reason: format!(
                    "must be at most {MAX_DAYS_BACK}, got {}",
                    self.gmail.days_back
                ),
            });
        }

        if self.gmail.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "gmail.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Tracing filter directive for the configured log level.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self.general.log_level.to_ascii_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "warn" | "warning" => "warn",
            "error" | "critical" => "error",
            _ => "info",
        }
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/payslip/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory holding credentials, schedules and logs.
    ///
    /// Defaults to the XDG data directory: `~/.local/share/payslip`
    pub fn data_dir(&self) -> ConfigResult<PathBuf> {
        match &self.paths.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().to_path_buf()),
        }
    }

    /// Directory holding the OAuth token (owner-only).
    pub fn credentials_dir(&self) -> ConfigResult<PathBuf> {
        Ok(self.data_dir()?.join("credentials"))
    }

    /// Directory holding the task store (owner-only).
    pub fn schedules_dir(&self) -> ConfigResult<PathBuf> {
        Ok(self.data_dir()?.join("schedules"))
    }

    /// Directory holding log files (owner-only).
    pub fn log_dir(&self) -> ConfigResult<PathBuf> {
        Ok(self.data_dir()?.join("logs"))
    }

    /// Path of the task store file.
    pub fn tasks_file(&self) -> ConfigResult<PathBuf> {
        Ok(self.schedules_dir()?.join(TASKS_FILE_NAME))
    }

    /// Path of the OAuth access token file.
    pub fn token_path(&self) -> ConfigResult<PathBuf> {
        match &self.paths.token_path {
            Some(path) => Ok(path.clone()),
            None => Ok(self.credentials_dir()?.join(TOKEN_FILE_NAME)),
        }
    }

    /// Root directory for downloaded PDFs.
    ///
    /// Defaults to `~/Documents/Payslips`.
    pub fn download_root(&self) -> ConfigResult<PathBuf> {
        if let Some(root) = &self.paths.download_root {
            return Ok(root.clone());
        }
        let dirs = UserDirs::new().ok_or(ConfigError::NoConfigDir)?;
        let documents = dirs
            .document_dir()
            .map_or_else(|| dirs.home_dir().join("Documents"), Path::to_path_buf);
        Ok(documents.join("Payslips"))
    }

    /// Create every directory the application needs.
    ///
    /// Sensitive directories (credentials, schedules, logs) are created
    /// owner-only (0700); the download root uses standard permissions (0755)
    /// since downloaded documents are not credentials.
    pub fn ensure_directories(&self) -> ConfigResult<()> {
        for dir in [self.credentials_dir()?, self.schedules_dir()?, self.log_dir()?] {
            create_dir_with_mode(&dir, 0o700)?;
        }
        create_dir_with_mode(&self.download_root()?, 0o755)?;
        Ok(())
    }

    /// Year directory for downloads: `<download_root>/<year>`, created 0755.
    pub fn year_dir(&self, year: i32) -> ConfigResult<PathBuf> {
        let dir = self.download_root()?.join(year.to_string());
        create_dir_with_mode(&dir, 0o755)?;
        Ok(dir)
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("com", "payslip", "payslip").ok_or(ConfigError::NoConfigDir)
}

/// Recursively create `dir`; newly created components get `mode` on Unix.
fn create_dir_with_mode(dir: &Path, mode: u32) -> ConfigResult<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(dir)?;
    Ok(())
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Timezone the recurrence expressions are interpreted in (`Area/City`)
    pub timezone: String,
    /// Log level: trace, debug, info, warn or error
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            timezone: "Asia/Jerusalem".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Filesystem locations. Unset entries fall back to platform defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root directory for downloaded PDFs
    pub download_root: Option<PathBuf>,
    /// Directory for credentials, schedules and logs
    pub data_dir: Option<PathBuf>,
    /// OAuth access token file
    pub token_path: Option<PathBuf>,
}

/// Gmail API access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GmailConfig {
    /// Base URL of the Gmail REST API
    pub api_base_url: String,
    /// Mailbox user id (`me` for the authorized account)
    pub user_id: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum search/metadata calls per second
    pub search_calls_per_second: f64,
    /// Maximum attachment downloads per second
    pub download_calls_per_second: f64,
    /// Attempts per remote call before giving up
    pub max_attempts: u32,
    /// How far back a scheduled run searches, in days
    pub days_back: u32,
    /// Message ids requested per result page
    pub page_size: u32,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://gmail.googleapis.com/gmail/v1".to_string(),
            user_id: "me".to_string(),
            timeout_secs: 60,
            search_calls_per_second: 5.0,
            download_calls_per_second: 3.0,
            max_attempts: 5,
            days_back: 30,
            page_size: 100,
        }
    }
}
