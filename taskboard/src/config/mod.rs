//! Configuration system for the task board.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskboard/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::service::http::DEFAULT_REQUEST_TIMEOUT;
use crate::tasks::DEFAULT_POLL_INTERVAL;
use taskboard_proto::task::MAX_TASK_TITLE_LENGTH;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// The server base URL is not a valid absolute URL.
    #[error("invalid server url {url:?}: {source}")]
    InvalidUrl {
        /// Value as configured.
        url: String,
        /// Parse failure.
        source: url::ParseError,
    },

    /// A setting is outside its allowed range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Setting name as written in the config file.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    board: BoardFileConfig,
    filters: FiltersFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// `[board]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BoardFileConfig {
    poll_interval_secs: Option<u64>,
    max_task_title_len: Option<usize>,
    change_buffer: Option<usize>,
}

/// `[filters]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct FiltersFileConfig {
    store_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved board configuration.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    // -- Server --
    /// Base URL of the REST task service.
    pub base_url: Option<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,

    // -- Board --
    /// Interval between snapshot polls.
    pub poll_interval: Duration,
    /// Maximum task title length in characters.
    pub max_task_title_len: usize,
    /// Buffer size for the watcher's render channel.
    pub change_buffer: usize,

    // -- Filters --
    /// File the filter state is persisted to. `None` keeps filters in memory.
    pub filter_store_path: Option<PathBuf>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_task_title_len: MAX_TASK_TITLE_LENGTH,
            change_buffer: 64,
            filter_store_path: crate::persist::JsonFileStore::default_path(),
        }
    }
}

impl BoardConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// CLI args and env vars are parsed via `clap`. If `--config` is given
    /// and the file does not exist, returns an error. If no `--config` is
    /// given, the default path (`~/.config/taskboard/config.toml`) is tried
    /// and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed, or if a resolved setting is out of range.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `BoardConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. Intervals, timeouts and sizes must be
    /// non-zero.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            base_url: cli
                .server_url
                .clone()
                .or_else(|| file.server.base_url.clone()),
            request_timeout: file
                .server
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            poll_interval: cli
                .poll_interval_secs
                .or(file.board.poll_interval_secs)
                .map_or(defaults.poll_interval, Duration::from_secs),
            max_task_title_len: file
                .board
                .max_task_title_len
                .unwrap_or(defaults.max_task_title_len),
            change_buffer: file
                .board
                .change_buffer
                .unwrap_or(defaults.change_buffer),
            filter_store_path: file
                .filters
                .store_path
                .clone()
                .or(defaults.filter_store_path),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let zero = |field| ConfigError::InvalidValue {
            field,
            reason: "must be greater than zero",
        };
        if self.poll_interval.is_zero() {
            return Err(zero("poll_interval_secs"));
        }
        if self.request_timeout.is_zero() {
            return Err(zero("request_timeout_secs"));
        }
        if self.change_buffer == 0 {
            return Err(zero("change_buffer"));
        }
        if self.max_task_title_len == 0 {
            return Err(zero("max_task_title_len"));
        }
        Ok(())
    }

    /// Parses the configured server URL.
    ///
    /// Returns `Ok(None)` when no server is configured.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidUrl`] if the URL does not parse.
    pub fn server_url(&self) -> Result<Option<Url>, ConfigError> {
        self.base_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
                    url: raw.to_string(),
                    source,
                })
            })
            .transpose()
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Watch a task board and print its columns")]
pub struct CliArgs {
    /// Base URL of the REST task service.
    #[arg(long, env = "TASKBOARD_SERVER_URL")]
    pub server_url: Option<String>,

    /// Seconds between snapshot polls.
    #[arg(long, env = "TASKBOARD_POLL_INTERVAL")]
    pub poll_interval_secs: Option<u64>,

    /// Path to config file (default: `~/.config/taskboard/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKBOARD_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/taskboard.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// `~/.config/taskboard/config.toml`, if the platform has a config dir.
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("taskboard").join("config.toml"))
}

/// Reads the TOML config.
///
/// An explicit path must exist. The default path may be absent, and so may
/// the platform config dir; both yield an empty config.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    let (path, required) = match explicit_path {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return Ok(ConfigFile::default()),
        },
    };

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ConfigFile::default());
        }
        Err(source) => return Err(ConfigError::ReadFile { path, source }),
    };
    Ok(toml::from_str(&contents)?)
}
