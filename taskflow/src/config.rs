//! Configuration system for the `TaskFlow` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskflow/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

use taskflow_proto::task::{Category, Priority, Recurrence, TaskId};

use crate::prefs::SortOrder;

/// Errors that can occur when loading client configuration.
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
}

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    remote: RemoteFileConfig,
    storage: StorageFileConfig,
    sync: SyncFileConfig,
}

/// `[remote]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct RemoteFileConfig {
    hub_url: Option<String>,
    account: Option<String>,
}

/// `[storage]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StorageFileConfig {
    cache_dir: Option<PathBuf>,
}

/// `[sync]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    undo_window_secs: Option<u64>,
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Local-first task tracker with optional hub sync")]
pub struct CliArgs {
    /// WebSocket URL of the sync hub (e.g. `ws://127.0.0.1:9100/ws`).
    #[arg(long, env = "TASKFLOW_HUB_URL")]
    pub hub_url: Option<String>,

    /// Account to sync as. Requires `--hub-url`.
    #[arg(long, env = "TASKFLOW_ACCOUNT")]
    pub account: Option<String>,

    /// Directory for the local task cache.
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Seconds during which a deletion can be undone.
    #[arg(long)]
    pub undo_window_secs: Option<u64>,

    /// Path to config file (default: `~/.config/taskflow/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn", env = "TASKFLOW_LOG")]
    pub log_level: String,

    /// What to do; defaults to `list`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Add a task.
    Add {
        /// Task title.
        title: String,

        /// Optional longer description.
        #[arg(long, short)]
        description: Option<String>,

        /// Due date as YYYY-MM-DD.
        #[arg(long)]
        due: Option<NaiveDate>,

        /// Priority: high, medium, or low.
        #[arg(long, default_value_t = Priority::Medium)]
        priority: Priority,

        /// Category: personal, work, health, shopping, or other.
        #[arg(long, default_value_t = Category::Personal)]
        category: Category,

        /// Recurrence: none, daily, weekly, monthly, or yearly.
        #[arg(long, default_value_t = Recurrence::None)]
        recurrence: Recurrence,
    },

    /// List tasks.
    List {
        /// Sort order: dueDate, priority, or created. Persisted for
        /// subsequent runs.
        #[arg(long)]
        sort: Option<SortOrder>,
    },

    /// Toggle a task's completion state.
    Done {
        /// Id of the task to toggle.
        id: TaskId,
    },

    /// Delete a task.
    Rm {
        /// Id of the task to delete.
        id: TaskId,
    },

    /// Stay connected and print each remote refresh as it lands.
    Watch,
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hub WebSocket URL, if syncing is configured.
    pub hub_url: Option<String>,
    /// Account to sync as, if syncing is configured.
    pub account: Option<String>,
    /// Directory holding the local cache files.
    pub cache_dir: PathBuf,
    /// How long a deletion stays undoable.
    pub undo_window: Duration,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hub_url: None,
            account: None,
            cache_dir: default_cache_dir(),
            undo_window: Duration::from_secs(5),
            log_level: "warn".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and a missing
    /// file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            hub_url: cli.hub_url.clone().or_else(|| file.remote.hub_url.clone()),
            account: cli.account.clone().or_else(|| file.remote.account.clone()),
            cache_dir: cli
                .cache_dir
                .clone()
                .or_else(|| file.storage.cache_dir.clone())
                .unwrap_or(defaults.cache_dir),
            undo_window: cli
                .undo_window_secs
                .or(file.sync.undo_window_secs)
                .map_or(defaults.undo_window, Duration::from_secs),
            log_level: cli.log_level.clone(),
        }
    }

    /// Hub URL and account together, when syncing is fully configured.
    ///
    /// Returns `None` if either half is missing (local-only mode).
    #[must_use]
    pub fn sync_target(&self) -> Option<(String, String)> {
        let hub_url = self.hub_url.clone()?;
        let account = self.account.clone()?;
        if account.is_empty() {
            return None;
        }
        Some((hub_url, account))
    }
}

/// The default cache directory, under the platform data dir.
fn default_cache_dir() -> PathBuf {
    dirs::data_dir().map_or_else(|| PathBuf::from(".taskflow"), |d| d.join("taskflow"))
}

/// Load and parse a TOML config file for the client.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("taskflow").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
