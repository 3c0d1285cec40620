use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::BackendError;
use crate::persistence::{JsonFileBackend, SqliteBackend, StatsBackend};
use crate::stats::DEFAULT_REVIEW_LIMIT;

/// Storage medium for the stats record
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: BackendKind,
    /// Overrides the default location under the state dir
    pub stats_path: Option<PathBuf>,
    /// Missed questions shown per topic when reviewing
    pub review_limit: usize,
    /// Cap on stored missed questions per topic; `None` keeps everything
    pub missed_retention: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Json,
            stats_path: None,
            review_limit: DEFAULT_REVIEW_LIMIT,
            missed_retention: None,
        }
    }
}

impl Config {
    /// Where the stats record lives for this configuration
    pub fn resolved_stats_path(&self) -> PathBuf {
        if let Some(path) = &self.stats_path {
            return path.clone();
        }
        let default = match self.backend {
            BackendKind::Json => AppDirs::json_path(),
            BackendKind::Sqlite => AppDirs::db_path(),
        };
        default.unwrap_or_else(|| match self.backend {
            BackendKind::Json => PathBuf::from("quizledger_stats.json"),
            BackendKind::Sqlite => PathBuf::from("quizledger_stats.db"),
        })
    }

    /// Build the configured persistence backend
    pub fn open_backend(&self) -> Result<Box<dyn StatsBackend>, BackendError> {
        let path = self.resolved_stats_path();
        Ok(match self.backend {
            BackendKind::Json => Box::new(JsonFileBackend::with_path(path)),
            BackendKind::Sqlite => Box::new(SqliteBackend::open(path)?),
        })
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => warn!("ignoring unreadable config {}: {e}", self.path.display()),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
