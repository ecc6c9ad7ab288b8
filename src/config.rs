//! Configuration file for indexing and search tuning.
//!
//! Configuration is optional and only read when `--config <path>` is given.
//! Every key has a default, so a partial file is fine.
//!
//! # Example Configuration
//!
//! ```toml
//! db_path = "/var/lib/mailsearch/enron.db"
//!
//! [index]
//! batch_size = 5000
//! max_records = 0          # 0 disables the ceiling
//!
//! [search]
//! limit = 20
//! related = "shared-terms"
//!
//! [fuzzy]
//! max_edit_distance = 1
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::search::fuzzy::FuzzyConfig;
use crate::search::related::RelatedStrategy;

/// Default database file, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "mail_search.db";

/// Records committed per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Hard ceiling on processed records per ingestion run.
pub const DEFAULT_MAX_RECORDS: u64 = 500_000;

/// Minimum normalized body length for a message to be indexed.
pub const DEFAULT_MIN_BODY_CHARS: usize = 50;

/// Ranked results printed per search.
pub const DEFAULT_RESULT_LIMIT: usize = 10;

/// Related documents printed per search.
pub const DEFAULT_RELATED_LIMIT: usize = 5;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding the index.
    pub db_path: PathBuf,
    pub index: IndexConfig,
    pub search: SearchConfig,
    pub fuzzy: FuzzyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            index: IndexConfig::default(),
            search: SearchConfig::default(),
            fuzzy: FuzzyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub batch_size: usize,
    /// `0` means unlimited.
    pub max_records: u64,
    pub min_body_chars: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_records: DEFAULT_MAX_RECORDS,
            min_body_chars: DEFAULT_MIN_BODY_CHARS,
        }
    }
}

impl IndexConfig {
    pub fn record_ceiling(&self) -> Option<u64> {
        (self.max_records > 0).then_some(self.max_records)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub limit: usize,
    pub related_limit: usize,
    pub related: RelatedStrategy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RESULT_LIMIT,
            related_limit: DEFAULT_RELATED_LIMIT,
            related: RelatedStrategy::default(),
        }
    }
}

impl Config {
    /// Load configuration from a specific path.
    ///
    /// Returns the defaults if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Load from `path` when given, otherwise use the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index.batch_size == 0 {
            return Err(ConfigError::Validation(
                "index.batch_size must be greater than zero".into(),
            ));
        }
        if self.search.limit == 0 {
            return Err(ConfigError::Validation(
                "search.limit must be greater than zero".into(),
            ));
        }
        if self.fuzzy.min_term_chars == 0 {
            return Err(ConfigError::Validation(
                "fuzzy.min_term_chars must be greater than zero".into(),
            ));
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation("db_path cannot be empty".into()));
        }
        Ok(())
    }
}
