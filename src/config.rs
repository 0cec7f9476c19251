#![forbid(unsafe_code)]

//! Search limits and their TOML configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum nesting depth of a filter tree.
pub const DEFAULT_MAX_DEPTH: usize = 256;
/// Maximum number of nodes in a filter tree.
pub const DEFAULT_MAX_NODES: usize = 10_000;
/// Maximum number of literals in one `In`/`NotIn` list.
pub const DEFAULT_MAX_IN_VALUES: usize = 10_000;
/// Maximum page size a request may ask for.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 1_000;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "FORUMQL_CONFIG";

/// Limits and defaults applied to every search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchOptions {
    /// Deepest filter nesting accepted.
    pub max_depth: usize,
    /// Largest filter node count accepted.
    pub max_nodes: usize,
    /// Longest `In`/`NotIn` literal list accepted.
    pub max_in_values: usize,
    /// Largest `count` a request may ask for.
    pub max_page_size: u32,
    /// Whether [`search`](crate::query::executor::SearchExecutor::search) runs the count query.
    pub include_total_by_default: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
            max_in_values: DEFAULT_MAX_IN_VALUES,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            include_total_by_default: true,
        }
    }
}

impl SearchOptions {
    /// Parses options from TOML text; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse { path: None, source })
    }

    /// Reads options from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    /// Loads options from `explicit`, else `$FORUMQL_CONFIG`, else the user
    /// config directory. A missing implicit file yields the defaults; a
    /// missing explicit file is an error.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let implicit = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(default_config_path);
        match implicit {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Default location of the configuration file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("forumql").join("search.toml"))
}

/// Failures while loading [`SearchOptions`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read search config {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`SearchOptions`].
    #[error("failed to parse search config{}: {source}", display_path(.path))]
    Parse {
        /// File that failed, when loaded from disk.
        path: Option<PathBuf>,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" {}", p.display()))
        .unwrap_or_default()
}
