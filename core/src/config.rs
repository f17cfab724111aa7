//! Runtime configuration read from the environment.

use std::path::PathBuf;

pub const API_URL_VAR: &str = "TODO_API_URL";
pub const DATA_DIR_VAR: &str = "TODO_DATA_DIR";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_base_url: String,
    /// Where the token file lives. `None` means the platform data directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            data_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            api_base_url: get(API_URL_VAR).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            data_dir: get(DATA_DIR_VAR).map(PathBuf::from),
        }
    }
}
