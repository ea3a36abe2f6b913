//! Configuration
//!
//! Runtime settings shared by the CLI and the HTTP server: which store
//! backend to use and where it lives.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default collection holding documents and problems.
pub const DEFAULT_COLLECTION: &str = "tutor_documents";

/// Default address of the remote vector service.
pub const DEFAULT_REMOTE_URL: &str = "http://127.0.0.1:8000";

/// Store backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Embedded store persisted as a JSON snapshot on disk.
    Local,
    /// Chroma-compatible REST service.
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub backend: Backend,
    pub data_dir: PathBuf,
    pub remote_url: String,
    pub collection: String,
}

impl Config {
    pub fn local(data_dir: PathBuf) -> Self {
        Self {
            backend: Backend::Local,
            data_dir,
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::local(default_data_dir())
    }
}

/// Platform data directory for the local store, falling back to the current
/// directory when the platform reports none.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tutorvault")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_local() {
        let config = Config::default();
        assert_eq!(config.backend, Backend::Local);
        assert_eq!(config.collection, DEFAULT_COLLECTION);
        assert!(config.data_dir.ends_with("tutorvault"));
    }

    #[test]
    fn test_backend_serde_is_lowercase() {
        let backend: Backend = serde_json::from_str("\"remote\"").unwrap();
        assert_eq!(backend, Backend::Remote);
        assert_eq!(serde_json::to_string(&Backend::Local).unwrap(), "\"local\"");
    }
}
