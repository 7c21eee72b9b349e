//! Path management for Revere's local files.
//!
//! ```text
//! ~/.config/revere/            # Config directory (platform config dir)
//! ├── config.toml              # Application configuration
//! ├── state.toml               # Last selected organization
//! ├── session.toml             # Backend session (live mode)
//! └── logs/                    # Application logs
//!     └── revere.log.YYYY-MM-DD
//! ```
//!
//! The root can be overridden (CLI `--config`, tests); every other path is
//! derived from it.

use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "revere";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Platform config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for revere_core::RevereError {
    fn from(err: PathError) -> Self {
        revere_core::RevereError::config(err.to_string())
    }
}

/// Resolved locations of every file Revere reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverePaths {
    root: PathBuf,
}

impl ReverePaths {
    /// Resolves the config directory, or uses `root` when given.
    pub fn new(root: Option<PathBuf>) -> Result<Self, PathError> {
        let root = match root {
            Some(root) => root,
            None => dirs::config_dir()
                .ok_or(PathError::ConfigDirNotFound)?
                .join(APP_DIR_NAME),
        };
        Ok(Self { root })
    }

    /// Paths rooted at `root`.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn config_dir(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.join("state.toml")
    }

    pub fn session_file(&self) -> PathBuf {
        self.root.join("session.toml")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}
