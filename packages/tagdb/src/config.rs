//! TagDbConfig - where the database lives and how it persists.
//!
//! Read from a JSON file; every field has a default, so `{}` is a valid
//! config.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default snapshot file name inside `root`.
pub const DEFAULT_SNAPSHOT_FILE: &str = ".tagfs_db.meta";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDbConfig {
    /// Directory holding the backing objects and the snapshot.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Snapshot file name, relative to `root` unless absolute.
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,

    /// Persist the snapshot after every successful mutation.
    #[serde(default = "default_autosave")]
    pub autosave: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_snapshot_file() -> String {
    DEFAULT_SNAPSHOT_FILE.to_string()
}

fn default_autosave() -> bool {
    true
}

impl Default for TagDbConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            snapshot_file: default_snapshot_file(),
            autosave: default_autosave(),
        }
    }
}

impl TagDbConfig {
    /// Config rooted at `root` with the other fields defaulted.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let config = Self::from_json(&fs::read_to_string(path)?)?;
        tracing::debug!(path = %path.display(), root = %config.root.display(), "config loaded");
        Ok(config)
    }

    /// Full path of the snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(&self.snapshot_file)
    }
}
