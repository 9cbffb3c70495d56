//! Configuration loading — turn a task-list file into validated definitions.
//!
//! The on-disk format is a JSON document with a single `tasks` array; each
//! entry carries the raw fields of a [`TaskSpec`]:
//!
//! ```json
//! {
//!   "tasks": [
//!     {
//!       "name": "from-queue",
//!       "poll_interval_ms": "200",
//!       "source": { "kind": "Queue", "path": "inbound" },
//!       "destination": { "kind": "Folder", "path": "/var/spool/inbound" }
//!     }
//!   ]
//! }
//! ```
//!
//! Loading is strict: an unreadable or malformed file, an empty task list, or
//! any task failing validation aborts startup with a [`ConfigError`]. Nothing
//! is scheduled on a partially valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::{TaskDefinition, TaskSpec, ValidationError};

/// Errors raised while loading and validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file `{path}` — is it valid JSON?")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("config file is valid but contains no tasks")]
    NoTasks,

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// The deserialized shape of a task-list file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Raw task entries, in file order.
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
}

impl BridgeConfig {
    /// Validates every entry, preserving file order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoTasks`] for an empty list, or the first
    /// [`ValidationError`] encountered.
    pub fn into_tasks(self) -> Result<Vec<TaskDefinition>, ConfigError> {
        if self.tasks.is_empty() {
            return Err(ConfigError::NoTasks);
        }
        self.tasks
            .iter()
            .map(|spec| TaskDefinition::validate(spec).map_err(ConfigError::from))
            .collect()
    }
}

/// Reads and validates the task-list file at `path`.
///
/// This is a synchronous, startup-time operation.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or parsed, contains
/// no tasks, or contains an invalid task.
pub fn load_tasks(path: impl AsRef<Path>) -> Result<Vec<TaskDefinition>, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config: BridgeConfig =
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    config.into_tasks()
}
