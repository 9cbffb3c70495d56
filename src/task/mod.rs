//! Task definitions — validated, immutable descriptions of one transfer.
//!
//! A [`TaskSpec`] carries the raw, stringly fields exactly as they arrive
//! from external configuration. [`TaskDefinition::validate`] checks them in a
//! fixed order (first failure wins), applies defaults, derives the transfer
//! [`Direction`] from the endpoint kinds, and produces a [`TaskDefinition`]
//! that never changes for the lifetime of the engine. Per-invocation values
//! such as a rendered destination name are computed fresh each tick and never
//! stored back here.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::template::{DEFAULT_NAME_TEMPLATE, NameTemplate};

/// Validation failures, one variant per rule, reported in rule order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("task name must not be blank")]
    BlankName,

    #[error("task `{task}`: poll_interval_ms must not be blank")]
    BlankInterval { task: String },

    #[error("task `{task}`: poll_interval_ms `{value}` is not a positive integer")]
    InvalidInterval { task: String, value: String },

    #[error("task `{task}`: source path must not be blank")]
    BlankSourcePath { task: String },

    #[error("task `{task}`: destination path must not be blank")]
    BlankDestinationPath { task: String },

    #[error("task `{task}`: source encoding must be `ASCII` or `Unicode`, got `{value}`")]
    InvalidEncoding { task: String, value: String },

    #[error("task `{task}`: transactional flag must be blank or `1`, got `{value}`")]
    InvalidTransactional { task: String, value: String },

    #[error("task `{task}`: unsupported pairing `{source_kind}` -> `{destination_kind}`")]
    UnsupportedPairing {
        task: String,
        source_kind: String,
        destination_kind: String,
    },
}

/// Which way a task moves items.
///
/// Derived from the source and destination endpoint kinds; exactly one side
/// must be the queue and the other the folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Files are picked up from a directory and sent to a queue.
    FolderToQueue,
    /// Messages are drained from a queue and written into a directory.
    QueueToFolder,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FolderToQueue => "folder-to-queue",
            Self::QueueToFolder => "queue-to-folder",
        })
    }
}

/// How source payload bytes are interpreted as text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceEncoding {
    /// 7-bit ASCII; bytes outside the range decode to `?`.
    Ascii,
    /// UTF-16 little-endian, the reference wire encoding.
    #[default]
    Unicode,
}

impl SourceEncoding {
    /// Returns the configuration spelling of this encoding.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ascii => "ASCII",
            Self::Unicode => "Unicode",
        }
    }
}

impl fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceEncoding {
    type Err = ();

    // Exact match only; configuration is case-sensitive here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASCII" => Ok(Self::Ascii),
            "Unicode" => Ok(Self::Unicode),
            _ => Err(()),
        }
    }
}

/// The kind of location an endpoint names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Queue,
    Folder,
}

impl FromStr for EndpointKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Queue" => Ok(Self::Queue),
            "Folder" => Ok(Self::Folder),
            _ => Err(()),
        }
    }
}

/// Raw endpoint fields as read from configuration.
///
/// `encoding` is only meaningful on a source, `name_template` and
/// `transactional` only on a destination; unused fields stay blank.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EndpointSpec {
    /// `"Queue"` or `"Folder"`.
    pub kind: String,
    /// Directory path or queue address.
    pub path: String,
    /// `"ASCII"`, `"Unicode"`, or blank for the default.
    #[serde(default)]
    pub encoding: String,
    /// Destination-name template, or blank for the default.
    #[serde(default)]
    pub name_template: String,
    /// `"1"` to wrap queue sends in a transaction, blank otherwise.
    #[serde(default)]
    pub transactional: String,
}

/// Raw task fields as read from configuration, prior to validation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TaskSpec {
    /// User-provided task name.
    pub name: String,
    /// Polling interval in milliseconds, as an unparsed string.
    #[serde(default)]
    pub poll_interval_ms: String,
    /// Where items come from.
    pub source: EndpointSpec,
    /// Where items go.
    pub destination: EndpointSpec,
}

/// A validated, immutable transfer task.
///
/// Built once at startup via [`TaskDefinition::validate`]; the scheduler and
/// the transfer components only ever read it.
///
/// # Examples
///
/// ```
/// use mqbridge::task::{Direction, EndpointSpec, TaskDefinition, TaskSpec};
///
/// let task = TaskDefinition::validate(&TaskSpec {
///     name: "inbound".into(),
///     poll_interval_ms: "200".into(),
///     source: EndpointSpec {
///         kind: "Queue".into(),
///         path: "orders".into(),
///         ..Default::default()
///     },
///     destination: EndpointSpec {
///         kind: "Folder".into(),
///         path: "/var/spool/orders".into(),
///         ..Default::default()
///     },
/// })
/// .unwrap();
///
/// assert_eq!(task.direction(), Direction::QueueToFolder);
/// assert_eq!(task.poll_interval().as_millis(), 200);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    name: String,
    poll_interval: Duration,
    direction: Direction,
    source_path: String,
    destination_path: String,
    source_encoding: SourceEncoding,
    name_template: NameTemplate,
    transactional: bool,
}

impl TaskDefinition {
    /// Validates raw task fields into a [`TaskDefinition`].
    ///
    /// Rules are checked in a fixed order and the first failure wins:
    ///
    /// 1. `name` must be non-blank.
    /// 2. `poll_interval_ms` must be non-blank and parse as a positive integer.
    /// 3. `source.path` must be non-blank.
    /// 4. `destination.path` must be non-blank.
    /// 5. A blank `destination.name_template` resolves to
    ///    [`DEFAULT_NAME_TEMPLATE`].
    /// 6. A blank `source.encoding` resolves to `Unicode`; anything else must
    ///    be exactly `ASCII` or `Unicode`.
    /// 7. `destination.transactional` must be blank (off) or `1` (on).
    ///
    /// Finally the direction is derived: a queue source with a folder
    /// destination is [`Direction::QueueToFolder`], the reverse pairing is
    /// [`Direction::FolderToQueue`], and any other combination is rejected.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] for the first rule violated.
    pub fn validate(spec: &TaskSpec) -> Result<Self, ValidationError> {
        if spec.name.is_empty() {
            return Err(ValidationError::BlankName);
        }
        let task = spec.name.clone();

        if spec.poll_interval_ms.is_empty() {
            return Err(ValidationError::BlankInterval { task });
        }
        let interval_ms: u64 = match spec.poll_interval_ms.parse() {
            Ok(ms) if ms >= 1 => ms,
            _ => {
                return Err(ValidationError::InvalidInterval {
                    task,
                    value: spec.poll_interval_ms.clone(),
                });
            }
        };

        if spec.source.path.is_empty() {
            return Err(ValidationError::BlankSourcePath { task });
        }
        if spec.destination.path.is_empty() {
            return Err(ValidationError::BlankDestinationPath { task });
        }

        let name_template = if spec.destination.name_template.is_empty() {
            NameTemplate::new(DEFAULT_NAME_TEMPLATE)
        } else {
            NameTemplate::new(spec.destination.name_template.clone())
        };

        let source_encoding = if spec.source.encoding.is_empty() {
            SourceEncoding::default()
        } else {
            spec.source.encoding.parse().map_err(|()| {
                ValidationError::InvalidEncoding {
                    task: task.clone(),
                    value: spec.source.encoding.clone(),
                }
            })?
        };

        let transactional = match spec.destination.transactional.as_str() {
            "" => false,
            "1" => true,
            other => {
                return Err(ValidationError::InvalidTransactional {
                    task,
                    value: other.to_owned(),
                });
            }
        };

        let direction = match (
            spec.source.kind.parse::<EndpointKind>(),
            spec.destination.kind.parse::<EndpointKind>(),
        ) {
            (Ok(EndpointKind::Queue), Ok(EndpointKind::Folder)) => Direction::QueueToFolder,
            (Ok(EndpointKind::Folder), Ok(EndpointKind::Queue)) => Direction::FolderToQueue,
            _ => {
                return Err(ValidationError::UnsupportedPairing {
                    task,
                    source_kind: spec.source.kind.clone(),
                    destination_kind: spec.destination.kind.clone(),
                });
            }
        };

        Ok(Self {
            name: spec.name.clone(),
            poll_interval: Duration::from_millis(interval_ms),
            direction,
            source_path: spec.source.path.clone(),
            destination_path: spec.destination.path.clone(),
            source_encoding,
            name_template,
            transactional,
        })
    }

    /// Returns the task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the polling interval.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Returns the transfer direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the source location (directory path or queue address).
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// Returns the destination location (directory path or queue address).
    pub fn destination_path(&self) -> &str {
        &self.destination_path
    }

    /// Returns how source payload bytes are decoded.
    pub fn source_encoding(&self) -> SourceEncoding {
        self.source_encoding
    }

    /// Returns the resolved destination-name template.
    pub fn name_template(&self) -> &NameTemplate {
        &self.name_template
    }

    /// Returns `true` if queue sends are wrapped in a transaction.
    pub fn transactional(&self) -> bool {
        self.transactional
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder_to_queue_spec() -> TaskSpec {
        TaskSpec {
            name: "outbound".into(),
            poll_interval_ms: "200".into(),
            source: EndpointSpec {
                kind: "Folder".into(),
                path: "/var/spool/out".into(),
                ..Default::default()
            },
            destination: EndpointSpec {
                kind: "Queue".into(),
                path: "orders".into(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn valid_spec_round_trips() {
        let task = TaskDefinition::validate(&folder_to_queue_spec()).unwrap();
        assert_eq!(task.name(), "outbound");
        assert_eq!(task.poll_interval(), Duration::from_millis(200));
        assert_eq!(task.direction(), Direction::FolderToQueue);
        assert_eq!(task.source_encoding(), SourceEncoding::Unicode);
        assert!(!task.transactional());
    }

    #[test]
    fn blank_name_rejected_first() {
        let mut spec = folder_to_queue_spec();
        spec.name.clear();
        spec.poll_interval_ms.clear(); // would also fail, but name wins
        assert_eq!(
            TaskDefinition::validate(&spec),
            Err(ValidationError::BlankName)
        );
    }

    #[test]
    fn interval_must_parse() {
        let mut spec = folder_to_queue_spec();
        spec.poll_interval_ms = "abc".into();
        assert!(matches!(
            TaskDefinition::validate(&spec),
            Err(ValidationError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn interval_must_be_positive() {
        let mut spec = folder_to_queue_spec();
        spec.poll_interval_ms = "0".into();
        assert!(matches!(
            TaskDefinition::validate(&spec),
            Err(ValidationError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn interval_accepts_plain_integer() {
        let mut spec = folder_to_queue_spec();
        spec.poll_interval_ms = "200".into();
        let task = TaskDefinition::validate(&spec).unwrap();
        assert_eq!(task.poll_interval(), Duration::from_millis(200));
    }

    #[test]
    fn blank_paths_rejected_in_order() {
        let mut spec = folder_to_queue_spec();
        spec.source.path.clear();
        spec.destination.path.clear();
        assert!(matches!(
            TaskDefinition::validate(&spec),
            Err(ValidationError::BlankSourcePath { .. })
        ));
    }

    #[test]
    fn blank_template_resolves_to_default() {
        let task = TaskDefinition::validate(&folder_to_queue_spec()).unwrap();
        assert_eq!(task.name_template().pattern(), DEFAULT_NAME_TEMPLATE);
    }

    #[test]
    fn explicit_template_is_kept() {
        let mut spec = folder_to_queue_spec();
        spec.destination.name_template = "[GUID].xml".into();
        let task = TaskDefinition::validate(&spec).unwrap();
        assert_eq!(task.name_template().pattern(), "[GUID].xml");
    }

    #[test]
    fn unknown_encoding_rejected() {
        let mut spec = folder_to_queue_spec();
        spec.source.encoding = "UTF7".into();
        assert!(matches!(
            TaskDefinition::validate(&spec),
            Err(ValidationError::InvalidEncoding { .. })
        ));
    }

    #[test]
    fn blank_encoding_defaults_to_unicode() {
        let task = TaskDefinition::validate(&folder_to_queue_spec()).unwrap();
        assert_eq!(task.source_encoding(), SourceEncoding::Unicode);
    }

    #[test]
    fn ascii_encoding_accepted() {
        let mut spec = folder_to_queue_spec();
        spec.source.encoding = "ASCII".into();
        let task = TaskDefinition::validate(&spec).unwrap();
        assert_eq!(task.source_encoding(), SourceEncoding::Ascii);
    }

    #[test]
    fn transactional_marker() {
        let mut spec = folder_to_queue_spec();
        spec.destination.transactional = "1".into();
        assert!(TaskDefinition::validate(&spec).unwrap().transactional());

        spec.destination.transactional = "yes".into();
        assert!(matches!(
            TaskDefinition::validate(&spec),
            Err(ValidationError::InvalidTransactional { .. })
        ));
    }

    #[test]
    fn direction_derivation() {
        let task = TaskDefinition::validate(&folder_to_queue_spec()).unwrap();
        assert_eq!(task.direction(), Direction::FolderToQueue);

        let mut spec = folder_to_queue_spec();
        spec.source.kind = "Queue".into();
        spec.destination.kind = "Folder".into();
        let task = TaskDefinition::validate(&spec).unwrap();
        assert_eq!(task.direction(), Direction::QueueToFolder);
    }

    #[test]
    fn same_kind_pairing_rejected() {
        let mut spec = folder_to_queue_spec();
        spec.destination.kind = "Folder".into();
        assert!(matches!(
            TaskDefinition::validate(&spec),
            Err(ValidationError::UnsupportedPairing { .. })
        ));
    }

    #[test]
    fn unknown_kind_rejected() {
        let mut spec = folder_to_queue_spec();
        spec.source.kind = "Smtp".into();
        assert!(matches!(
            TaskDefinition::validate(&spec),
            Err(ValidationError::UnsupportedPairing { .. })
        ));
    }
}
