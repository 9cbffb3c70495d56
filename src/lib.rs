//! # mqbridge
//!
//! A scheduled, bidirectional transfer engine between message queues and
//! filesystem directories. Named tasks each poll on their own interval and
//! move items one way: files from a folder into a queue, or messages from a
//! queue into a folder, with per-item failure isolation and templated
//! destination names.
//!
//! The queue transport is abstracted behind [`queue::QueueClient`]; an
//! in-memory implementation ships with the crate.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mqbridge::config::load_tasks;
//! use mqbridge::queue::InMemoryQueue;
//! use mqbridge::scheduler::Scheduler;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tasks = load_tasks("tasks.json")?;
//!     let queue = Arc::new(InMemoryQueue::new());
//!     queue.create_queue("inbound").await;
//!
//!     let scheduler = Scheduler::schedule(tasks, queue)?;
//!     // Run until it is time to stop (a signal handler in a real binary).
//!     tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
//!     scheduler.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod queue;
pub mod scheduler;
pub mod task;
pub mod template;
pub mod transfer;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::{BridgeConfig, ConfigError, load_tasks};
pub use queue::{InMemoryQueue, QueueClient, QueueError, QueueMessage};
pub use scheduler::{ScheduleError, Scheduler};
pub use task::{Direction, SourceEncoding, TaskDefinition, TaskSpec, ValidationError};
pub use template::{DEFAULT_NAME_TEMPLATE, NameTemplate, RenderContext};
pub use transfer::{
    BatchOutcome, FolderToQueueTransfer, MAX_ITEM_SIZE, QueueToFolderTransfer, TransferError,
};
