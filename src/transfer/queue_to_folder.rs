//! Queue → folder transfer: move queue messages into a directory.
//!
//! One invocation snapshots the source queue and processes every message in
//! arrival order: render a destination filename, decode the body, write the
//! file (overwriting any existing file of the same name), then remove the
//! message from the queue. Removal happens whether or not the write
//! succeeded — once observed, a message is always retired. Oversized
//! messages are never written but are still drained, so a poison message
//! cannot wedge the queue.

use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::queue::QueueClient;
use crate::task::TaskDefinition;
use crate::template::RenderContext;
use crate::transfer::{BatchOutcome, MAX_ITEM_SIZE, TransferError, decode_payload};

/// Moves messages from a source queue into a destination directory.
pub struct QueueToFolderTransfer {
    queue: Arc<dyn QueueClient>,
}

impl QueueToFolderTransfer {
    /// Creates a transfer backed by the given queue client.
    pub fn new(queue: Arc<dyn QueueClient>) -> Self {
        Self { queue }
    }

    /// Runs one invocation for `task`.
    ///
    /// Returns the per-batch counters on success. A failed file write is
    /// logged and counted, but the message is removed from the queue anyway;
    /// there is no re-delivery on this side.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] when the destination directory or source
    /// queue is unavailable, or when a queue operation (snapshot, removal)
    /// fails mid-batch. The remainder of the batch is abandoned; the next
    /// tick re-snapshots.
    pub async fn run(&self, task: &TaskDefinition) -> Result<BatchOutcome, TransferError> {
        debug!(task = task.name(), "queue-to-folder invocation");

        match fs::metadata(task.destination_path()).await {
            Ok(meta) if meta.is_dir() => {}
            _ => {
                return Err(TransferError::DestinationFolderUnavailable {
                    task: task.name().to_owned(),
                    path: task.destination_path().to_owned(),
                });
            }
        }
        if !self.queue.exists(task.source_path()).await {
            return Err(TransferError::QueueUnavailable {
                task: task.name().to_owned(),
                queue: task.source_path().to_owned(),
            });
        }

        let messages = self
            .queue
            .snapshot(task.source_path())
            .await
            .map_err(|source| TransferError::Queue {
                task: task.name().to_owned(),
                source,
            })?;
        if messages.is_empty() {
            debug!(task = task.name(), queue = task.source_path(), "found no messages");
            return Ok(BatchOutcome::default());
        }

        let now = Local::now();
        let mut outcome = BatchOutcome::default();

        for (sequence, message) in messages.iter().enumerate() {
            debug!(
                task = task.name(),
                message_id = %message.id,
                "attempting to write and then remove message"
            );

            let filename = task.name_template().render(&RenderContext {
                timestamp: now,
                sequence: sequence as u32,
                source_name: &message.label,
                task_name: task.name(),
            });
            let destination = Path::new(task.destination_path()).join(&filename);

            if message.body.len() > MAX_ITEM_SIZE {
                warn!(
                    task = task.name(),
                    message_id = %message.id,
                    size = message.body.len(),
                    limit = MAX_ITEM_SIZE,
                    "ignored (and did not write) oversized message"
                );
                outcome.skipped += 1;
            } else {
                outcome.attempted += 1;
                let text = decode_payload(&message.body, task.source_encoding());
                match fs::write(&destination, text).await {
                    Ok(()) => {
                        info!(
                            task = task.name(),
                            message_id = %message.id,
                            file = %destination.display(),
                            encoding = %task.source_encoding(),
                            "wrote message"
                        );
                        outcome.transferred += 1;
                    }
                    Err(e) => {
                        // The message is still removed below; its content is
                        // lost, which this direction accepts by contract.
                        error!(
                            task = task.name(),
                            message_id = %message.id,
                            file = %destination.display(),
                            error = %e,
                            "failed to write message"
                        );
                        outcome.failed += 1;
                    }
                }
            }

            self.queue
                .remove(task.source_path(), &message.id)
                .await
                .map_err(|source| TransferError::Queue {
                    task: task.name().to_owned(),
                    source,
                })?;
            debug!(
                task = task.name(),
                message_id = %message.id,
                label = %message.label,
                "removed message"
            );
        }

        Ok(outcome)
    }
}
