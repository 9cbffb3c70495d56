//! Folder → queue transfer: move files from a directory into a queue.
//!
//! One invocation lists the source directory (non-recursive, files only),
//! sorts entries oldest-first by modification time for FIFO-ish delivery,
//! skips partial files still being written, and then sends each remaining
//! file's decoded contents to the destination queue under a freshly rendered
//! label. A file is deleted only after its send succeeded; a failed send
//! leaves it in place so the next tick retries it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use chrono::Local;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::queue::QueueClient;
use crate::task::TaskDefinition;
use crate::template::RenderContext;
use crate::transfer::{BatchOutcome, MAX_ITEM_SIZE, PARTIAL_FILE_SUFFIX, TransferError, decode_payload};

// One directory entry eligible for processing.
struct SourceFile {
    path: PathBuf,
    name: String,
    len: u64,
    modified: SystemTime,
}

/// Moves files from a source directory into a destination queue.
///
/// The client is shared; the transfer itself is stateless between
/// invocations, so one instance can serve every tick of a task.
pub struct FolderToQueueTransfer {
    queue: Arc<dyn QueueClient>,
}

impl FolderToQueueTransfer {
    /// Creates a transfer backed by the given queue client.
    pub fn new(queue: Arc<dyn QueueClient>) -> Self {
        Self { queue }
    }

    /// Runs one invocation for `task`.
    ///
    /// Returns the per-batch counters on success. Per-item send failures are
    /// logged, leave the source file in place, and do not abort the batch.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] when the source directory or destination
    /// queue is unavailable, or when the directory cannot be listed. The
    /// caller is expected to log the error and retry on the next tick.
    pub async fn run(&self, task: &TaskDefinition) -> Result<BatchOutcome, TransferError> {
        debug!(task = task.name(), "folder-to-queue invocation");

        match fs::metadata(task.source_path()).await {
            Ok(meta) if meta.is_dir() => {}
            _ => {
                return Err(TransferError::SourceFolderUnavailable {
                    task: task.name().to_owned(),
                    path: task.source_path().to_owned(),
                });
            }
        }
        if !self.queue.exists(task.destination_path()).await {
            return Err(TransferError::QueueUnavailable {
                task: task.name().to_owned(),
                queue: task.destination_path().to_owned(),
            });
        }

        let mut files = list_files(task).await?;
        if files.is_empty() {
            debug!(task = task.name(), path = task.source_path(), "found no files");
            return Ok(BatchOutcome::default());
        }

        // Oldest first; the stable sort keeps listing order for ties.
        files.sort_by_key(|f| f.modified);

        let now = Local::now();
        let mut sequence: u32 = 0;
        let mut outcome = BatchOutcome::default();

        for file in &files {
            if file.name.ends_with(PARTIAL_FILE_SUFFIX) {
                debug!(task = task.name(), file = %file.path.display(), "ignoring partial file");
                outcome.skipped += 1;
                continue;
            }
            if file.len > MAX_ITEM_SIZE as u64 {
                warn!(
                    task = task.name(),
                    file = %file.path.display(),
                    size = file.len,
                    limit = MAX_ITEM_SIZE,
                    "skipping oversized file; it will not be retried until it shrinks"
                );
                outcome.skipped += 1;
                continue;
            }

            let label = task.name_template().render(&RenderContext {
                timestamp: now,
                sequence,
                source_name: &file.name,
                task_name: task.name(),
            });
            sequence += 1;
            outcome.attempted += 1;

            debug!(task = task.name(), file = %file.path.display(), %label, "posting file");

            let bytes = match fs::read(&file.path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(
                        task = task.name(),
                        file = %file.path.display(),
                        error = %e,
                        "failed to read file; leaving it for the next tick"
                    );
                    outcome.failed += 1;
                    continue;
                }
            };
            let body = Bytes::from(decode_payload(&bytes, task.source_encoding()).into_bytes());

            let sent = if task.transactional() {
                self.queue
                    .send_transactional(task.destination_path(), &label, body)
                    .await
            } else {
                self.queue.send(task.destination_path(), &label, body).await
            };

            match sent {
                Ok(()) => {
                    info!(
                        task = task.name(),
                        file = %file.path.display(),
                        queue = task.destination_path(),
                        %label,
                        encoding = %task.source_encoding(),
                        "posted file"
                    );
                    if let Err(e) = fs::remove_file(&file.path).await {
                        // The item still counts as processed; a leftover file
                        // will be re-sent next tick, which is the accepted
                        // at-least-once behavior.
                        error!(
                            task = task.name(),
                            file = %file.path.display(),
                            error = %e,
                            "failed to delete file after posting"
                        );
                    } else {
                        debug!(task = task.name(), file = %file.path.display(), "deleted file");
                    }
                    outcome.transferred += 1;
                }
                Err(e) => {
                    error!(
                        task = task.name(),
                        file = %file.path.display(),
                        queue = task.destination_path(),
                        error = %e,
                        "failed to post file; leaving it in place"
                    );
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }
}

// Non-recursive listing of regular files with the metadata the sort and the
// size check need. Directories and other non-file entries are ignored.
async fn list_files(task: &TaskDefinition) -> Result<Vec<SourceFile>, TransferError> {
    let listing_error = |source| TransferError::Listing {
        task: task.name().to_owned(),
        path: task.source_path().to_owned(),
        source,
    };

    let mut entries = fs::read_dir(task.source_path()).await.map_err(&listing_error)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(&listing_error)? {
        let meta = entry.metadata().await.map_err(&listing_error)?;
        if !meta.is_file() {
            continue;
        }
        files.push(SourceFile {
            path: entry.path(),
            name: entry.file_name().to_string_lossy().into_owned(),
            len: meta.len(),
            modified: meta.modified().map_err(&listing_error)?,
        });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{InMemoryQueue, QueueClient};
    use crate::task::{EndpointSpec, TaskSpec};
    use std::time::Duration;

    fn task(source: &str, queue: &str, template: &str) -> TaskDefinition {
        TaskDefinition::validate(&TaskSpec {
            name: "to-queue".into(),
            poll_interval_ms: "50".into(),
            source: EndpointSpec {
                kind: "Folder".into(),
                path: source.into(),
                encoding: "ASCII".into(),
                ..Default::default()
            },
            destination: EndpointSpec {
                kind: "Queue".into(),
                path: queue.into(),
                name_template: template.into(),
                ..Default::default()
            },
        })
        .unwrap()
    }

    fn write_with_age(dir: &std::path::Path, name: &str, contents: &str, age: Duration) {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        let mtime = SystemTime::now() - age;
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(mtime).unwrap();
    }

    #[tokio::test]
    async fn missing_source_folder_is_an_environment_error() {
        let queue = Arc::new(InMemoryQueue::new());
        queue.create_queue("q").await;
        let transfer = FolderToQueueTransfer::new(queue);
        let result = transfer.run(&task("/nonexistent/inbox", "q", "[n]")).await;
        assert!(matches!(
            result,
            Err(TransferError::SourceFolderUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn missing_queue_is_an_environment_error() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(InMemoryQueue::new());
        let transfer = FolderToQueueTransfer::new(queue);
        let result = transfer
            .run(&task(dir.path().to_str().unwrap(), "absent", "[n]"))
            .await;
        assert!(matches!(result, Err(TransferError::QueueUnavailable { .. })));
    }

    #[tokio::test]
    async fn empty_folder_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(InMemoryQueue::new());
        queue.create_queue("q").await;
        let transfer = FolderToQueueTransfer::new(queue.clone());
        let outcome = transfer
            .run(&task(dir.path().to_str().unwrap(), "q", "[n]"))
            .await
            .unwrap();
        assert!(outcome.is_noop());
        assert!(queue.is_empty("q").await);
    }

    #[tokio::test]
    async fn oldest_first_order_tmp_skipped_sent_files_deleted() {
        let dir = tempfile::tempdir().unwrap();
        write_with_age(dir.path(), "a.tmp", "partial", Duration::from_secs(30));
        write_with_age(dir.path(), "b.txt", "older", Duration::from_secs(20));
        write_with_age(dir.path(), "c.txt", "newer", Duration::from_secs(10));

        let queue = Arc::new(InMemoryQueue::new());
        queue.create_queue("q").await;
        let transfer = FolderToQueueTransfer::new(queue.clone());
        let outcome = transfer
            .run(&task(dir.path().to_str().unwrap(), "q", "[Source.Name]"))
            .await
            .unwrap();

        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.transferred, 2);
        assert_eq!(outcome.skipped, 1);

        let labels: Vec<_> = queue
            .snapshot("q")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.label)
            .collect();
        assert_eq!(labels, ["b.txt", "c.txt"]);

        assert!(dir.path().join("a.tmp").exists());
        assert!(!dir.path().join("b.txt").exists());
        assert!(!dir.path().join("c.txt").exists());
    }

    #[tokio::test]
    async fn send_failure_leaves_file_in_place() {
        let dir = tempfile::tempdir().unwrap();
        write_with_age(dir.path(), "b.txt", "first", Duration::from_secs(20));
        write_with_age(dir.path(), "c.txt", "second", Duration::from_secs(10));

        let queue = Arc::new(InMemoryQueue::new());
        queue.create_queue("q").await;
        queue.fail_sends_after("q", 1).await;

        let transfer = FolderToQueueTransfer::new(queue.clone());
        let outcome = transfer
            .run(&task(dir.path().to_str().unwrap(), "q", "[Source.Name]"))
            .await
            .unwrap();

        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.transferred, 1);
        assert_eq!(outcome.failed, 1);

        assert!(!dir.path().join("b.txt").exists());
        assert!(dir.path().join("c.txt").exists());
        assert_eq!(queue.len("q").await, 1);
    }

    #[tokio::test]
    async fn sequence_counts_only_attempted_entries() {
        let dir = tempfile::tempdir().unwrap();
        write_with_age(dir.path(), "skip.tmp", "partial", Duration::from_secs(40));
        write_with_age(dir.path(), "one.txt", "1", Duration::from_secs(30));
        write_with_age(dir.path(), "two.txt", "2", Duration::from_secs(20));

        let queue = Arc::new(InMemoryQueue::new());
        queue.create_queue("q").await;
        let transfer = FolderToQueueTransfer::new(queue.clone());
        transfer
            .run(&task(dir.path().to_str().unwrap(), "q", "[n2]"))
            .await
            .unwrap();

        let labels: Vec<_> = queue
            .snapshot("q")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.label)
            .collect();
        assert_eq!(labels, ["00", "01"]);
    }

    #[tokio::test]
    async fn oversized_file_is_skipped_and_kept() {
        let dir = tempfile::tempdir().unwrap();
        let big = "x".repeat(MAX_ITEM_SIZE + 1);
        write_with_age(dir.path(), "big.txt", &big, Duration::from_secs(10));

        let queue = Arc::new(InMemoryQueue::new());
        queue.create_queue("q").await;
        let transfer = FolderToQueueTransfer::new(queue.clone());
        let outcome = transfer
            .run(&task(dir.path().to_str().unwrap(), "q", "[n]"))
            .await
            .unwrap();

        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.attempted, 0);
        assert!(dir.path().join("big.txt").exists());
        assert!(queue.is_empty("q").await);
    }

    #[tokio::test]
    async fn transactional_send_is_used_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        write_with_age(dir.path(), "b.txt", "payload", Duration::from_secs(10));

        let queue = Arc::new(InMemoryQueue::new());
        queue.create_queue("q").await;

        let spec = TaskSpec {
            name: "txn".into(),
            poll_interval_ms: "50".into(),
            source: EndpointSpec {
                kind: "Folder".into(),
                path: dir.path().to_str().unwrap().into(),
                encoding: "ASCII".into(),
                ..Default::default()
            },
            destination: EndpointSpec {
                kind: "Queue".into(),
                path: "q".into(),
                name_template: "[Source.Name]".into(),
                transactional: "1".into(),
                ..Default::default()
            },
        };
        let task = TaskDefinition::validate(&spec).unwrap();

        let transfer = FolderToQueueTransfer::new(queue.clone());
        let outcome = transfer.run(&task).await.unwrap();
        assert_eq!(outcome.transferred, 1);

        let messages = queue.snapshot("q").await.unwrap();
        assert_eq!(messages[0].body.as_ref(), b"payload");
    }
}
