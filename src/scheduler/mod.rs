//! Task scheduling — one periodic execution loop per task, with clean
//! shutdown.
//!
//! [`Scheduler::schedule`] spawns an independent Tokio task for every
//! [`TaskDefinition`]: each loop fires immediately, then at the task's
//! configured interval. Within one loop an invocation always runs to
//! completion before the next tick is considered, so invocations of the same
//! task never overlap — a slow batch simply stretches that task's effective
//! period. Loops for different tasks are fully independent and run
//! concurrently.
//!
//! Nothing below the scheduler terminates the process: invocation errors are
//! logged and the task stays scheduled for its next tick. [`Scheduler::shutdown`]
//! signals every loop to stop, lets in-flight invocations finish, and waits
//! for all loops to exit.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::queue::QueueClient;
use crate::task::{Direction, TaskDefinition};
use crate::transfer::{BatchOutcome, FolderToQueueTransfer, QueueToFolderTransfer, TransferError};

/// Errors preventing the scheduler from starting.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("no tasks configured; nothing to schedule")]
    NoTasks,
}

// The per-task transfer component, picked once at scheduling time.
enum TransferRunner {
    FolderToQueue(FolderToQueueTransfer),
    QueueToFolder(QueueToFolderTransfer),
}

impl TransferRunner {
    fn for_task(task: &TaskDefinition, queue: Arc<dyn QueueClient>) -> Self {
        match task.direction() {
            Direction::FolderToQueue => Self::FolderToQueue(FolderToQueueTransfer::new(queue)),
            Direction::QueueToFolder => Self::QueueToFolder(QueueToFolderTransfer::new(queue)),
        }
    }

    async fn run(&self, task: &TaskDefinition) -> Result<BatchOutcome, TransferError> {
        match self {
            Self::FolderToQueue(transfer) => transfer.run(task).await,
            Self::QueueToFolder(transfer) => transfer.run(task).await,
        }
    }
}

/// Owns the running task loops.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use mqbridge::queue::InMemoryQueue;
/// use mqbridge::scheduler::Scheduler;
/// use mqbridge::task::TaskDefinition;
///
/// # async fn example(tasks: Vec<TaskDefinition>) -> Result<(), Box<dyn std::error::Error>> {
/// let queue = Arc::new(InMemoryQueue::new());
/// let scheduler = Scheduler::schedule(tasks, queue)?;
/// // ... run until a stop signal arrives ...
/// scheduler.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Scheduler {
    stop_tx: watch::Sender<bool>,
    loops: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Starts one periodic loop per task against the shared queue client.
    ///
    /// Every loop fires its first invocation immediately and then repeats at
    /// the task's poll interval. Ticks missed while an invocation is still
    /// running are not made up; the next tick is simply rescheduled a full
    /// interval later.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::NoTasks`] if `tasks` is empty.
    pub fn schedule(
        tasks: Vec<TaskDefinition>,
        queue: Arc<dyn QueueClient>,
    ) -> Result<Self, ScheduleError> {
        if tasks.is_empty() {
            return Err(ScheduleError::NoTasks);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let loops = tasks
            .into_iter()
            .map(|task| {
                info!(
                    task = task.name(),
                    direction = %task.direction(),
                    interval_ms = task.poll_interval().as_millis() as u64,
                    source = task.source_path(),
                    destination = task.destination_path(),
                    "started task"
                );
                let runner = TransferRunner::for_task(&task, Arc::clone(&queue));
                tokio::spawn(task_loop(task, runner, stop_rx.clone()))
            })
            .collect();

        Ok(Self { stop_tx, loops })
    }

    /// Signals every task loop to stop and waits for in-flight invocations
    /// to finish.
    ///
    /// An invocation that has already started runs to completion; no new
    /// invocations begin after the signal.
    pub async fn shutdown(self) {
        info!("scheduler shutting down");
        let _ = self.stop_tx.send(true);
        for handle in self.loops {
            // A panicked loop has already been logged by the runtime; there
            // is nothing further to unwind here.
            let _ = handle.await;
        }
        info!("scheduler stopped");
    }
}

// The periodic execution loop for one task. Invocations are strictly
// serialized: the loop only returns to the tick await once `runner.run`
// has completed.
async fn task_loop(
    task: TaskDefinition,
    runner: TransferRunner,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(task.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Poll the stop signal first: once shutdown is requested, a tick
            // that is already due must not start another invocation.
            biased;

            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match runner.run(&task).await {
                    Ok(outcome) if outcome.is_noop() => {
                        debug!(task = task.name(), "invocation found nothing to do");
                    }
                    Ok(outcome) => {
                        debug!(
                            task = task.name(),
                            attempted = outcome.attempted,
                            transferred = outcome.transferred,
                            failed = outcome.failed,
                            skipped = outcome.skipped,
                            "invocation finished"
                        );
                    }
                    Err(e) => {
                        // Environment or batch-level trouble; the task stays
                        // scheduled and the next tick retries from scratch.
                        error!(task = task.name(), error = %e, "invocation failed");
                    }
                }
            }
        }
    }

    debug!(task = task.name(), "task loop stopped");
}
