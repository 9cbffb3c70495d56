//! Transfer execution — the two batch move algorithms and their shared
//! machinery.
//!
//! [`FolderToQueueTransfer`] and [`QueueToFolderTransfer`] each implement one
//! direction of the bridge. A `run` call is a single invocation: it snapshots
//! the currently available items, processes them one at a time, and returns a
//! [`BatchOutcome`]. Per-item failures are logged and isolated — one bad item
//! never aborts the batch. Environment problems (missing folder or queue) and
//! unexpected mid-batch errors surface as [`TransferError`]; the scheduler
//! logs them and retries on the next tick, so nothing here is ever fatal to
//! the process.
//!
//! The failure model is deliberately asymmetric. On the folder side a failed
//! send leaves the file in place for the next tick. On the queue side a
//! message is always removed once observed, even when the file write failed,
//! because the transport offers no peek-without-consuming guarantee to lean
//! on.

use std::io;

use thiserror::Error;

use crate::queue::QueueError;
use crate::task::SourceEncoding;

pub mod folder_to_queue;
pub mod queue_to_folder;

pub use folder_to_queue::FolderToQueueTransfer;
pub use queue_to_folder::QueueToFolderTransfer;

/// Maximum size of a single item payload, shared by both directions (64 KiB).
pub const MAX_ITEM_SIZE: usize = 64 * 1024;

/// Filename suffix marking a file as still being written; such files are left
/// for a future tick. The match is case-sensitive.
pub const PARTIAL_FILE_SUFFIX: &str = ".tmp";

/// Errors that abort an invocation.
///
/// These are either environment errors (a precondition failed before any item
/// was touched) or unexpected errors that cut a batch short. Work already
/// completed within the invocation stands; the task stays scheduled and the
/// next tick starts over from a fresh snapshot.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("task `{task}`: source folder `{path}` is not accessible (does the folder exist?)")]
    SourceFolderUnavailable { task: String, path: String },

    #[error("task `{task}`: destination folder `{path}` is not accessible (does the folder exist?)")]
    DestinationFolderUnavailable { task: String, path: String },

    #[error("task `{task}`: queue `{queue}` is not accessible (does the queue exist?)")]
    QueueUnavailable { task: String, queue: String },

    #[error("task `{task}`: failed to list `{path}`")]
    Listing {
        task: String,
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("task `{task}`: queue operation failed")]
    Queue {
        task: String,
        #[source]
        source: QueueError,
    },
}

/// Counters summarizing one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Items for which a transfer was attempted.
    pub attempted: usize,
    /// Items moved end to end (sent and retired, or written and drained).
    pub transferred: usize,
    /// Items whose transfer attempt failed.
    pub failed: usize,
    /// Items passed over without an attempt (partial files, oversized items).
    pub skipped: usize,
}

impl BatchOutcome {
    /// Returns `true` if the invocation touched nothing at all.
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Decodes raw payload bytes into text according to the task's source
/// encoding.
///
/// ASCII maps bytes outside the 7-bit range to `?`; Unicode decodes UTF-16
/// little-endian with U+FFFD replacement for invalid units and for a dangling
/// trailing byte. Decoding never fails.
pub(crate) fn decode_payload(bytes: &[u8], encoding: SourceEncoding) -> String {
    match encoding {
        SourceEncoding::Ascii => bytes
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '?' })
            .collect(),
        SourceEncoding::Unicode => {
            let mut units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            if bytes.len() % 2 != 0 {
                units.push(0xFFFD);
            }
            String::from_utf16_lossy(&units)
        }
    }
}
