//! Progress reporting and cancellation for streaming operations

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use super::format::DEFAULT_CHUNK_SIZE;
use crate::error::{VaultError, VaultResult};

/// Receives cumulative plaintext bytes processed, once per chunk.
///
/// Called from the worker running the codec. Implementations that need a
/// UI thread must hop there themselves and must not block.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, bytes_processed: u64);
}

impl<F> ProgressSink for F
where
    F: Fn(u64) + Send + Sync,
{
    fn on_progress(&self, bytes_processed: u64) {
        self(bytes_processed)
    }
}

/// Progress delivered over a bounded channel. Updates are dropped when the
/// consumer falls behind; the next one carries the newer total anyway.
#[derive(Clone)]
pub struct ChannelProgress {
    tx: Sender<u64>,
}

impl ChannelProgress {
    pub fn bounded(capacity: usize) -> (Self, Receiver<u64>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn on_progress(&self, bytes_processed: u64) {
        if let Err(TrySendError::Disconnected(_)) = self.tx.try_send(bytes_processed) {
            tracing::trace!("progress receiver dropped");
        }
    }
}

/// Shared cancellation flag, checked at chunk boundaries
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-call knobs for streaming reads and writes
#[derive(Clone, Copy)]
pub struct StreamOptions<'a> {
    /// Plaintext bytes per chunk (writes only)
    pub chunk_size: u32,
    pub progress: Option<&'a dyn ProgressSink>,
    pub cancel: Option<&'a CancellationToken>,
    /// Directory for temporary plaintext output; system temp dir when unset
    pub temp_dir: Option<&'a Path>,
}

impl Default for StreamOptions<'_> {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress: None,
            cancel: None,
            temp_dir: None,
        }
    }
}

impl<'a> StreamOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: &'a CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_temp_dir(mut self, dir: &'a Path) -> Self {
        self.temp_dir = Some(dir);
        self
    }

    pub(crate) fn check_cancelled(&self) -> VaultResult<()> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(VaultError::Cancelled),
            _ => Ok(()),
        }
    }

    pub(crate) fn report(&self, bytes_processed: u64) {
        if let Some(progress) = self.progress {
            progress.on_progress(bytes_processed);
        }
    }
}
