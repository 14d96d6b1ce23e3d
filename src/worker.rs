//! SecretVault - Background Worker
//!
//! Async entry points that run the blocking codec on tokio's blocking pool,
//! so UI and reactor threads never wait on Argon2 or file I/O.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};

use crate::config::DEFAULT_IMPORT_CONCURRENCY;
use crate::container::{
    self, CancellationToken, MediaType, PlaintextSource, ProgressSink, StreamOptions, WriteSummary,
    DEFAULT_CHUNK_SIZE,
};
use crate::crypto::KeyPair;
use crate::error::{VaultError, VaultResult};
use crate::metadata::MediaMetadata;
use crate::rotation::{self, RotationReport};

/// Owned counterpart of [`StreamOptions`] that can cross into a blocking task
#[derive(Clone)]
pub struct WorkerOptions {
    pub chunk_size: u32,
    pub progress: Option<Arc<dyn ProgressSink>>,
    pub cancel: Option<CancellationToken>,
    pub temp_dir: Option<PathBuf>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress: None,
            cancel: None,
            temp_dir: None,
        }
    }
}

impl WorkerOptions {
    pub fn with_progress(mut self, progress: impl ProgressSink + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn stream_options(&self) -> StreamOptions<'_> {
        StreamOptions {
            chunk_size: self.chunk_size,
            progress: self.progress.as_deref(),
            cancel: self.cancel.as_ref(),
            temp_dir: self.temp_dir.as_deref(),
        }
    }
}

async fn run_blocking<T, F>(job: F) -> VaultResult<T>
where
    F: FnOnce() -> VaultResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| VaultError::IoError(std::io::Error::other(e)))?
}

/// Encrypt the file at `source` into a new container at `destination`
pub async fn encrypt_file(
    source: PathBuf,
    media_type: MediaType,
    metadata: Option<MediaMetadata>,
    keys: KeyPair,
    destination: PathBuf,
    options: WorkerOptions,
) -> VaultResult<WriteSummary> {
    run_blocking(move || {
        container::write_container(
            PlaintextSource::File(&source),
            media_type,
            metadata.as_ref(),
            &keys,
            &destination,
            &options.stream_options(),
        )
    })
    .await
}

/// Decrypt a container into a fresh temporary file owned by the caller
pub async fn decrypt_to_temporary_file(
    path: PathBuf,
    preferred_extension: Option<String>,
    keys: KeyPair,
    options: WorkerOptions,
) -> VaultResult<PathBuf> {
    run_blocking(move || {
        container::read_container_to_temporary_file(
            &path,
            preferred_extension.as_deref(),
            &keys,
            &options.stream_options(),
        )
    })
    .await
}

pub async fn read_metadata(path: PathBuf, keys: KeyPair) -> VaultResult<Option<MediaMetadata>> {
    run_blocking(move || container::read_metadata(&path, &keys)).await
}

pub async fn reencrypt(path: PathBuf, old_keys: KeyPair, new_keys: KeyPair, options: WorkerOptions) -> VaultResult<()> {
    run_blocking(move || rotation::reencrypt_container(&path, &old_keys, &new_keys, &options.stream_options())).await
}

/// Rotate a collection with at most `concurrency` containers in flight
/// (default 2 when `None`). Paths must be distinct.
pub async fn reencrypt_collection(
    paths: Vec<PathBuf>,
    old_keys: KeyPair,
    new_keys: KeyPair,
    concurrency: Option<usize>,
    options: WorkerOptions,
) -> RotationReport {
    let permits = Arc::new(Semaphore::new(concurrency.unwrap_or(DEFAULT_IMPORT_CONCURRENCY).max(1)));
    let mut tasks = JoinSet::new();
    let mut pending = HashMap::new();

    for path in paths {
        let permits = Arc::clone(&permits);
        let (old_keys, new_keys, options) = (old_keys.clone(), new_keys.clone(), options.clone());
        let task_path = path.clone();
        let handle = tasks.spawn(async move {
            match permits.acquire_owned().await {
                Ok(_permit) => reencrypt(task_path, old_keys, new_keys, options).await,
                Err(_) => Err(VaultError::Cancelled),
            }
        });
        pending.insert(handle.id(), path);
    }

    let report = collect_report(tasks, pending).await;
    tracing::info!(
        succeeded = report.succeeded_count(),
        failed = report.failed_count(),
        "collection rotation finished"
    );
    report
}

/// Every spawned path lands in the report, panicked tasks as failures
async fn collect_report(mut tasks: JoinSet<VaultResult<()>>, mut pending: HashMap<task::Id, PathBuf>) -> RotationReport {
    let mut report = RotationReport::default();
    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, result) = match joined {
            Ok((id, result)) => (id, result),
            Err(e) => {
                tracing::error!(error = %e, "rotation task panicked");
                (e.id(), Err(VaultError::IoError(std::io::Error::other(e))))
            }
        };
        if let Some(path) = pending.remove(&id) {
            report.record(path, result);
        }
    }
    report
}
