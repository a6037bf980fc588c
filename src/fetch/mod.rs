//! Blob fetch pipeline for the media panel.
//!
//! This module provides:
//! - `BatchFetchScheduler` - Coalesces blob requests into throttled batches
//! - `BlobCache` - Shared, memory-bounded store of resolved blobs
//! - `FetchTask` / `TaskFetcher` - Cancellable tokio tasks that run batches

pub mod blob_cache;
pub mod scheduler;
pub mod task;

pub use blob_cache::{BlobCache, ResolvedUriStore};
pub use scheduler::{BatchFetchScheduler, ScrollOutcome};
pub use task::{
    BatchFuture, BatchHandle, BatchId, BatchSettled, BlobClient, BlobFetcher, FetchTask,
    ResolvedBlob, TaskFetcher, TaskHandle,
};
