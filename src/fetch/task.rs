//! Cancellable batch fetch tasks.
//!
//! A batch runs as a tokio task. The scheduler keeps only an abort handle;
//! completion travels back to the panel loop as a `BatchSettled` message,
//! tagged with the batch id so results of aborted batches can be told apart.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use flume::Sender;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, trace};

use crate::error::FetchError;
use crate::models::MediaKind;

/// Future returned by a `BlobClient` for one batch.
pub type BatchFuture =
    Pin<Box<dyn Future<Output = Result<Vec<ResolvedBlob>, FetchError>> + Send + 'static>>;

/// Monotonic identifier of a dispatched batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(pub u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch-{}", self.0)
    }
}

/// One blob delivered by a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBlob {
    pub uri: String,
    pub data: Arc<[u8]>,
}

impl ResolvedBlob {
    pub fn new(uri: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            uri: uri.into(),
            data: data.into(),
        }
    }
}

/// Completion of a batch, delivered back to whoever owns the scheduler.
#[derive(Debug, Clone)]
pub struct BatchSettled {
    pub batch: BatchId,
    pub outcome: Result<Vec<ResolvedBlob>, FetchError>,
}

/// Handle to a dispatched batch held by the scheduler while it is in flight.
pub trait BatchHandle {
    /// Cancel the batch. Must be a no-op if it already finished.
    fn abort(&mut self);
}

/// Starts batch fetches on behalf of the scheduler.
pub trait BlobFetcher {
    type Handle: BatchHandle;

    fn fetch(&self, batch: BatchId, uris: Vec<String>) -> Self::Handle;
}

/// Transport that actually retrieves blob bytes, e.g. an HTTP client posting
/// to `MediaKind::batch_endpoint`.
pub trait BlobClient: Send + Sync + 'static {
    fn fetch_batch(&self, kind: MediaKind, uris: Vec<String>) -> BatchFuture;
}

/// A spawned batch fetch that can be awaited or aborted.
pub struct FetchTask {
    batch: BatchId,
    handle: JoinHandle<Result<Vec<ResolvedBlob>, FetchError>>,
}

impl FetchTask {
    /// Spawn `future` on the current tokio runtime.
    pub fn spawn(batch: BatchId, future: BatchFuture) -> Self {
        Self {
            batch,
            handle: tokio::spawn(future),
        }
    }

    pub fn batch(&self) -> BatchId {
        self.batch
    }

    /// Cancel the task. Safe before it first runs and after it finished.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.abort_handle()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the batch. Returns `None` if it was aborted.
    pub async fn join(self) -> Option<Result<Vec<ResolvedBlob>, FetchError>> {
        match self.handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) if e.is_cancelled() => {
                trace!(batch = %self.batch, "Fetch task aborted");
                None
            }
            Err(_) => Some(Err(FetchError::TaskPanicked)),
        }
    }
}

/// Abort handle returned to the scheduler by `TaskFetcher`.
#[derive(Debug)]
pub struct TaskHandle {
    batch: BatchId,
    abort: AbortHandle,
}

impl BatchHandle for TaskHandle {
    fn abort(&mut self) {
        debug!(batch = %self.batch, "Aborting blob batch");
        self.abort.abort();
    }
}

/// Runs batches through a `BlobClient` as tokio tasks and reports each
/// completion on a channel.
pub struct TaskFetcher<C> {
    client: Arc<C>,
    kind: MediaKind,
    settled_tx: Sender<BatchSettled>,
}

impl<C: BlobClient> TaskFetcher<C> {
    pub fn new(client: Arc<C>, kind: MediaKind, settled_tx: Sender<BatchSettled>) -> Self {
        Self {
            client,
            kind,
            settled_tx,
        }
    }
}

impl<C: BlobClient> BlobFetcher for TaskFetcher<C> {
    type Handle = TaskHandle;

    fn fetch(&self, batch: BatchId, uris: Vec<String>) -> TaskHandle {
        let count = uris.len();
        let task = FetchTask::spawn(batch, self.client.fetch_batch(self.kind, uris));
        let abort = task.abort_handle();
        let tx = self.settled_tx.clone();

        tokio::spawn(async move {
            // Aborted tasks report nothing.
            if let Some(outcome) = task.join().await {
                let _ = tx.send(BatchSettled { batch, outcome });
            }
        });

        debug!(%batch, count, kind = %self.kind, "Dispatched blob batch");
        TaskHandle { batch, abort }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct SlowClient {
        delay: Duration,
    }

    impl BlobClient for SlowClient {
        fn fetch_batch(&self, _kind: MediaKind, uris: Vec<String>) -> BatchFuture {
            let delay = self.delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                let blobs: Vec<ResolvedBlob> = uris
                    .into_iter()
                    .map(|uri| ResolvedBlob::new(uri, vec![1u8, 2, 3]))
                    .collect();
                Ok::<_, FetchError>(blobs)
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_join_returns_outcome() {
        let client = SlowClient {
            delay: Duration::from_millis(20),
        };
        let task = FetchTask::spawn(
            BatchId(1),
            client.fetch_batch(MediaKind::Image, vec!["a".into()]),
        );
        let blobs = task.join().await.unwrap().unwrap();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].uri, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_before_run_yields_none() {
        let client = SlowClient {
            delay: Duration::from_millis(20),
        };
        let task = FetchTask::spawn(
            BatchId(2),
            client.fetch_batch(MediaKind::Image, vec!["a".into()]),
        );
        task.abort();
        assert!(task.join().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_after_completion_is_noop() {
        let task = FetchTask::spawn(
            BatchId(3),
            Box::pin(async { Ok::<_, FetchError>(Vec::<ResolvedBlob>::new()) }),
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(task.is_finished());
        task.abort();
        assert_eq!(task.join().await, Some(Ok(Vec::new())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetcher_reports_completion() {
        let (tx, rx) = flume::unbounded();
        let fetcher = TaskFetcher::new(
            Arc::new(SlowClient {
                delay: Duration::from_millis(5),
            }),
            MediaKind::Audio,
            tx,
        );
        let _handle = fetcher.fetch(BatchId(7), vec!["x".into(), "y".into()]);

        let settled = rx.recv_async().await.unwrap();
        assert_eq!(settled.batch, BatchId(7));
        assert_eq!(settled.outcome.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetcher_abort_reports_nothing() {
        let (tx, rx) = flume::unbounded();
        let fetcher = TaskFetcher::new(
            Arc::new(SlowClient {
                delay: Duration::from_millis(50),
            }),
            MediaKind::Image,
            tx,
        );
        let mut handle = fetcher.fetch(BatchId(8), vec!["x".into()]);
        handle.abort();
        handle.abort();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
    }
}
