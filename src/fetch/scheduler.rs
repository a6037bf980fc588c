//! Batched, cancellable blob request scheduler.
//!
//! - Requests for unresolved URIs accumulate in an ordered, duplicate-free set
//! - A debounce restarts on every request; a throttle of the same interval caps
//!   how often batches go out
//! - A flush dispatches every pending URI as one batch and empties the set
//! - A scroll jump larger than the viewport aborts the in-flight batch
//!
//! The scheduler does not own a timer. The event loop asks `next_deadline`
//! when to wake and calls `poll_flush` then.

use std::collections::HashSet;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::blob_cache::ResolvedUriStore;
use super::task::{BatchHandle, BatchId, BlobFetcher, ResolvedBlob};
use crate::config::PanelConfig;
use crate::error::FetchError;
use crate::timing::{Debounce, Throttle};

/// A dispatched batch that has not settled yet.
struct InFlightBatch<H> {
    id: BatchId,
    size: usize,
    handle: H,
}

/// Result of feeding a scroll offset to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollOutcome {
    /// The scroll moved further than one viewport height.
    pub jumped: bool,
    /// Batch aborted because of the jump, if one was in flight.
    pub aborted: Option<BatchId>,
}

pub struct BatchFetchScheduler<F: BlobFetcher, S> {
    fetcher: F,
    store: S,
    /// Pending URIs in first-seen order.
    pending: Vec<String>,
    /// Membership index for `pending`.
    pending_index: HashSet<String>,
    debounce: Debounce,
    throttle: Throttle,
    in_flight: Option<InFlightBatch<F::Handle>>,
    /// Batches replaced by a newer dispatch but still running.
    superseded: Vec<InFlightBatch<F::Handle>>,
    next_batch: u64,
    last_offset: f64,
    viewport_height: f64,
    torn_down: bool,
}

impl<F, S> BatchFetchScheduler<F, S>
where
    F: BlobFetcher,
    S: ResolvedUriStore,
{
    pub fn new(fetcher: F, store: S, config: &PanelConfig) -> Self {
        Self {
            fetcher,
            store,
            pending: Vec::new(),
            pending_index: HashSet::new(),
            debounce: Debounce::new(config.quiet_period),
            throttle: Throttle::new(config.quiet_period),
            in_flight: None,
            superseded: Vec::new(),
            next_batch: 1,
            last_offset: 0.0,
            viewport_height: config.viewport_height,
            torn_down: false,
        }
    }

    /// Replace the rate limiters, e.g. to throttle harder than the quiet period.
    pub fn with_timing(mut self, debounce: Debounce, throttle: Throttle) -> Self {
        self.debounce = debounce;
        self.throttle = throttle;
        self
    }

    /// Ask for `uri` to be fetched in the next batch.
    ///
    /// Returns false if the URI is already resolved, already pending, or the
    /// scheduler has been torn down. A pending duplicate still restarts the
    /// quiet period.
    pub fn request(&mut self, uri: &str, now: Instant) -> bool {
        if self.torn_down {
            trace!(uri, "Request after teardown ignored");
            return false;
        }

        if self.store.has_id(uri) {
            trace!(uri, "Blob already resolved");
            return false;
        }

        let added = if self.pending_index.contains(uri) {
            trace!(uri, "Blob already pending");
            false
        } else {
            self.pending_index.insert(uri.to_owned());
            self.pending.push(uri.to_owned());
            true
        };

        self.debounce.trigger(now);
        added
    }

    /// When the next flush is due, if one is scheduled.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.torn_down {
            return None;
        }
        let deadline = self.debounce.deadline()?;
        Some(match self.throttle.next_ready() {
            Some(ready) if ready > deadline => ready,
            _ => deadline,
        })
    }

    /// Dispatch the pending set if the quiet period has elapsed and the
    /// throttle allows it. Returns the id of the dispatched batch.
    pub fn poll_flush(&mut self, now: Instant) -> Option<BatchId> {
        match self.next_deadline() {
            Some(deadline) if now >= deadline => {}
            _ => return None,
        }

        if !self.debounce.poll(now) || self.pending.is_empty() {
            return None;
        }
        self.throttle.try_acquire(now);
        Some(self.dispatch())
    }

    fn dispatch(&mut self) -> BatchId {
        let id = BatchId(self.next_batch);
        self.next_batch += 1;

        let uris = std::mem::take(&mut self.pending);
        self.pending_index.clear();
        let size = uris.len();

        debug!(batch = %id, size, "Flushing blob batch");
        let handle = self.fetcher.fetch(id, uris);

        if let Some(previous) = self.in_flight.replace(InFlightBatch { id, size, handle }) {
            trace!(batch = %previous.id, "Previous batch still running");
            self.superseded.push(previous);
        }
        id
    }

    /// Consume the completion of a batch.
    ///
    /// Blobs of a successful batch are marked resolved. Completions of
    /// aborted batches, or arriving after teardown, are ignored. A failure is
    /// returned to the caller and not retried.
    pub fn on_batch_settled(
        &mut self,
        batch: BatchId,
        outcome: Result<Vec<ResolvedBlob>, FetchError>,
    ) -> Result<usize, FetchError> {
        if self.torn_down {
            trace!(%batch, "Completion after teardown ignored");
            return Ok(0);
        }

        let settled = if self.in_flight.as_ref().is_some_and(|b| b.id == batch) {
            self.in_flight.take()
        } else if let Some(pos) = self.superseded.iter().position(|b| b.id == batch) {
            Some(self.superseded.swap_remove(pos))
        } else {
            None
        };

        let Some(settled) = settled else {
            trace!(%batch, "Completion of aborted batch ignored");
            return Ok(0);
        };

        match outcome {
            Ok(blobs) => {
                let count = blobs.len();
                for blob in blobs {
                    self.store.mark_resolved(blob);
                }
                debug!(%batch, requested = settled.size, resolved = count, "Blob batch resolved");
                Ok(count)
            }
            Err(e) => {
                warn!(%batch, error = %e, "Blob batch failed");
                Err(e)
            }
        }
    }

    /// Track the list's scroll offset, aborting the in-flight batch on a jump
    /// larger than the viewport.
    pub fn on_scroll(&mut self, offset: f64) -> ScrollOutcome {
        if !offset.is_finite() {
            trace!(offset, "Non-finite scroll offset ignored");
            return ScrollOutcome::default();
        }
        let delta = (offset - self.last_offset).abs();
        self.last_offset = offset;

        if delta <= self.viewport_height {
            return ScrollOutcome::default();
        }

        let aborted = self.in_flight.take().map(|mut batch| {
            debug!(batch = %batch.id, delta, "Scroll jump, aborting in-flight batch");
            batch.handle.abort();
            batch.id
        });
        ScrollOutcome {
            jumped: true,
            aborted,
        }
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.viewport_height = height;
    }

    /// Cancel the timer and abort everything still running. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.debounce.cancel();
        self.throttle.reset();
        self.pending.clear();
        self.pending_index.clear();

        if let Some(mut batch) = self.in_flight.take() {
            batch.handle.abort();
        }
        for mut batch in self.superseded.drain(..) {
            batch.handle.abort();
        }
        debug!("Blob scheduler torn down");
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    pub fn in_flight(&self) -> Option<BatchId> {
        self.in_flight.as_ref().map(|b| b.id)
    }

    pub fn last_offset(&self) -> f64 {
        self.last_offset
    }

    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<F: BlobFetcher, S> Drop for BatchFetchScheduler<F, S> {
    fn drop(&mut self) {
        if let Some(mut batch) = self.in_flight.take() {
            batch.handle.abort();
        }
        for mut batch in self.superseded.drain(..) {
            batch.handle.abort();
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;

    /// Records dispatched batches; handles count their aborts.
    #[derive(Clone, Default)]
    pub struct RecordingFetcher {
        pub batches: Rc<RefCell<Vec<(BatchId, Vec<String>)>>>,
        pub aborts: Rc<RefCell<Vec<(BatchId, Rc<Cell<usize>>)>>>,
    }

    pub struct RecordingHandle {
        aborts: Rc<Cell<usize>>,
    }

    impl BatchHandle for RecordingHandle {
        fn abort(&mut self) {
            self.aborts.set(self.aborts.get() + 1);
        }
    }

    impl BlobFetcher for RecordingFetcher {
        type Handle = RecordingHandle;

        fn fetch(&self, batch: BatchId, uris: Vec<String>) -> RecordingHandle {
            let aborts = Rc::new(Cell::new(0));
            self.batches.borrow_mut().push((batch, uris));
            self.aborts.borrow_mut().push((batch, Rc::clone(&aborts)));
            RecordingHandle { aborts }
        }
    }

    impl RecordingFetcher {
        pub fn batch_uris(&self) -> Vec<Vec<String>> {
            self.batches.borrow().iter().map(|(_, u)| u.clone()).collect()
        }

        pub fn abort_count(&self, batch: BatchId) -> usize {
            self.aborts
                .borrow()
                .iter()
                .find(|(id, _)| *id == batch)
                .map(|(_, n)| n.get())
                .unwrap_or(0)
        }
    }

    pub fn blobs(uris: &[&str]) -> Vec<ResolvedBlob> {
        uris.iter()
            .map(|uri| ResolvedBlob::new(*uri, vec![0u8; 4]))
            .collect()
    }
}
