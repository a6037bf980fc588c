use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info};

use super::document::{DocumentEvents, DocumentListenerGuard, MouseOverCallback};
use super::popover::{PopoverInputs, PopoverState};
use crate::config::PanelConfig;
use crate::error::FetchError;
use crate::fetch::{
    BatchFetchScheduler, BatchId, BlobFetcher, ResolvedBlob, ResolvedUriStore, ScrollOutcome,
};
use crate::hover::{FocusedState, HoverSyncController};
use crate::models::HoverTarget;

/// Owns the blob scheduler and the hover controller for one mounted panel
/// and routes pointer, scroll and lifecycle events to them.
pub struct PanelController<F: BlobFetcher, S: ResolvedUriStore> {
    scheduler: BatchFetchScheduler<F, S>,
    hover: HoverSyncController,
    document_listener: Option<DocumentListenerGuard>,
    mounted: bool,
}

impl<F, S> PanelController<F, S>
where
    F: BlobFetcher,
    S: ResolvedUriStore,
{
    /// Mount the panel and start listening for document mouseover.
    ///
    /// `on_document_mouse_over` is what the document invokes; the embedder
    /// routes it back to `on_document_mouse_over` on this controller.
    pub fn mount(
        config: &PanelConfig,
        fetcher: F,
        store: S,
        hover: HoverSyncController,
        document: Arc<dyn DocumentEvents>,
        on_document_mouse_over: MouseOverCallback,
    ) -> Self {
        let scheduler = BatchFetchScheduler::new(fetcher, store, config);
        let document_listener = DocumentListenerGuard::attach(document, on_document_mouse_over);
        info!(
            kind = %config.media_kind,
            quiet_ms = config.quiet_period.as_millis() as u64,
            "Media panel mounted"
        );

        Self {
            scheduler,
            hover,
            document_listener: Some(document_listener),
            mounted: true,
        }
    }

    /// Pointer moved inside the panel container. `target` is the tracked
    /// item under it, if any.
    pub fn on_mouse_over(&mut self, target: Option<HoverTarget>) {
        if !self.mounted {
            return;
        }
        match target {
            Some(target) => {
                self.hover.on_pointer_enter(target);
            }
            None => {
                self.hover.close();
            }
        }
    }

    /// Pointer moved somewhere else on the page.
    pub fn on_document_mouse_over(&mut self) {
        if self.mounted {
            self.hover.on_pointer_leave_all();
        }
    }

    /// The list scrolled to `offset`. A jump past one viewport aborts the
    /// in-flight batch and closes the overlay.
    pub fn on_list_scroll(&mut self, offset: f64) -> ScrollOutcome {
        if !self.mounted {
            return ScrollOutcome::default();
        }
        let outcome = self.scheduler.on_scroll(offset);
        if outcome.jumped {
            self.hover.close();
        } else {
            self.hover.refresh_display_rect();
        }
        outcome
    }

    /// An item became visible and needs its blob.
    pub fn request_blob(&mut self, uri: &str, now: Instant) -> bool {
        self.scheduler.request(uri, now)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Fire the batch flush if it is due.
    pub fn poll(&mut self, now: Instant) -> Option<BatchId> {
        self.scheduler.poll_flush(now)
    }

    pub fn on_batch_settled(
        &mut self,
        batch: BatchId,
        outcome: Result<Vec<ResolvedBlob>, FetchError>,
    ) -> Result<usize, FetchError> {
        self.scheduler.on_batch_settled(batch, outcome)
    }

    pub fn set_focused_state(&mut self, focused: FocusedState) {
        self.hover.set_focused_state(focused);
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.scheduler.set_viewport_height(height);
        self.hover.refresh_display_rect();
    }

    pub fn popover(&self, inputs: &PopoverInputs) -> PopoverState {
        PopoverState::derive(inputs, self.hover.focused_state(), self.hover.display_rect())
    }

    /// Detach from the document, stop all fetch activity and forget every
    /// resolved blob. Idempotent; also runs on drop.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;

        if let Some(mut guard) = self.document_listener.take() {
            guard.detach();
        }
        self.scheduler.teardown();
        self.scheduler.store().reset();
        debug!("Media panel unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn hover(&self) -> &HoverSyncController {
        &self.hover
    }

    pub fn scheduler(&self) -> &BatchFetchScheduler<F, S> {
        &self.scheduler
    }
}

impl<F: BlobFetcher, S: ResolvedUriStore> Drop for PanelController<F, S> {
    fn drop(&mut self) {
        self.unmount();
    }
}
