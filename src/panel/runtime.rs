//! Async event loop that drives a `PanelController`.
//!
//! - Embedder events arrive on a flume channel through `PanelHandle`
//! - Batch completions arrive on a second channel fed by `TaskFetcher`
//! - The loop sleeps until the scheduler's next flush deadline
//! - Fetch failures are forwarded on an error channel, never retried

use std::sync::Arc;

use flume::{Receiver, Sender};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::controller::PanelController;
use super::document::MouseOverCallback;
use crate::error::FetchError;
use crate::fetch::{BatchSettled, BlobClient, BlobFetcher, ResolvedUriStore, TaskFetcher};
use crate::hover::FocusedState;
use crate::models::{HoverTarget, MediaKind};

/// Input to the panel loop.
#[derive(Debug, Clone)]
pub enum PanelEvent {
    /// Pointer moved inside the container, over `Some(item)` or a gap.
    MouseOver(Option<HoverTarget>),
    /// Pointer moved elsewhere on the page.
    DocumentMouseOver,
    Scroll { offset: f64 },
    Request(String),
    Focus(FocusedState),
    ViewportResized(f64),
    Unmount,
}

/// Cloneable sender side of a running panel.
#[derive(Clone)]
pub struct PanelHandle {
    events_tx: Sender<PanelEvent>,
    errors_rx: Receiver<FetchError>,
}

impl PanelHandle {
    /// Queue an event. Returns false once the loop has stopped.
    pub fn send(&self, event: PanelEvent) -> bool {
        self.events_tx.send(event).is_ok()
    }

    pub fn mouse_over(&self, target: Option<HoverTarget>) -> bool {
        self.send(PanelEvent::MouseOver(target))
    }

    pub fn scroll(&self, offset: f64) -> bool {
        self.send(PanelEvent::Scroll { offset })
    }

    pub fn request(&self, uri: impl Into<String>) -> bool {
        self.send(PanelEvent::Request(uri.into()))
    }

    pub fn set_focused_state(&self, focused: FocusedState) -> bool {
        self.send(PanelEvent::Focus(focused))
    }

    pub fn set_viewport_height(&self, height: f64) -> bool {
        self.send(PanelEvent::ViewportResized(height))
    }

    pub fn unmount(&self) -> bool {
        self.send(PanelEvent::Unmount)
    }

    /// Failed batches, in completion order.
    pub fn errors(&self) -> &Receiver<FetchError> {
        &self.errors_rx
    }
}

pub struct PanelRuntime {
    events_tx: Sender<PanelEvent>,
    events_rx: Receiver<PanelEvent>,
    settled_tx: Sender<BatchSettled>,
    settled_rx: Receiver<BatchSettled>,
    errors_tx: Sender<FetchError>,
    errors_rx: Receiver<FetchError>,
}

impl PanelRuntime {
    pub fn new() -> Self {
        let (events_tx, events_rx) = flume::unbounded();
        let (settled_tx, settled_rx) = flume::unbounded();
        let (errors_tx, errors_rx) = flume::unbounded();
        Self {
            events_tx,
            events_rx,
            settled_tx,
            settled_rx,
            errors_tx,
            errors_rx,
        }
    }

    /// A fetcher whose completions are delivered to this loop.
    pub fn fetcher<C: BlobClient>(&self, client: Arc<C>, kind: MediaKind) -> TaskFetcher<C> {
        TaskFetcher::new(client, kind, self.settled_tx.clone())
    }

    /// Callback to register on the document; feeds `DocumentMouseOver`.
    pub fn document_callback(&self) -> MouseOverCallback {
        let tx = self.events_tx.clone();
        Arc::new(move || {
            let _ = tx.send(PanelEvent::DocumentMouseOver);
        })
    }

    pub fn handle(&self) -> PanelHandle {
        PanelHandle {
            events_tx: self.events_tx.clone(),
            errors_rx: self.errors_rx.clone(),
        }
    }

    /// Run until `Unmount` is received, then tear the panel down.
    pub async fn run<F, S>(self, mut panel: PanelController<F, S>)
    where
        F: BlobFetcher,
        S: ResolvedUriStore,
    {
        // Keep only the receiving ends so the loop ends once every handle
        // and the document callback are gone.
        let Self {
            events_tx,
            events_rx,
            settled_rx,
            errors_tx,
            ..
        } = self;
        drop(events_tx);
        debug!("Panel loop started");

        loop {
            let deadline = panel.next_deadline();

            tokio::select! {
                event = events_rx.recv_async() => {
                    match event {
                        Ok(event) => Self::dispatch(&mut panel, event),
                        Err(_) => break,
                    }
                    if !panel.is_mounted() {
                        break;
                    }
                }
                Ok(settled) = settled_rx.recv_async() => {
                    if let Err(e) = panel.on_batch_settled(settled.batch, settled.outcome) {
                        warn!(batch = %settled.batch, error = %e, "Forwarding batch failure");
                        let _ = errors_tx.send(e);
                    }
                }
                _ = sleep_until(deadline) => {
                    panel.poll(Instant::now());
                }
            }
        }

        panel.unmount();
        debug!("Panel loop stopped");
    }

    fn dispatch<F, S>(panel: &mut PanelController<F, S>, event: PanelEvent)
    where
        F: BlobFetcher,
        S: ResolvedUriStore,
    {
        trace!(?event, "Panel event");
        match event {
            PanelEvent::MouseOver(target) => panel.on_mouse_over(target),
            PanelEvent::DocumentMouseOver => panel.on_document_mouse_over(),
            PanelEvent::Scroll { offset } => {
                panel.on_list_scroll(offset);
            }
            PanelEvent::Request(uri) => {
                panel.request_blob(&uri, Instant::now());
            }
            PanelEvent::Focus(focused) => panel.set_focused_state(focused),
            PanelEvent::ViewportResized(height) => panel.set_viewport_height(height),
            PanelEvent::Unmount => panel.unmount(),
        }
    }
}

impl Default for PanelRuntime {
    fn default() -> Self {
        Self::new()
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
