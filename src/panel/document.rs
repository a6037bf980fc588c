//! Document-level mouseover subscriptions.
//!
//! The panel closes its overlay when the pointer moves anywhere outside its
//! tracked items, so it listens on the whole document for as long as it is
//! mounted. `DocumentListenerGuard` ties that subscription to a scope.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

/// Handle of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type MouseOverCallback = Arc<dyn Fn() + Send + Sync>;

/// An event target that can broadcast mouseover to subscribers.
pub trait DocumentEvents: Send + Sync {
    fn add_mouseover_listener(&self, callback: MouseOverCallback) -> ListenerId;
    /// Returns false if `id` was not registered.
    fn remove_mouseover_listener(&self, id: ListenerId) -> bool;
}

#[derive(Default)]
struct DocumentInner {
    next_id: u64,
    listeners: Vec<(ListenerId, MouseOverCallback)>,
}

/// In-process document: the embedder forwards pointer events that landed
/// outside any panel to `dispatch_mouse_over`.
#[derive(Clone, Default)]
pub struct Document {
    inner: Arc<Mutex<DocumentInner>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke every listener. Listeners may add or remove listeners.
    pub fn dispatch_mouse_over(&self) {
        let listeners: Vec<MouseOverCallback> = self
            .inner
            .lock()
            .listeners
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        trace!(count = listeners.len(), "Dispatching document mouseover");
        for callback in listeners {
            callback();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

impl DocumentEvents for Document {
    fn add_mouseover_listener(&self, callback: MouseOverCallback) -> ListenerId {
        let mut inner = self.inner.lock();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push((id, callback));
        id
    }

    fn remove_mouseover_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(lid, _)| *lid != id);
        inner.listeners.len() != before
    }
}

/// Detaches its listener when dropped or when `detach` is called.
pub struct DocumentListenerGuard {
    document: Arc<dyn DocumentEvents>,
    id: Option<ListenerId>,
}

impl DocumentListenerGuard {
    pub fn attach(document: Arc<dyn DocumentEvents>, callback: MouseOverCallback) -> Self {
        let id = document.add_mouseover_listener(callback);
        debug!(?id, "Attached document mouseover listener");
        Self {
            document,
            id: Some(id),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.id.is_some()
    }

    pub fn detach(&mut self) {
        if let Some(id) = self.id.take() {
            self.document.remove_mouseover_listener(id);
            debug!(?id, "Detached document mouseover listener");
        }
    }
}

impl Drop for DocumentListenerGuard {
    fn drop(&mut self) {
        self.detach();
    }
}
