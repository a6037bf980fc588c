//! Panel wiring: lifecycle, document listening, popover state and the async
//! event loop.

pub mod controller;
pub mod document;
pub mod popover;
pub mod runtime;

pub use controller::PanelController;
pub use document::{Document, DocumentEvents, DocumentListenerGuard, ListenerId, MouseOverCallback};
pub use popover::{PopoverInputs, PopoverState, ResizeMode};
pub use runtime::{PanelEvent, PanelHandle, PanelRuntime};
