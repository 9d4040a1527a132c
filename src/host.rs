//! The narrow interface to the embedding environment.
//!
//! A browser embedder implements [`Host`] over the DOM; tests and headless
//! embedders use [`MemoryHost`](crate::MemoryHost). The runtime never
//! touches the environment except through these operations.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque handle to a host element, obtained from [`Host::get_element`].
///
/// Carries the element's id and, optionally, a native object owned by the
/// host implementation (for example a `web_sys::Element`).
pub struct ElementHandle {
    id: String,
    native: Option<Box<dyn Any + Send>>,
}

impl ElementHandle {
    /// Handle identified by id alone.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            native: None,
        }
    }

    /// Handle that also carries a host-native element object.
    pub fn with_native<N: Any + Send>(id: impl Into<String>, native: N) -> Self {
        Self {
            id: id.into(),
            native: Some(Box::new(native)),
        }
    }

    /// The element's id attribute.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The host-native element, if this handle carries one of type `N`.
    pub fn native<N: Any>(&self) -> Option<&N> {
        self.native.as_deref()?.downcast_ref()
    }
}

impl fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementHandle")
            .field("id", &self.id)
            .field("native", &self.native.is_some())
            .finish()
    }
}

/// An event delivered to a [`Listener`].
///
/// Mirrors the subset of a DOM event that components actually read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Event {
    /// Event name, e.g. `"click"` or `"keydown"`.
    pub kind: String,
    /// `event.target.value` for form controls.
    pub target_value: Option<String>,
    /// `event.key` for keyboard events.
    pub key: Option<String>,
    /// `event.shiftKey`.
    pub shift_key: bool,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl Event {
    /// An event of the given kind with no payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Builder: set `target.value`.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.target_value = Some(value.into());
        self
    }

    /// Builder: set `key` and `shiftKey`.
    pub fn with_key(mut self, key: impl Into<String>, shift: bool) -> Self {
        self.key = Some(key.into());
        self.shift_key = shift;
        self
    }

    /// Equivalent of `preventDefault()`.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Equivalent of `stopPropagation()`.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Whether a listener called [`prevent_default`](Self::prevent_default).
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Whether a listener called [`stop_propagation`](Self::stop_propagation).
    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// Event callback attached to a host element.
pub type Listener = Arc<dyn Fn(&mut Event) + Send + Sync>;

/// Callback run on the host's next presentation tick.
pub type FrameCallback = Box<dyn FnOnce() + Send>;

/// Operations the runtime requires from its embedding environment.
///
/// Implementations must be callable from the render thread.
pub trait Host: Send + Sync {
    /// Look up an element by its id.
    fn get_element(&self, id: &str) -> Option<ElementHandle>;

    /// Replace the element's outer markup.
    ///
    /// `markup`'s outermost element carries the same id as `element`.
    fn replace_outer_html(&self, element: &ElementHandle, markup: &str);

    /// Replace the element's content, keeping the element itself.
    fn set_inner_html(&self, element: &ElementHandle, markup: &str);

    /// Attach `listener` for events named `event` on `element`.
    fn add_event_listener(&self, element: &ElementHandle, event: &str, listener: Listener);

    /// Run `callback` on the next presentation tick.
    ///
    /// Hosts without a frame clock run it immediately.
    fn request_frame(&self, callback: FrameCallback) {
        callback();
    }
}
