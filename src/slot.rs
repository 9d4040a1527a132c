//! A region whose content is one interchangeable child.

use std::fmt;

use parking_lot::{Mutex, RwLock};

use crate::component::{Component, ComponentRef, render_component};
use crate::id::ComponentId;
use crate::runtime::Runtime;

/// Holds zero or one child and renders it inside a layout-neutral wrapper:
///
/// ```text
/// <div id="{slot id}" style="display:contents">{child markup}</div>
/// ```
///
/// [`swap`](Self::swap) tears the outgoing child down before the incoming
/// one becomes visible to readers. It does not publish a render request;
/// follow it with [`Document::notify_render`](crate::Document::notify_render)
/// for the slot (or an ancestor).
pub struct Slot {
    id: ComponentId,
    runtime: Runtime,
    child: RwLock<Option<ComponentRef>>,
    swapping: Mutex<()>,
}

impl Slot {
    /// An empty slot.
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            id: ComponentId::new(),
            runtime: runtime.clone(),
            child: RwLock::new(None),
            swapping: Mutex::new(()),
        }
    }

    /// Builder: initial child.
    pub fn with_child(self, child: ComponentRef) -> Self {
        *self.child.write() = Some(child);
        self
    }

    /// The current child.
    pub fn current(&self) -> Option<ComponentRef> {
        self.child.read().clone()
    }

    /// Replace the child with `next`, tearing down the previous child's
    /// state (and its descendants') first.
    ///
    /// Swapping in the child that is already installed is a no-op.
    pub fn swap(&self, next: Option<ComponentRef>) {
        let _swapping = self.swapping.lock();
        let previous = self.current();
        if let (Some(old), Some(new)) = (&previous, &next) {
            if old.id() == new.id() {
                return;
            }
        }
        if let Some(previous) = &previous {
            tracing::debug!(slot = %self.id, child = %previous.id(), "tearing down outgoing child");
            self.runtime.kill_all_states(&**previous);
        }
        *self.child.write() = next;
    }
}

impl Component for Slot {
    fn id(&self) -> ComponentId {
        self.id
    }

    fn render(&self) -> String {
        let inner = self
            .current()
            .map(|child| render_component(&*child))
            .unwrap_or_default();
        format!("<div id=\"{}\" style=\"display:contents\">{inner}</div>", self.id)
    }

    fn children(&self) -> Vec<ComponentRef> {
        self.current().into_iter().collect()
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.id)
            .field("child", &self.child.read().as_ref().map(|c| c.id()))
            .finish()
    }
}
