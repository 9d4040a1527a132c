//! The context every state cell and teardown call runs against.
//!
//! A [`Runtime`] bundles the [`StateRegistry`] with the producer side of the
//! render queue. State cells hold a clone and publish their owner's id into
//! the queue; they never hold a reference to the owner itself. Because the
//! runtime is an ordinary value, tests can build an isolated one with
//! [`Runtime::new`] and drain its queue by hand through the returned
//! [`RenderReceiver`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::thread;
use std::time::Duration;

use crate::component::Component;
use crate::error::{Error, Result};
use crate::id::ComponentId;
use crate::registry::{OwnedCells, StateRegistry};
use crate::scheduler::RenderMessage;

/// Poll interval of a state consumer waiting on a full render queue.
const FULL_QUEUE_BACKOFF: Duration = Duration::from_millis(1);

struct Inner {
    registry: StateRegistry,
    queue: SyncSender<RenderMessage>,
    capacity: usize,
}

/// Shared handle to a state registry and a render queue.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<Inner>,
}

impl Runtime {
    /// A runtime whose render queue holds at most `capacity` messages.
    ///
    /// The caller owns the consumer side; [`Document`](crate::Document)
    /// hands it to its render thread.
    pub fn new(capacity: usize) -> (Runtime, RenderReceiver) {
        let (queue, rx) = mpsc::sync_channel(capacity);
        let runtime = Runtime {
            inner: Arc::new(Inner {
                registry: StateRegistry::new(),
                queue,
                capacity,
            }),
        };
        (runtime, RenderReceiver { rx })
    }

    /// The state registry.
    pub fn registry(&self) -> &StateRegistry {
        &self.inner.registry
    }

    /// Maximum number of queued render messages.
    pub fn queue_capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Publish a render request for `component`.
    ///
    /// Blocks while the queue is full. Returns `false` if the consumer is
    /// gone.
    pub fn notify_render(&self, component: ComponentId) -> bool {
        self.inner
            .queue
            .send(RenderMessage::Render(component))
            .is_ok()
    }

    /// Like [`notify_render`](Self::notify_render) but never blocks.
    ///
    /// Returns `false` if the queue is full or the consumer is gone.
    pub fn try_notify_render(&self, component: ComponentId) -> bool {
        match self.inner.queue.try_send(RenderMessage::Render(component)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!(component = %component, "render queue full");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Publish `component`, waiting while the queue is full, but give up
    /// once `cancelled` is raised.
    ///
    /// State consumers publish through this so that a teardown joining them
    /// never waits on queue space. The joining thread may be the render
    /// thread itself.
    pub(crate) fn notify_render_unless(&self, component: ComponentId, cancelled: &AtomicBool) -> bool {
        let mut message = RenderMessage::Render(component);
        loop {
            match self.inner.queue.try_send(message) {
                Ok(()) => return true,
                Err(TrySendError::Disconnected(_)) => return false,
                Err(TrySendError::Full(returned)) => {
                    if cancelled.load(Ordering::Acquire) {
                        return false;
                    }
                    message = returned;
                    thread::sleep(FULL_QUEUE_BACKOFF);
                }
            }
        }
    }

    pub(crate) fn send(&self, message: RenderMessage) -> Result<()> {
        self.inner
            .queue
            .send(message)
            .map_err(|_| Error::SchedulerStopped)
    }

    /// Tear down every state cell owned by `component` and its descendants.
    ///
    /// Each owner's cells are removed from the registry and signalled, the
    /// component's children are torn down recursively, and finally the
    /// consumers of the owner's cells are joined. When this returns, no
    /// cell in the subtree will publish another render request.
    ///
    /// Tearing down a component with no registered state (already torn
    /// down, or stateless) logs a warning and still recurses into its
    /// children.
    pub fn kill_all_states(&self, component: &dyn Component) {
        let id = component.id();
        let cells = self.inner.registry.take_owner(id);
        if cells.is_none() {
            tracing::warn!(component = %id, "teardown of component with no live state");
        }
        self.finish_teardown(component, cells);
    }

    fn teardown_descendant(&self, component: &dyn Component) {
        let cells = self.inner.registry.take_owner(component.id());
        self.finish_teardown(component, cells);
    }

    fn finish_teardown(&self, component: &dyn Component, cells: Option<OwnedCells>) {
        if let Some(cells) = &cells {
            tracing::debug!(component = %component.id(), cells = cells.len(), "cancelling state");
            for cell in cells.values() {
                cell.cancel();
            }
        }
        for child in component.children() {
            self.teardown_descendant(&*child);
        }
        for cell in cells.iter().flat_map(|cells| cells.values()) {
            cell.join();
        }
    }
}

/// Consumer side of a [`Runtime`]'s render queue.
pub struct RenderReceiver {
    rx: Receiver<RenderMessage>,
}

impl RenderReceiver {
    /// Block for the next message; `None` once every producer is gone.
    pub fn recv(&self) -> Option<RenderMessage> {
        self.rx.recv().ok()
    }

    /// Next message if one is queued.
    pub fn try_recv(&self) -> Option<RenderMessage> {
        match self.rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next message.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RenderMessage> {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Every component id currently queued for rendering, in order.
    /// Other messages are discarded.
    pub fn drain_renders(&self) -> Vec<ComponentId> {
        std::iter::from_fn(|| self.try_recv())
            .filter_map(|message| match message {
                RenderMessage::Render(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}
