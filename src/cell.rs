//! Typed reactive state owned by a single component.
//!
//! # Architecture
//!
//! Every [`StateCell`] gets one consumer thread, started on creation:
//!
//! 1. [`SetState::set`] sends the value into the cell's update channel.
//! 2. The consumer receives it, commits it under the cell's write lock,
//!    releases the lock, publishes the owner's id to the render queue and
//!    hands the value to each registered effect. While the render queue is
//!    full it waits for space, but gives up as soon as the cell is
//!    cancelled, so teardown never depends on the queue draining.
//! 3. On the cancellation signal the consumer drops its effects and exits.
//!
//! Each effect runs on its own dispatcher thread fed by its own channel.
//! One slow or panicking effect therefore never holds up the cell or any
//! other effect, and a single effect still sees values in commit order.
//!
//! The update channel is unbounded, so an effect may call `set` on its own
//! cell. Doing so queues another update and another render request; it
//! cannot deadlock, but an effect that unconditionally re-sets its cell
//! loops forever.
//!
//! ```ignore
//! let (count, set_count) = StateCell::new(document.runtime(), id, 0)?;
//! count.add_effect(|v| tracing::info!(value = v, "count changed"))?;
//! set_count.set(1);
//! ```

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};
use slab::Slab;

use crate::error::{Error, Result};
use crate::id::{CellId, ComponentId};
use crate::registry::CellControl;
use crate::runtime::Runtime;

enum CellMessage<T> {
    Update(T),
    Cancel,
}

/// Opaque key of a registered effect, used to remove it again.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct EffectKey(usize);

struct Shared<T> {
    id: CellId,
    owner: ComponentId,
    value: RwLock<T>,
    /// Sender per effect dispatcher. Dropping a sender stops its dispatcher.
    effects: Mutex<Slab<Sender<T>>>,
    cancelled: AtomicBool,
    /// Set by the consumer as its last action.
    exited: AtomicBool,
    tx: Sender<CellMessage<T>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
    fn dispatch_effects(&self, value: &T) {
        let senders: Vec<Sender<T>> = self.effects.lock().iter().map(|(_, tx)| tx.clone()).collect();
        for tx in senders {
            // A dispatcher only stops when its sender is dropped, so this
            // can fail only for an effect removed since the snapshot.
            let _ = tx.send(value.clone());
        }
    }
}

impl<T: Clone + Send + Sync + 'static> CellControl for Shared<T> {
    fn cell_id(&self) -> CellId {
        self.id
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            let _ = self.tx.send(CellMessage::Cancel);
        }
    }

    fn join(&self) {
        let Some(handle) = self.consumer.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            tracing::warn!(cell = %self.id, owner = %self.owner, "state consumer panicked");
        }
    }
}

/// Raises the consumer's `exited` flag when dropped, including on unwind.
struct ExitFlag<'a>(&'a AtomicBool);

impl Drop for ExitFlag<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

fn consume<T: Clone + Send + Sync + 'static>(
    shared: Arc<Shared<T>>,
    runtime: Runtime,
    rx: Receiver<CellMessage<T>>,
) {
    let _exited = ExitFlag(&shared.exited);
    tracing::debug!(cell = %shared.id, owner = %shared.owner, "state consumer started");

    while let Ok(message) = rx.recv() {
        let value = match message {
            CellMessage::Update(value) => value,
            CellMessage::Cancel => break,
        };
        // Updates queued behind a cancellation are never committed.
        if shared.cancelled.load(Ordering::Acquire) {
            break;
        }

        *shared.value.write() = value.clone();
        tracing::trace!(cell = %shared.id, "value committed");

        if !runtime.notify_render_unless(shared.owner, &shared.cancelled) {
            if shared.cancelled.load(Ordering::Acquire) {
                break;
            }
            tracing::trace!(cell = %shared.id, "render scheduler gone; notification dropped");
        }
        shared.dispatch_effects(&value);
    }

    shared.effects.lock().clear();
    tracing::debug!(cell = %shared.id, owner = %shared.owner, "state consumer stopped");
}

fn run_effect<T, F: Fn(&T)>(cell: CellId, rx: Receiver<T>, effect: F) {
    while let Ok(value) = rx.recv() {
        if catch_unwind(AssertUnwindSafe(|| effect(&value))).is_err() {
            tracing::warn!(cell = %cell, "effect panicked");
        }
    }
}

/// A reactive value owned by one component.
///
/// Cloning yields another handle to the same cell.
pub struct StateCell<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> StateCell<T> {
    /// Create a cell owned by `owner`, register it with the runtime's
    /// registry and start its consumer.
    ///
    /// Returns the cell and the setter that feeds its update channel.
    pub fn new(runtime: &Runtime, owner: ComponentId, initial: T) -> Result<(Self, SetState<T>)> {
        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Shared {
            id: CellId::next(),
            owner,
            value: RwLock::new(initial),
            effects: Mutex::new(Slab::new()),
            cancelled: AtomicBool::new(false),
            exited: AtomicBool::new(false),
            tx: tx.clone(),
            consumer: Mutex::new(None),
        });

        let consumer = thread::Builder::new()
            .name(format!("weft-{}", shared.id))
            .spawn({
                let shared = shared.clone();
                let runtime = runtime.clone();
                move || consume(shared, runtime, rx)
            })
            .map_err(|source| Error::Spawn {
                what: "state consumer",
                source,
            })?;
        *shared.consumer.lock() = Some(consumer);

        runtime.registry().register(owner, shared.clone());

        let setter = SetState {
            cell: shared.id,
            tx,
        };
        Ok((StateCell { shared }, setter))
    }

    /// The last committed value.
    pub fn current(&self) -> T {
        self.shared.value.read().clone()
    }

    /// Read the last committed value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.shared.value.read())
    }

    /// Register `effect` to run with every value committed from now on.
    ///
    /// The effect runs on its own thread. It may read this cell and may
    /// call `set` on it (see the module docs).
    pub fn add_effect<F>(&self, effect: F) -> Result<EffectKey>
    where
        F: Fn(&T) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let cell = self.shared.id;
        thread::Builder::new()
            .name(format!("weft-{cell}-effect"))
            .spawn(move || run_effect(cell, rx, effect))
            .map_err(|source| Error::Spawn {
                what: "effect dispatcher",
                source,
            })?;

        let key = self.shared.effects.lock().insert(tx);
        // The consumer clears effects on exit; catch one that slipped in after.
        if self.shared.cancelled.load(Ordering::Acquire) {
            self.shared.effects.lock().try_remove(key);
        }
        Ok(EffectKey(key))
    }

    /// Unregister an effect. Returns whether it was registered.
    pub fn remove_effect(&self, key: EffectKey) -> bool {
        self.shared.effects.lock().try_remove(key.0).is_some()
    }

    /// Number of registered effects.
    pub fn effect_count(&self) -> usize {
        self.shared.effects.lock().len()
    }

    /// A setter for this cell.
    pub fn setter(&self) -> SetState<T> {
        SetState {
            cell: self.shared.id,
            tx: self.shared.tx.clone(),
        }
    }
}

impl<T> StateCell<T> {
    /// This cell's identity.
    pub fn id(&self) -> CellId {
        self.shared.id
    }

    /// The owning component.
    pub fn owner(&self) -> ComponentId {
        self.shared.owner
    }

    /// Whether the cancellation signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Whether the consumer thread has finished its loop.
    ///
    /// `true` for a cancelled cell once teardown has returned.
    pub fn is_stopped(&self) -> bool {
        self.shared.exited.load(Ordering::Acquire)
    }
}

impl<T: fmt::Debug> fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell")
            .field("id", &self.shared.id)
            .field("owner", &self.shared.owner)
            .field("value", &*self.shared.value.read())
            .finish()
    }
}

/// Hands values to a [`StateCell`]'s update channel.
pub struct SetState<T> {
    cell: CellId,
    tx: Sender<CellMessage<T>>,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell,
            tx: self.tx.clone(),
        }
    }
}

impl<T> SetState<T> {
    /// Queue `value` for the cell. Never blocks.
    ///
    /// Values sent after the cell was torn down are dropped.
    pub fn set(&self, value: T) {
        if self.tx.send(CellMessage::Update(value)).is_err() {
            tracing::trace!(cell = %self.cell, "set on torn-down cell dropped");
        }
    }

    /// The cell this setter feeds.
    pub fn cell(&self) -> CellId {
        self.cell
    }
}
