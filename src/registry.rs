// State registry - which component owns which state cells
//
// Shape: owner ComponentId -> (CellId -> cancel handle), both maps keyed
// with FastHashBuilder. The outer map sits behind one mutex; every
// operation holds it only long enough to insert or remove entries, never
// while a cell is being signalled or joined.
//
// Cells register themselves on creation. Teardown removes the owner's
// whole entry in one step, so a cell can never be cancelled twice through
// the registry.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::hash::FastHashBuilder;
use crate::id::{CellId, ComponentId};

/// Type-erased control surface of a live state cell.
pub(crate) trait CellControl: Send + Sync {
    fn cell_id(&self) -> CellId;

    /// Deliver the cancellation signal. Idempotent.
    fn cancel(&self);

    /// Wait for the cell's consumer to finish. No-op when called from the
    /// consumer itself or when another caller already joined it.
    fn join(&self);
}

pub(crate) type OwnedCells = IndexMap<CellId, Arc<dyn CellControl>, FastHashBuilder>;

/// Process-wide mapping from component identity to the state cells it owns.
///
/// One instance lives inside every [`Runtime`](crate::Runtime); tests build
/// their own runtimes, so nothing here is global.
#[derive(Default)]
pub struct StateRegistry {
    owners: Mutex<HashMap<ComponentId, OwnedCells, FastHashBuilder>>,
}

impl StateRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, owner: ComponentId, cell: Arc<dyn CellControl>) {
        self.owners
            .lock()
            .entry(owner)
            .or_default()
            .insert(cell.cell_id(), cell);
    }

    /// Remove and return every cell registered under `owner`.
    pub(crate) fn take_owner(&self, owner: ComponentId) -> Option<OwnedCells> {
        self.owners.lock().remove(&owner)
    }

    /// Whether `owner` has live state cells.
    pub fn contains(&self, owner: ComponentId) -> bool {
        self.owners.lock().contains_key(&owner)
    }

    /// Number of live cells owned by `owner`.
    pub fn cell_count(&self, owner: ComponentId) -> usize {
        self.owners.lock().get(&owner).map_or(0, IndexMap::len)
    }

    /// Number of components with live state.
    pub fn owner_count(&self) -> usize {
        self.owners.lock().len()
    }
}
