//! Resizing and replacing homogeneous child lists.
//!
//! Two policies, chosen by whether per-entry configurations are supplied:
//!
//! * **In-place resize** (`configs == None`): the leading
//!   `min(old_len, target_len)` entries are kept by identity; the list grows
//!   by appending entries built with `None`, or shrinks by tearing down and
//!   dropping its tail.
//! * **Full replace** (`configs == Some(..)`): every existing entry is torn
//!   down and exactly `target_len` fresh entries are built, entry `i` from
//!   `configs[i]` (or `None` once the configurations run out).
//!
//! Entries are never reordered and never reused across a full replace.
//!
//! If the constructor fails, entries it already built in that call are torn
//! down again and the error is returned. Entries removed before the failure
//! stay removed.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::component::{Component, ComponentRef};
use crate::error::Result;
use crate::runtime::Runtime;

/// What a reconciliation did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// Entries kept by identity.
    pub kept: usize,
    /// Entries freshly built.
    pub added: usize,
    /// Entries torn down and dropped.
    pub removed: usize,
}

/// Reconcile `list` to `target_len` entries.
///
/// `build` constructs one entry from an optional configuration. See the
/// module docs for the two policies.
pub fn reconcile<C, Cfg, F>(
    runtime: &Runtime,
    list: &mut Vec<Arc<C>>,
    target_len: usize,
    mut build: F,
    configs: Option<Vec<Cfg>>,
) -> Result<Reconciled>
where
    C: Component + 'static,
    F: FnMut(Option<Cfg>) -> Result<Arc<C>>,
{
    match configs {
        Some(configs) => {
            let removed = std::mem::take(list);
            let outcome = Reconciled {
                kept: 0,
                added: target_len,
                removed: removed.len(),
            };
            teardown(runtime, removed);
            *list = fill(runtime, target_len, &mut build, configs)?;
            Ok(outcome)
        }
        None if target_len < list.len() => {
            let removed = list.split_off(target_len);
            let outcome = Reconciled {
                kept: target_len,
                added: 0,
                removed: removed.len(),
            };
            teardown(runtime, removed);
            Ok(outcome)
        }
        None => {
            let kept = list.len();
            let added = fill(runtime, target_len - kept, &mut build, Vec::new())?;
            list.extend(added);
            Ok(Reconciled {
                kept,
                added: target_len - kept,
                removed: 0,
            })
        }
    }
}

fn teardown<C: Component + 'static>(runtime: &Runtime, removed: Vec<Arc<C>>) {
    for entry in &removed {
        runtime.kill_all_states(&**entry);
    }
}

fn fill<C, Cfg, F>(
    runtime: &Runtime,
    count: usize,
    build: &mut F,
    configs: Vec<Cfg>,
) -> Result<Vec<Arc<C>>>
where
    C: Component + 'static,
    F: FnMut(Option<Cfg>) -> Result<Arc<C>>,
{
    if configs.len() > count {
        tracing::debug!(
            surplus = configs.len() - count,
            "ignoring configurations past the target length"
        );
    }
    let mut configs = configs.into_iter();
    let mut built = Vec::with_capacity(count);
    for _ in 0..count {
        match build(configs.next()) {
            Ok(entry) => built.push(entry),
            Err(err) => {
                teardown(runtime, built);
                return Err(err);
            }
        }
    }
    Ok(built)
}

/// A shareable child list that reconciles without holding its lock while
/// entries are torn down or built.
///
/// Reconciliations of one list are serialised; reads proceed concurrently
/// and observe either the old or the new entries of each phase.
pub struct ChildList<C> {
    runtime: Runtime,
    entries: RwLock<Vec<Arc<C>>>,
    reconciling: Mutex<()>,
}

impl<C: Component + 'static> ChildList<C> {
    /// An empty list whose entries are torn down through `runtime`.
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            runtime: runtime.clone(),
            entries: RwLock::new(Vec::new()),
            reconciling: Mutex::new(()),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// The entry at `index`.
    pub fn get(&self, index: usize) -> Option<Arc<C>> {
        self.entries.read().get(index).cloned()
    }

    /// The current entries.
    pub fn snapshot(&self) -> Vec<Arc<C>> {
        self.entries.read().clone()
    }

    /// The current entries as components, for [`Component::children`].
    pub fn components(&self) -> Vec<ComponentRef> {
        self.entries
            .read()
            .iter()
            .map(|entry| entry.clone() as ComponentRef)
            .collect()
    }

    /// Reconcile to `target_len` entries; same policies as [`reconcile`].
    pub fn reconcile<Cfg, F>(
        &self,
        target_len: usize,
        mut build: F,
        configs: Option<Vec<Cfg>>,
    ) -> Result<Reconciled>
    where
        F: FnMut(Option<Cfg>) -> Result<Arc<C>>,
    {
        let _reconciling = self.reconciling.lock();
        match configs {
            Some(configs) => {
                let removed = std::mem::take(&mut *self.entries.write());
                let outcome = Reconciled {
                    kept: 0,
                    added: target_len,
                    removed: removed.len(),
                };
                teardown(&self.runtime, removed);
                let built = fill(&self.runtime, target_len, &mut build, configs)?;
                *self.entries.write() = built;
                Ok(outcome)
            }
            None => {
                let kept = self.len().min(target_len);
                let removed = self.entries.write().split_off(kept);
                let added = fill(&self.runtime, target_len - kept, &mut build, Vec::new());
                let outcome = Reconciled {
                    kept,
                    added: target_len - kept,
                    removed: removed.len(),
                };
                teardown(&self.runtime, removed);
                self.entries.write().extend(added?);
                Ok(outcome)
            }
        }
    }

    /// Tear down and drop every entry.
    pub fn clear(&self) -> usize {
        let _reconciling = self.reconciling.lock();
        let removed = std::mem::take(&mut *self.entries.write());
        let count = removed.len();
        teardown(&self.runtime, removed);
        count
    }
}

impl<C> fmt::Debug for ChildList<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildList")
            .field("len", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}
