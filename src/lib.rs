#![deny(missing_docs)]

//! Channel-driven reactive components that render to HTML and patch
//! themselves into a host document.
//!
//! A component renders markup whose outermost element carries the
//! component's id. Its state lives in [`StateCell`]s. Each cell has a
//! consumer thread that commits new values and asks the render scheduler
//! to re-render the owning component. The scheduler replaces that
//! component's element in the host and re-attaches its listeners.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use weft::{Document, Event, Leaf, MemoryHost, StateCell};
//!
//! let host = Arc::new(MemoryHost::with_root("app"));
//! let document = Document::builder().host(host.clone()).build()?;
//!
//! let id = weft::ComponentId::new();
//! let (count, set_count) = StateCell::new(document.runtime(), id, 0)?;
//! let counter = {
//!     let count = count.clone();
//!     Leaf::with_id(id, move |id| format!("<button id=\"{id}\">{}</button>", count.current()))
//!         .on_mount(move |id, doc| {
//!             let count = count.clone();
//!             let set_count = set_count.clone();
//!             doc.add_event_listener(&id.to_string(), "click", move |_: &mut Event| {
//!                 set_count.set(count.current() + 1);
//!             });
//!         })
//! };
//!
//! document.add_root(Arc::new(counter));
//! document.mount()?;
//! host.dispatch(&id.to_string(), Event::new("click"));
//! ```
//!
//! # Core Types
//!
//! - [`Component`]: identity, markup, children and listener hook.
//! - [`StateCell<T>`] / [`SetState<T>`]: a typed value with its own update
//!   channel and consumer thread.
//! - [`Runtime`]: the [`StateRegistry`] plus the render queue producer.
//!   [`Runtime::kill_all_states`] tears a subtree down.
//! - [`Document`]: roots, host binding, render thread and component index.
//! - [`Slot`]: one interchangeable child.
//! - [`reconcile`] / [`ChildList`]: resize or replace homogeneous child lists.
//! - [`Host`]: the binding to the environment that owns real elements.
//!   [`MemoryHost`] is an in-process implementation.
//!
//! # Threads
//!
//! - one consumer per state cell,
//! - one dispatcher per registered effect,
//! - one render thread per document.
//!
//! Render requests go through a bounded queue; producers block while it is
//! full. Tearing a component down cancels its cells and joins their
//! consumers before returning.

mod cell;
mod component;
mod document;
mod error;
mod hash;
mod host;
mod id;
pub mod markup;
mod memory_host;
mod reconcile;
mod registry;
mod runtime;
mod scheduler;
mod slot;

pub use cell::{EffectKey, SetState, StateCell};
pub use component::{Component, ComponentRef, Container, Leaf, render_component};
pub use document::{
    DEFAULT_QUEUE_CAPACITY, DEFAULT_ROOT_ELEMENT, DEFAULT_THREAD_NAME, Document, DocumentBuilder,
};
pub use error::{Error, Result};
pub use host::{ElementHandle, Event, FrameCallback, Host, Listener};
pub use id::{CellId, ComponentId};
pub use memory_host::{MemoryHost, Replacement};
pub use reconcile::{ChildList, Reconciled, reconcile};
pub use registry::StateRegistry;
pub use runtime::{RenderReceiver, Runtime};
pub use scheduler::RenderMessage;
pub use slot::Slot;

#[cfg(test)]
mod tests;
