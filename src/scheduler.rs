//! The render scheduler: a single consumer draining the render queue.
//!
//! State cells on any thread publish their owner's id; this loop is the
//! only place host markup is replaced after the initial mount. For each
//! request it:
//!
//! 1. resolves the id through the document's component index,
//! 2. looks the element up in the host,
//! 3. replaces the element's outer markup with a fresh render,
//! 4. re-indexes the subtree and re-runs `init_listeners` over it,
//! 5. runs callbacks queued with [`Document::after_next_mount`].
//!
//! A request whose component or element cannot be found is dropped with a
//! warning; typically an ancestor re-rendered first and detached it.
//! Requests are not de-duplicated: rendering always reads the latest
//! committed state, so repeats cost a redundant patch, nothing more.

use std::fmt;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use crate::component::render_component;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::id::ComponentId;
use crate::runtime::RenderReceiver;

/// A message on the render queue.
pub enum RenderMessage {
    /// Re-render the component with this id.
    Render(ComponentId),
    /// Acknowledge once every earlier message has been processed.
    Barrier(Sender<()>),
    /// Stop the render loop.
    Shutdown,
}

impl fmt::Debug for RenderMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderMessage::Render(id) => f.debug_tuple("Render").field(id).finish(),
            RenderMessage::Barrier(_) => f.write_str("Barrier"),
            RenderMessage::Shutdown => f.write_str("Shutdown"),
        }
    }
}

pub(crate) fn spawn(
    document: Document,
    queue: RenderReceiver,
    thread_name: String,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(thread_name)
        .spawn(move || render_loop(document, queue))
        .map_err(|source| Error::Spawn {
            what: "render scheduler",
            source,
        })
}

fn render_loop(document: Document, queue: RenderReceiver) {
    tracing::debug!("render scheduler started");
    while let Some(message) = queue.recv() {
        match message {
            RenderMessage::Render(id) => remount(&document, id),
            RenderMessage::Barrier(ack) => {
                let _ = ack.send(());
            }
            RenderMessage::Shutdown => break,
        }
    }
    tracing::debug!("render scheduler stopped");
}

/// Process one render request. Exactly one host replacement or one
/// missing-element warning per call.
pub(crate) fn remount(document: &Document, id: ComponentId) {
    let Some(component) = document.lookup(id) else {
        tracing::warn!(component = %id, "render request for detached component dropped");
        return;
    };
    let Some(element) = document.host().get_element(&id.to_string()) else {
        tracing::warn!(component = %id, "host element missing; render dropped");
        return;
    };

    let html = render_component(&*component);
    document.host().replace_outer_html(&element, &html);
    document.attach_subtree(&component);
    document.run_after_mount();
}
