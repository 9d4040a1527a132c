//! Headless [`Host`] that keeps the whole document as one markup string.
//!
//! Elements are located by scanning tags, so replacing an element's outer
//! markup really does detach everything that was inside it: listeners of
//! ids that disappear are dropped, just as a browser drops listeners of
//! discarded nodes. Every outer-markup replacement is recorded so tests
//! can assert on exactly what the render scheduler did.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::host::{ElementHandle, Event, FrameCallback, Host, Listener};
use crate::markup;

/// One call to [`Host::replace_outer_html`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replacement {
    /// Id of the replaced element.
    pub id: String,
    /// Markup it was replaced with.
    pub markup: String,
}

#[derive(Default)]
struct State {
    document: String,
    listeners: HashMap<String, Vec<(String, Listener)>>,
    replacements: Vec<Replacement>,
    frames: Vec<FrameCallback>,
}

impl State {
    fn drop_listeners_in(&mut self, range: std::ops::Range<usize>) {
        let gone: Vec<String> = markup::ids(&self.document[range])
            .into_iter()
            .map(str::to_owned)
            .collect();
        for id in gone {
            self.listeners.remove(&id);
        }
    }
}

/// In-memory host document.
#[derive(Default)]
pub struct MemoryHost {
    state: Mutex<State>,
    changed: Condvar,
}

impl MemoryHost {
    /// Host whose document is `markup`.
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(State {
                document: markup.into(),
                ..State::default()
            }),
            changed: Condvar::new(),
        }
    }

    /// Host whose document is a single empty `<div>` with the given id.
    pub fn with_root(root_id: &str) -> Self {
        Self::new(format!("<div id=\"{root_id}\"></div>"))
    }

    /// The full current document.
    pub fn html(&self) -> String {
        self.state.lock().document.clone()
    }

    /// Outer markup of the element with `id`, if present.
    pub fn element_html(&self, id: &str) -> Option<String> {
        let state = self.state.lock();
        markup::element_span(&state.document, id).map(|span| state.document[span].to_owned())
    }

    /// Whether an element with `id` is present.
    pub fn contains(&self, id: &str) -> bool {
        markup::element_span(&self.state.lock().document, id).is_some()
    }

    /// Every outer-markup replacement so far, oldest first.
    pub fn replacements(&self) -> Vec<Replacement> {
        self.state.lock().replacements.clone()
    }

    /// Number of outer-markup replacements so far.
    pub fn replacement_count(&self) -> usize {
        self.state.lock().replacements.len()
    }

    /// Number of listeners currently attached for `event` on `id`.
    pub fn listener_count(&self, id: &str, event: &str) -> usize {
        self.state
            .lock()
            .listeners
            .get(id)
            .map_or(0, |list| list.iter().filter(|(name, _)| name == event).count())
    }

    /// Fire `event` at the element `id`, invoking its listeners in
    /// attachment order. Returns the event after every listener saw it, or
    /// `None` when nothing is listening.
    pub fn dispatch(&self, id: &str, mut event: Event) -> Option<Event> {
        let listeners: Vec<Listener> = {
            let state = self.state.lock();
            state
                .listeners
                .get(id)?
                .iter()
                .filter(|(name, _)| *name == event.kind)
                .map(|(_, listener)| listener.clone())
                .collect()
        };
        if listeners.is_empty() {
            return None;
        }
        for listener in listeners {
            listener(&mut event);
        }
        Some(event)
    }

    /// Run every queued frame callback; returns how many ran.
    pub fn run_frames(&self) -> usize {
        let frames = std::mem::take(&mut self.state.lock().frames);
        let count = frames.len();
        for frame in frames {
            frame();
        }
        count
    }

    /// Block until at least `count` replacements have happened or
    /// `timeout` elapses. Returns whether the count was reached.
    pub fn wait_for_replacements(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |host| host.replacements.len() >= count)
    }

    /// Block until the document satisfies `pred` or `timeout` elapses.
    pub fn wait_for_html(&self, timeout: Duration, pred: impl Fn(&str) -> bool) -> bool {
        self.wait_until(timeout, |host| pred(&host.document))
    }

    fn wait_until(&self, timeout: Duration, pred: impl Fn(&State) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !pred(&state) {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return pred(&state);
            }
        }
        true
    }
}

impl Host for MemoryHost {
    fn get_element(&self, id: &str) -> Option<ElementHandle> {
        self.contains(id).then(|| ElementHandle::new(id))
    }

    fn replace_outer_html(&self, element: &ElementHandle, markup: &str) {
        let mut state = self.state.lock();
        let Some(span) = markup::element_span(&state.document, element.id()) else {
            tracing::debug!(element = element.id(), "replace on detached element ignored");
            return;
        };
        state.drop_listeners_in(span.clone());
        state.document.replace_range(span, markup);
        state.replacements.push(Replacement {
            id: element.id().to_owned(),
            markup: markup.to_owned(),
        });
        drop(state);
        self.changed.notify_all();
    }

    fn set_inner_html(&self, element: &ElementHandle, markup: &str) {
        let mut state = self.state.lock();
        let Some(span) = markup::content_span(&state.document, element.id()) else {
            tracing::debug!(element = element.id(), "set_inner_html on detached element ignored");
            return;
        };
        state.drop_listeners_in(span.clone());
        state.document.replace_range(span, markup);
        drop(state);
        self.changed.notify_all();
    }

    fn add_event_listener(&self, element: &ElementHandle, event: &str, listener: Listener) {
        self.state
            .lock()
            .listeners
            .entry(element.id().to_owned())
            .or_default()
            .push((event.to_owned(), listener));
    }

    fn request_frame(&self, callback: FrameCallback) {
        self.state.lock().frames.push(callback);
    }
}
