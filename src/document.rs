//! The root of the component forest.
//!
//! A [`Document`] owns the host binding, the root components, the render
//! queue's consumer thread and an index from component id to component.
//! It is built with [`DocumentBuilder`]:
//!
//! ```ignore
//! let document = Document::builder()
//!     .host(Arc::new(MemoryHost::with_root("app")))
//!     .root_element("app")
//!     .queue_capacity(100)
//!     .build()?;
//!
//! document.add_root(counter);
//! document.mount()?;
//! ```

use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use papaya::HashMap as PapayaHashMap;
use parking_lot::{Mutex, RwLock};

use crate::component::{Component, ComponentRef, render_component};
use crate::error::{Error, Result};
use crate::hash::FastHashBuilder;
use crate::host::{Event, FrameCallback, Host};
use crate::id::ComponentId;
use crate::runtime::Runtime;
use crate::scheduler::{self, RenderMessage};

/// Default render queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default id of the host element the document mounts into.
pub const DEFAULT_ROOT_ELEMENT: &str = "app";

/// Default name of the render thread.
pub const DEFAULT_THREAD_NAME: &str = "weft-render";

type AfterMount = Box<dyn FnOnce() + Send>;

/// Builder for configuring a [`Document`] and starting its render thread.
pub struct DocumentBuilder {
    host: Option<Arc<dyn Host>>,
    root_element: String,
    queue_capacity: usize,
    thread_name: String,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    /// Defaults:
    /// - `root_element`: `"app"`
    /// - `queue_capacity`: 100
    /// - `thread_name`: `"weft-render"`
    ///
    /// A host must be supplied before [`build`](Self::build).
    pub fn new() -> Self {
        Self {
            host: None,
            root_element: DEFAULT_ROOT_ELEMENT.to_owned(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
        }
    }

    /// Set the host binding.
    pub fn host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    /// Set the id of the host element roots are mounted into.
    pub fn root_element(mut self, id: impl Into<String>) -> Self {
        self.root_element = id.into();
        self
    }

    /// Set the render queue capacity. Producers block while it is full.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the render thread's name.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Create the document and start its render thread.
    ///
    /// Fails with [`Error::HostBindingAbsent`] if no host was supplied.
    pub fn build(self) -> Result<Document> {
        let host = self.host.ok_or(Error::HostBindingAbsent)?;
        let (runtime, queue) = Runtime::new(self.queue_capacity);
        let document = Document {
            inner: Arc::new(Inner {
                runtime,
                host,
                root_element: self.root_element,
                roots: RwLock::new(Vec::new()),
                index: PapayaHashMap::with_hasher(FastHashBuilder),
                after_mount: Mutex::new(Vec::new()),
                render_thread: Mutex::new(None),
            }),
        };
        let handle = scheduler::spawn(document.clone(), queue, self.thread_name)?;
        *document.inner.render_thread.lock() = Some(handle);
        Ok(document)
    }
}

struct Inner {
    runtime: Runtime,
    host: Arc<dyn Host>,
    root_element: String,
    roots: RwLock<Vec<ComponentRef>>,
    index: PapayaHashMap<ComponentId, Weak<dyn Component>, FastHashBuilder>,
    after_mount: Mutex<Vec<AfterMount>>,
    render_thread: Mutex<Option<JoinHandle<()>>>,
}

/// Shared handle to a document. Cheap to clone.
#[derive(Clone)]
pub struct Document {
    inner: Arc<Inner>,
}

impl Document {
    /// Start configuring a document.
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }

    /// The runtime state cells of this document's components use.
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// The host binding.
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.inner.host
    }

    /// Id of the host element roots are mounted into.
    pub fn root_element(&self) -> &str {
        &self.inner.root_element
    }

    /// Append a root component. Takes effect on the next [`mount`](Self::mount).
    pub fn add_root(&self, component: ComponentRef) {
        self.inner.roots.write().push(component);
    }

    /// The root components, in mount order.
    pub fn roots(&self) -> Vec<ComponentRef> {
        self.inner.roots.read().clone()
    }

    /// Render every root into the host's root element and register
    /// listeners over the whole forest.
    pub fn mount(&self) -> Result<()> {
        let root = self
            .inner
            .host
            .get_element(&self.inner.root_element)
            .ok_or_else(|| Error::RootElementMissing {
                id: self.inner.root_element.clone(),
            })?;

        let roots = self.roots();
        let html: String = roots.iter().map(|root| render_component(&**root)).collect();
        self.inner.host.set_inner_html(&root, &html);
        for component in &roots {
            self.attach_subtree(component);
        }
        tracing::debug!(roots = roots.len(), "document mounted");
        self.run_after_mount();
        Ok(())
    }

    /// Queue a re-render of `component`. Blocks while the render queue is
    /// full.
    pub fn notify_render(&self, component: &dyn Component) {
        if !self.inner.runtime.notify_render(component.id()) {
            tracing::debug!(component = %component.id(), "render scheduler stopped; request dropped");
        }
    }

    /// Attach `listener` to the host element `element_id`.
    ///
    /// Returns `false`, logging at debug level, when no such element is
    /// mounted.
    pub fn add_event_listener<F>(&self, element_id: &str, event: &str, listener: F) -> bool
    where
        F: Fn(&mut Event) + Send + Sync + 'static,
    {
        let Some(element) = self.inner.host.get_element(element_id) else {
            tracing::debug!(element = element_id, event, "listener target not found");
            return false;
        };
        self.inner
            .host
            .add_event_listener(&element, event, Arc::new(listener));
        true
    }

    /// Run `callback` on the host's next presentation tick.
    pub fn request_frame(&self, callback: impl FnOnce() + Send + 'static) {
        let callback: FrameCallback = Box::new(callback);
        self.inner.host.request_frame(callback);
    }

    /// Run `callback` once the next mount or re-render has replaced its
    /// markup and re-attached listeners. Runs on the thread that did the
    /// mounting.
    pub fn after_next_mount(&self, callback: impl FnOnce() + Send + 'static) {
        self.inner.after_mount.lock().push(Box::new(callback));
    }

    /// Tear down `component` and its descendants. See
    /// [`Runtime::kill_all_states`].
    pub fn kill_all_states(&self, component: &dyn Component) {
        self.inner.runtime.kill_all_states(component);
    }

    /// Wait until every render request queued before this call has been
    /// processed.
    ///
    /// Must not be called from the render thread.
    pub fn flush(&self) -> Result<()> {
        let (ack, done) = mpsc::channel();
        self.inner.runtime.send(RenderMessage::Barrier(ack))?;
        done.recv().map_err(|_| Error::SchedulerStopped)
    }

    /// Tear down every root, empty the root element and stop the render
    /// thread.
    pub fn shutdown(&self) {
        let roots = std::mem::take(&mut *self.inner.roots.write());
        for root in &roots {
            self.inner.runtime.kill_all_states(&**root);
        }
        if let Some(element) = self.inner.host.get_element(&self.inner.root_element) {
            self.inner.host.set_inner_html(&element, "");
        }
        self.inner.index.pin().clear();

        let handle = self.inner.render_thread.lock().take();
        if self.inner.runtime.send(RenderMessage::Shutdown).is_err() {
            return;
        }
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                tracing::warn!("render scheduler panicked");
            }
        }
    }

    /// Look up a mounted component by id.
    pub fn lookup(&self, id: ComponentId) -> Option<ComponentRef> {
        let index = self.inner.index.pin();
        match index.get(&id).map(Weak::upgrade) {
            Some(Some(component)) => Some(component),
            Some(None) => {
                index.remove(&id);
                None
            }
            None => None,
        }
    }

    /// Index `component` and its descendants and run their
    /// `init_listeners`, parents before children.
    pub(crate) fn attach_subtree(&self, component: &ComponentRef) {
        self.inner
            .index
            .pin()
            .insert(component.id(), Arc::downgrade(component));
        component.init_listeners(self);
        for child in component.children() {
            self.attach_subtree(&child);
        }
    }

    pub(crate) fn run_after_mount(&self) {
        let callbacks = std::mem::take(&mut *self.inner.after_mount.lock());
        for callback in callbacks {
            callback();
        }
    }

    /// Process one render request on the calling thread, bypassing the
    /// queue.
    pub fn render_now(&self, component: &dyn Component) {
        scheduler::remount(self, component.id());
    }
}
