//! The component contract and two general-purpose components.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::document::Document;
use crate::id::ComponentId;
use crate::markup;
use crate::runtime::Runtime;

/// A unit of UI: identity, markup, children and listeners.
///
/// Components are shared between the application, their parent and the
/// render thread, so they are `Send + Sync` and handled as
/// [`ComponentRef`]s. Mutable parts (state, child lists) live behind the
/// component's own synchronization.
pub trait Component: Send + Sync {
    /// Identity, constant for the component's lifetime.
    fn id(&self) -> ComponentId;

    /// Markup with exactly one outermost element whose `id` attribute is
    /// `self.id()`.
    ///
    /// A panic here is caught by the renderer, which substitutes a
    /// placeholder element.
    fn render(&self) -> String;

    /// Owned children, in order.
    fn children(&self) -> Vec<ComponentRef> {
        Vec::new()
    }

    /// Register event listeners against host elements, typically through
    /// [`Document::add_event_listener`]. Called after every mount or
    /// remount of a subtree containing this component; children are
    /// visited separately.
    fn init_listeners(&self, _document: &Document) {}
}

/// Shared reference to a component.
pub type ComponentRef = Arc<dyn Component>;

/// Render `component`, recovering from a panicking `render()`.
///
/// Markup whose outermost id does not match the component id is passed
/// through unchanged but logged, since the host will not be able to find
/// the element on the next re-render.
pub fn render_component(component: &dyn Component) -> String {
    let id = component.id();
    // The markup scan runs under the same guard as `render()`: nothing a
    // component returns may take the render thread down.
    let rendered = catch_unwind(AssertUnwindSafe(|| {
        let html = component.render();
        let found = markup::outer_id(&html).map(str::to_owned);
        (html, found)
    }));
    match rendered {
        Ok((html, found)) => {
            if found.as_deref() != Some(id.to_string().as_str()) {
                tracing::warn!(
                    component = %id,
                    found = ?found,
                    "rendered markup does not carry the component id"
                );
            }
            html
        }
        Err(_) => {
            tracing::warn!(component = %id, "render panicked; using placeholder");
            markup::placeholder(id)
        }
    }
}

type RenderFn = Box<dyn Fn(ComponentId) -> String + Send + Sync>;
type ListenerFn = Box<dyn Fn(ComponentId, &Document) + Send + Sync>;

/// A childless component defined by closures.
pub struct Leaf {
    id: ComponentId,
    render: RenderFn,
    listeners: Option<ListenerFn>,
}

impl Leaf {
    /// Leaf with a fresh id. `render` receives the id to put on its outer
    /// element.
    pub fn new(render: impl Fn(ComponentId) -> String + Send + Sync + 'static) -> Self {
        Self::with_id(ComponentId::new(), render)
    }

    /// Leaf with a caller-chosen id, for components whose state cells are
    /// created before the component itself.
    pub fn with_id(
        id: ComponentId,
        render: impl Fn(ComponentId) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            render: Box::new(render),
            listeners: None,
        }
    }

    /// Builder: listener registration hook.
    pub fn on_mount(
        mut self,
        listeners: impl Fn(ComponentId, &Document) + Send + Sync + 'static,
    ) -> Self {
        self.listeners = Some(Box::new(listeners));
        self
    }
}

impl Component for Leaf {
    fn id(&self) -> ComponentId {
        self.id
    }

    fn render(&self) -> String {
        (self.render)(self.id)
    }

    fn init_listeners(&self, document: &Document) {
        if let Some(listeners) = &self.listeners {
            listeners(self.id, document);
        }
    }
}

impl fmt::Debug for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leaf").field("id", &self.id).finish_non_exhaustive()
    }
}

/// A component that renders its children inside one wrapping element.
///
/// Removing children through [`remove`](Self::remove) or
/// [`clear`](Self::clear) tears them down. The container does not publish
/// render requests itself; call [`Document::notify_render`] after a batch
/// of changes.
pub struct Container {
    id: ComponentId,
    tag: String,
    attrs: String,
    runtime: Runtime,
    children: RwLock<Vec<ComponentRef>>,
}

impl Container {
    /// An empty `<div>` container.
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            id: ComponentId::new(),
            tag: "div".to_owned(),
            attrs: String::new(),
            runtime: runtime.clone(),
            children: RwLock::new(Vec::new()),
        }
    }

    /// Builder: wrapping element name.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Builder: extra attributes for the wrapping element, written verbatim
    /// after the id (e.g. `class="list"`).
    pub fn with_attrs(mut self, attrs: impl Into<String>) -> Self {
        self.attrs = attrs.into();
        self
    }

    /// Append a child.
    pub fn push(&self, child: ComponentRef) {
        self.children.write().push(child);
    }

    /// Remove the child at `index`, tearing down its state.
    pub fn remove(&self, index: usize) -> Option<ComponentRef> {
        let removed = {
            let mut children = self.children.write();
            (index < children.len()).then(|| children.remove(index))
        }?;
        self.runtime.kill_all_states(&*removed);
        Some(removed)
    }

    /// Remove every child, tearing down their state.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.children.write());
        for child in &removed {
            self.runtime.kill_all_states(&**child);
        }
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.children.read().len()
    }

    /// Whether the container has no children.
    pub fn is_empty(&self) -> bool {
        self.children.read().is_empty()
    }
}

impl Component for Container {
    fn id(&self) -> ComponentId {
        self.id
    }

    fn render(&self) -> String {
        let inner: String = self
            .children()
            .iter()
            .map(|child| render_component(&**child))
            .collect();
        let sep = if self.attrs.is_empty() { "" } else { " " };
        format!(
            "<{tag} id=\"{id}\"{sep}{attrs}>{inner}</{tag}>",
            tag = self.tag,
            id = self.id,
            attrs = self.attrs
        )
    }

    fn children(&self) -> Vec<ComponentRef> {
        self.children.read().clone()
    }
}
