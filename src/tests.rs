/// End-to-end tests: documents mounted into a `MemoryHost`, driven through
/// state cells and the render thread.
use crate::{
    ChildList, Component, ComponentId, ComponentRef, Document, Event, Host, Leaf, MemoryHost,
    Result, Runtime, Slot, StateCell, markup, render_component,
};
use parking_lot::{Condvar, Mutex};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing_test::traced_test;

const TIMEOUT: Duration = Duration::from_secs(5);

fn mounted(host: &Arc<MemoryHost>, capacity: usize, roots: &[ComponentRef]) -> Document {
    let document = Document::builder()
        .host(host.clone())
        .queue_capacity(capacity)
        .build()
        .expect("document");
    for root in roots {
        document.add_root(root.clone());
    }
    document.mount().expect("mount");
    document
}

// A list entry with one state cell.
struct Row {
    id: ComponentId,
    label: String,
    hits: StateCell<u32>,
}

impl Component for Row {
    fn id(&self) -> ComponentId {
        self.id
    }

    fn render(&self) -> String {
        format!("<li id=\"{}\">{} {}</li>", self.id, self.label, self.hits.current())
    }
}

fn row(runtime: &Runtime, label: Option<&'static str>) -> Result<Arc<Row>> {
    let id = ComponentId::new();
    let (hits, _set) = StateCell::new(runtime, id, 0)?;
    Ok(Arc::new(Row {
        id,
        label: label.unwrap_or("row").to_owned(),
        hits,
    }))
}

struct Rows {
    id: ComponentId,
    list: ChildList<Row>,
}

impl Component for Rows {
    fn id(&self) -> ComponentId {
        self.id
    }

    fn render(&self) -> String {
        let items: String = self
            .children()
            .iter()
            .map(|child| render_component(&**child))
            .collect();
        format!("<ul id=\"{}\">{items}</ul>", self.id)
    }

    fn children(&self) -> Vec<ComponentRef> {
        self.list.components()
    }
}

#[test]
fn counter_renders_after_set_and_stops_on_teardown() {
    let host = Arc::new(MemoryHost::with_root("app"));
    let document = Document::builder()
        .host(host.clone())
        .build()
        .expect("document");

    let id = ComponentId::new();
    let (count, set_count) = StateCell::new(document.runtime(), id, 0i32).expect("cell");
    let counter: ComponentRef = {
        let shown = count.clone();
        let count = count.clone();
        Arc::new(
            Leaf::with_id(id, move |id| {
                format!("<button id=\"{id}\">{}</button>", shown.current())
            })
            .on_mount(move |id, doc| {
                let count = count.clone();
                let set_count = set_count.clone();
                doc.add_event_listener(&id.to_string(), "click", move |_: &mut Event| {
                    set_count.set(count.current() + 1);
                });
            }),
        )
    };
    document.add_root(counter.clone());
    document.mount().expect("mount");

    let key = id.to_string();
    assert_eq!(host.element_html(&key).as_deref(), Some(format!("<button id=\"{key}\">0</button>").as_str()));

    assert!(host.dispatch(&key, Event::new("click")).is_some());
    assert!(host.wait_for_replacements(1, TIMEOUT));
    document.flush().expect("flush");

    let replacements = host.replacements();
    assert_eq!(replacements.len(), 1);
    assert_eq!(replacements[0].id, key);
    assert_eq!(markup::outer_id(&replacements[0].markup), Some(key.as_str()));
    assert_eq!(count.current(), 1);
    assert_eq!(host.element_html(&key).as_deref(), Some(format!("<button id=\"{key}\">1</button>").as_str()));
    // The remount re-attached the listener the replacement discarded.
    assert_eq!(host.listener_count(&key, "click"), 1);

    document.kill_all_states(&*counter);
    assert!(count.is_cancelled());
    assert!(count.is_stopped());
    document.shutdown();
}

#[test]
fn effects_see_values_in_commit_order() {
    let (runtime, _queue) = Runtime::new(16);
    let (cell, set) = StateCell::new(&runtime, ComponentId::new(), 0u32).expect("cell");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    cell.add_effect(move |v| recorded.lock().push(*v)).expect("effect");

    for v in [1, 2, 3] {
        set.set(v);
    }
    let deadline = std::time::Instant::now() + TIMEOUT;
    while seen.lock().len() < 3 && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(*seen.lock(), vec![1, 2, 3]);
}

#[test]
fn resizing_a_child_list_keeps_the_prefix_and_cancels_the_tail() {
    let host = Arc::new(MemoryHost::with_root("app"));
    let document = Document::builder()
        .host(host.clone())
        .build()
        .expect("document");
    let runtime = document.runtime().clone();
    let rows = Arc::new(Rows {
        id: ComponentId::new(),
        list: ChildList::new(&runtime),
    });
    rows.list
        .reconcile(3, |cfg| row(&runtime, cfg), None)
        .expect("initial rows");
    document.add_root(rows.clone());
    document.mount().expect("mount");
    let first = rows.list.snapshot();

    let outcome = rows
        .list
        .reconcile(5, |cfg| row(&runtime, cfg), None)
        .expect("grow");
    assert_eq!((outcome.kept, outcome.added), (3, 2));
    let grown = rows.list.snapshot();
    assert_eq!(grown.len(), 5);
    for (old, new) in first.iter().zip(&grown) {
        assert!(Arc::ptr_eq(old, new));
    }
    assert!(grown[3..].iter().all(|r| first.iter().all(|f| !Arc::ptr_eq(f, r))));

    document.notify_render(&*rows);
    document.flush().expect("flush");
    let ul = host.element_html(&rows.id.to_string()).expect("list element");
    assert_eq!(markup::ids(&ul).len(), 6);

    rows.list
        .reconcile(2, |cfg| row(&runtime, cfg), None)
        .expect("shrink");
    let cancelled: Vec<bool> = grown.iter().map(|r| r.hits.is_cancelled()).collect();
    assert_eq!(cancelled, vec![false, false, true, true, true]);
    assert!(grown[2..].iter().all(|r| r.hits.is_stopped()));

    document.notify_render(&*rows);
    document.flush().expect("flush");
    assert!(!host.contains(&grown[4].id.to_string()));
    assert!(host.contains(&grown[1].id.to_string()));
    document.shutdown();
}

#[test]
fn configurations_replace_every_entry() {
    let (runtime, _queue) = Runtime::new(16);
    let list = ChildList::new(&runtime);
    list.reconcile(4, |cfg| row(&runtime, cfg), None).expect("rows");
    let before = list.snapshot();

    let outcome = list
        .reconcile(2, |cfg| row(&runtime, cfg), Some(vec!["a", "b"]))
        .expect("replace");
    assert_eq!(outcome.removed, 4);
    assert!(before.iter().all(|r| r.hits.is_cancelled()));
    let labels: Vec<String> = list.snapshot().iter().map(|r| r.label.clone()).collect();
    assert_eq!(labels, vec!["a".to_owned(), "b".to_owned()]);
    assert!(list.snapshot().iter().all(|r| !r.hits.is_cancelled()));
}

#[test]
fn swap_cancels_outgoing_child_before_incoming_renders() {
    let host = Arc::new(MemoryHost::with_root("app"));
    let document = Document::builder()
        .host(host.clone())
        .build()
        .expect("document");
    let runtime = document.runtime().clone();

    let x_id = ComponentId::new();
    let (x_cell, x_set) = StateCell::new(&runtime, x_id, 0u32).expect("cell");
    let x: ComponentRef = Arc::new(Leaf::with_id(x_id, |id| format!("<b id=\"{id}\">x</b>")));

    // Y records whether X was already cancelled each time it renders.
    let x_cancelled_at_render = Arc::new(Mutex::new(Vec::new()));
    let y: ComponentRef = {
        let x_cell = x_cell.clone();
        let seen = x_cancelled_at_render.clone();
        Arc::new(Leaf::new(move |id| {
            seen.lock().push(x_cell.is_cancelled());
            format!("<i id=\"{id}\">y</i>")
        }))
    };

    let slot = Arc::new(Slot::new(&runtime).with_child(x.clone()));
    document.add_root(slot.clone());
    document.mount().expect("mount");
    assert!(host.contains(&x_id.to_string()));

    slot.swap(Some(y.clone()));
    assert!(x_cell.is_cancelled());
    assert!(x_cell.is_stopped());

    document.notify_render(&*slot);
    document.flush().expect("flush");
    assert_eq!(*x_cancelled_at_render.lock(), vec![true]);
    assert!(host.contains(&y.id().to_string()));
    assert!(!host.contains(&x_id.to_string()));

    // Sets on the torn-down cell publish nothing.
    let before = host.replacement_count();
    x_set.set(5);
    document.flush().expect("flush");
    assert_eq!(host.replacement_count(), before);
    document.shutdown();
}

// Holds the render thread inside `render()` while closed.
struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    fn new() -> Arc<Self> {
        Arc::new(Gate {
            open: Mutex::new(true),
            changed: Condvar::new(),
        })
    }

    fn set(&self, open: bool) {
        *self.open.lock() = open;
        self.changed.notify_all();
    }
}

/// A leaf that blocks in `render()` while `gate` is closed, reporting on the
/// returned channel each time it starts waiting.
fn gated(gate: &Arc<Gate>) -> (ComponentRef, mpsc::Receiver<()>) {
    let (entered_tx, entered) = mpsc::channel();
    let entered_tx = Mutex::new(entered_tx);
    let gate = gate.clone();
    let leaf = Leaf::new(move |id| {
        let mut open = gate.open.lock();
        if !*open {
            let _ = entered_tx.lock().send(());
            while !*open {
                gate.changed.wait(&mut open);
            }
        }
        format!("<p id=\"{id}\"></p>")
    });
    (Arc::new(leaf), entered)
}

fn flush_within(document: &Document, timeout: Duration) -> bool {
    let (tx, rx) = mpsc::channel();
    let document = document.clone();
    thread::spawn(move || {
        let _ = tx.send(document.flush().is_ok());
    });
    rx.recv_timeout(timeout).unwrap_or(false)
}

#[test]
fn full_render_queue_blocks_producers() {
    let host = Arc::new(MemoryHost::with_root("app"));
    let gate = Gate::new();
    let (slow, entered) = gated(&gate);
    let document = mounted(&host, 1, std::slice::from_ref(&slow));

    gate.set(false);
    document.notify_render(&*slow);
    entered.recv_timeout(TIMEOUT).expect("render thread busy");

    // The render thread is stuck inside render(); this fills the queue.
    document.notify_render(&*slow);

    let done = Arc::new(AtomicBool::new(false));
    let producer = {
        let document = document.clone();
        let slow = slow.clone();
        let done = done.clone();
        thread::spawn(move || {
            document.notify_render(&*slow);
            done.store(true, Ordering::SeqCst);
        })
    };
    thread::sleep(Duration::from_millis(50));
    assert!(!done.load(Ordering::SeqCst));

    gate.set(true);
    producer.join().expect("producer");
    assert!(done.load(Ordering::SeqCst));
    document.flush().expect("flush");
    assert_eq!(host.replacement_count(), 3);
    document.shutdown();
}

#[test]
fn teardown_on_the_render_thread_with_a_full_queue() {
    let host = Arc::new(MemoryHost::with_root("app"));
    let gate = Gate::new();
    let (slow, entered) = gated(&gate);

    let document = Document::builder()
        .host(host.clone())
        .queue_capacity(1)
        .build()
        .expect("document");
    let x_id = ComponentId::new();
    let (x_cell, x_set) = StateCell::new(document.runtime(), x_id, 0u32).expect("cell");
    let x: ComponentRef = Arc::new(Leaf::with_id(x_id, |id| format!("<b id=\"{id}\"></b>")));
    document.add_root(slow.clone());
    document.add_root(x.clone());
    document.mount().expect("mount");

    gate.set(false);
    document.notify_render(&*slow);
    entered.recv_timeout(TIMEOUT).expect("render thread busy");
    document.notify_render(&*slow);

    // X's consumer commits, then waits for queue space.
    x_set.set(1);
    let deadline = std::time::Instant::now() + TIMEOUT;
    while x_cell.current() != 1 && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(x_cell.current(), 1);
    assert!(!x_cell.is_stopped());

    {
        let doc = document.clone();
        let x = x.clone();
        document.after_next_mount(move || doc.kill_all_states(&*x));
    }
    gate.set(true);

    assert!(flush_within(&document, TIMEOUT), "render thread stalled");
    assert!(x_cell.is_cancelled());
    assert!(x_cell.is_stopped());
    // Only the two queued renders of the slow component reached the host.
    let replaced: Vec<String> = host.replacements().into_iter().map(|r| r.id).collect();
    assert_eq!(replaced, vec![slow.id().to_string(); 2]);
    document.shutdown();
}

#[test]
fn malformed_markup_does_not_stop_the_render_thread() {
    let host = Arc::new(MemoryHost::with_root("app"));
    let broken = Arc::new(AtomicBool::new(false));
    let a: ComponentRef = {
        let broken = broken.clone();
        Arc::new(Leaf::new(move |id| {
            if broken.load(Ordering::SeqCst) {
                format!("<p id=\"{id}\" title=\"café")
            } else {
                format!("<p id=\"{id}\">a</p>")
            }
        }))
    };
    let b: ComponentRef = Arc::new(Leaf::new(|id| format!("<p id=\"{id}\">b</p>")));
    let document = mounted(&host, 8, &[b.clone(), a.clone()]);

    broken.store(true, Ordering::SeqCst);
    document.notify_render(&*a);
    document.flush().expect("flush after malformed render");

    document.notify_render(&*b);
    document.flush().expect("flush");
    let replaced: Vec<String> = host.replacements().into_iter().map(|r| r.id).collect();
    assert_eq!(replaced, vec![a.id().to_string(), b.id().to_string()]);
    assert!(host.html().contains("title=\"café"));
    document.shutdown();
}

#[test]
fn renders_are_applied_in_queue_order() {
    let host = Arc::new(MemoryHost::with_root("app"));
    let a: ComponentRef = Arc::new(Leaf::new(|id| format!("<p id=\"{id}\">a</p>")));
    let b: ComponentRef = Arc::new(Leaf::new(|id| format!("<p id=\"{id}\">b</p>")));
    let document = mounted(&host, 8, &[a.clone(), b.clone()]);

    document.notify_render(&*a);
    document.notify_render(&*b);
    document.notify_render(&*a);
    document.flush().expect("flush");

    let order: Vec<String> = host.replacements().into_iter().map(|r| r.id).collect();
    assert_eq!(order, vec![a.id().to_string(), b.id().to_string(), a.id().to_string()]);
    document.shutdown();
}

#[test]
fn teardown_silences_the_whole_subtree() {
    let host = Arc::new(MemoryHost::with_root("app"));
    let document = Document::builder()
        .host(host.clone())
        .build()
        .expect("document");
    let runtime = document.runtime().clone();
    let rows = Arc::new(Rows {
        id: ComponentId::new(),
        list: ChildList::new(&runtime),
    });
    rows.list
        .reconcile(3, |cfg| row(&runtime, cfg), None)
        .expect("rows");
    document.add_root(rows.clone());
    document.mount().expect("mount");

    let setters: Vec<_> = rows.list.snapshot().iter().map(|r| r.hits.setter()).collect();
    document.kill_all_states(&*rows);
    assert_eq!(runtime.registry().owner_count(), 0);

    for set in &setters {
        set.set(1);
    }
    document.flush().expect("flush");
    assert_eq!(host.replacement_count(), 0);
    document.shutdown();
}

#[test]
fn listeners_attach_after_next_mount() {
    let host = Arc::new(MemoryHost::with_root("app"));
    let leaf: ComponentRef = Arc::new(Leaf::new(|id| {
        format!("<form id=\"{id}\"><input id=\"{id}-name\"></form>")
    }));
    let document = mounted(&host, 8, std::slice::from_ref(&leaf));

    let submitted = Arc::new(AtomicUsize::new(0));
    let input = format!("{}-name", leaf.id());
    {
        let document = document.clone();
        let input = input.clone();
        let submitted = submitted.clone();
        document.clone().after_next_mount(move || {
            document.add_event_listener(&input, "keydown", move |event: &mut Event| {
                if event.key.as_deref() == Some("Enter") && !event.shift_key {
                    event.prevent_default();
                    submitted.fetch_add(1, Ordering::SeqCst);
                }
            });
        });
    }
    document.notify_render(&*leaf);
    document.flush().expect("flush");

    let event = host
        .dispatch(&input, Event::new("keydown").with_key("Enter", false))
        .expect("listener attached");
    assert!(event.default_prevented());
    assert!(host.dispatch(&input, Event::new("keydown").with_key("Enter", true)).is_some());
    assert_eq!(submitted.load(Ordering::SeqCst), 1);
    document.shutdown();
}

#[test]
#[traced_test]
fn second_teardown_warns() {
    let (runtime, _queue) = Runtime::new(4);
    let id = ComponentId::new();
    let (_cell, _set) = StateCell::new(&runtime, id, ()).expect("cell");
    let leaf = Leaf::with_id(id, |id| format!("<p id=\"{id}\"></p>"));

    runtime.kill_all_states(&leaf);
    assert!(!logs_contain("teardown of component with no live state"));
    runtime.kill_all_states(&leaf);
    assert!(logs_contain("teardown of component with no live state"));
}

#[test]
fn host_trait_objects_drive_the_document() {
    let host = Arc::new(MemoryHost::with_root("app"));
    let dyn_host: Arc<dyn Host> = host.clone();
    let document = Document::builder()
        .host(dyn_host)
        .root_element("app")
        .thread_name("render-under-test")
        .build()
        .expect("document");
    assert!(document.host().get_element("app").is_some());
    assert_eq!(document.root_element(), "app");
    document.shutdown();
}
