//! Path-keyed event bus
//!
//! Listeners register under `"<verb>:<path>"` event names. The registry is a
//! trie per verb, so triggering `set:todos.1` also reaches listeners of
//! `set:todos.1.name` (with an empty payload).
//!
//! Key types:
//! - `EventBus`: cheap-to-clone handle (`listen`, `unlisten`, `trigger`)
//! - `Payload`: what a trigger carries (`set:` value, `add:`/`delete:` splice)
//! - `ListenerId`: one id per `listen` call, shared by all its event names
//!
//! Dispatch is synchronous and reentrant: callbacks may trigger, listen and
//! unlisten. No registry borrow is held while a callback runs.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

/// Handle returned by [`EventBus::listen`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Data carried by a trigger
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    /// New value of a `set:` path
    Value(Value),
    /// `add:`/`delete:` range: first affected position and item count
    Splice { index: usize, length: usize },
}

impl Payload {
    pub fn splice(&self) -> Option<(usize, usize)> {
        match self {
            Payload::Splice { index, length } => Some((*index, *length)),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Payload::Value(value) => Some(value),
            _ => None,
        }
    }
}

pub type Callback = Rc<dyn Fn(&Payload)>;

struct Entry {
    id: ListenerId,
    /// Cleared on unlisten so an in-progress dispatch skips it
    active: Cell<bool>,
    callback: Callback,
}

#[derive(Default)]
struct Node {
    listeners: Vec<Rc<Entry>>,
    children: FxHashMap<String, Node>,
}

impl Node {
    fn collect(&self, out: &mut Vec<Rc<Entry>>) {
        out.extend(self.listeners.iter().cloned());
        for child in self.children.values() {
            child.collect(out);
        }
    }

    fn deactivate_all(&self) {
        for entry in &self.listeners {
            entry.active.set(false);
        }
        for child in self.children.values() {
            child.deactivate_all();
        }
    }

    fn count(&self) -> usize {
        self.listeners.len() + self.children.values().map(Node::count).sum::<usize>()
    }

    /// Drop empty branches below this node
    fn prune(&mut self) {
        self.children.retain(|_, child| {
            child.prune();
            !child.listeners.is_empty() || !child.children.is_empty()
        });
    }
}

/// `"set:todos.1"` -> (`"set"`, `["todos", "1"]`). An empty path (`"set:"`)
/// addresses the verb root.
fn split_event(event: &str) -> (&str, impl Iterator<Item = &str>) {
    let (verb, path) = event.split_once(':').unwrap_or((event, ""));
    (verb, path.split('.').filter(|segment| !segment.is_empty()))
}

#[derive(Default)]
struct Registry {
    roots: FxHashMap<String, Node>,
    next_id: u64,
}

impl Registry {
    fn node(&self, event: &str) -> Option<&Node> {
        let (verb, segments) = split_event(event);
        let mut node = self.roots.get(verb)?;
        for segment in segments {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    fn node_mut(&mut self, event: &str) -> Option<&mut Node> {
        let (verb, segments) = split_event(event);
        let mut node = self.roots.get_mut(verb)?;
        for segment in segments {
            node = node.children.get_mut(segment)?;
        }
        Some(node)
    }

    fn node_or_insert(&mut self, event: &str) -> &mut Node {
        let (verb, segments) = split_event(event);
        let mut node = self.roots.entry(verb.to_string()).or_default();
        for segment in segments {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node
    }

    fn prune(&mut self, event: &str) {
        let (verb, _) = split_event(event);
        if let Some(root) = self.roots.get_mut(verb) {
            root.prune();
            if root.listeners.is_empty() && root.children.is_empty() {
                self.roots.remove(verb);
            }
        }
    }
}

struct Inner {
    registry: RefCell<Registry>,
    in_flight: RefCell<FxHashSet<String>>,
    guard_reentry: Cell<bool>,
}

/// Clears the in-flight marker when a dispatch ends, unwinding included
struct InFlight<'a> {
    set: &'a RefCell<FxHashSet<String>>,
    event: &'a str,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.borrow_mut().remove(self.event);
    }
}

/// Publish/subscribe registry keyed by data path
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<Inner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                registry: RefCell::new(Registry::default()),
                in_flight: RefCell::new(FxHashSet::default()),
                guard_reentry: Cell::new(true),
            }),
        }
    }

    /// Skip (and warn about) triggers of an event that is already being
    /// dispatched. On by default.
    pub fn set_reentry_guard(&self, enabled: bool) {
        self.inner.guard_reentry.set(enabled);
    }

    /// Register `callback` under every space-separated name in `events`
    pub fn listen(&self, events: &str, callback: impl Fn(&Payload) + 'static) -> ListenerId {
        let callback: Callback = Rc::new(callback);
        let mut registry = self.inner.registry.borrow_mut();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;

        for event in events.split_whitespace() {
            registry.node_or_insert(event).listeners.push(Rc::new(Entry {
                id,
                active: Cell::new(true),
                callback: Rc::clone(&callback),
            }));
        }
        tracing::debug!(%id, events, "listen");
        id
    }

    /// Remove listener `id` from each named bucket, or with `None` clear
    /// each bucket together with its descendant paths.
    ///
    /// Unknown events and already-removed listeners are ignored.
    pub fn unlisten(&self, events: &str, id: Option<ListenerId>) {
        let mut registry = self.inner.registry.borrow_mut();
        for event in events.split_whitespace() {
            let Some(node) = registry.node_mut(event) else {
                continue;
            };
            match id {
                Some(id) => node.listeners.retain(|entry| {
                    if entry.id == id {
                        entry.active.set(false);
                        false
                    } else {
                        true
                    }
                }),
                None => {
                    node.deactivate_all();
                    node.listeners.clear();
                    node.children.clear();
                }
            }
            registry.prune(event);
        }
        match id {
            Some(id) => tracing::debug!(%id, events, "unlisten"),
            None => tracing::debug!(events, "unlisten all"),
        }
    }

    /// Dispatch every space-separated name in `events`: the event's own
    /// listeners receive `payload`, listeners of descendant paths follow
    /// with [`Payload::None`], each group in registration order.
    pub fn trigger(&self, events: &str, payload: Payload) {
        for event in events.split_whitespace() {
            self.dispatch(event, &payload);
        }
    }

    fn dispatch(&self, event: &str, payload: &Payload) {
        let fresh = self.inner.in_flight.borrow_mut().insert(event.to_string());
        if !fresh && self.inner.guard_reentry.get() {
            tracing::warn!(event, "re-entrant trigger skipped");
            return;
        }
        let _in_flight = fresh.then(|| InFlight {
            set: &self.inner.in_flight,
            event,
        });

        let (own, mut descendants) = {
            let registry = self.inner.registry.borrow();
            let Some(node) = registry.node(event) else {
                tracing::trace!(event, "trigger without listeners");
                return;
            };
            let mut descendants = Vec::new();
            for child in node.children.values() {
                child.collect(&mut descendants);
            }
            (node.listeners.clone(), descendants)
        };
        descendants.sort_by_key(|entry| entry.id);

        tracing::trace!(
            event,
            own = own.len(),
            descendants = descendants.len(),
            "trigger"
        );

        for entry in &own {
            if entry.active.get() {
                (entry.callback)(payload);
            }
        }
        for entry in &descendants {
            if entry.active.get() {
                (entry.callback)(&Payload::None);
            }
        }
    }

    /// Listeners registered directly under `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .registry
            .borrow()
            .node(event)
            .map_or(0, |node| node.listeners.len())
    }

    /// Listeners under `event` and every descendant path
    pub fn subtree_count(&self, event: &str) -> usize {
        self.inner.registry.borrow().node(event).map_or(0, Node::count)
    }

    pub fn total_listeners(&self) -> usize {
        self.inner
            .registry
            .borrow()
            .roots
            .values()
            .map(Node::count)
            .sum()
    }

    pub fn is_dispatching(&self, event: &str) -> bool {
        self.inner.in_flight.borrow().contains(event)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.total_listeners())
            .field("guard_reentry", &self.inner.guard_reentry.get())
            .finish()
    }
}
