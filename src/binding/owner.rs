//! Subscription ownership
//!
//! Every listener a mount registers is recorded in an [`Owner`]. Disposing
//! the owner runs the recorded cleanups in reverse order, which unregisters
//! exactly the listeners that mount created.

use std::cell::{Cell, RefCell};
use std::fmt;

use crate::bus::{EventBus, ListenerId};

/// Cleanup function run when an owner is disposed
pub type Cleanup = Box<dyn FnOnce()>;

#[derive(Default)]
pub struct Owner {
    cleanups: RefCell<Vec<Cleanup>>,
    disposed: Cell<bool>,
}

impl Owner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cleanup. On an already disposed owner it runs at once.
    pub fn on_dispose(&self, cleanup: impl FnOnce() + 'static) {
        if self.disposed.get() {
            cleanup();
            return;
        }
        self.cleanups.borrow_mut().push(Box::new(cleanup));
    }

    /// Record a bus subscription so disposal unlistens it
    pub fn track(&self, bus: &EventBus, events: String, id: ListenerId) {
        let bus = bus.clone();
        self.on_dispose(move || bus.unlisten(&events, Some(id)));
    }

    /// Run every cleanup, newest first. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        // released before running: a cleanup may call back into this owner
        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Pending cleanups
    pub fn len(&self) -> usize {
        self.cleanups.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cleanups.borrow().is_empty()
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("cleanups", &self.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn dispose_runs_cleanups_in_reverse_once() {
        let owner = Owner::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let order = order.clone();
            owner.on_dispose(move || order.borrow_mut().push(n));
        }
        owner.dispose();
        owner.dispose();
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
        assert!(owner.is_empty());
    }

    #[test]
    fn late_cleanup_runs_immediately() {
        let owner = Owner::new();
        owner.dispose();
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        owner.on_dispose(move || flag.set(true));
        assert!(ran.get());
    }

    #[test]
    fn track_unlistens_on_dispose() {
        let bus = EventBus::new();
        let owner = Owner::new();
        let id = bus.listen("set:a set:b", |_| {});
        owner.track(&bus, "set:a set:b".to_string(), id);
        bus.listen("set:a", |_| {});

        owner.dispose();
        assert_eq!(bus.listener_count("set:a"), 1);
        assert_eq!(bus.listener_count("set:b"), 0);
    }
}
