//! Typed callback slot with explicit subscribe/unsubscribe.
//!
//! # Design
//!
//! An [`EventSlot<A>`] is the Rust stand-in for a host event such as
//! `OnGridSplit`: a list of callbacks receiving `&A`. Callers keep the
//! [`ListenerId`] returned by `subscribe()` and hand it back to
//! `unsubscribe()`; nothing is removed implicitly.
//!
//! # Re-entrancy
//!
//! `emit()` snapshots the listener list before the first call and releases
//! the borrow, so listeners may subscribe or unsubscribe (themselves or
//! others) on the same slot while it is being emitted:
//!
//! - a listener removed during emission is skipped if it has not run yet;
//! - a listener added during emission first runs on the next `emit()`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

type Callback<A> = Rc<dyn Fn(&A)>;

/// Identifies one registered callback on one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// A list of callbacks fired with `&A`.
pub struct EventSlot<A> {
    listeners: RefCell<Vec<(ListenerId, Callback<A>)>>,
    next_id: Cell<u64>,
}

impl<A: 'static> Default for EventSlot<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for EventSlot<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSlot")
            .field("listener_count", &self.listeners.borrow().len())
            .finish()
    }
}

impl<A: 'static> EventSlot<A> {
    #[must_use]
    pub fn new() -> Self {
        EventSlot {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    /// Registers `callback` and returns the id needed to remove it again.
    pub fn subscribe(&self, callback: impl Fn(&A) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.listeners.borrow_mut().push((id, Rc::new(callback)));
        id
    }

    /// Removes the callback registered under `id`. Returns `false` if it was
    /// not registered (already removed, or issued by another slot).
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener, _)| *listener != id);
        listeners.len() != before
    }

    #[must_use]
    pub fn is_subscribed(&self, id: ListenerId) -> bool {
        self.listeners.borrow().iter().any(|(listener, _)| *listener == id)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Calls every listener registered at the time of the call, in
    /// registration order.
    pub fn emit(&self, args: &A) {
        let snapshot: Vec<(ListenerId, Callback<A>)> = self
            .listeners
            .borrow()
            .iter()
            .map(|(id, cb)| (*id, Rc::clone(cb)))
            .collect();

        for (id, cb) in snapshot {
            // Skip listeners that an earlier callback unsubscribed.
            if self.is_subscribed(id) {
                cb(args);
            }
        }
    }
}
