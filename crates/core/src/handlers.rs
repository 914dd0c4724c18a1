//! Listener registry and scoped subscriptions.
//!
//! Listeners live in a [`HandlerMap`], an [`IndexMap`] keyed by [`HandlerId`]
//! so emission follows registration order. Registering returns a
//! [`Subscription`] that unregisters on drop.
//!
//! Everything here is single-threaded: listeners are `Rc` closures and may
//! capture non-`Send` host objects such as DOM nodes or JS callbacks.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

/// Unique identifier for a registered listener.
pub type HandlerId = u64;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a new globally-unique handler ID.
pub fn next_handler_id() -> HandlerId {
	NEXT_HANDLER_ID.fetch_add(1, Ordering::SeqCst)
}

/// Listener callback receiving `&E`.
pub type HandlerFn<E> = Rc<dyn Fn(&E)>;

type Handlers<E> = RefCell<IndexMap<HandlerId, HandlerFn<E>>>;

/// Shared, ordered set of listeners for events of type `E`.
pub struct HandlerMap<E> {
	handlers: Rc<Handlers<E>>,
}

impl<E> Clone for HandlerMap<E> {
	fn clone(&self) -> Self {
		Self {
			handlers: Rc::clone(&self.handlers),
		}
	}
}

impl<E: 'static> Default for HandlerMap<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<E: 'static> HandlerMap<E> {
	pub fn new() -> Self {
		Self {
			handlers: Rc::new(RefCell::new(IndexMap::new())),
		}
	}

	/// Registers `handler`; it stays registered until the returned
	/// [`Subscription`] is dropped.
	pub fn insert(&self, handler: impl Fn(&E) + 'static) -> Subscription {
		let id = next_handler_id();
		self.handlers.borrow_mut().insert(id, Rc::new(handler));
		Subscription::from_handler_map(id, self)
	}

	/// Calls every registered listener with `event`.
	///
	/// Listeners are snapshotted first, so a listener may subscribe or drop
	/// subscriptions while being called.
	pub fn emit(&self, event: &E) {
		let handlers: Vec<HandlerFn<E>> = self.handlers.borrow().values().cloned().collect();
		for handler in handlers {
			handler(event);
		}
	}

	pub fn len(&self) -> usize {
		self.handlers.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.handlers.borrow().is_empty()
	}
}

/// RAII handle that releases a listener registration on drop.
///
/// Host bindings return one from [`Host::subscribe`](crate::Host::subscribe)
/// and remove their native listeners in the dropper.
pub struct Subscription {
	id: HandlerId,
	dropper: Option<Box<dyn FnOnce(HandlerId)>>,
}

impl Subscription {
	/// Creates a subscription with a custom dropper.
	pub fn new(id: HandlerId, dropper: impl FnOnce(HandlerId) + 'static) -> Self {
		Self {
			id,
			dropper: Some(Box::new(dropper)),
		}
	}

	/// Creates a subscription from a handler map using a weak reference.
	///
	/// Dropping it after the map is gone is a no-op.
	pub fn from_handler_map<E: 'static>(id: HandlerId, map: &HandlerMap<E>) -> Self {
		let weak: Weak<Handlers<E>> = Rc::downgrade(&map.handlers);
		Self::new(id, move |id| {
			if let Some(handlers) = weak.upgrade() {
				handlers.borrow_mut().shift_remove(&id);
			}
		})
	}

	pub fn id(&self) -> HandlerId {
		self.id
	}

	/// Explicitly unsubscribes. Equivalent to dropping.
	pub fn unsubscribe(mut self) {
		self.release();
	}

	fn release(&mut self) {
		if let Some(dropper) = self.dropper.take() {
			dropper(self.id);
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.release();
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("id", &self.id)
			.field("active", &self.dropper.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;

	use super::*;

	#[test]
	fn test_handler_id_increments() {
		let id1 = next_handler_id();
		let id2 = next_handler_id();
		assert!(id2 > id1);
	}

	#[test]
	fn test_emit_in_registration_order() {
		let map: HandlerMap<u32> = HandlerMap::new();
		let seen = Rc::new(RefCell::new(Vec::new()));

		let first = Rc::clone(&seen);
		let _a = map.insert(move |v: &u32| first.borrow_mut().push(("a", *v)));
		let second = Rc::clone(&seen);
		let _b = map.insert(move |v: &u32| second.borrow_mut().push(("b", *v)));

		map.emit(&7);
		assert_eq!(*seen.borrow(), [("a", 7), ("b", 7)]);
	}

	#[test]
	fn test_subscription_drop_removes_handler() {
		let map: HandlerMap<u32> = HandlerMap::new();
		let calls = Rc::new(Cell::new(0));

		{
			let calls = Rc::clone(&calls);
			let _sub = map.insert(move |_: &u32| calls.set(calls.get() + 1));
			assert_eq!(map.len(), 1);
			map.emit(&1);
		}

		assert!(map.is_empty());
		map.emit(&2);
		assert_eq!(calls.get(), 1);
	}

	#[test]
	fn test_subscription_unsubscribe_runs_dropper_once() {
		let called = Rc::new(Cell::new(0));
		let counter = Rc::clone(&called);

		let sub = Subscription::new(1, move |_| counter.set(counter.get() + 1));
		assert_eq!(called.get(), 0);

		sub.unsubscribe();
		assert_eq!(called.get(), 1);
	}

	#[test]
	fn test_subscription_weak_reference() {
		let map: HandlerMap<String> = HandlerMap::new();
		let sub = map.insert(|_: &String| {});

		drop(map);

		// Map is gone; dropping must not panic.
		drop(sub);
	}

	#[test]
	fn test_listener_may_unsubscribe_during_emit() {
		let map: HandlerMap<u32> = HandlerMap::new();
		let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

		let inner = Rc::clone(&slot);
		let sub = map.insert(move |_: &u32| {
			inner.borrow_mut().take();
		});
		*slot.borrow_mut() = Some(sub);

		map.emit(&0);
		assert!(map.is_empty());
	}
}
