//! Listener registration primitives.
//!
//! Platform widgets expose two registration styles: a single listener slot
//! (`setOnXListener`, where setting a new listener silently discards the old
//! one) and an add/remove listener set. [`ListenerSlot`] and [`ListenerSet`]
//! model both. [`ListenerSource`] is the capability the adapter binds to;
//! [`WidgetSlot`] and [`WidgetSet`] implement it for any [`Widget`].

use crate::scope::{LifecycleScope, Scope};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Callback installed on a widget. Returns whether the invocation was
/// consumed, for platform APIs that ask.
pub type NativeListener<A> = Arc<dyn Fn(A) -> bool + Send + Sync>;

static NEXT_REGISTRATION: AtomicU64 = AtomicU64::new(1);

/// Identifies one listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl RegistrationId {
    fn next() -> Self {
        Self(NEXT_REGISTRATION.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reg-{}", self.0)
    }
}

/// Single listener slot with last-writer-wins semantics.
pub struct ListenerSlot<A> {
    current: Mutex<Option<(RegistrationId, NativeListener<A>)>>,
}

impl<A> ListenerSlot<A> {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Install a listener, replacing any previous one.
    pub fn set(&self, listener: NativeListener<A>) -> RegistrationId {
        let id = RegistrationId::next();
        let previous = self.current.lock().replace((id, listener));
        if let Some((old, _)) = previous {
            debug!(replaced = %old, by = %id, "Listener slot overwritten");
        }
        id
    }

    /// Remove whatever listener is installed.
    pub fn clear(&self) {
        self.current.lock().take();
    }

    /// Remove the listener only if `id` is still the installed registration.
    pub fn clear_if(&self, id: RegistrationId) -> bool {
        let mut current = self.current.lock();
        match current.as_ref() {
            Some((installed, _)) if *installed == id => {
                current.take();
                true
            }
            _ => false,
        }
    }

    /// Whether a listener is installed.
    pub fn is_set(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Registration currently occupying the slot.
    pub fn registration(&self) -> Option<RegistrationId> {
        self.current.lock().as_ref().map(|(id, _)| *id)
    }

    /// Invoke the installed listener. Returns `false` when the slot is empty.
    pub fn fire(&self, args: A) -> bool {
        let listener = self.current.lock().as_ref().map(|(_, l)| l.clone());
        match listener {
            Some(listener) => listener(args),
            None => false,
        }
    }
}

impl<A> Default for ListenerSlot<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for ListenerSlot<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSlot")
            .field("registration", &self.registration())
            .finish()
    }
}

/// Add/remove listener collection. Listeners are invoked in insertion order.
pub struct ListenerSet<A> {
    listeners: Mutex<Vec<(RegistrationId, NativeListener<A>)>>,
}

impl<A: Clone> ListenerSet<A> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Add a listener.
    pub fn add(&self, listener: NativeListener<A>) -> RegistrationId {
        let id = RegistrationId::next();
        self.listeners.lock().push((id, listener));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove(&self, id: RegistrationId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(installed, _)| *installed != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every listener with a clone of `args`. Returns whether any
    /// listener consumed the invocation.
    pub fn fire(&self, args: A) -> bool {
        let snapshot: Vec<NativeListener<A>> =
            self.listeners.lock().iter().map(|(_, l)| l.clone()).collect();
        let mut consumed = false;
        for listener in snapshot {
            consumed |= listener(args.clone());
        }
        consumed
    }
}

impl<A: Clone> Default for ListenerSet<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for ListenerSet<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

/// Anything with an attachment lifetime. Detaching cancels the attachment
/// scope.
pub trait Widget: Send + Sync + 'static {
    /// Widget name used in errors and logs.
    fn widget_name(&self) -> &str;

    /// Scope that ends when the widget is destroyed or detached.
    fn attachment(&self) -> &LifecycleScope;
}

/// A place a single native listener can be registered and unregistered.
pub trait ListenerSource: Send + Sync + 'static {
    /// Raw callback arguments.
    type Args: Send + 'static;

    /// Human-readable name, e.g. `"view.clicks"`.
    fn name(&self) -> String;

    /// Attachment scope of the underlying widget.
    fn attachment(&self) -> &LifecycleScope;

    /// Register the listener.
    fn register(&self, listener: NativeListener<Self::Args>) -> RegistrationId;

    /// Unregister a listener previously returned by
    /// [`register`](Self::register). A no-op when it was already replaced.
    fn unregister(&self, id: RegistrationId) -> bool;

    /// Whether binding is currently possible.
    fn is_available(&self) -> bool {
        self.attachment().is_active()
    }
}

/// [`ListenerSource`] backed by one [`ListenerSlot`] of a widget.
pub struct WidgetSlot<W, A> {
    widget: Arc<W>,
    event: &'static str,
    slot: fn(&W) -> &ListenerSlot<A>,
}

impl<W: Widget, A> WidgetSlot<W, A> {
    /// Pair a widget with the accessor of one of its slots.
    pub fn new(widget: Arc<W>, event: &'static str, slot: fn(&W) -> &ListenerSlot<A>) -> Self {
        Self {
            widget,
            event,
            slot,
        }
    }

    /// The widget being bound.
    pub fn widget(&self) -> &Arc<W> {
        &self.widget
    }
}

impl<W: Widget, A: Send + 'static> ListenerSource for WidgetSlot<W, A> {
    type Args = A;

    fn name(&self) -> String {
        format!("{}.{}", self.widget.widget_name(), self.event)
    }

    fn attachment(&self) -> &LifecycleScope {
        self.widget.attachment()
    }

    fn register(&self, listener: NativeListener<A>) -> RegistrationId {
        (self.slot)(&self.widget).set(listener)
    }

    fn unregister(&self, id: RegistrationId) -> bool {
        (self.slot)(&self.widget).clear_if(id)
    }
}

/// [`ListenerSource`] backed by one [`ListenerSet`] of a widget.
pub struct WidgetSet<W, A> {
    widget: Arc<W>,
    event: &'static str,
    set: fn(&W) -> &ListenerSet<A>,
}

impl<W: Widget, A: Clone> WidgetSet<W, A> {
    /// Pair a widget with the accessor of one of its listener sets.
    pub fn new(widget: Arc<W>, event: &'static str, set: fn(&W) -> &ListenerSet<A>) -> Self {
        Self { widget, event, set }
    }

    /// The widget being bound.
    pub fn widget(&self) -> &Arc<W> {
        &self.widget
    }
}

impl<W: Widget, A: Clone + Send + 'static> ListenerSource for WidgetSet<W, A> {
    type Args = A;

    fn name(&self) -> String {
        format!("{}.{}", self.widget.widget_name(), self.event)
    }

    fn attachment(&self) -> &LifecycleScope {
        self.widget.attachment()
    }

    fn register(&self, listener: NativeListener<A>) -> RegistrationId {
        (self.set)(&self.widget).add(listener)
    }

    fn unregister(&self, id: RegistrationId) -> bool {
        (self.set)(&self.widget).remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting(counter: &Arc<AtomicUsize>) -> NativeListener<u32> {
        let counter = counter.clone();
        Arc::new(move |value: u32| {
            counter.fetch_add(value as usize, Ordering::SeqCst);
            true
        })
    }

    #[test]
    fn test_slot_last_writer_wins() {
        let slot = ListenerSlot::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let first_id = slot.set(counting(&first));
        let second_id = slot.set(counting(&second));
        assert_ne!(first_id, second_id);

        assert!(slot.fire(3));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_slot_clear_if_ignores_stale_registration() {
        let slot = ListenerSlot::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let stale = slot.set(counting(&counter));
        let current = slot.set(counting(&counter));

        assert!(!slot.clear_if(stale));
        assert_eq!(slot.registration(), Some(current));
        assert!(slot.clear_if(current));
        assert!(!slot.is_set());
        assert!(!slot.fire(1));
    }

    #[test]
    fn test_slot_listener_may_reenter() {
        let slot = Arc::new(ListenerSlot::<u32>::new());
        let inner = slot.clone();
        slot.set(Arc::new(move |_: u32| {
            inner.clear();
            true
        }));

        assert!(slot.fire(0));
        assert!(!slot.is_set());
    }

    #[test]
    fn test_set_fires_all_in_order() {
        let set = ListenerSet::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for label in ["a", "b"] {
            let log = log.clone();
            set.add(Arc::new(move |value: u32| {
                log.lock().push((label, value));
                false
            }));
        }

        assert!(!set.fire(7));
        assert_eq!(*log.lock(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_set_remove() {
        let set = ListenerSet::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = set.add(counting(&counter));
        assert_eq!(set.len(), 1);

        assert!(set.remove(id));
        assert!(!set.remove(id));
        assert!(set.is_empty());
    }
}
