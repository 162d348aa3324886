use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Weak,
    },
};
use crossbeam_skiplist::SkipSet;

/// A notification emitted by a store after a mutating operation has completed.
///
/// Events are plain data describing what changed. Listeners receive them synchronously,
/// before the mutating call returns to its caller.
pub trait Event: fmt::Debug + Send + Sync {}

type Callback<E> = dyn Fn(&E) + Send + Sync;

struct ListenerEntry<E: Event> {
    // The list only holds weak references; the `Listener` handle owns the callback.
    callback: Weak<Callback<E>>,
    order: usize,
}

impl<E: Event> Eq for ListenerEntry<E> {}

impl<E: Event> PartialEq for ListenerEntry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
    }
}

impl<E: Event> Ord for ListenerEntry<E> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.order.cmp(&other.order)
    }
}

impl<E: Event> PartialOrd for ListenerEntry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

static NEXT_LISTENER_ORDER: AtomicUsize = AtomicUsize::new(0);

/// Listeners registered for one event type, called in registration order.
pub struct ListenerList<E: Event> {
    inner: SkipSet<ListenerEntry<E>>,
}

impl<E: Event + 'static> ListenerList<E> {
    pub fn new() -> Self {
        ListenerList {
            inner: SkipSet::new(),
        }
    }

    /// Number of registrations, including ones whose `Listener` was dropped since the last
    /// dispatch.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Calls every live listener with `event`, in registration order.
    ///
    /// Registrations whose `Listener` handle has been dropped are pruned as they are found.
    /// Only the owning store may emit events, hence `pub(crate)`.
    pub(crate) fn dispatch(&self, event: &E) {
        for entry in self.inner.iter() {
            match entry.value().callback.upgrade() {
                Some(callback) => callback(event),
                None => {
                    entry.remove();
                }
            }
        }
    }
}

impl<E: Event + 'static> Default for ListenerList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for ListenerList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("listener_count", &self.inner.len())
            .finish()
    }
}

/// An active listener registration.
///
/// Keep the handle alive for as long as notifications are wanted. Dropping it unregisters
/// the callback; the stale entry is cleaned up on the next dispatch.
pub struct Listener<E: Event> {
    #[allow(dead_code)]
    callback: Arc<Callback<E>>,
    order: usize,
}

impl<E: Event + 'static> Listener<E> {
    /// Registers `callback` with `listeners`.
    pub fn new<F>(listeners: &ListenerList<E>, callback: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let order = NEXT_LISTENER_ORDER.fetch_add(1, Ordering::SeqCst);
        let callback: Arc<Callback<E>> = Arc::new(callback);
        listeners.inner.insert(ListenerEntry {
            callback: Arc::downgrade(&callback),
            order,
        });

        Listener { callback, order }
    }
}

impl<E: Event> fmt::Debug for Listener<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("order", &self.order)
            .finish()
    }
}

/// Defines a struct of named `ListenerList` fields, one per event type.
///
/// Stores expose an instance as their public `on` field, so callers register with
/// `Listener::new(&store.on.changed, |event| ...)`.
macro_rules! define_event_listeners {
    ($struct_name:ident { $($field_name:ident: $event_type:ty),* $(,)? }) => {
        /// Listener lists for the events emitted by this component.
        #[derive(Debug, Default)]
        pub struct $struct_name {
            $(
                pub $field_name: $crate::event::ListenerList<$event_type>,
            )*
        }

        impl $struct_name {
            pub fn new() -> Self {
                Self {
                    $(
                        $field_name: $crate::event::ListenerList::new(),
                    )*
                }
            }
        }
    };
}

pub(crate) use define_event_listeners;
