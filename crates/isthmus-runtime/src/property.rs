//! Observable values backing interface properties.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    value: RwLock<T>,
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    next_id: AtomicU64,
}

impl<T> Inner<T> {
    fn unsubscribe(&self, id: u64) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }
}

/// A value that can be read and observed but not set.
pub struct ReadOnlyProperty<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ReadOnlyProperty<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ReadOnlyProperty<T> {
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Register `callback` to run with the new value after every change.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(callback)));
        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        Subscription {
            disconnect: Mutex::new(Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.unsubscribe(id);
                }
            }))),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadOnlyProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadOnlyProperty").field(&*self.inner.value.read()).finish()
    }
}

/// A settable observable value.
pub struct Property<T> {
    view: ReadOnlyProperty<T>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Property<T> {
    pub fn new(initial: T) -> Self {
        Self {
            view: ReadOnlyProperty {
                inner: Arc::new(Inner {
                    value: RwLock::new(initial),
                    listeners: Mutex::new(Vec::new()),
                    next_id: AtomicU64::new(0),
                }),
            },
        }
    }

    pub fn get(&self) -> T {
        self.view.get()
    }

    /// Store `value` and notify subscribers; returns false when the value
    /// is unchanged, in which case nobody is notified.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.view.inner.value.write();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        // Listeners run without any lock held so they may read or subscribe.
        let listeners: Vec<Listener<T>> = self
            .view
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&value);
        }
        true
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.view.subscribe(callback)
    }

    /// A read-only view sharing this property's value and subscribers.
    pub fn read_only(&self) -> ReadOnlyProperty<T> {
        self.view.clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Property").field(&*self.view.inner.value.read()).finish()
    }
}

/// Disposable subscription token.
///
/// `disconnect` is idempotent, and dropping the token disconnects it.
pub struct Subscription {
    disconnect: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub fn disconnect(&self) {
        let action = self.disconnect.lock().take();
        if let Some(action) = action {
            action();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.disconnect.lock().is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("connected", &self.is_connected())
            .finish()
    }
}
