//! Reverse proxies: managed implementations called from native code.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{BridgeError, Result};
use crate::handle::NativeHandle;

/// Wraps a managed implementation of an interface contract.
///
/// Every native-initiated call goes through [`ReverseProxy::invoke`], which
/// hands back the managed result or translates the managed failure. Domain
/// errors keep their domain, code and parameters; any other failure,
/// including a panic, becomes [`BridgeError::Managed`].
pub struct ReverseProxy<T: ?Sized> {
    interface: &'static str,
    target: Arc<T>,
}

impl<T: ?Sized> Clone for ReverseProxy<T> {
    fn clone(&self) -> Self {
        Self {
            interface: self.interface,
            target: Arc::clone(&self.target),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

impl<T: ?Sized> ReverseProxy<T> {
    pub fn new(interface: &'static str, target: Arc<T>) -> Self {
        Self { interface, target }
    }

    pub fn interface(&self) -> &'static str {
        self.interface
    }

    pub fn target(&self) -> &Arc<T> {
        &self.target
    }

    pub fn invoke<R>(&self, method: &str, call: impl FnOnce(&T) -> Result<R>) -> Result<R> {
        let outcome = catch_unwind(AssertUnwindSafe(|| call(&self.target)));
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err @ (BridgeError::Domain(_) | BridgeError::Managed { .. }))) => Err(err),
            Ok(Err(other)) if other.is_protocol_violation() => Err(other),
            Ok(Err(other)) => Err(BridgeError::Managed {
                message: format!("{}.{method}: {other}", self.interface),
            }),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(interface = self.interface, method, %message, "managed implementation panicked");
                Err(BridgeError::Managed {
                    message: format!("{}.{method} panicked: {message}", self.interface),
                })
            }
        }
    }
}

/// Reverse handles held by native code, each naming one managed object.
///
/// Handles start at 1 and are never reused within a table.
pub struct ReverseHandleTable<T: ?Sized> {
    next: AtomicU64,
    entries: Mutex<HashMap<NativeHandle, Arc<T>>>,
}

impl<T: ?Sized> Default for ReverseHandleTable<T> {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: ?Sized> ReverseHandleTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, target: Arc<T>) -> Result<NativeHandle> {
        let handle = NativeHandle::new(self.next.fetch_add(1, Ordering::Relaxed))?;
        self.entries.lock().insert(handle, target);
        Ok(handle)
    }

    pub fn get(&self, raw: u64) -> Result<Arc<T>> {
        let handle = NativeHandle::new(raw)?;
        self.entries
            .lock()
            .get(&handle)
            .cloned()
            .ok_or(BridgeError::InvalidHandle)
    }

    /// Release a reverse handle; returns false if it was already released.
    pub fn release(&self, raw: u64) -> bool {
        match NativeHandle::new(raw) {
            Ok(handle) => self.entries.lock().remove(&handle).is_some(),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
