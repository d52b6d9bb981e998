//! Native handles and the proxies that own them.
//!
//! Two ownership models are provided. [`OwnedHandle`] destroys the native
//! object deterministically when dropped. [`NativeProxy`] reproduces the
//! managed-host contract: destruction is registered with a [`Cleaner`] at
//! construction and runs later, exactly once.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

use tracing::trace;

use crate::cleaner::{Cleanable, Cleaner};
use crate::error::{BridgeError, Result};

/// Opaque identifier of one live native object. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NativeHandle(NonZeroU64);

impl NativeHandle {
    /// Validate a raw handle received from native code.
    pub fn new(raw: u64) -> Result<Self> {
        NonZeroU64::new(raw).map(Self).ok_or(BridgeError::InvalidHandle)
    }

    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

/// The native-side destroy entry point for one proxied type.
pub trait NativeDestructor: Send + Sync {
    fn destroy(&self, handle: NativeHandle);
}

impl<F> NativeDestructor for F
where
    F: Fn(NativeHandle) + Send + Sync,
{
    fn destroy(&self, handle: NativeHandle) {
        self(handle)
    }
}

/// A handle whose native object is destroyed when this value is dropped.
pub struct OwnedHandle {
    handle: Option<NativeHandle>,
    destructor: Arc<dyn NativeDestructor>,
}

impl OwnedHandle {
    pub fn new(raw: u64, destructor: Arc<dyn NativeDestructor>) -> Result<Self> {
        Ok(Self {
            handle: Some(NativeHandle::new(raw)?),
            destructor,
        })
    }

    pub fn handle(&self) -> Option<NativeHandle> {
        self.handle
    }

    /// Give up ownership without destroying the native object.
    pub fn release(mut self) -> Option<NativeHandle> {
        self.handle.take()
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            trace!(%handle, "destroying owned native handle");
            self.destructor.destroy(handle);
        }
    }
}

impl fmt::Debug for OwnedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedHandle").field("handle", &self.handle).finish()
    }
}

/// Managed-side proxy state for a native-backed object.
///
/// Holds exactly one handle. The destroy call is captured at construction
/// and queued on the [`Cleaner`] when the proxy is dropped.
pub struct NativeProxy {
    handle: NativeHandle,
    cleanup: Cleanable,
}

impl NativeProxy {
    /// Wrap a raw handle; zero is rejected with [`BridgeError::InvalidHandle`].
    pub fn new(raw: u64, cleaner: &Cleaner, destructor: Arc<dyn NativeDestructor>) -> Result<Self> {
        let handle = NativeHandle::new(raw)?;
        let cleanup = cleaner.register(move || {
            trace!(%handle, "running deferred native destroy");
            destructor.destroy(handle);
        });
        Ok(Self { handle, cleanup })
    }

    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    /// Forward a call to the native side with the captured handle.
    ///
    /// Fails with [`BridgeError::InvalidHandle`] once [`close`](Self::close)
    /// has destroyed the native object.
    pub fn call<R>(&self, f: impl FnOnce(NativeHandle) -> Result<R>) -> Result<R> {
        if !self.cleanup.is_armed() {
            return Err(BridgeError::InvalidHandle);
        }
        f(self.handle)
    }

    /// Destroy the native object now instead of waiting for the queue.
    pub fn close(&self) -> bool {
        self.cleanup.clean()
    }
}

impl fmt::Debug for NativeProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeProxy")
            .field("handle", &self.handle)
            .field("cleanup", &self.cleanup)
            .finish()
    }
}
