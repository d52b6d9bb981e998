//! Native bridging runtime for isthmus-generated bindings.
//!
//! The fixed support library generated code links against:
//! - **Handles:** non-zero native handles, owning handles and native-backed
//!   proxies whose destruction runs through a deferred [`Cleaner`]
//! - **Reverse proxies:** managed implementations invoked from native code
//! - **Completions:** pending results resolved at most once
//! - **Properties:** observable values with idempotent subscriptions
//! - **Values and wire codec:** structural values and their byte encoding
//! - **Errors:** error-domain instances and bridging errors

pub mod cleaner;
pub mod completion;
pub mod error;
pub mod handle;
pub mod property;
pub mod proxy_cache;
pub mod reverse;
pub mod value;
pub mod wire;

pub use cleaner::{Cleanable, Cleaner};
pub use completion::{pending_result, Completion, PendingResult};
pub use error::{BridgeError, DomainError, Result};
pub use handle::{NativeDestructor, NativeHandle, NativeProxy, OwnedHandle};
pub use property::{Property, ReadOnlyProperty, Subscription};
pub use proxy_cache::ProxyCache;
pub use reverse::{ReverseHandleTable, ReverseProxy};
pub use value::{RecordValue, Value};
pub use wire::{decode, encode, ErrorShape, ValueShape};
