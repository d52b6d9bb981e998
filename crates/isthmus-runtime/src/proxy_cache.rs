//! Handle-to-proxy table.
//!
//! When native code hands back an object the managed side already holds a
//! proxy for, the existing proxy is returned instead of a second one, so a
//! handle is never aliased by two live proxies.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::Result;
use crate::handle::NativeHandle;

const MIN_SWEEP: usize = 16;

struct Entries<P> {
    map: HashMap<NativeHandle, Weak<P>>,
    /// Size at which the next insert sweeps dead entries.
    sweep_at: usize,
}

impl<P> Entries<P> {
    fn sweep(&mut self) {
        self.map.retain(|_, proxy| proxy.strong_count() > 0);
        self.sweep_at = (self.map.len() * 2).max(MIN_SWEEP);
    }
}

pub struct ProxyCache<P> {
    entries: Mutex<Entries<P>>,
}

impl<P> Default for ProxyCache<P> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                sweep_at: MIN_SWEEP,
            }),
        }
    }
}

impl<P> ProxyCache<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live proxy for `raw`, or build one with `make`.
    ///
    /// A zero handle is rejected before `make` is consulted. Inserting
    /// sweeps dead entries once the table has doubled since the last sweep.
    pub fn get_or_insert_with(&self, raw: u64, make: impl FnOnce(NativeHandle) -> Result<P>) -> Result<Arc<P>> {
        let handle = NativeHandle::new(raw)?;
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.map.get(&handle).and_then(Weak::upgrade) {
            return Ok(existing);
        }
        let proxy = Arc::new(make(handle)?);
        if entries.map.len() >= entries.sweep_at {
            entries.sweep();
        }
        entries.map.insert(handle, Arc::downgrade(&proxy));
        Ok(proxy)
    }

    pub fn get(&self, raw: u64) -> Option<Arc<P>> {
        let handle = NativeHandle::new(raw).ok()?;
        self.entries.lock().map.get(&handle).and_then(Weak::upgrade)
    }

    /// Entries held, dead or alive.
    pub fn len(&self) -> usize {
        self.entries.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose proxies are gone; returns the number of live entries.
    pub fn purge(&self) -> usize {
        let mut entries = self.entries.lock();
        entries.sweep();
        entries.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    #[test]
    fn same_handle_returns_same_proxy() {
        let cache: ProxyCache<String> = ProxyCache::new();
        let a = cache.get_or_insert_with(9, |h| Ok(format!("proxy {h}"))).unwrap();
        let b = cache
            .get_or_insert_with(9, |_| panic!("must reuse the live proxy"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*a, "proxy 0x9");
    }

    #[test]
    fn dead_proxies_are_replaced() {
        let cache: ProxyCache<u64> = ProxyCache::new();
        drop(cache.get_or_insert_with(3, |h| Ok(h.raw())).unwrap());
        assert!(cache.get(3).is_none());
        assert_eq!(cache.purge(), 0);
        let fresh = cache.get_or_insert_with(3, |h| Ok(h.raw() + 1)).unwrap();
        assert_eq!(*fresh, 4);
    }

    #[test]
    fn inserts_sweep_dead_entries() {
        let cache: ProxyCache<u64> = ProxyCache::new();
        for raw in 1..=1000 {
            drop(cache.get_or_insert_with(raw, |h| Ok(h.raw())).unwrap());
        }
        assert!(cache.len() <= MIN_SWEEP + 1, "{} entries retained", cache.len());

        let live: Vec<Arc<u64>> = (2000..2100)
            .map(|raw| cache.get_or_insert_with(raw, |h| Ok(h.raw())).unwrap())
            .collect();
        for raw in 3000..3500 {
            drop(cache.get_or_insert_with(raw, |h| Ok(h.raw())).unwrap());
        }
        assert!(live.iter().all(|p| cache.get(**p).is_some()));
        assert!(cache.len() <= 2 * live.len() + 1);
        assert_eq!(cache.purge(), live.len());
    }

    #[test]
    fn zero_handle_is_rejected() {
        let cache: ProxyCache<u64> = ProxyCache::new();
        let err = cache.get_or_insert_with(0, |h| Ok(h.raw())).unwrap_err();
        assert_eq!(err, BridgeError::InvalidHandle);
    }
}
