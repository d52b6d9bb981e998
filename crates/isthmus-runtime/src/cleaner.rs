//! Deferred reclamation queue.
//!
//! A cleanup action is registered when a proxy is constructed. Dropping the
//! returned [`Cleanable`] does not run the action; it hands it to the queue,
//! which runs it later from [`Cleaner::run_pending`]. Whichever path gets
//! there first runs the action, and it runs at most once.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{error, trace};

type Action = Box<dyn FnOnce() + Send>;

struct Slot {
    action: Mutex<Option<Action>>,
}

impl Slot {
    /// Take and run the action if it is still armed.
    fn run(&self) -> bool {
        let action = self.action.lock().take();
        match action {
            Some(action) => {
                if catch_unwind(AssertUnwindSafe(action)).is_err() {
                    error!("cleanup action panicked");
                }
                true
            }
            None => false,
        }
    }
}

#[derive(Default)]
struct Queue {
    pending: Mutex<VecDeque<Arc<Slot>>>,
    completed: AtomicUsize,
}

impl Drop for Queue {
    // Actions still queued when the last cleaner goes away run here.
    fn drop(&mut self) {
        let pending = std::mem::take(self.pending.get_mut());
        let ran = pending.iter().filter(|slot| slot.run()).count();
        if ran > 0 {
            trace!(ran, "ran queued cleanup actions on shutdown");
        }
    }
}

/// A queue of cleanup actions owned by unreachable proxies.
///
/// Cloning a `Cleaner` shares the same queue.
#[derive(Clone, Default)]
pub struct Cleaner {
    queue: Arc<Queue>,
}

/// Registration token returned by [`Cleaner::register`].
pub struct Cleanable {
    slot: Arc<Slot>,
    queue: Weak<Queue>,
}

impl Cleaner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action to run once the returned token is dropped or cleaned.
    pub fn register(&self, action: impl FnOnce() + Send + 'static) -> Cleanable {
        Cleanable {
            slot: Arc::new(Slot {
                action: Mutex::new(Some(Box::new(action))),
            }),
            queue: Arc::downgrade(&self.queue),
        }
    }

    /// Run every queued action, returning how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.queue.pending.lock().pop_front();
            let Some(slot) = next else {
                break;
            };
            if slot.run() {
                ran += 1;
            }
        }
        if ran > 0 {
            self.queue.completed.fetch_add(ran, Ordering::Relaxed);
            trace!(ran, "ran deferred cleanup actions");
        }
        ran
    }

    /// Actions queued but not yet run.
    pub fn pending(&self) -> usize {
        self.queue.pending.lock().len()
    }

    /// Actions run so far through the queue.
    pub fn completed(&self) -> usize {
        self.queue.completed.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Cleaner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cleaner")
            .field("pending", &self.pending())
            .field("completed", &self.completed())
            .finish()
    }
}

impl Cleanable {
    /// Run the action now; later drops and queue runs do nothing.
    pub fn clean(&self) -> bool {
        self.slot.run()
    }

    pub fn is_armed(&self) -> bool {
        self.slot.action.lock().is_some()
    }
}

impl Drop for Cleanable {
    fn drop(&mut self) {
        if !self.is_armed() {
            return;
        }
        match self.queue.upgrade() {
            Some(queue) => queue.pending.lock().push_back(Arc::clone(&self.slot)),
            // The queue is gone, nobody would ever run the action.
            None => {
                self.slot.run();
            }
        }
    }
}

impl std::fmt::Debug for Cleanable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cleanable").field("armed", &self.is_armed()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn counter() -> (Arc<AtomicU32>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn drop_defers_until_run_pending() {
        let cleaner = Cleaner::new();
        let (count, action) = counter();
        let token = cleaner.register(action);
        drop(token);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(cleaner.pending(), 1);
        assert_eq!(cleaner.run_pending(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(cleaner.run_pending(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn explicit_clean_disarms_queue() {
        let cleaner = Cleaner::new();
        let (count, action) = counter();
        let token = cleaner.register(action);
        assert!(token.clean());
        assert!(!token.clean());
        drop(token);
        assert_eq!(cleaner.pending(), 0);
        cleaner.run_pending();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn orphaned_token_runs_inline() {
        let (count, action) = counter();
        let token = Cleaner::new().register(action);
        drop(token);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_cleaner_runs_queued_actions() {
        let cleaner = Cleaner::new();
        let (count, action) = counter();
        drop(cleaner.register(action));
        assert_eq!(cleaner.pending(), 1);
        drop(cleaner);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_action_does_not_poison_queue() {
        let cleaner = Cleaner::new();
        drop(cleaner.register(|| panic!("boom")));
        let (count, action) = counter();
        drop(cleaner.register(action));
        assert_eq!(cleaner.run_pending(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_drops_each_run_once() {
        let cleaner = Cleaner::new();
        let count = Arc::new(AtomicU32::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cleaner = cleaner.clone();
                let count = Arc::clone(&count);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let c = Arc::clone(&count);
                        drop(cleaner.register(move || {
                            c.fetch_add(1, Ordering::SeqCst);
                        }));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cleaner.run_pending(), 800);
        assert_eq!(count.load(Ordering::SeqCst), 800);
        assert_eq!(cleaner.completed(), 800);
    }
}
