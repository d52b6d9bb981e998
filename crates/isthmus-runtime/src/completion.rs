//! Asynchronous bridging: pending results and their completions.
//!
//! [`pending_result`] returns a pair. The [`Completion`] goes to whichever
//! side does the work; the [`PendingResult`] stays with the caller, who
//! either blocks on [`PendingResult::wait`] or awaits it as a future.
//!
//! A completion may be signalled once. A second attempt is a protocol
//! violation reported as [`BridgeError::DoubleCompletion`]. Dropping an
//! unsignalled completion resolves the pending result with
//! [`BridgeError::Abandoned`]. There is no cancellation or timeout.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::{Condvar, Mutex};
use tracing::error;

use crate::error::{BridgeError, Result};

enum State<T> {
    Pending(Option<Waker>),
    Ready(Result<T>),
    Taken,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    signalled: Condvar,
}

impl<T> Shared<T> {
    fn resolve(&self, outcome: Result<T>) -> Result<()> {
        let waker = {
            let mut state = self.state.lock();
            match &mut *state {
                State::Pending(waker) => {
                    let waker = waker.take();
                    *state = State::Ready(outcome);
                    waker
                }
                State::Ready(_) | State::Taken => return Err(BridgeError::DoubleCompletion),
            }
        };
        self.signalled.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
        Ok(())
    }
}

/// The completion side of an asynchronous call.
pub struct Completion<T> {
    shared: Arc<Shared<T>>,
}

/// The caller's handle on an asynchronous call's eventual result.
pub struct PendingResult<T> {
    shared: Arc<Shared<T>>,
}

pub fn pending_result<T>() -> (Completion<T>, PendingResult<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::Pending(None)),
        signalled: Condvar::new(),
    });
    (
        Completion {
            shared: Arc::clone(&shared),
        },
        PendingResult { shared },
    )
}

impl<T> Completion<T> {
    /// Signal success.
    pub fn succeed(&self, value: T) -> Result<()> {
        self.complete(Ok(value))
    }

    /// Signal failure; the error reaches the awaiting caller unchanged.
    pub fn fail(&self, error: BridgeError) -> Result<()> {
        self.complete(Err(error))
    }

    pub fn complete(&self, outcome: Result<T>) -> Result<()> {
        let result = self.shared.resolve(outcome);
        if result.is_err() {
            error!("pending result completed more than once");
        }
        result
    }

    pub fn is_completed(&self) -> bool {
        !matches!(*self.shared.state.lock(), State::Pending(_))
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if !self.is_completed() {
            // Only fails if another path completed in between, which is fine here.
            let _ = self.shared.resolve(Err(BridgeError::Abandoned));
        }
    }
}

impl<T> PendingResult<T> {
    /// Block the calling thread until the completion is signalled.
    pub fn wait(self) -> Result<T> {
        let mut state = self.shared.state.lock();
        loop {
            match std::mem::replace(&mut *state, State::Taken) {
                State::Ready(outcome) => return outcome,
                pending @ State::Pending(_) => {
                    *state = pending;
                    self.shared.signalled.wait(&mut state);
                }
                State::Taken => return Err(BridgeError::DoubleCompletion),
            }
        }
    }

    /// Take the outcome if it has already arrived.
    pub fn try_take(&mut self) -> Option<Result<T>> {
        let mut state = self.shared.state.lock();
        match std::mem::replace(&mut *state, State::Taken) {
            State::Ready(outcome) => Some(outcome),
            other => {
                *state = other;
                None
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.shared.state.lock(), State::Ready(_))
    }
}

impl<T> Future for PendingResult<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        match std::mem::replace(&mut *state, State::Taken) {
            State::Ready(outcome) => Poll::Ready(outcome),
            State::Pending(_) => {
                *state = State::Pending(Some(cx.waker().clone()));
                Poll::Pending
            }
            State::Taken => Poll::Ready(Err(BridgeError::DoubleCompletion)),
        }
    }
}
