//! One-shot completion barrier
//!
//! Collects a fixed number of completion signals from concurrent workers and
//! hands the joined result to a single downstream handler exactly once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use tracing::{debug, error};

/// Barrier joining `signals` results into one handler call.
///
/// The handler receives the first failure signalled, or success once every
/// expected signal has arrived. Signalling more times than expected panics.
pub struct Synchronizer<E, H>
where
    H: FnOnce(Result<(), E>),
{
    /// Name for diagnostics
    name: String,

    /// Number of signals that fire the handler
    expected: usize,

    /// Signals received so far
    received: AtomicUsize,

    /// First failure observed
    failure: Mutex<Option<E>>,

    /// Downstream handler, taken when fired
    handler: Mutex<Option<H>>,
}

impl<E, H> Synchronizer<E, H>
where
    H: FnOnce(Result<(), E>),
{
    /// Create a barrier expecting `signals` completions.
    ///
    /// With zero expected signals the handler fires immediately with success.
    pub fn new(handler: H, signals: usize, name: impl Into<String>) -> Self {
        let synchronizer = Self {
            name: name.into(),
            expected: signals,
            received: AtomicUsize::new(0),
            failure: Mutex::new(None),
            handler: Mutex::new(Some(handler)),
        };

        if signals == 0 {
            synchronizer.fire();
        }

        synchronizer
    }

    /// Record one worker's completion
    pub fn signal(&self, result: Result<(), E>) {
        if let Err(error) = result {
            let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
            if failure.is_none() {
                *failure = Some(error);
            }
        }

        let received = self.received.fetch_add(1, Ordering::AcqRel) + 1;
        assert!(
            received <= self.expected,
            "{}: signalled {received} times, expected {}",
            self.name,
            self.expected
        );

        if received == self.expected {
            self.fire();
        }
    }

    /// Signals still outstanding
    pub fn pending(&self) -> usize {
        self.expected.saturating_sub(self.received.load(Ordering::Acquire))
    }

    fn fire(&self) {
        let handler = self.handler.lock().unwrap_or_else(PoisonError::into_inner).take();
        let result = match self.failure.lock().unwrap_or_else(PoisonError::into_inner).take() {
            Some(error) => Err(error),
            None => Ok(()),
        };

        debug!(
            barrier = %self.name,
            signals = self.expected,
            success = result.is_ok(),
            "Synchronized"
        );
        if let Some(handler) = handler {
            handler(result);
        }
    }
}

impl<E, H> Drop for Synchronizer<E, H>
where
    H: FnOnce(Result<(), E>),
{
    fn drop(&mut self) {
        let pending = self.pending();
        if pending > 0 && !thread::panicking() {
            error!(
                barrier = %self.name,
                pending,
                "Synchronizer dropped before all signals arrived"
            );
        }
    }
}
