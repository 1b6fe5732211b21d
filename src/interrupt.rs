//! Ctrl+C handling shared by the binaries.
//!
//! An [`Interrupt`] is triggered from the signal handler thread and observed
//! by the control task, either by polling [`Interrupt::is_triggered`] or by
//! racing a request against it with [`Interrupt::run`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A resettable interrupt signal.
#[derive(Debug, Default)]
pub struct Interrupt {
    triggered: AtomicBool,
    notify: Notify,
}

impl Interrupt {
    /// Creates an untriggered interrupt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Triggers the interrupt and wakes every waiter.
    ///
    /// Returns true if it was already triggered.
    pub fn trigger(&self) -> bool {
        let already = self.triggered.swap(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        already
    }

    /// Returns true if the interrupt has fired since the last reset.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Clears the interrupt.
    pub fn reset(&self) {
        self.triggered.store(false, Ordering::SeqCst);
    }

    /// Resolves once the interrupt is triggered.
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a trigger in between is not lost.
        notified.as_mut().enable();
        if self.is_triggered() {
            return;
        }
        notified.await;
    }

    /// Drives `future` to completion unless the interrupt fires first.
    ///
    /// Returns `None` when interrupted; the future is dropped and whatever it
    /// was waiting on is abandoned.
    pub async fn run<F: Future>(&self, future: F) -> Option<F::Output> {
        tokio::select! {
            output = future => Some(output),
            _ = self.wait() => None,
        }
    }
}
