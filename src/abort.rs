//! Abort & Cancellation.
//!
//! A single atomic boolean per workload. Modules observe it only through
//! `Emitter::is_aborted`/the abort-aware waits the scheduler itself takes
//! between phases. Cancellation is cooperative only: setting the flag
//! requests early return, it never forcibly terminates a module.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

/// Cooperative abort signal shared by every module instance in a workload.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    inner: Arc<Inner>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request abort. Idempotent — calling this twice has no additional effect.
    pub fn set(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Cheap, lock-free check modules should consult at coarse-grained points
    /// in their inner loops.
    pub fn is_aborted(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Suspend until abort is requested. Useful for modules that want to
    /// race their own work against the abort signal with `tokio::select!`.
    pub async fn wait_aborted(&self) {
        if self.is_aborted() {
            return;
        }
        let notified = self.inner.notify.notified();
        if self.is_aborted() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unset() {
        let signal = AbortSignal::new();
        assert!(!signal.is_aborted());
    }

    #[test]
    fn set_is_idempotent() {
        let signal = AbortSignal::new();
        signal.set();
        signal.set();
        assert!(signal.is_aborted());
    }

    #[tokio::test]
    async fn wait_aborted_returns_once_set() {
        let signal = AbortSignal::new();
        let waiter = signal.clone();
        let handle = tokio::spawn(async move {
            waiter.wait_aborted().await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        signal.set();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("wait_aborted should return promptly after set()")
            .unwrap();
    }
}
