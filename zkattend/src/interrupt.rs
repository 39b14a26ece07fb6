//! Operator interruption
//!
//! Blocking loops (live tail, daily schedule) and console prompts race their
//! work against [`Interrupt::wait`] and stop when it resolves.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Resolves when the operator asks the current activity to stop
#[async_trait]
pub trait Interrupt: Send + Sync {
    async fn wait(&self);
}

/// Latched interruption request
///
/// A trigger stays pending until one [`Interrupt::wait`] consumes it, so a
/// request made while nobody is waiting (in the middle of a fetch, say) stops
/// whatever waits next.
#[derive(Debug, Clone, Default)]
pub struct Latch {
    inner: Arc<LatchInner>,
}

#[derive(Debug, Default)]
struct LatchInner {
    pending: AtomicBool,
    notify: Notify,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.inner.pending.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.pending.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Interrupt for Latch {
    async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.inner.pending.swap(false, Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

/// Latch triggered by every Ctrl+C for the rest of the process
///
/// Spawns the listener task; must be called inside the runtime.
pub fn listen_for_ctrl_c() -> Latch {
    let latch = Latch::new();
    let trigger = latch.clone();
    tokio::spawn(async move {
        loop {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupted by operator");
                    trigger.trigger();
                }
                Err(e) => {
                    warn!("Cannot listen for Ctrl+C: {}", e);
                    return;
                }
            }
        }
    });
    latch
}

/// Never fires
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

#[async_trait]
impl Interrupt for Never {
    async fn wait(&self) {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    /// Fires on the `n`-th call to `wait`, counting from 1
    pub struct AfterWaits {
        remaining: AtomicUsize,
    }

    impl AfterWaits {
        pub fn new(n: usize) -> Self {
            Self {
                remaining: AtomicUsize::new(n),
            }
        }
    }

    #[async_trait]
    impl Interrupt for AfterWaits {
        async fn wait(&self) {
            let before = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .unwrap_or(0);
            if before > 1 {
                std::future::pending::<()>().await;
            }
        }
    }
}
