//! Best-effort wakeup signal. Losing a signal is safe: the `JobStore` is
//! authoritative and a Worker's periodic claim poll is the fallback path.
//!
//! An external broker (`QUEUE_URL`) is accepted for configuration parity
//! with a real deployment but is not wired to a concrete broker here, a
//! push to it is a documented no-op. Nothing in the dispatch contract
//! depends on it firing.

use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

/// Cheaply cloneable wakeup notifier shared across the Hub's route handlers
/// and background loops.
#[derive(Clone)]
pub struct QueueSignal {
    notify: Arc<Notify>,
    external_url: Option<String>,
}

impl QueueSignal {
    #[must_use]
    pub fn new(external_url: Option<String>) -> Self {
        Self {
            notify: Arc::new(Notify::new()),
            external_url,
        }
    }

    /// Signal that new work may be claimable. Always succeeds from the
    /// caller's point of view, a push to an external broker that cannot be
    /// reached is logged, not propagated as an error, per spec.
    pub fn wake(&self) {
        self.notify.notify_waiters();
        if let Some(ref url) = self.external_url {
            debug!(queue_url = %url, "external queue push is a no-op in this deployment; relying on in-process notify and claim poll fallback");
        }
    }

    /// Wait for the next wakeup notification.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}
