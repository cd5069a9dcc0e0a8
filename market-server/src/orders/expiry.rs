//! Order expiry scheduling
//!
//! Unpaid orders are closed after their validity window. Scheduling is
//! decoupled behind [`ExpiryScheduler`] so the manager never knows how
//! jobs are delivered; the production implementation pushes jobs over
//! an mpsc channel to a worker task. Delivery is at-least-once and the
//! closure handler is idempotent, so a duplicate or late job is
//! harmless.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::manager::OrderManager;

/// A pending closure job for one order
#[derive(Debug, Clone, Copy)]
pub struct ExpiryJob {
    pub order_id: i64,
    pub delay: Duration,
}

/// Schedules the closure of an unpaid order after `delay`
pub trait ExpiryScheduler: Send + Sync {
    fn schedule_close(&self, order_id: i64, delay: Duration);
}

/// Channel-backed scheduler used in production
pub struct TokioExpiryScheduler {
    tx: mpsc::UnboundedSender<ExpiryJob>,
}

impl ExpiryScheduler for TokioExpiryScheduler {
    fn schedule_close(&self, order_id: i64, delay: Duration) {
        if self
            .tx
            .send(ExpiryJob { order_id, delay })
            .is_err()
        {
            // Worker gone; the order stays pending but unsellable past
            // its expire_time, closure happens on the next restart pass
            tracing::warn!(order_id, "expiry worker unavailable, job dropped");
        }
    }
}

/// Create the scheduler plus the receiver the worker consumes
pub fn expiry_channel() -> (TokioExpiryScheduler, mpsc::UnboundedReceiver<ExpiryJob>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TokioExpiryScheduler { tx }, rx)
}

/// Run the expiry worker until the channel closes.
///
/// Each job gets its own sleeper task so a long delay never blocks the
/// queue.
pub fn spawn_expiry_worker(
    mut rx: mpsc::UnboundedReceiver<ExpiryJob>,
    manager: Arc<OrderManager>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("expiry worker started");
        while let Some(job) = rx.recv().await {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                tokio::time::sleep(job.delay).await;
                match manager.close_timeout_order(job.order_id).await {
                    Ok(true) => {
                        tracing::info!(order_id = job.order_id, "order closed on timeout")
                    }
                    Ok(false) => {
                        tracing::debug!(order_id = job.order_id, "order already settled or closed")
                    }
                    Err(e) => {
                        tracing::error!(order_id = job.order_id, error = %e, "timeout closure failed")
                    }
                }
            });
        }
        tracing::info!("expiry worker stopped");
    })
}
