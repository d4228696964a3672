use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::lifecycle;
use crate::models::order::{Order, OrderStatus};
use crate::notify;
use crate::state::AppState;

/// Recurring reconciliation of unclaimed orders. Runs one sweep immediately
/// to clean up leftovers from a previous run, then once per interval until
/// the owning task is aborted.
pub async fn run_expiration_supervisor(state: Arc<AppState>, sweep_interval: Duration) {
    info!(
        interval_secs = sweep_interval.as_secs(),
        window_secs = state.expiration_window.num_seconds(),
        "expiration supervisor started"
    );

    let cleaned = sweep(&state);
    if cleaned > 0 {
        info!(cancelled = cleaned, "startup cleanup cancelled stale orders");
    }

    let mut ticker = tokio::time::interval(sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately; the startup pass above covered it
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let expired = sweep(&state);
        if expired > 0 {
            info!(cancelled = expired, "expiration sweep cancelled unclaimed orders");
        }
    }
}

/// True when the order is still unclaimed and was created before `cutoff`.
/// Shared by the sweep and the read-path lazy check.
pub fn unclaimed_and_stale(order: &Order, cutoff: DateTime<Utc>) -> bool {
    matches!(
        order.status,
        OrderStatus::Pending | OrderStatus::Preparing | OrderStatus::Ready
    ) && order.driver_id.is_none()
        && order.created_at < cutoff
}

/// One pass over the store. Candidates are collected first, then each is
/// re-checked and cancelled under its own entry guard, so a failure or lost
/// race on one order never touches the rest.
pub fn sweep(state: &Arc<AppState>) -> usize {
    let cutoff = Utc::now() - state.expiration_window;

    let candidates: Vec<Uuid> = state
        .orders
        .iter()
        .filter(|entry| unclaimed_and_stale(entry.value(), cutoff))
        .map(|entry| *entry.key())
        .collect();

    let mut cancelled = 0;
    for order_id in candidates {
        if expire_order(state, order_id, cutoff) {
            cancelled += 1;
        }
    }
    cancelled
}

/// Cancels one stale order. The staleness predicate is re-checked under the
/// exclusive entry guard immediately before mutating, so a concurrent
/// acceptance always wins.
pub fn expire_order(state: &Arc<AppState>, order_id: Uuid, cutoff: DateTime<Utc>) -> bool {
    let expired = {
        let Some(mut entry) = state.orders.get_mut(&order_id) else {
            return false;
        };

        if !unclaimed_and_stale(entry.value(), cutoff) {
            debug!(order_id = %order_id, "skipping expiry; order was claimed or already cancelled");
            return false;
        }

        lifecycle::cancel(entry.value_mut(), None);
        entry.clone()
    };

    state.metrics.orders_expired_total.inc();
    warn!(
        order_id = %order_id,
        created_at = %expired.created_at,
        "unclaimed order expired"
    );
    notify::order_expired(state, &expired);

    true
}
