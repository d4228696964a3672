use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::engine::lifecycle;
use crate::error::AppError;
use crate::models::order::{Order, OrderStatus};
use crate::notify;
use crate::state::AppState;

/// Claims an order for a driver.
///
/// The unassigned check and the assignment happen under the order's
/// exclusive map entry, so concurrent attempts serialize and exactly one
/// caller observes the unclaimed order; everyone else gets a conflict.
pub fn accept_order(
    state: &Arc<AppState>,
    order_id: Uuid,
    driver_id: Uuid,
) -> Result<Order, AppError> {
    if !state.drivers.contains_key(&driver_id) {
        return Err(AppError::NotFound(format!("driver {driver_id} not found")));
    }

    let accepted = {
        let mut entry = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if entry.driver_id.is_some() {
            state
                .metrics
                .order_acceptances_total
                .with_label_values(&["conflict"])
                .inc();
            return Err(AppError::Conflict("order already accepted".to_string()));
        }

        if !lifecycle::can_transition(entry.status, OrderStatus::Accepted) {
            state
                .metrics
                .order_acceptances_total
                .with_label_values(&["conflict"])
                .inc();
            return Err(AppError::Conflict(format!(
                "order in status {} can no longer be accepted",
                entry.status.as_str()
            )));
        }

        entry.driver_id = Some(driver_id);
        entry.driver_accepted_at = Some(Utc::now());
        lifecycle::apply_transition(entry.value_mut(), OrderStatus::Accepted);
        entry.clone()
    };

    state
        .metrics
        .order_acceptances_total
        .with_label_values(&["success"])
        .inc();
    info!(order_id = %order_id, driver_id = %driver_id, "order accepted");

    notify::status_changed(state, &accepted);
    notify::order_taken(state, &accepted);

    Ok(accepted)
}
