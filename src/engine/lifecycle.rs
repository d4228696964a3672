use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::ServiceType;
use crate::models::order::{Order, OrderStatus};

/// Who is asking for a mutation. Cancellation rules differ between the
/// customer and the assigned driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer,
    Driver(Uuid),
}

/// The forward transition table. `completed` and `cancelled` have no
/// outgoing edges; `delivered` only admits the final confirmation step.
pub fn next_statuses(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;

    match from {
        Pending => &[Preparing, Ready, Accepted],
        Preparing => &[Ready, Accepted],
        Ready => &[Accepted],
        Accepted => &[Arrived, InProgress],
        Arrived => &[InProgress],
        InProgress => &[Delivered, Completed],
        Delivered => &[Completed],
        Completed | Cancelled => &[],
    }
}

pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    next_statuses(from).contains(&to)
}

pub fn is_terminal(status: OrderStatus) -> bool {
    matches!(status, OrderStatus::Completed | OrderStatus::Cancelled)
}

/// Driver-progression statuses may only be reached once a driver holds the
/// order.
pub fn requires_driver(status: OrderStatus) -> bool {
    matches!(
        status,
        OrderStatus::Accepted
            | OrderStatus::Arrived
            | OrderStatus::InProgress
            | OrderStatus::Delivered
            | OrderStatus::Completed
    )
}

/// Initial status at creation. Delivery orders carrying a basket start in
/// `preparing` while the shop assembles the items; everything else starts
/// `pending`.
pub fn initial_status(service_type: ServiceType, has_items: bool) -> OrderStatus {
    if service_type == ServiceType::Delivery && has_items {
        OrderStatus::Preparing
    } else {
        OrderStatus::Pending
    }
}

/// Actor-aware cancellation guard.
///
/// The assigned driver may cancel any non-terminal order short of delivery,
/// but must give a reason once they have arrived. The customer may cancel
/// only until the driver arrives. Delivered and completed orders are never
/// cancellable, by anyone.
pub fn authorize_cancellation(
    order: &Order,
    actor: Actor,
    reason: Option<&str>,
) -> Result<(), AppError> {
    match order.status {
        OrderStatus::Delivered | OrderStatus::Completed => {
            return Err(AppError::Conflict(
                "order can no longer be cancelled after delivery".to_string(),
            ));
        }
        OrderStatus::Cancelled => {
            return Err(AppError::Conflict("order is already cancelled".to_string()));
        }
        _ => {}
    }

    let is_assigned_driver =
        matches!(actor, Actor::Driver(driver_id) if order.driver_id == Some(driver_id));

    if is_assigned_driver {
        let has_reason = reason.map(str::trim).is_some_and(|r| !r.is_empty());
        if matches!(order.status, OrderStatus::Arrived | OrderStatus::InProgress) && !has_reason {
            return Err(AppError::BadRequest(
                "cancellation_reason is required once the driver has arrived".to_string(),
            ));
        }
        return Ok(());
    }

    match order.status {
        OrderStatus::Pending | OrderStatus::Preparing | OrderStatus::Ready | OrderStatus::Accepted => {
            Ok(())
        }
        _ => Err(AppError::Conflict(
            "order cannot be cancelled after the driver has arrived".to_string(),
        )),
    }
}

/// Applies a forward transition. Callers check `can_transition` first; this
/// only touches `status` and `updated_at`.
pub fn apply_transition(order: &mut Order, to: OrderStatus) {
    order.status = to;
    order.updated_at = Utc::now();
}

/// Moves an order to `cancelled`, recording the reason when one was given.
pub fn cancel(order: &mut Order, reason: Option<String>) {
    order.status = OrderStatus::Cancelled;
    if let Some(reason) = reason {
        order.cancellation_reason = Some(reason);
    }
    order.updated_at = Utc::now();
}
