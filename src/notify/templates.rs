use uuid::Uuid;

use crate::models::driver::ServiceType;
use crate::models::order::OrderStatus;

/// A rendered notification. `kind` is the machine-readable discriminator the
/// mobile clients switch on; it rides in the push metadata map.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    pub title: String,
    pub body: String,
    pub kind: &'static str,
}

impl MessageTemplate {
    fn new(title: &str, body: impl Into<String>, kind: &'static str) -> Self {
        Self {
            title: title.to_string(),
            body: body.into(),
            kind,
        }
    }
}

/// Confirmation sent to the customer right after creation.
pub fn order_created(order_id: Uuid) -> MessageTemplate {
    let mut reference = order_id.to_string();
    reference.truncate(8);
    MessageTemplate::new(
        "Order created",
        format!("Your order was created - reference {reference}"),
        "order_created",
    )
}

/// Offer sent to the drivers selected by the matcher.
pub fn new_order(service_type: ServiceType) -> MessageTemplate {
    MessageTemplate::new(
        "New order available",
        format!("New {} order", service_type.label()),
        "new_order",
    )
}

/// Retraction sent to the losing drivers once an order is claimed.
pub fn order_taken() -> MessageTemplate {
    MessageTemplate::new(
        "Order taken",
        "The order was accepted by another driver",
        "order_taken",
    )
}

/// Sent to the customer when the order expires unclaimed.
pub fn order_expired() -> MessageTemplate {
    MessageTemplate::new(
        "No providers available",
        "Sorry, no drivers are available right now. Please try again later.",
        "order_expired",
    )
}

/// Customer-facing message for a status change. Creation-side statuses have
/// no message; the creation confirmation covers those.
pub fn customer_status(status: OrderStatus) -> Option<MessageTemplate> {
    let template = match status {
        OrderStatus::Accepted => MessageTemplate::new(
            "Your order was accepted",
            "A driver accepted your order",
            "driver_accepted",
        ),
        OrderStatus::Arrived => MessageTemplate::new(
            "Driver arrived",
            "Your driver has arrived at your location",
            "order_update",
        ),
        OrderStatus::InProgress => MessageTemplate::new(
            "Driver on the way",
            "Your driver is on the way",
            "driver_on_way",
        ),
        OrderStatus::Delivered => MessageTemplate::new(
            "Order delivered",
            "Your order was delivered successfully",
            "order_update",
        ),
        OrderStatus::Completed => MessageTemplate::new(
            "Order completed",
            "Your order was completed successfully",
            "order_update",
        ),
        OrderStatus::Cancelled => MessageTemplate::new(
            "Order cancelled",
            "Your order was cancelled",
            "order_update",
        ),
        OrderStatus::Pending | OrderStatus::Preparing | OrderStatus::Ready => return None,
    };
    Some(template)
}

/// Message for the assigned driver. The cancelled variant differs from the
/// customer's: the driver is told the order they accepted is gone.
pub fn driver_status(status: OrderStatus) -> Option<MessageTemplate> {
    let template = match status {
        OrderStatus::Accepted => MessageTemplate::new(
            "Order accepted",
            "Head to the customer location",
            "order_update",
        ),
        OrderStatus::Arrived => MessageTemplate::new(
            "Arrival confirmed",
            "Waiting at the customer location",
            "order_update",
        ),
        OrderStatus::InProgress => {
            MessageTemplate::new("Trip in progress", "The order is in progress", "order_update")
        }
        OrderStatus::Delivered => {
            MessageTemplate::new("Delivery confirmed", "Order marked as delivered", "order_update")
        }
        OrderStatus::Completed => {
            MessageTemplate::new("Order completed", "Order completed successfully", "order_update")
        }
        OrderStatus::Cancelled => MessageTemplate::new(
            "Order cancelled",
            "The order you accepted was cancelled",
            "order_cancelled",
        ),
        OrderStatus::Pending | OrderStatus::Preparing | OrderStatus::Ready => return None,
    };
    Some(template)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn cancelled_templates_differ_per_audience() {
        let customer = customer_status(OrderStatus::Cancelled).unwrap();
        let driver = driver_status(OrderStatus::Cancelled).unwrap();

        assert_ne!(customer.body, driver.body);
        assert_eq!(driver.kind, "order_cancelled");
    }

    #[test]
    fn creation_side_statuses_have_no_status_message() {
        for status in [OrderStatus::Pending, OrderStatus::Preparing, OrderStatus::Ready] {
            assert!(customer_status(status).is_none());
            assert!(driver_status(status).is_none());
        }
    }

    #[test]
    fn created_confirmation_carries_a_short_reference() {
        let order_id = Uuid::new_v4();
        let template = order_created(order_id);
        assert!(template.body.contains(&order_id.to_string()[..8]));
    }
}
