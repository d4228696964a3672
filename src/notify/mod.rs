pub mod push;
pub mod realtime;
pub mod templates;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::dispatch::DispatchPlan;
use crate::models::driver::{GeoPoint, ServiceType};
use crate::models::order::{Order, OrderStatus};
use crate::notify::push::PushMessage;
use crate::notify::realtime::{RealtimeEvent, Topic};
use crate::notify::templates::MessageTemplate;
use crate::state::AppState;

/// Typed metadata attached to a push message. Flattened to the string-only
/// map the push channel accepts at the very edge.
#[derive(Debug, Clone)]
pub struct PushContext {
    pub order_id: Uuid,
    pub kind: &'static str,
    pub status: Option<OrderStatus>,
    pub driver_id: Option<Uuid>,
    pub service_type: Option<ServiceType>,
}

impl PushContext {
    fn for_order(order: &Order, template: &MessageTemplate) -> Self {
        Self {
            order_id: order.id,
            kind: template.kind,
            status: Some(order.status),
            driver_id: order.driver_id,
            service_type: Some(order.service_type),
        }
    }

    pub fn into_data(self) -> HashMap<String, String> {
        let mut data = HashMap::new();
        data.insert("order_id".to_string(), self.order_id.to_string());
        data.insert("type".to_string(), self.kind.to_string());
        if let Some(status) = self.status {
            data.insert("status".to_string(), status.as_str().to_string());
        }
        if let Some(driver_id) = self.driver_id {
            data.insert("driver_id".to_string(), driver_id.to_string());
        }
        if let Some(service_type) = self.service_type {
            data.insert("service_type".to_string(), service_type.as_str().to_string());
        }
        data.insert("timestamp".to_string(), Utc::now().to_rfc3339());
        data
    }
}

/// Fan-out for a freshly created order: the global feed event, a scoped
/// offer to each selected driver, the driver push batch, and the customer's
/// creation confirmation.
pub fn order_created(state: &Arc<AppState>, order: &Order, plan: &DispatchPlan) {
    let now = Utc::now();

    state.realtime.publish(
        vec![Topic::Global],
        RealtimeEvent::OrderNew {
            order: order.clone(),
            timestamp: now,
        },
    );

    for recipient in &plan.recipients {
        state.realtime.publish(
            vec![Topic::Driver(recipient.driver_id)],
            RealtimeEvent::OrderNew {
                order: order.clone(),
                timestamp: now,
            },
        );
    }

    let tokens = plan.push_tokens();
    if tokens.is_empty() {
        debug!(order_id = %order.id, "no push recipients for new order");
    } else {
        let template = templates::new_order(order.service_type);
        let context = PushContext::for_order(order, &template);
        send_batch(state, tokens, template, context);
    }

    let template = templates::order_created(order.id);
    let context = PushContext::for_order(order, &template);
    send_to_customer(state, order, template, context);
}

/// Fan-out for a status transition: one event addressed to the order topic
/// and the global feed, plus audience-specific pushes.
pub fn status_changed(state: &Arc<AppState>, order: &Order) {
    publish_status(state, order, None);

    if let Some(template) = templates::customer_status(order.status) {
        let context = PushContext::for_order(order, &template);
        send_to_customer(state, order, template, context);
    }

    if let Some(driver_id) = order.driver_id {
        if let Some(template) = templates::driver_status(order.status) {
            let context = PushContext::for_order(order, &template);
            send_to_driver(state, driver_id, template, context);
        }
    }
}

/// Retraction push to the available same-type drivers who lost the race.
pub fn order_taken(state: &Arc<AppState>, order: &Order) {
    let tokens: Vec<String> = state
        .drivers
        .iter()
        .filter(|entry| {
            let driver = entry.value();
            driver.service_type == order.service_type
                && driver.is_available
                && Some(driver.id) != order.driver_id
        })
        .filter_map(|entry| entry.value().push_token.clone())
        .collect();

    if tokens.is_empty() {
        return;
    }

    let template = templates::order_taken();
    let context = PushContext::for_order(order, &template);
    send_batch(state, tokens, template, context);
}

/// Fan-out for an order the supervisor cancelled: the customer learns no
/// driver was found; the feed sees a cancellation flagged as expired.
pub fn order_expired(state: &Arc<AppState>, order: &Order) {
    publish_status(state, order, Some("expired"));

    let template = templates::order_expired();
    let context = PushContext::for_order(order, &template);
    send_to_customer(state, order, template, context);
}

/// Location ping for a driver's trackers.
pub fn driver_location_updated(state: &Arc<AppState>, driver_id: Uuid, location: GeoPoint) {
    state.realtime.publish(
        vec![Topic::Driver(driver_id)],
        RealtimeEvent::DriverLocationUpdated {
            driver_id,
            location,
            timestamp: Utc::now(),
        },
    );
}

fn publish_status(state: &Arc<AppState>, order: &Order, reason: Option<&'static str>) {
    state.realtime.publish(
        vec![Topic::Order(order.id), Topic::Global],
        RealtimeEvent::OrderStatusUpdated {
            order_id: order.id,
            status: order.status,
            driver_id: order.driver_id,
            reason,
            timestamp: Utc::now(),
        },
    );
}

fn send_to_customer(
    state: &Arc<AppState>,
    order: &Order,
    template: MessageTemplate,
    context: PushContext,
) {
    let token = state
        .customer_tokens
        .get(&order.customer_id)
        .map(|entry| entry.value().clone());

    match token {
        Some(token) => send_single(state, token, template, context),
        None => {
            state
                .metrics
                .push_notifications_total
                .with_label_values(&["skipped"])
                .inc();
            debug!(order_id = %order.id, "customer has no push token; skipping");
        }
    }
}

fn send_to_driver(
    state: &Arc<AppState>,
    driver_id: Uuid,
    template: MessageTemplate,
    context: PushContext,
) {
    let token = state
        .drivers
        .get(&driver_id)
        .and_then(|entry| entry.value().push_token.clone());

    match token {
        Some(token) => send_single(state, token, template, context),
        None => {
            state
                .metrics
                .push_notifications_total
                .with_label_values(&["skipped"])
                .inc();
            debug!(driver_id = %driver_id, "driver has no push token; skipping");
        }
    }
}

/// Dispatches one push in a detached task so the triggering request never
/// waits on the channel. Failures are logged and counted, nothing more.
fn send_single(state: &Arc<AppState>, token: String, template: MessageTemplate, context: PushContext) {
    let push = state.push.clone();
    let metrics = state.metrics.clone();
    let order_id = context.order_id;
    let message = PushMessage {
        token,
        title: template.title,
        body: template.body,
        data: context.into_data(),
    };

    tokio::spawn(async move {
        match push.send(message).await {
            Ok(()) => metrics
                .push_notifications_total
                .with_label_values(&["sent"])
                .inc(),
            Err(err) => {
                metrics
                    .push_notifications_total
                    .with_label_values(&["failed"])
                    .inc();
                warn!(order_id = %order_id, error = %err, "push delivery failed");
            }
        }
    });
}

/// Batch variant of `send_single`; per-token outcomes are handled in
/// isolation so one bad token never suppresses the rest.
fn send_batch(state: &Arc<AppState>, tokens: Vec<String>, template: MessageTemplate, context: PushContext) {
    let push = state.push.clone();
    let metrics = state.metrics.clone();
    let order_id = context.order_id;
    let data = context.into_data();

    tokio::spawn(async move {
        let outcomes = push
            .send_batch(tokens, template.title, template.body, data)
            .await;

        for (token, outcome) in outcomes {
            match outcome {
                Ok(()) => metrics
                    .push_notifications_total
                    .with_label_values(&["sent"])
                    .inc(),
                Err(err) => {
                    metrics
                        .push_notifications_total
                        .with_label_values(&["failed"])
                        .inc();
                    warn!(order_id = %order_id, token = %token, error = %err, "push delivery failed");
                }
            }
        }
    });
}
