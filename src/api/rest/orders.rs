use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::{acceptance, dispatch, expiration, lifecycle};
use crate::engine::lifecycle::Actor;
use crate::error::AppError;
use crate::models::driver::{Driver, GeoPoint, ServiceType};
use crate::models::order::{Order, OrderItem, OrderStatus};
use crate::notify;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/accept", post(accept_order))
        .route("/orders/:id/status", put(update_order_status))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub service_type: ServiceType,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_address: Option<String>,
    pub customer_location: Option<GeoPoint>,
    pub items: Option<Vec<OrderItem>>,
    pub destination: Option<GeoPoint>,
    pub destination_address: Option<String>,
    pub notes: Option<String>,
    pub total: Option<f64>,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    if payload.customer_id.trim().is_empty() {
        return Err(AppError::BadRequest("customer_id cannot be empty".to_string()));
    }

    if payload.customer_name.trim().is_empty() {
        return Err(AppError::BadRequest("customer_name cannot be empty".to_string()));
    }

    let items = payload.items.unwrap_or_default();
    let now = Utc::now();
    let order = Order {
        id: Uuid::new_v4(),
        service_type: payload.service_type,
        status: lifecycle::initial_status(payload.service_type, !items.is_empty()),
        customer_id: payload.customer_id,
        customer_name: payload.customer_name,
        customer_address: payload.customer_address,
        customer_location: payload.customer_location,
        items,
        destination: payload.destination,
        destination_address: payload.destination_address,
        notes: payload.notes,
        total: payload.total,
        driver_id: None,
        driver_accepted_at: None,
        cancellation_reason: None,
        created_at: now,
        updated_at: now,
    };

    state.orders.insert(order.id, order.clone());
    state
        .metrics
        .orders_created_total
        .with_label_values(&[order.service_type.as_str()])
        .inc();

    let started = Instant::now();
    let pool: Vec<Driver> = state.drivers.iter().map(|entry| entry.value().clone()).collect();
    let plan = dispatch::plan_dispatch(&order, &pool);

    let policy = if !order.service_type.is_latency_critical() {
        "broadcast"
    } else if order.customer_location.is_some() {
        "nearest"
    } else {
        "none"
    };
    state
        .metrics
        .dispatch_latency_seconds
        .with_label_values(&[policy])
        .observe(started.elapsed().as_secs_f64());

    info!(
        order_id = %order.id,
        service_type = order.service_type.as_str(),
        recipients = plan.recipients.len(),
        "order created"
    );

    notify::order_created(&state, &order, &plan);

    Ok((StatusCode::CREATED, Json(order)))
}

#[derive(Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub service_type: Option<ServiceType>,
    pub driver_id: Option<Uuid>,
    pub customer_id: Option<String>,
    #[serde(default)]
    pub include_expired: bool,
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListOrdersQuery>,
) -> Json<Vec<Order>> {
    let cutoff = Utc::now() - state.expiration_window;

    let mut orders: Vec<Order> = state
        .orders
        .iter()
        .filter(|entry| {
            let order = entry.value();
            query.status.is_none_or(|status| order.status == status)
                && query
                    .service_type
                    .is_none_or(|service_type| order.service_type == service_type)
                && query
                    .driver_id
                    .is_none_or(|driver_id| order.driver_id == Some(driver_id))
                && query
                    .customer_id
                    .as_deref()
                    .is_none_or(|customer_id| order.customer_id == customer_id)
        })
        .map(|entry| entry.value().clone())
        .collect();

    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    // stale unclaimed orders encountered while listing are cancelled in the
    // background, never inline
    let stale: Vec<Uuid> = orders
        .iter()
        .filter(|order| expiration::unclaimed_and_stale(order, cutoff))
        .map(|order| order.id)
        .collect();
    if !stale.is_empty() {
        let state = state.clone();
        tokio::spawn(async move {
            for order_id in stale {
                expiration::expire_order(&state, order_id, cutoff);
            }
        });
    }

    // the discovery feed never shows stale, claimed or cancelled orders,
    // even between sweep ticks
    let available_query = !query.include_expired
        && matches!(
            query.status,
            Some(OrderStatus::Pending) | Some(OrderStatus::Ready)
        )
        && query.driver_id.is_none()
        && query.customer_id.is_none();

    if available_query {
        orders.retain(|order| {
            order.status != OrderStatus::Cancelled
                && order.driver_id.is_none()
                && order.created_at >= cutoff
        });
    }

    Json(orders)
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;

    Ok(Json(order.value().clone()))
}

#[derive(Deserialize)]
pub struct AcceptOrderRequest {
    pub driver_id: Uuid,
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AcceptOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let order = acceptance::accept_order(&state, id, payload.driver_id)?;
    Ok(Json(order))
}

#[derive(Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    pub driver_id: Option<Uuid>,
    pub cancellation_reason: Option<String>,
}

async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let updated = {
        let mut entry = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;
        let order = entry.value_mut();

        if payload.status == OrderStatus::Cancelled {
            let actor = match payload.driver_id {
                Some(driver_id) if order.driver_id == Some(driver_id) => Actor::Driver(driver_id),
                _ => Actor::Customer,
            };
            lifecycle::authorize_cancellation(order, actor, payload.cancellation_reason.as_deref())?;
            let reason = payload
                .cancellation_reason
                .clone()
                .filter(|reason| !reason.trim().is_empty());
            lifecycle::cancel(order, reason);
        } else {
            if lifecycle::requires_driver(payload.status) && order.driver_id.is_none() {
                return Err(AppError::BadRequest(format!(
                    "order must be accepted by a driver before moving to {}",
                    payload.status.as_str()
                )));
            }
            if !lifecycle::can_transition(order.status, payload.status) {
                return Err(AppError::Conflict(format!(
                    "cannot move order from {} to {}",
                    order.status.as_str(),
                    payload.status.as_str()
                )));
            }
            lifecycle::apply_transition(order, payload.status);
        }

        order.clone()
    };

    info!(order_id = %id, status = updated.status.as_str(), "order status updated");
    notify::status_changed(&state, &updated);

    Ok(Json(updated))
}
