use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::{GeoPoint, ServiceType};

/// Lifecycle states of an order. Legal moves between them are defined in one
/// place, `engine::lifecycle`, and consulted by every mutation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Accepted,
    Arrived,
    InProgress,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Arrived => "arrived",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub product_name: String,
    pub price: f64,
    pub quantity: u32,
}

/// The unit of work. Terminal orders are kept as history, never deleted.
///
/// Invariants enforced by the engine: `driver_id` is set exactly once and
/// never cleared, `created_at` is immutable, and `status` only advances
/// through the lifecycle table or jumps to `cancelled` under the actor guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub service_type: ServiceType,
    pub status: OrderStatus,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_address: Option<String>,
    pub customer_location: Option<GeoPoint>,
    pub items: Vec<OrderItem>,
    pub destination: Option<GeoPoint>,
    pub destination_address: Option<String>,
    pub notes: Option<String>,
    pub total: Option<f64>,
    pub driver_id: Option<Uuid>,
    pub driver_accepted_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
