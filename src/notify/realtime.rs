use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::driver::GeoPoint;
use crate::models::order::{Order, OrderStatus};

/// Addressing for the real-time channel. Clients subscribe to driver- and
/// order-scoped topics; `global` is the feed every client receives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Global,
    Driver(Uuid),
    Order(Uuid),
}

impl Topic {
    /// Parses the wire form: `global`, `driver:<uuid>` or `order:<uuid>`.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == "global" {
            return Some(Topic::Global);
        }

        let (kind, id) = raw.split_once(':')?;
        let id = Uuid::parse_str(id).ok()?;
        match kind {
            "driver" => Some(Topic::Driver(id)),
            "order" => Some(Topic::Order(id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum RealtimeEvent {
    #[serde(rename = "order:new")]
    OrderNew {
        order: Order,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "order:status:updated")]
    OrderStatusUpdated {
        order_id: Uuid,
        status: OrderStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        driver_id: Option<Uuid>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<&'static str>,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "driver:location:updated")]
    DriverLocationUpdated {
        driver_id: Uuid,
        location: GeoPoint,
        timestamp: DateTime<Utc>,
    },
}

/// An event plus the topics it is addressed to.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub topics: Vec<Topic>,
    pub event: RealtimeEvent,
}

impl Envelope {
    /// Global envelopes reach everyone; scoped ones require a subscription.
    pub fn matches(&self, subscribed: &HashSet<Topic>) -> bool {
        self.topics
            .iter()
            .any(|topic| *topic == Topic::Global || subscribed.contains(topic))
    }
}

/// Fire-and-forget event bus backed by a broadcast channel. Subscribers that
/// are offline simply miss events and fall back to polling.
#[derive(Clone)]
pub struct RealtimeHub {
    tx: broadcast::Sender<Envelope>,
}

impl RealtimeHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn publish(&self, topics: Vec<Topic>, event: RealtimeEvent) {
        let _ = self.tx.send(Envelope { topics, event });
    }
}
