use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// The closed set of marketplace services a driver can work and an order can
/// request. An order is only ever offered to drivers of the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Delivery,
    Taxi,
    Maintenance,
    CarEmergency,
    Crane,
    Fuel,
    Maid,
    CarWash,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Delivery => "delivery",
            ServiceType::Taxi => "taxi",
            ServiceType::Maintenance => "maintenance",
            ServiceType::CarEmergency => "car_emergency",
            ServiceType::Crane => "crane",
            ServiceType::Fuel => "fuel",
            ServiceType::Maid => "maid",
            ServiceType::CarWash => "car_wash",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ServiceType::Delivery => "delivery",
            ServiceType::Taxi => "taxi",
            ServiceType::Maintenance => "maintenance",
            ServiceType::CarEmergency => "car emergency",
            ServiceType::Crane => "crane",
            ServiceType::Fuel => "fuel",
            ServiceType::Maid => "maid",
            ServiceType::CarWash => "car wash",
        }
    }

    /// Latency-critical services are offered to the nearest few drivers
    /// instead of the whole pool.
    pub fn is_latency_critical(&self) -> bool {
        matches!(self, ServiceType::Delivery | ServiceType::Taxi)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub service_type: ServiceType,
    pub is_available: bool,
    pub location: Option<GeoPoint>,
    pub push_token: Option<String>,
    pub last_location_update: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
