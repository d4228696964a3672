use tracing::debug;
use uuid::Uuid;

use crate::geo::haversine_m;
use crate::models::driver::Driver;
use crate::models::order::Order;

/// How many of the closest drivers are offered a latency-critical order.
pub const NEAREST_DRIVER_COUNT: usize = 4;

/// Ephemeral pairing of a driver and the computed distance to the customer.
/// Produced during matching, consumed by the fan-out, never stored.
#[derive(Debug, Clone)]
pub struct DispatchCandidate {
    pub driver_id: Uuid,
    pub push_token: Option<String>,
    pub distance_m: Option<f64>,
}

/// The ordered recipient list for a newly created order.
#[derive(Debug, Default)]
pub struct DispatchPlan {
    pub recipients: Vec<DispatchCandidate>,
}

impl DispatchPlan {
    /// Tokens for the push batch. Tokenless drivers stay in `recipients` and
    /// are still reached over the real-time channel.
    pub fn push_tokens(&self) -> Vec<String> {
        self.recipients
            .iter()
            .filter_map(|candidate| candidate.push_token.clone())
            .collect()
    }
}

/// Selects which drivers are offered a new order.
///
/// Latency-critical services rank drivers by great-circle distance to the
/// customer and take the nearest few; a missing customer location means no
/// driver is notified at all and the order stays discoverable by polling.
/// Every other service type is broadcast to the whole eligible pool.
pub fn plan_dispatch(order: &Order, pool: &[Driver]) -> DispatchPlan {
    let eligible = pool
        .iter()
        .filter(|driver| driver.service_type == order.service_type && driver.is_available);

    if !order.service_type.is_latency_critical() {
        let recipients = eligible
            .map(|driver| DispatchCandidate {
                driver_id: driver.id,
                push_token: driver.push_token.clone(),
                distance_m: None,
            })
            .collect();
        return DispatchPlan { recipients };
    }

    let Some(customer_location) = order.customer_location else {
        debug!(
            order_id = %order.id,
            service_type = order.service_type.as_str(),
            "customer location missing; skipping driver notification"
        );
        return DispatchPlan::default();
    };

    let mut ranked: Vec<(f64, DispatchCandidate)> = eligible
        .filter_map(|driver| {
            let location = driver.location?;
            let distance = haversine_m(&customer_location, &location);
            Some((
                distance,
                DispatchCandidate {
                    driver_id: driver.id,
                    push_token: driver.push_token.clone(),
                    distance_m: Some(distance),
                },
            ))
        })
        .collect();

    // stable sort: equal distances keep pool order
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

    let recipients = ranked
        .into_iter()
        .take(NEAREST_DRIVER_COUNT)
        .map(|(_, candidate)| candidate)
        .collect();

    DispatchPlan { recipients }
}
