use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::driver::Driver;
use crate::models::order::Order;
use crate::notify::push::PushSender;
use crate::notify::realtime::RealtimeHub;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub orders: DashMap<Uuid, Order>,
    pub drivers: DashMap<Uuid, Driver>,
    pub customer_tokens: DashMap<String, String>,
    pub realtime: RealtimeHub,
    pub push: Arc<dyn PushSender>,
    pub metrics: Metrics,
    pub expiration_window: Duration,
}

impl AppState {
    pub fn new(
        event_buffer_size: usize,
        expiration_window_secs: u64,
        push: Arc<dyn PushSender>,
    ) -> Self {
        Self {
            orders: DashMap::new(),
            drivers: DashMap::new(),
            customer_tokens: DashMap::new(),
            realtime: RealtimeHub::new(event_buffer_size),
            push,
            metrics: Metrics::new(),
            expiration_window: Duration::seconds(expiration_window_secs as i64),
        }
    }
}
