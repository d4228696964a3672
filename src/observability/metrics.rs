use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounterVec,
    pub order_acceptances_total: IntCounterVec,
    pub orders_expired_total: IntCounter,
    pub push_notifications_total: IntCounterVec,
    pub dispatch_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total = IntCounterVec::new(
            Opts::new("orders_created_total", "Orders created by service type"),
            &["service_type"],
        )
        .expect("valid orders_created_total metric");

        let order_acceptances_total = IntCounterVec::new(
            Opts::new(
                "order_acceptances_total",
                "Acceptance attempts by outcome",
            ),
            &["outcome"],
        )
        .expect("valid order_acceptances_total metric");

        let orders_expired_total = IntCounter::new(
            "orders_expired_total",
            "Unclaimed orders cancelled by the expiration supervisor",
        )
        .expect("valid orders_expired_total metric");

        let push_notifications_total = IntCounterVec::new(
            Opts::new(
                "push_notifications_total",
                "Push notifications by outcome",
            ),
            &["outcome"],
        )
        .expect("valid push_notifications_total metric");

        let dispatch_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "dispatch_latency_seconds",
                "Latency of driver selection for new orders",
            ),
            &["policy"],
        )
        .expect("valid dispatch_latency_seconds metric");

        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(order_acceptances_total.clone()))
            .expect("register order_acceptances_total");
        registry
            .register(Box::new(orders_expired_total.clone()))
            .expect("register orders_expired_total");
        registry
            .register(Box::new(push_notifications_total.clone()))
            .expect("register push_notifications_total");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");

        Self {
            registry,
            orders_created_total,
            order_acceptances_total,
            orders_expired_total,
            push_notifications_total,
            dispatch_latency_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
