use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub assignment_cycles_total: IntCounter,
    pub assignment_cycle_duration_seconds: Histogram,
    pub assignments_total: IntCounterVec,
    pub unassigned_orders_total: IntCounter,
    pub assignment_conflicts_total: IntCounter,
    pub notifications_total: IntCounterVec,
    pub available_couriers: IntGauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let assignment_cycles_total =
            IntCounter::new("assignment_cycles_total", "Completed assignment cycles")
                .expect("valid assignment_cycles_total metric");

        let assignment_cycle_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "assignment_cycle_duration_seconds",
            "Wall time of one assignment cycle in seconds",
        ))
        .expect("valid assignment_cycle_duration_seconds metric");

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Successful assignments by source"),
            &["source"],
        )
        .expect("valid assignments_total metric");

        let unassigned_orders_total = IntCounter::new(
            "unassigned_orders_total",
            "Orders for which no courier was found within any radius",
        )
        .expect("valid unassigned_orders_total metric");

        let assignment_conflicts_total = IntCounter::new(
            "assignment_conflicts_total",
            "Assignments rejected because a precondition no longer held",
        )
        .expect("valid assignment_conflicts_total metric");

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Emails by outcome"),
            &["outcome"],
        )
        .expect("valid notifications_total metric");

        let available_couriers = IntGauge::new(
            "available_couriers",
            "Couriers available at the start of the last cycle",
        )
        .expect("valid available_couriers metric");

        registry
            .register(Box::new(assignment_cycles_total.clone()))
            .expect("register assignment_cycles_total");
        registry
            .register(Box::new(assignment_cycle_duration_seconds.clone()))
            .expect("register assignment_cycle_duration_seconds");
        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(unassigned_orders_total.clone()))
            .expect("register unassigned_orders_total");
        registry
            .register(Box::new(assignment_conflicts_total.clone()))
            .expect("register assignment_conflicts_total");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(available_couriers.clone()))
            .expect("register available_couriers");

        Self {
            registry,
            assignment_cycles_total,
            assignment_cycle_duration_seconds,
            assignments_total,
            unassigned_orders_total,
            assignment_conflicts_total,
            notifications_total,
            available_couriers,
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
