use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub reservations_created_total: IntCounterVec,
    pub payment_callbacks_total: IntCounterVec,
    pub auto_cancellations_total: IntCounterVec,
    pub reservations_accepted_total: IntCounterVec,
    pub awaiting_driver_reservations: IntGauge,
    pub create_reservation_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let reservations_created_total = IntCounterVec::new(
            Opts::new(
                "reservations_created_total",
                "Total reservation creations by outcome",
            ),
            &["outcome"],
        )
        .expect("valid reservations_created_total metric");

        let payment_callbacks_total = IntCounterVec::new(
            Opts::new(
                "payment_callbacks_total",
                "Total payment callbacks by result",
            ),
            &["result"],
        )
        .expect("valid payment_callbacks_total metric");

        let auto_cancellations_total = IntCounterVec::new(
            Opts::new(
                "auto_cancellations_total",
                "Delayed cancellation checks by outcome",
            ),
            &["outcome"],
        )
        .expect("valid auto_cancellations_total metric");

        let reservations_accepted_total = IntCounterVec::new(
            Opts::new(
                "reservations_accepted_total",
                "Driver acceptance attempts by outcome",
            ),
            &["outcome"],
        )
        .expect("valid reservations_accepted_total metric");

        let awaiting_driver_reservations = IntGauge::new(
            "awaiting_driver_reservations",
            "Current number of reservations awaiting a driver",
        )
        .expect("valid awaiting_driver_reservations metric");

        let create_reservation_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "create_reservation_latency_seconds",
                "Latency of reservation creation in seconds",
            ),
            &["outcome"],
        )
        .expect("valid create_reservation_latency_seconds metric");

        registry
            .register(Box::new(reservations_created_total.clone()))
            .expect("register reservations_created_total");
        registry
            .register(Box::new(payment_callbacks_total.clone()))
            .expect("register payment_callbacks_total");
        registry
            .register(Box::new(auto_cancellations_total.clone()))
            .expect("register auto_cancellations_total");
        registry
            .register(Box::new(reservations_accepted_total.clone()))
            .expect("register reservations_accepted_total");
        registry
            .register(Box::new(awaiting_driver_reservations.clone()))
            .expect("register awaiting_driver_reservations");
        registry
            .register(Box::new(create_reservation_latency_seconds.clone()))
            .expect("register create_reservation_latency_seconds");

        Self {
            registry,
            reservations_created_total,
            payment_callbacks_total,
            auto_cancellations_total,
            reservations_accepted_total,
            awaiting_driver_reservations,
            create_reservation_latency_seconds,
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
