use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub operations_total: IntCounterVec,
    pub operation_latency_seconds: HistogramVec,
    pub batches_formed_total: IntCounter,
    pub deliveries_batched_total: IntCounter,
    pub outstanding_debt: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let operations_total = IntCounterVec::new(
            Opts::new("operations_total", "Core operations by name and outcome"),
            &["operation", "outcome"],
        )
        .expect("valid operations_total metric");

        let operation_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Latency of core operations in seconds",
            ),
            &["operation", "outcome"],
        )
        .expect("valid operation_latency_seconds metric");

        let batches_formed_total =
            IntCounter::new("batches_formed_total", "Total batches formed")
                .expect("valid batches_formed_total metric");

        let deliveries_batched_total = IntCounter::new(
            "deliveries_batched_total",
            "Total deliveries moved into a batch",
        )
        .expect("valid deliveries_batched_total metric");

        let outstanding_debt = Gauge::new(
            "outstanding_debt",
            "Cash collected by agents and not yet remitted",
        )
        .expect("valid outstanding_debt metric");

        registry
            .register(Box::new(operations_total.clone()))
            .expect("register operations_total");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("register operation_latency_seconds");
        registry
            .register(Box::new(batches_formed_total.clone()))
            .expect("register batches_formed_total");
        registry
            .register(Box::new(deliveries_batched_total.clone()))
            .expect("register deliveries_batched_total");
        registry
            .register(Box::new(outstanding_debt.clone()))
            .expect("register outstanding_debt");

        Self {
            registry,
            operations_total,
            operation_latency_seconds,
            batches_formed_total,
            deliveries_batched_total,
            outstanding_debt,
        }
    }

    pub fn observe(&self, operation: &str, ok: bool, elapsed_secs: f64) {
        let outcome = if ok { "success" } else { "error" };
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.operation_latency_seconds
            .with_label_values(&[operation, outcome])
            .observe(elapsed_secs);
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

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
