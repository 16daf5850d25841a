//! Prometheus metrics for the chat pipeline.
//!
//! Each context owns its registry, so several contexts (tests, the CLI) can
//! coexist in one process. The `/metrics` route encodes that registry.

use prometheus::{
    histogram_opts, opts, CounterVec, Encoder, HistogramVec, Registry, TextEncoder,
};

pub struct PipelineMetrics {
    registry: Registry,
    requests_total: CounterVec,
    stage_failures_total: CounterVec,
    stage_duration_seconds: HistogramVec,
}

impl PipelineMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            opts!("copilot_chat_requests_total", "Chat requests by outcome"),
            &["outcome"],
        )?;

        let stage_failures_total = CounterVec::new(
            opts!("copilot_stage_failures_total", "Pipeline failures by stage"),
            &["stage"],
        )?;

        let stage_duration_seconds = HistogramVec::new(
            histogram_opts!(
                "copilot_stage_duration_seconds",
                "Time spent in each pipeline stage",
                // Model and Dataverse calls dominate: 10ms to 60s
                vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
            ),
            &["stage"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(stage_failures_total.clone()))?;
        registry.register(Box::new(stage_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            stage_failures_total,
            stage_duration_seconds,
        })
    }

    /// `outcome` is `answered`, `generation_failed` or `error`.
    pub fn record_request(&self, outcome: &str) {
        self.requests_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_failure(&self, stage: &str) {
        self.stage_failures_total.with_label_values(&[stage]).inc();
    }

    pub fn observe_stage(&self, stage: &str, elapsed: std::time::Duration) {
        self.stage_duration_seconds
            .with_label_values(&[stage])
            .observe(elapsed.as_secs_f64());
    }

    /// Encode all metrics in Prometheus text format.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .unwrap_or_default();
        String::from_utf8(buffer).unwrap_or_default()
    }
}
