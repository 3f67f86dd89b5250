// Prometheus metrics for cmdgate monitoring
//
// Exposed on the /metrics HTTP endpoint:
// - HTTP requests (counter, by endpoint and status)
// - Blocked commands (counter, by denylist category)
// - Executions (counter, by mode and outcome)
// - Execution durations (histogram, by mode)

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramVec, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("http_requests_total", "Total HTTP requests handled"),
        &["endpoint", "status"]
    ).expect("Failed to create HTTP requests metric");

    pub static ref COMMANDS_BLOCKED_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("commands_blocked_total", "Commands rejected by the denylist"),
        &["reason"]
    ).expect("Failed to create blocked commands metric");

    pub static ref EXECUTIONS_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("executions_total", "Execution attempts by mode and outcome"),
        &["mode", "outcome"]
    ).expect("Failed to create executions metric");

    pub static ref EXECUTION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new("execution_duration_seconds", "Child process wall-clock duration"),
        &["mode"]
    ).expect("Failed to create execution duration metric");
}

/// Initialize metrics registry - must be called once at startup
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(COMMANDS_BLOCKED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EXECUTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EXECUTION_DURATION_SECONDS.clone()))?;
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
