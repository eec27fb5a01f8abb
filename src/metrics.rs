use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    // Pre-register counters so they appear even before the first increment.
    counter!("cycles_completed_total").absolute(0);
    counter!("failovers_total").absolute(0);
    counter!("force_funds_total").absolute(0);
    counter!("funding_transfers_total").absolute(0);
    for reason in [
        "network_exhausted",
        "funding_exhausted",
        "estimation_failure",
        "submission_rejected",
        "transaction_reverted",
        "confirmation_timeout",
    ] {
        counter!("cycles_abandoned_total", "reason" => reason).absolute(0);
    }

    gauge!("rotation_index").set(0.0);

    // Histogram is lazily created on first record; force creation.
    histogram!("cycle_duration_seconds").record(0.0);

    Ok(handle)
}
