use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::models::{Market, Priority};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    register_metrics();
    handle
}

/// Pre-register series so they appear even before the first increment.
pub fn register_metrics() {
    for market in Market::ALL {
        for tier in Priority::ALL {
            counter!("signals_emitted_total", "market" => market.as_str(), "tier" => tier.as_str()).absolute(0);
        }
        gauge!("watchlist_size", "market" => market.as_str()).set(0.0);
    }
    counter!("news_items_total").absolute(0);
    counter!("watchlist_promotions_total").absolute(0);
    counter!("notifications_failed_total").absolute(0);

    // Histograms are lazily created on first record; force creation.
    for name in ["fast", "slow", "news"] {
        histogram!("tick_duration_seconds", "loop" => name).record(0.0);
    }
}
