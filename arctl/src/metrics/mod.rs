//! Prometheus exposition.
//!
//! HTTP request metrics come from [`axum_prometheus`]. Its recorder is installed as the global
//! `metrics` recorder, so anything recorded through the `metrics` facade (the pool gauges in
//! [`crate::db::pools::metrics`], the pool creation counter) is rendered by the same handle.

use std::sync::OnceLock;

use axum_prometheus::PrometheusMetricLayer;
use metrics_exporter_prometheus::PrometheusHandle;

static PROMETHEUS: OnceLock<(PrometheusMetricLayer<'static>, PrometheusHandle)> = OnceLock::new();

/// The HTTP metrics layer and the handle that renders the exposition.
///
/// The global recorder can only be installed once per process, so the pair is built on first
/// use and cloned afterwards. Tests build many routers in one process.
pub fn prometheus_layer_and_handle() -> (PrometheusMetricLayer<'static>, PrometheusHandle) {
    PROMETHEUS.get_or_init(PrometheusMetricLayer::pair).clone()
}
