//! Prometheus exporter and HTTP request metrics

use metrics::{counter, gauge, histogram, Gauge, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Start the Prometheus exporter; metrics are served at `/metrics` on `port`.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Request counters for one listener.
///
/// * `http_requests_total{server, route, status}`
/// * `http_request_duration_seconds{server}`
/// * `http_requests_in_flight{server}`
#[derive(Clone)]
pub struct ServerMetrics {
    request_duration: Histogram,
    in_flight: Gauge,
    server_name: String,
}

impl ServerMetrics {
    pub fn new(server_name: &str) -> Self {
        let name = server_name.to_string();

        Self {
            request_duration: histogram!("http_request_duration_seconds", "server" => name.clone()),
            in_flight: gauge!("http_requests_in_flight", "server" => name.clone()),
            server_name: name,
        }
    }

    pub fn record_request(&self, route: &str, duration: Duration, status_code: u16) {
        counter!(
            "http_requests_total",
            "server" => self.server_name.clone(),
            "route" => route.to_string(),
            "status" => status_code.to_string()
        )
        .increment(1);
        self.request_duration.record(duration.as_secs_f64());
    }

    pub fn request_started(&self) {
        self.in_flight.increment(1.0);
    }

    pub fn request_finished(&self) {
        self.in_flight.decrement(1.0);
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }
}

/// Records duration and status when dropped, so early returns are counted too.
pub struct RequestMetricsGuard<'a> {
    metrics: &'a ServerMetrics,
    route: String,
    start: Instant,
    status_code: u16,
}

impl<'a> RequestMetricsGuard<'a> {
    pub fn new(metrics: &'a ServerMetrics, route: impl Into<String>) -> Self {
        metrics.request_started();
        Self {
            metrics,
            route: route.into(),
            start: Instant::now(),
            status_code: 500,
        }
    }

    pub fn set_status(&mut self, code: u16) {
        self.status_code = code;
    }
}

impl Drop for RequestMetricsGuard<'_> {
    fn drop(&mut self) {
        self.metrics.request_finished();
        self.metrics
            .record_request(&self.route, self.start.elapsed(), self.status_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_records_without_recorder() {
        // with no recorder installed the macros are no-ops
        let metrics = ServerMetrics::new("http");
        assert_eq!(metrics.server_name(), "http");

        let mut guard = RequestMetricsGuard::new(&metrics, "/api/v1/match");
        guard.set_status(200);
        drop(guard);
    }
}
