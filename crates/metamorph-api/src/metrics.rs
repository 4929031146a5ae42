//! Prometheus metrics for the API server. The conversion duration
//! histograms are recorded by `metamorph-worker`; both processes share the
//! same global `metrics` recorder only when co-located, so this crate
//! installs its own recorder and exposes only HTTP request metrics.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new().install_recorder().expect("failed to install prometheus recorder")
}

mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "metamorph_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "metamorph_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "metamorph_http_requests_in_flight";
}

fn sanitize_path(path: &str) -> String {
    // `/convert` carries no path params; this only exists so future routes
    // (if any are added) don't explode metrics cardinality on query values.
    path.to_string()
}

fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [("method", method.to_string()), ("path", sanitize_path(path)), ("status", status.to_string())];
    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed().as_secs_f64());
    response
}
