use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{Instrument, info, info_span, warn};

/// Wrap every request in a span carrying method and path, and log the outcome.
pub async fn trace_requests(req: Request<Body>, next: Next) -> Response {
    let span = info_span!(
        "http_request",
        method = %req.method(),
        path = %req.uri().path()
    );
    let started = Instant::now();

    let response = next.run(req).instrument(span.clone()).await;

    let status = response.status().as_u16();
    let latency_ms = started.elapsed().as_millis() as u64;
    span.in_scope(|| {
        if response.status().is_server_error() {
            warn!(status, latency_ms, "request failed");
        } else {
            info!(status, latency_ms, "request completed");
        }
    });

    response
}
