//! Request logging middleware.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, warn};

/// Logs one line per request with method, path, status and latency.
pub async fn access_log(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        warn!(%method, %uri, status = status.as_u16(), ?latency, "Request failed");
    } else {
        info!(%method, %uri, status = status.as_u16(), ?latency, "Request served");
    }

    response
}
