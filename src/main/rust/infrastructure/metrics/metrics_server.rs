use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use warp::http::StatusCode;
use warp::Filter;

use super::PrometheusReporter;

/// `/metrics`, `/health`, `/livez` and `/readyz`. Readiness follows `ready`.
pub fn routes(
    ready: Arc<AtomicBool>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    // CORS configuration for browser access
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "OPTIONS"])
        .allow_headers(vec!["Content-Type"]);

    let metrics_route = warp::path("metrics").map(|| {
        warp::reply::with_header(
            PrometheusReporter::gather_metrics(),
            "content-type",
            "text/plain; version=0.0.4; charset=utf-8",
        )
    });

    let health_route = warp::path("health")
        .or(warp::path("livez"))
        .unify()
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    let ready_route = warp::path("readyz").map(move || {
        if ready.load(Ordering::SeqCst) {
            warp::reply::with_status("OK", StatusCode::OK)
        } else {
            warp::reply::with_status("NOT READY", StatusCode::SERVICE_UNAVAILABLE)
        }
    });

    metrics_route.or(health_route).or(ready_route).with(cors)
}

/// Serve the metrics endpoints until `shutdown` fires
pub async fn serve_metrics(port: u16, ready: Arc<AtomicBool>, shutdown: CancellationToken) {
    let (addr, server) = warp::serve(routes(ready))
        .bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            shutdown.cancelled().await;
        });

    tracing::info!("Metrics server listening on http://{}", addr);
    server.await;
}
