// Prometheus metrics handler
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::Response};

pub async fn prometheus_metrics(
    State(state): State<AppState>,
) -> Result<Response<String>, StatusCode> {
    state.metrics.record_http_request("GET", "/metrics", 200);

    let metrics_output = state.prometheus.render();

    let response = Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
        .body(metrics_output)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(response)
}
