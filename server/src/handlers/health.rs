// Service status and health check handlers
use crate::state::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};

pub async fn service_status(State(state): State<AppState>) -> Json<Value> {
    let response = json!({
        "status": "online",
        "service": "tickrelay",
        "finnhub_connected": state.feed.is_connected(),
        "active_clients": state.registry.count().await,
        "active_subscriptions": state.router.symbol_count().await,
    });

    state.metrics.record_http_request("GET", "/", 200);

    Json(response)
}

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let response = json!({
        "status": "healthy",
        "finnhub_connection": state.feed.state().as_str(),
        "clients": state.registry.count().await,
        "subscriptions": state.router.symbol_count().await,
        "subscribed_symbols": state.router.active_symbols().await,
        "timestamp": chrono::Utc::now().timestamp(),
    });

    state.metrics.record_http_request("GET", "/health", 200);

    Json(response)
}
