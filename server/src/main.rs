// tickrelay server - fans one Finnhub feed out to many WebSocket clients
use anyhow::Result;
use axum::{routing::get, Router};
use dotenvy::dotenv;
use std::sync::Arc;
use tickrelay_common::{MetricsCollector, RelayConfig, RelayError};
use tickrelay_server::{
    finnhub::FinnhubLink,
    handlers::{health, metrics as metrics_handler},
    registry::ClientRegistry,
    router::SymbolRouter,
    state::{spawn_stats_logger, AppState},
    websocket,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "tickrelay_server=info,tower_http=info".to_string()),
        )
        .init();

    info!("🚀 Starting tickrelay server");

    // Load configuration
    let config = RelayConfig::from_env()?;

    // Initialize metrics exporter
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    let prometheus = recorder.handle();
    metrics::set_global_recorder(recorder).expect("Failed to install Prometheus metrics recorder");

    // Wire the registry, the upstream link and the router together
    let metrics = Arc::new(MetricsCollector::new());
    let registry = Arc::new(ClientRegistry::new(metrics.clone()));
    let feed = FinnhubLink::new(config.feed.clone(), metrics.clone());
    let router = Arc::new(SymbolRouter::new(
        Arc::new(feed.clone()),
        registry.clone(),
        metrics.clone(),
    ));
    feed.set_handler(router.clone());

    // Keep serving on a transient connect failure; collected interest
    // replays once the feed comes up.
    match feed.connect().await {
        Ok(()) => {}
        Err(e @ RelayError::ConfigError(_)) => {
            error!("❌ Upstream feed configuration problem: {}", e);
            return Err(e.into());
        }
        Err(e) => {
            warn!("⚠️ Initial feed connect failed, retrying in the background: {}", e);
            feed.begin_reconnect().await;
        }
    }

    // Periodic activity summary alongside the Prometheus endpoint
    let stats_task = spawn_stats_logger(metrics.clone(), std::time::Duration::from_secs(60));

    let state = AppState {
        router,
        registry,
        feed: feed.clone(),
        metrics,
        prometheus,
    };

    // Build the router
    let app = Router::new()
        // Service status
        .route("/", get(health::service_status))
        .route("/health", get(health::health_check))
        // Metrics endpoint for Prometheus
        .route("/metrics", get(metrics_handler::prometheus_metrics))
        // WebSocket endpoint for price-stream clients
        .route("/ws", get(websocket::websocket_handler))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);

    info!("🌐 tickrelay server listening on {}", addr);
    info!("📊 Prometheus metrics available at http://{}/metrics", addr);
    info!("🏥 Health check available at http://{}/health", addr);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("Server error: {}", e);
            e
        })?;

    stats_task.abort();
    feed.shutdown().await;
    info!("👋 tickrelay server stopped");

    Ok(())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<axum::http::HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("🛑 Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
