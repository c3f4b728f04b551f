// Application state shared by the HTTP and WebSocket handlers
use crate::finnhub::FinnhubLink;
use crate::registry::ClientRegistry;
use crate::router::SymbolRouter;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tickrelay_common::MetricsCollector;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<SymbolRouter>,
    pub registry: Arc<ClientRegistry>,
    pub feed: FinnhubLink,
    pub metrics: Arc<MetricsCollector>,
    pub prometheus: PrometheusHandle,
}

/// Logs a periodic activity summary alongside the Prometheus endpoint.
/// The caller keeps the handle and aborts it on shutdown.
pub fn spawn_stats_logger(metrics: Arc<MetricsCollector>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let (updates, feed_messages, failures) = metrics.get_stats();
            info!(
                "📊 Relay stats: {} price updates routed, {} feed messages, {} send failures",
                updates, feed_messages, failures
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stats_logger_runs_until_aborted() {
        let handle = spawn_stats_logger(
            Arc::new(MetricsCollector::new()),
            Duration::from_millis(5),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        handle.abort();
        let result = handle.await;
        assert!(result.unwrap_err().is_cancelled());
    }
}
