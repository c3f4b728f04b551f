// Metrics collection for monitoring
use metrics::{counter, gauge};
use std::sync::atomic::{AtomicU64, Ordering};

pub struct MetricsCollector {
    updates_routed: AtomicU64,
    feed_messages: AtomicU64,
    send_failures: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            updates_routed: AtomicU64::new(0),
            feed_messages: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
        }
    }

    pub fn record_feed_connection_status(&self, connected: bool) {
        let status = if connected { 1.0 } else { 0.0 };
        gauge!("feed_connected").set(status);
    }

    pub fn record_feed_reconnect_attempt(&self) {
        counter!("feed_reconnect_attempts").increment(1);
    }

    pub fn record_feed_message(&self, msg_type: &str) {
        self.feed_messages.fetch_add(1, Ordering::Relaxed);
        counter!("feed_messages", "type" => msg_type.to_string()).increment(1);
    }

    pub fn record_price_update(&self, symbol: &str) {
        self.updates_routed.fetch_add(1, Ordering::Relaxed);
        counter!("price_updates_routed", "symbol" => symbol.to_string()).increment(1);
    }

    pub fn record_client_count(&self, count: usize) {
        gauge!("clients_connected").set(count as f64);
    }

    pub fn record_client_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
        counter!("client_send_failures").increment(1);
    }

    pub fn record_subscription_count(&self, count: usize) {
        gauge!("symbols_subscribed").set(count as f64);
    }

    pub fn record_http_request(&self, method: &str, endpoint: &str, status: u16) {
        counter!(
            "http_requests",
            "method" => method.to_string(),
            "endpoint" => endpoint.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
    }

    pub fn get_stats(&self) -> (u64, u64, u64) {
        (
            self.updates_routed.load(Ordering::Relaxed),
            self.feed_messages.load(Ordering::Relaxed),
            self.send_failures.load(Ordering::Relaxed),
        )
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
