// Common types and utilities shared across the tickrelay services
// Wire shapes mirror the browser client contract and the Finnhub WebSocket protocol

pub mod types;
pub mod error;
pub mod metrics;
pub mod config;

pub use types::*;
pub use error::*;
pub use metrics::MetricsCollector;
pub use config::{FeedConfig, RelayConfig, DEFAULT_FEED_WS_URL};
