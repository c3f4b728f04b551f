// HTTP handlers for the relay's status surface
pub mod health;
pub mod metrics;

pub use health::{health_check, service_status};
pub use metrics::prometheus_metrics;
