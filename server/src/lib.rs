// Relay server: one upstream Finnhub link fanned out to many WebSocket clients
pub mod finnhub;
pub mod handlers;
pub mod registry;
pub mod router;
pub mod state;
pub mod websocket;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
