// Shared types for the tickrelay services
// Wire shapes match the browser client contract and the Finnhub WebSocket protocol
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Canonical ticker symbol. Construction uppercases the input so that
/// "aapl", "Aapl" and "AAPL" all name the same routing entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn new(symbol: impl AsRef<str>) -> Self {
        Symbol(symbol.as_ref().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol::new(s)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::new(s)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier the registry hands out for each downstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        ClientId(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Command sent by a downstream client over its WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCommand {
    pub action: String,
    #[serde(default)]
    pub symbols: Vec<String>,
}

/// Price payload delivered to downstream clients. A missing upstream
/// timestamp is forwarded as null rather than invented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceData {
    pub price: f64,
    pub volume: f64,
    pub timestamp: Option<i64>,
}

/// Messages the relay sends to downstream clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEnvelope {
    Connection { status: String, client_id: ClientId },
    Subscription { status: String, symbols: Vec<String> },
    PriceUpdate { symbol: Symbol, data: PriceData },
    Error { message: String },
}

impl ClientEnvelope {
    pub fn connected(client_id: ClientId) -> Self {
        ClientEnvelope::Connection {
            status: "connected".to_string(),
            client_id,
        }
    }

    pub fn subscribed(symbols: Vec<String>) -> Self {
        ClientEnvelope::Subscription {
            status: "subscribed".to_string(),
            symbols,
        }
    }

    pub fn unsubscribed(symbols: Vec<String>) -> Self {
        ClientEnvelope::Subscription {
            status: "unsubscribed".to_string(),
            symbols,
        }
    }

    pub fn price_update(symbol: Symbol, data: PriceData) -> Self {
        ClientEnvelope::PriceUpdate { symbol, data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ClientEnvelope::Error {
            message: message.into(),
        }
    }
}

/// One trade tick inside an upstream trade message. Finnhub uses
/// single-letter field names on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedTick {
    #[serde(rename = "s", default)]
    pub symbol: String,
    #[serde(rename = "p")]
    pub price: Option<f64>,
    #[serde(rename = "t")]
    pub timestamp: Option<i64>,
    #[serde(rename = "v", default)]
    pub volume: f64,
}

/// Messages the upstream feed sends us. Anything that fails to parse is
/// an unrecognized kind and gets ignored by the link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedMessage {
    Trade {
        data: Vec<FeedTick>,
    },
    Ping,
    Error {
        #[serde(default)]
        msg: String,
    },
}

/// Commands the relay sends upstream. The feed protocol takes one
/// message per symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedCommand {
    Subscribe { symbol: Symbol },
    Unsubscribe { symbol: Symbol },
}
