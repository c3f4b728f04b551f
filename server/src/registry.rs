// Downstream connection registry
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tickrelay_common::{ClientEnvelope, ClientId, MetricsCollector, RelayError, Result};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// One downstream delivery channel. The production implementation wraps an
/// axum WebSocket sink; tests substitute recording fakes.
#[async_trait]
pub trait ClientConnection: Send + Sync {
    async fn send_json(&self, envelope: &ClientEnvelope) -> Result<()>;
}

/// Owns every connected downstream client. Ids are minted here on add and
/// never reused; routing state keyed by an id is torn down by the caller.
pub struct ClientRegistry {
    clients: RwLock<HashMap<ClientId, Arc<dyn ClientConnection>>>,
    metrics: Arc<MetricsCollector>,
}

impl ClientRegistry {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Registers a connection and returns its freshly minted id.
    pub async fn add(&self, connection: Arc<dyn ClientConnection>) -> ClientId {
        let id = ClientId::new();
        let mut clients = self.clients.write().await;
        clients.insert(id, connection);
        self.metrics.record_client_count(clients.len());
        info!("🔌 Client connected: {} ({} total)", id, clients.len());
        id
    }

    /// Removes a client. Safe to call for ids that are already gone.
    pub async fn remove(&self, id: ClientId) {
        let mut clients = self.clients.write().await;
        if clients.remove(&id).is_some() {
            self.metrics.record_client_count(clients.len());
            info!("🔌 Client disconnected: {} ({} total)", id, clients.len());
        }
    }

    /// Sends one envelope to one client. A failed send removes the client
    /// before the error is returned so the caller can purge routing state.
    pub async fn send_to(&self, id: ClientId, envelope: &ClientEnvelope) -> Result<()> {
        let connection = {
            let clients = self.clients.read().await;
            clients.get(&id).cloned()
        };
        let connection = match connection {
            Some(connection) => connection,
            None => return Err(RelayError::UnknownClient(id)),
        };
        if let Err(e) = connection.send_json(envelope).await {
            warn!("Failed to deliver message to client {}: {}", id, e);
            self.metrics.record_client_send_failure();
            self.remove(id).await;
            return Err(RelayError::ClientSendFailed(id));
        }
        Ok(())
    }

    /// Delivers an envelope to every client except `exclude`. The sweep
    /// always completes; clients whose sends failed are removed afterwards
    /// and returned so the caller can purge their routing state.
    pub async fn broadcast(
        &self,
        envelope: &ClientEnvelope,
        exclude: Option<ClientId>,
    ) -> Vec<ClientId> {
        let snapshot: Vec<(ClientId, Arc<dyn ClientConnection>)> = {
            let clients = self.clients.read().await;
            clients
                .iter()
                .map(|(id, connection)| (*id, connection.clone()))
                .collect()
        };

        let mut failed = Vec::new();
        for (id, connection) in snapshot {
            if Some(id) == exclude {
                continue;
            }
            if let Err(e) = connection.send_json(envelope).await {
                warn!("Broadcast delivery failed for client {}: {}", id, e);
                self.metrics.record_client_send_failure();
                failed.push(id);
            }
        }
        for id in &failed {
            self.remove(*id).await;
        }
        failed
    }

    pub async fn count(&self) -> usize {
        self.clients.read().await.len()
    }
}
