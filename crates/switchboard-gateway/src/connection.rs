use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// A connected web-widget socket.
#[derive(Debug)]
pub struct Connection {
    pub id: Uuid,
    /// Session the socket talks on when a frame names none.
    pub session_id: String,
    pub tx: mpsc::UnboundedSender<String>,
}

/// Manages active WebSocket connections.
pub struct ConnectionManager {
    connections: RwLock<HashMap<Uuid, Connection>>,
}

impl ConnectionManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn add(&self, conn: Connection) {
        let id = conn.id;
        let session_id = conn.session_id.clone();
        self.connections.write().await.insert(id, conn);
        tracing::info!(connection_id = %id, session_id = %session_id, "Connection added");
    }

    pub async fn remove(&self, id: Uuid) {
        self.connections.write().await.remove(&id);
        tracing::info!(connection_id = %id, "Connection removed");
    }

    /// Queue a frame for one connection. Returns `false` if it is gone.
    pub async fn send_to_connection(&self, id: Uuid, message: &str) -> bool {
        let conns = self.connections.read().await;
        conns
            .get(&id)
            .is_some_and(|conn| conn.tx.send(message.to_string()).is_ok())
    }

    /// Rebind a connection to another session.
    pub async fn bind_session(&self, id: Uuid, session_id: &str) {
        if let Some(conn) = self.connections.write().await.get_mut(&id) {
            if conn.session_id != session_id {
                conn.session_id = session_id.to_string();
            }
        }
    }

    pub async fn session_of(&self, id: Uuid) -> Option<String> {
        self.connections
            .read()
            .await
            .get(&id)
            .map(|conn| conn.session_id.clone())
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }
}
