//! Per-connection delivery
//!
//! The [`Transport`] trait is the only way handlers reach a client. The
//! [`ConnectionTable`] implementation keeps one outbound channel per open
//! WebSocket; a writer task on the other end of each channel owns the socket.

use crate::error::{SyncError, SyncResult};
use crate::roster::ConnectionId;
use async_trait::async_trait;
use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::{mpsc, RwLock};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers one serialized message to one connection
    async fn post_to_connection(&self, id: &ConnectionId, payload: &str) -> SyncResult<()>;
}

/// An open connection as seen by the transport
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    /// Peer address, when the connection came in over a socket
    pub addr: Option<SocketAddr>,
    pub connected_at: Instant,
    sender: mpsc::UnboundedSender<String>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        addr: Option<SocketAddr>,
        sender: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }
}

/// Open connections indexed by id
#[derive(Debug, Default)]
pub struct ConnectionTable {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and returns the receiving half of its channel
    pub async fn open(
        &self,
        id: ConnectionId,
        addr: Option<SocketAddr>,
    ) -> mpsc::UnboundedReceiver<String> {
        let (sender, receiver) = mpsc::unbounded_channel();
        match addr {
            Some(addr) => info!("Connection {} opened from {}", id, addr),
            None => info!("Connection {} opened", id),
        }
        let connection = Connection::new(id.clone(), addr, sender);
        self.connections.write().await.insert(id, connection);
        receiver
    }

    /// Forgets a connection. Returns false if it was already gone.
    pub async fn close(&self, id: &ConnectionId) -> bool {
        if let Some(connection) = self.connections.write().await.remove(id) {
            info!(
                "Connection {} closed after {:.1}s",
                connection.id,
                connection.connected_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    pub async fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

#[async_trait]
impl Transport for ConnectionTable {
    async fn post_to_connection(&self, id: &ConnectionId, payload: &str) -> SyncResult<()> {
        let connections = self.connections.read().await;
        let connection = connections.get(id).ok_or_else(|| SyncError::Delivery {
            connection_id: id.to_string(),
            reason: "connection is gone".to_string(),
        })?;

        connection
            .sender
            .send(payload.to_string())
            .map_err(|_| SyncError::Delivery {
                connection_id: id.to_string(),
                reason: "connection is closed".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_and_deliver() {
        let table = ConnectionTable::new();
        let id = ConnectionId::from("c1");
        let mut rx = table.open(id.clone(), None).await;

        assert!(table.contains(&id).await);
        assert_eq!(table.len().await, 1);

        table.post_to_connection(&id, "hello").await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_unknown_connection_fails() {
        let table = ConnectionTable::new();
        let result = table
            .post_to_connection(&ConnectionId::from("ghost"), "hello")
            .await;

        assert!(matches!(result, Err(SyncError::Delivery { .. })));
    }

    #[tokio::test]
    async fn test_dropped_receiver_fails() {
        let table = ConnectionTable::new();
        let id = ConnectionId::from("c1");
        let rx = table.open(id.clone(), None).await;
        drop(rx);

        let result = table.post_to_connection(&id, "hello").await;
        assert!(matches!(result, Err(SyncError::Delivery { .. })));
    }

    #[tokio::test]
    async fn test_close() {
        let table = ConnectionTable::new();
        let id = ConnectionId::from("c1");
        let _rx = table.open(id.clone(), None).await;

        assert!(table.close(&id).await);
        assert!(!table.close(&id).await);
        assert!(table.is_empty().await);
    }
}
