//! Error taxonomy shared by every server component
//!
//! No variant ever reaches the transport as a failure response. Each call
//! site decides locally whether to drop a connection, degrade to an empty
//! value, or skip the event, and logs what it did.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A single connection no longer accepts messages
    #[error("delivery to connection {connection_id} failed: {reason}")]
    Delivery {
        connection_id: String,
        reason: String,
    },

    /// A durable store operation failed or timed out
    #[error("store {operation} failed: {reason}")]
    Store {
        operation: &'static str,
        reason: String,
    },

    /// An inbound body could not be parsed or lacked a required field
    #[error("malformed {route} body: {reason}")]
    MalformedInput { route: String, reason: String },

    /// The route key matched no known handler
    #[error("unknown route `{0}`")]
    UnknownRoute(String),
}

impl SyncError {
    pub fn store(operation: &'static str, reason: impl ToString) -> Self {
        SyncError::Store {
            operation,
            reason: reason.to_string(),
        }
    }

    pub fn malformed(route: impl Into<String>, reason: impl ToString) -> Self {
        SyncError::MalformedInput {
            route: route.into(),
            reason: reason.to_string(),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
