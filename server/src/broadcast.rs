//! Scatter/gather delivery of server messages
//!
//! Every call issues all of its deliveries concurrently and waits for all of
//! them to settle. A failed delivery never stops the others: it is logged
//! and the connection is dropped from the roster the caller passed in, so a
//! later broadcast in the same invocation skips it. Dropped connections are
//! reported back; persisting the membership change is up to the caller.

use crate::chunk::chunks;
use crate::roster::{ConnectionId, Roster};
use crate::transport::Transport;
use futures::future::join_all;
use log::{debug, error, warn};
use shared::{Block, ServerMessage};

/// Outcome of one or more broadcasts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Connections whose delivery failed, each listed once
    pub dropped: Vec<ConnectionId>,
}

impl BroadcastReport {
    pub fn merge(&mut self, other: BroadcastReport) {
        self.delivered += other.delivered;
        for id in other.dropped {
            if !self.dropped.contains(&id) {
                self.dropped.push(id);
            }
        }
    }
}

pub struct Broadcaster<'a> {
    transport: &'a dyn Transport,
}

impl<'a> Broadcaster<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    /// Sends `message` to each of `targets`
    pub async fn broadcast(
        &self,
        roster: &mut Roster,
        targets: &[ConnectionId],
        message: &ServerMessage,
    ) -> BroadcastReport {
        let payload = match message.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize broadcast message: {}", e);
                return BroadcastReport::default();
            }
        };

        let deliveries = targets
            .iter()
            .map(|id| (id.clone(), payload.clone()))
            .collect();
        self.scatter(roster, deliveries).await
    }

    /// Sends `message` to every connection currently in the roster
    pub async fn broadcast_to_all(
        &self,
        roster: &mut Roster,
        message: &ServerMessage,
    ) -> BroadcastReport {
        let targets = roster.connection_ids();
        self.broadcast(roster, &targets, message).await
    }

    /// Sends `blocks` to one connection as concurrent `addBlocks` batches.
    ///
    /// Batches may arrive in any order; receivers apply them idempotently.
    pub async fn send_chunks(
        &self,
        roster: &mut Roster,
        id: &ConnectionId,
        blocks: &[Block],
        chunk_size: usize,
    ) -> BroadcastReport {
        let mut deliveries = Vec::new();
        for chunk in chunks(blocks, chunk_size) {
            let message = ServerMessage::AddBlocks {
                data: chunk.to_vec(),
            };
            match message.to_json() {
                Ok(payload) => deliveries.push((id.clone(), payload)),
                Err(e) => error!("Failed to serialize block batch: {}", e),
            }
        }

        debug!("Sending {} block batches to {}", deliveries.len(), id);
        self.scatter(roster, deliveries).await
    }

    async fn scatter(
        &self,
        roster: &mut Roster,
        deliveries: Vec<(ConnectionId, String)>,
    ) -> BroadcastReport {
        let transport = self.transport;
        let outcomes = join_all(deliveries.iter().map(|(id, payload)| async move {
            (id, transport.post_to_connection(id, payload).await)
        }))
        .await;

        let mut report = BroadcastReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    debug!("Sent to {}", id);
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!("{}; dropping {} from roster", e, id);
                    roster.remove(id);
                    if !report.dropped.contains(id) {
                        report.dropped.push(id.clone());
                    }
                }
            }
        }
        report
    }
}
