//! Route handlers
//!
//! Each handler works on the reconciled [`WorldSnapshot`] of its invocation.
//! An `Err` from a handler only ever means the event was skipped because its
//! body did not satisfy the route; store write failures are logged and
//! swallowed where they happen, so the broadcast side still runs.

use crate::broadcast::{BroadcastReport, Broadcaster};
use crate::config::{InvocationSettings, RosterMode};
use crate::error::{SyncError, SyncResult};
use crate::roster::ConnectionId;
use crate::router::Context;
use crate::store::Store;
use crate::world::WorldSnapshot;
use log::{debug, info, warn};
use serde::Deserialize;
use shared::{Block, ServerMessage};

pub const UNKNOWN_COMMAND: &str = "unknown command";

/// Every field any route reads; a route checks only the ones it needs
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Body {
    name: Option<String>,
    x: Option<f64>,
    y: Option<f64>,
    color: Option<String>,
    message: Option<String>,
}

impl Body {
    /// Parses a raw body, falling back to an empty one
    fn parse(route: &str, raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Body::default();
        };
        serde_json::from_str(raw).unwrap_or_else(|e| {
            warn!("{}", SyncError::malformed(route, e));
            Body::default()
        })
    }

    fn position(&self, route: &str) -> SyncResult<(f64, f64)> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(SyncError::malformed(route, "missing x or y")),
        }
    }

    fn cell(&self, route: &str) -> SyncResult<(i32, i32)> {
        let (x, y) = self.position(route)?;
        match (grid_coordinate(x), grid_coordinate(y)) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(SyncError::malformed(route, "x and y must be integers")),
        }
    }

    fn text(field: Option<String>, route: &str, what: &str) -> SyncResult<String> {
        field
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| SyncError::malformed(route, format!("missing {}", what)))
    }
}

fn grid_coordinate(value: f64) -> Option<i32> {
    let in_range = value >= i32::MIN as f64 && value <= i32::MAX as f64;
    (value.fract() == 0.0 && in_range).then_some(value as i32)
}

/// Handler state for one event
pub struct Invocation<'a> {
    store: &'a dyn Store,
    broadcaster: Broadcaster<'a>,
    settings: InvocationSettings,
    connection_id: &'a ConnectionId,
    world: &'a mut WorldSnapshot,
}

impl<'a> Invocation<'a> {
    pub fn new(
        context: &'a Context,
        connection_id: &'a ConnectionId,
        world: &'a mut WorldSnapshot,
    ) -> Self {
        Self {
            store: context.store.as_ref(),
            broadcaster: Broadcaster::new(context.transport.as_ref()),
            settings: context.settings,
            connection_id,
            world,
        }
    }

    pub async fn connect(&mut self) -> SyncResult<()> {
        debug!("{} connected", self.connection_id);
        Ok(())
    }

    pub async fn disconnect(&mut self) -> SyncResult<()> {
        let id = self.connection_id.clone();
        let Some(name) = self.world.roster.remove(&id) else {
            debug!("{} disconnected before choosing a name", id);
            // A concurrent join may still have written a row for it
            self.persist_membership(None, &[id]).await;
            return Ok(());
        };
        info!("{} ({}) left", name, id);

        let mut report = self
            .broadcast_to_all(ServerMessage::notice(format!("{} disconnected", name)))
            .await;
        report.merge(
            self.broadcast_to_all(ServerMessage::PlayerLeft { name })
                .await,
        );

        report.dropped.push(id);
        self.persist_membership(None, &report.dropped).await;
        Ok(())
    }

    pub async fn set_name(&mut self, raw: Option<&str>) -> SyncResult<()> {
        let body = Body::parse("setName", raw);
        let name = Body::text(body.name, "setName", "name")?;
        let id = self.connection_id.clone();

        if let Some(previous) = self.world.roster.insert(id.clone(), name.clone()) {
            info!("{} renamed from {} to {}", id, previous, name);
        } else {
            info!("{} joined as {}", id, name);
        }

        let mut report = self
            .broadcast_to_all(ServerMessage::notice(format!("{} joined the game", name)))
            .await;
        report.merge(
            self.broadcast_to_all(ServerMessage::PlayerJoined { name: name.clone() })
                .await,
        );

        let all_players = ServerMessage::AllPlayers {
            data: self.world.roster.names(),
        };
        report.merge(
            self.broadcaster
                .broadcast(&mut self.world.roster, &[id.clone()], &all_players)
                .await,
        );

        report.merge(
            self.broadcaster
                .send_chunks(
                    &mut self.world.roster,
                    &id,
                    &self.world.blocks,
                    self.settings.chunk_size,
                )
                .await,
        );

        self.persist_membership(Some((&id, name.as_str())), &report.dropped)
            .await;
        Ok(())
    }

    pub async fn move_player(&mut self, raw: Option<&str>) -> SyncResult<()> {
        let body = Body::parse("move", raw);
        let (x, y) = body.position("move")?;
        let Some(name) = self.sender_name() else {
            return Ok(());
        };

        self.broadcast_to_all(ServerMessage::Move { x, y, name })
            .await;
        Ok(())
    }

    pub async fn build(&mut self, raw: Option<&str>) -> SyncResult<()> {
        let body = Body::parse("build", raw);
        let (x, y) = body.cell("build")?;
        let color = Body::text(body.color, "build", "color")?;

        let block = Block::new(x, y, color.clone());
        // The broadcast goes out even when the write fails, leaving
        // clients with a block the store does not have.
        if let Err(e) = self.store.put_block(&block).await {
            warn!("{}; broadcasting build at ({}, {}) anyway", e, x, y);
        }
        if let Some(previous) = self.world.place_block(block) {
            debug!("Build at ({}, {}) replaced {}", x, y, previous.color);
        }

        self.broadcast_to_all(ServerMessage::Build { x, y, data: color })
            .await;
        Ok(())
    }

    pub async fn remove(&mut self, raw: Option<&str>) -> SyncResult<()> {
        let body = Body::parse("remove", raw);
        let (x, y) = body.cell("remove")?;

        if self.world.take_block(x, y).is_none() {
            info!("No block at ({}, {}) to remove", x, y);
            return Ok(());
        }

        if let Err(e) = self.store.delete_block(x, y).await {
            warn!("{}; block at ({}, {}) may reappear", e, x, y);
        }
        self.broadcast_to_all(ServerMessage::Remove { x, y }).await;
        Ok(())
    }

    pub async fn message(&mut self, raw: Option<&str>) -> SyncResult<()> {
        let body = Body::parse("message", raw);
        let message = Body::text(body.message, "message", "message text")?;
        let Some(name) = self.sender_name() else {
            return Ok(());
        };

        self.broadcast_to_all(ServerMessage::Message { message, name })
            .await;
        Ok(())
    }

    pub async fn unknown_command(&mut self) -> SyncResult<()> {
        self.broadcast_to_all(ServerMessage::notice(UNKNOWN_COMMAND))
            .await;
        Ok(())
    }

    fn sender_name(&self) -> Option<String> {
        let name = self.world.roster.name_of(self.connection_id);
        if name.is_none() {
            info!("Ignoring event from unnamed connection {}", self.connection_id);
        }
        name.map(str::to_owned)
    }

    async fn broadcast_to_all(&mut self, message: ServerMessage) -> BroadcastReport {
        self.broadcaster
            .broadcast_to_all(&mut self.world.roster, &message)
            .await
    }

    /// Writes a membership change back to the store.
    ///
    /// Failures are logged only; the roster the next invocation reads may
    /// then lag behind what clients were told.
    async fn persist_membership(&self, joined: Option<(&ConnectionId, &str)>, left: &[ConnectionId]) {
        match self.settings.roster_mode {
            RosterMode::Record => {
                if let Err(e) = self.store.put_roster(&self.world.roster).await {
                    warn!("{}; roster change lost", e);
                }
            }
            RosterMode::PerConnection => {
                for id in left {
                    if let Err(e) = self.store.delete_player(id).await {
                        warn!("{}; {} stays in the stored roster", e, id);
                    }
                }
                if let Some((id, name)) = joined {
                    if !self.world.roster.contains(id) {
                        return;
                    }
                    if let Err(e) = self.store.put_player(id, name).await {
                        warn!("{}; {} missing from the stored roster", e, id);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_parse_fallbacks() {
        let body = Body::parse("build", Some("{not json"));
        assert!(body.x.is_none() && body.color.is_none());

        let body = Body::parse("build", None);
        assert!(body.position("build").is_err());

        let body = Body::parse("move", Some(r#"{"action":"move","x":1.5,"y":2}"#));
        assert_eq!(body.position("move").unwrap(), (1.5, 2.0));
    }

    #[test]
    fn test_cell_requires_integers() {
        let body = Body::parse("build", Some(r#"{"x":20,"y":40.0}"#));
        assert_eq!(body.cell("build").unwrap(), (20, 40));

        let body = Body::parse("build", Some(r#"{"x":20.5,"y":40}"#));
        assert!(matches!(
            body.cell("build"),
            Err(SyncError::MalformedInput { .. })
        ));

        let body = Body::parse("build", Some(r#"{"x":1e12,"y":0}"#));
        assert!(body.cell("build").is_err());
    }

    #[test]
    fn test_text_rejects_blank() {
        assert!(Body::text(Some("   ".into()), "setName", "name").is_err());
        assert!(Body::text(None, "setName", "name").is_err());
        assert_eq!(Body::text(Some("Ann".into()), "setName", "name").unwrap(), "Ann");
    }
}
