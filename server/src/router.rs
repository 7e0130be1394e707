//! Event routing
//!
//! One transport event is one invocation: reconcile the world snapshot from
//! the store, run the handler the route key selects, and acknowledge. The
//! acknowledgment is the same whatever the handler did; failures are logged
//! here and never reach the transport.

use crate::config::InvocationSettings;
use crate::error::SyncError;
use crate::handlers::Invocation;
use crate::reconcile::reconcile;
use crate::roster::ConnectionId;
use crate::store::Store;
use crate::transport::Transport;
use log::{debug, warn};
use shared::{route_key_of, Block};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CONNECT_ROUTE: &str = "$connect";
pub const DISCONNECT_ROUTE: &str = "$disconnect";
pub const DEFAULT_ROUTE: &str = "$default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Connect,
    Disconnect,
    SetName,
    Move,
    Build,
    Remove,
    Message,
    /// Anything unrecognized, including `$default` itself
    Default(String),
}

impl Route {
    pub fn from_key(key: &str) -> Self {
        match key {
            CONNECT_ROUTE => Route::Connect,
            DISCONNECT_ROUTE => Route::Disconnect,
            "setName" => Route::SetName,
            "move" => Route::Move,
            "build" => Route::Build,
            "remove" => Route::Remove,
            "message" => Route::Message,
            other => Route::Default(other.to_string()),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Route::Connect => CONNECT_ROUTE,
            Route::Disconnect => DISCONNECT_ROUTE,
            Route::SetName => "setName",
            Route::Move => "move",
            Route::Build => "build",
            Route::Remove => "remove",
            Route::Message => "message",
            Route::Default(key) => key,
        }
    }
}

/// One inbound transport event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub connection_id: ConnectionId,
    pub route_key: String,
    pub body: Option<String>,
}

impl Event {
    pub fn connect(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            route_key: CONNECT_ROUTE.to_string(),
            body: None,
        }
    }

    pub fn disconnect(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            route_key: DISCONNECT_ROUTE.to_string(),
            body: None,
        }
    }

    /// A client frame, routed by its `action` field
    pub fn frame(connection_id: ConnectionId, body: impl Into<String>) -> Self {
        let body = body.into();
        let route_key = route_key_of(&body).unwrap_or_else(|| DEFAULT_ROUTE.to_string());
        Self {
            connection_id,
            route_key,
            body: Some(body),
        }
    }
}

/// Fixed acknowledgment returned to the transport for every event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub status_code: u16,
}

impl Ack {
    pub const OK: Ack = Ack { status_code: 200 };
}

/// Collaborators an invocation may touch
#[derive(Clone)]
pub struct Context {
    pub store: Arc<dyn Store>,
    pub transport: Arc<dyn Transport>,
    pub settings: InvocationSettings,
}

/// Result of one invocation
#[derive(Debug)]
pub struct Outcome {
    pub ack: Ack,
    /// The block list as this invocation last knew it
    pub blocks: Vec<Block>,
}

/// Runs one event to completion
pub async fn handle_event(context: &Context, carried_blocks: Vec<Block>, event: Event) -> Outcome {
    let route = Route::from_key(&event.route_key);
    debug!("Event {} from {}", route.key(), event.connection_id);

    let reconciliation = reconcile(
        context.store.as_ref(),
        context.settings.roster_mode,
        carried_blocks,
    )
    .await;
    let mut world = reconciliation.world;

    let mut invocation = Invocation::new(context, &event.connection_id, &mut world);
    let body = event.body.as_deref();
    let result = match &route {
        Route::Connect => invocation.connect().await,
        Route::Disconnect => invocation.disconnect().await,
        Route::SetName => invocation.set_name(body).await,
        Route::Move => invocation.move_player(body).await,
        Route::Build => invocation.build(body).await,
        Route::Remove => invocation.remove(body).await,
        Route::Message => invocation.message(body).await,
        Route::Default(key) => {
            warn!("{}", SyncError::UnknownRoute(key.clone()));
            invocation.unknown_command().await
        }
    };

    if let Err(e) = result {
        warn!("Event {} from {} ignored: {}", route.key(), event.connection_id, e);
    }

    Outcome {
        ack: Ack::OK,
        blocks: world.into_blocks(),
    }
}

/// Feeds transport events into invocations.
///
/// The only state kept between events is the block list returned by the
/// previous invocation, handed explicitly to the next one so reconciliation
/// can skip the full fetch when nothing changed. With `carry_blocks`
/// disabled every invocation starts cold.
pub struct Dispatcher {
    context: Context,
    carried: Mutex<Vec<Block>>,
    carry_blocks: bool,
}

impl Dispatcher {
    pub fn new(context: Context, carry_blocks: bool) -> Self {
        Self {
            context,
            carried: Mutex::new(Vec::new()),
            carry_blocks,
        }
    }

    pub async fn dispatch(&self, event: Event) -> Ack {
        let carried = if self.carry_blocks {
            self.carried.lock().await.clone()
        } else {
            Vec::new()
        };

        let outcome = handle_event(&self.context, carried, event).await;

        if self.carry_blocks {
            *self.carried.lock().await = outcome.blocks;
        }
        outcome.ack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_keys() {
        let keys = [
            "$connect",
            "$disconnect",
            "setName",
            "move",
            "build",
            "remove",
            "message",
        ];
        for key in keys {
            let route = Route::from_key(key);
            assert!(!matches!(route, Route::Default(_)), "{} fell through", key);
            assert_eq!(route.key(), key);
        }

        assert_eq!(Route::from_key("$default"), Route::Default("$default".into()));
        assert_eq!(Route::from_key("dance"), Route::Default("dance".into()));
        assert_eq!(Route::from_key("SETNAME"), Route::Default("SETNAME".into()));
    }

    #[test]
    fn test_frame_routing() {
        let id = ConnectionId::from("c1");

        let event = Event::frame(id.clone(), r#"{"action":"build","x":1,"y":2,"color":"red"}"#);
        assert_eq!(event.route_key, "build");

        let event = Event::frame(id.clone(), "garbage");
        assert_eq!(event.route_key, DEFAULT_ROUTE);
        assert_eq!(event.body.as_deref(), Some("garbage"));

        assert_eq!(Event::connect(id.clone()).route_key, CONNECT_ROUTE);
        assert_eq!(Event::disconnect(id).body, None);
    }
}
