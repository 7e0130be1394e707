//! # Block World Server Library
//!
//! This library keeps every connected client's view of players and blocks
//! consistent with a shared durable store. Clients join with a name, move
//! around, chat, and place or remove colored blocks on a shared grid; the
//! server fans each change out to everyone connected.
//!
//! ## Invocation Model
//!
//! Every transport event (a connection opening, a frame, a connection
//! closing) is handled by an independent invocation. Invocations run
//! concurrently and share nothing in memory except the store and the
//! transport, so each one starts by rebuilding its own snapshot of the
//! world:
//!
//! 1. **Reconciliation** re-reads the roster and compares the store's cheap
//!    block count against the block list handed in from the previous
//!    invocation, refetching all blocks only when they disagree.
//! 2. **Routing** selects a handler from the event's route key.
//! 3. **Handling** mutates the store and broadcasts to connected clients.
//! 4. The transport always receives the same acknowledgment.
//!
//! ## Consistency
//!
//! Availability of the shared session wins over strict correctness. A dead
//! connection is dropped from the roster and the broadcast continues to
//! everyone else. A failed store write is logged and the broadcast still
//! goes out, so a client can briefly see a block the store never got.
//! Blocks live in one row per coordinate; the roster can be stored either as
//! one row per connection or as a single record overwritten on every change
//! (see [`config::RosterMode`]), where concurrent joins can lose each other.
//!
//! ## Module Organization
//!
//! ### Store (`store`, `file_store`)
//! The durable store capability and its in-memory and on-disk backends.
//!
//! ### Delivery (`transport`, `broadcast`, `chunk`)
//! Per-connection channels, scatter/gather broadcast, and bounded block
//! batches for onboarding.
//!
//! ### Invocation (`reconcile`, `router`, `handlers`, `world`)
//! Snapshot rebuilding, route dispatch, and the per-route handlers.
//!
//! ### Network (`network`)
//! The WebSocket listener that turns client traffic into events.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::InvocationSettings;
//! use server::network::WorldServer;
//! use server::store::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let server = WorldServer::bind(
//!         "127.0.0.1:8080",
//!         store,
//!         InvocationSettings::default(),
//!         true,
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod chunk;
pub mod config;
pub mod error;
pub mod file_store;
pub mod handlers;
pub mod network;
pub mod reconcile;
pub mod roster;
pub mod router;
pub mod store;
pub mod transport;
pub mod world;
