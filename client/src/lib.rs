//! # Block World Client Library
//!
//! A headless terminal client for the block world server. It joins under a
//! player name, mirrors the shared world from the messages the server
//! broadcasts, and turns typed lines into player actions.
//!
//! ## Module Organization
//!
//! ### World Module (`world`)
//! The client's copy of the world:
//! - Player names and last known positions
//! - Placed blocks: batched blocks never overwrite, builds always do
//! - The chat and server notice log
//! - Optimistic application of local builds and removals
//!
//! ### Command Module (`command`)
//! Parses input lines:
//! - `/move X Y`, `/build X Y COLOR`, `/remove X Y`, `/name NAME`
//! - Build and remove coordinates snapped onto the block grid
//! - Anything else is sent as chat
//!
//! ### Network Module (`network`)
//! The WebSocket session that ties the two together.
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::network::Client;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = Client::new("ws://127.0.0.1:8080", "Ann");
//! client.run().await?;
//! println!("{} blocks seen", client.view().blocks().len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Consistency
//!
//! The client never assumes its own actions succeeded until the server
//! echoes them, except for blocks: a local build or removal is shown at
//! once and the server's echo lands on the same state. Block batches may
//! arrive in any order, and a batch seen twice changes nothing.

pub mod command;
pub mod network;
pub mod world;
