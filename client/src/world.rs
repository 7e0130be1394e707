//! Client-side mirror of the shared world
//!
//! Built purely from server messages. Block batches can arrive in any order
//! and more than once, so batched blocks go through [`BlockSet::insert`],
//! where the first block seen at a coordinate wins. A `build` is a later,
//! explicit placement and replaces whatever the coordinate held.

use log::debug;
use shared::{Block, BlockSet, ClientMessage, ServerMessage};
use std::collections::BTreeMap;

/// Where newly announced players appear until their first move
pub const SPAWN_POSITION: (f64, f64) = (100.0, 100.0);

#[derive(Debug, Clone, PartialEq)]
pub enum ChatLine {
    Server(String),
    Player { name: String, message: String },
}

#[derive(Debug, Default)]
pub struct WorldView {
    players: BTreeMap<String, (f64, f64)>,
    blocks: BlockSet,
    chat: Vec<ChatLine>,
}

impl WorldView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one server message to the view
    pub fn apply(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Notice { message } => self.chat.push(ChatLine::Server(message)),
            ServerMessage::Message { message, name } => {
                self.chat.push(ChatLine::Player { name, message })
            }
            ServerMessage::PlayerJoined { name } => {
                self.players.entry(name).or_insert(SPAWN_POSITION);
            }
            ServerMessage::PlayerLeft { name } => {
                self.players.remove(&name);
            }
            ServerMessage::AllPlayers { data } => {
                for name in data {
                    self.players.entry(name).or_insert(SPAWN_POSITION);
                }
            }
            ServerMessage::Move { x, y, name } => {
                if let Some(position) = self.players.get_mut(&name) {
                    *position = (x, y);
                }
            }
            ServerMessage::AddBlocks { data } => {
                let added = self.blocks.extend(data);
                debug!("Applied block batch, {} new", added);
            }
            ServerMessage::Build { x, y, data } => {
                self.blocks.replace(Block::new(x, y, data));
            }
            ServerMessage::Remove { x, y } => {
                self.blocks.remove(x, y);
            }
        }
    }

    /// Applies a local action optimistically.
    ///
    /// Returns the message to send, or None when the action cannot apply
    /// to the current view (building on an occupied cell, removing from an
    /// empty one).
    pub fn prepare(&mut self, message: ClientMessage) -> Option<ClientMessage> {
        match &message {
            ClientMessage::Build { x, y, color } => {
                if !self.blocks.insert(Block::new(*x, *y, color.clone())) {
                    return None;
                }
            }
            ClientMessage::Remove { x, y } => {
                self.blocks.remove(*x, *y)?;
            }
            _ => {}
        }
        Some(message)
    }

    pub fn position_of(&self, name: &str) -> Option<(f64, f64)> {
        self.players.get(name).copied()
    }

    pub fn player_names(&self) -> Vec<&str> {
        self.players.keys().map(String::as_str).collect()
    }

    pub fn blocks(&self) -> &BlockSet {
        &self.blocks
    }

    pub fn chat(&self) -> &[ChatLine] {
        &self.chat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_roster_messages() {
        let mut view = WorldView::new();
        view.apply(ServerMessage::AllPlayers {
            data: vec!["Ann".into(), "Bea".into()],
        });
        view.apply(ServerMessage::PlayerJoined { name: "Cy".into() });
        view.apply(ServerMessage::PlayerLeft { name: "Bea".into() });

        assert_eq!(view.player_names(), vec!["Ann", "Cy"]);
    }

    #[test]
    fn test_move_updates_known_players_only() {
        let mut view = WorldView::new();
        view.apply(ServerMessage::PlayerJoined { name: "Ann".into() });
        view.apply(ServerMessage::Move {
            x: 140.5,
            y: 90.25,
            name: "Ann".into(),
        });
        view.apply(ServerMessage::Move {
            x: 1.0,
            y: 1.0,
            name: "Ghost".into(),
        });

        let (x, y) = view.position_of("Ann").unwrap();
        assert_approx_eq!(x, 140.5);
        assert_approx_eq!(y, 90.25);
        assert_eq!(view.position_of("Ghost"), None);
    }

    #[test]
    fn test_repeated_block_batches_are_harmless() {
        let batch = vec![Block::new(0, 0, "red"), Block::new(20, 0, "blue")];
        let mut view = WorldView::new();

        view.apply(ServerMessage::AddBlocks { data: batch.clone() });
        view.apply(ServerMessage::Build {
            x: 0,
            y: 0,
            data: "green".into(),
        });
        view.apply(ServerMessage::AddBlocks { data: batch });

        assert_eq!(view.blocks().len(), 2);
        assert_eq!(view.blocks().color_at(0, 0), Some("green"));
        assert_eq!(view.blocks().color_at(20, 0), Some("blue"));
    }

    #[test]
    fn test_remove_then_rebuild() {
        let mut view = WorldView::new();
        view.apply(ServerMessage::Build {
            x: 20,
            y: 20,
            data: "red".into(),
        });
        view.apply(ServerMessage::Remove { x: 20, y: 20 });
        view.apply(ServerMessage::Remove { x: 40, y: 40 });
        assert!(view.blocks().is_empty());

        view.apply(ServerMessage::Build {
            x: 20,
            y: 20,
            data: "blue".into(),
        });
        assert_eq!(view.blocks().color_at(20, 20), Some("blue"));
    }

    #[test]
    fn test_chat_log() {
        let mut view = WorldView::new();
        view.apply(ServerMessage::notice("Ann joined the game"));
        view.apply(ServerMessage::Message {
            message: "hi".into(),
            name: "Ann".into(),
        });

        assert_eq!(
            view.chat(),
            &[
                ChatLine::Server("Ann joined the game".into()),
                ChatLine::Player {
                    name: "Ann".into(),
                    message: "hi".into()
                },
            ]
        );
    }

    #[test]
    fn test_prepare_rejects_occupied_build() {
        let mut view = WorldView::new();
        let build = ClientMessage::Build {
            x: 20,
            y: 20,
            color: "red".into(),
        };

        assert_eq!(view.prepare(build.clone()), Some(build.clone()));
        assert_eq!(view.prepare(build), None);
        assert_eq!(view.prepare(ClientMessage::Remove { x: 40, y: 40 }), None);
        assert!(view.prepare(ClientMessage::Remove { x: 20, y: 20 }).is_some());
        assert!(view.blocks().is_empty());
    }
}
