use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Edge length of one grid cell in world units
pub const GRID_SIZE: i32 = 20;
/// Width and height of the shared map in world units
pub const MAP_SIZE: i32 = 2000;
/// Largest number of blocks carried by a single `addBlocks` message
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Messages sent by clients, discriminated by the `action` field
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientMessage {
    SetName { name: String },
    Move { x: f64, y: f64 },
    Build { x: i32, y: i32, color: String },
    Remove { x: i32, y: i32 },
    Message { message: String },
}

impl ClientMessage {
    /// The transport route key this message is dispatched under
    pub fn route_key(&self) -> &'static str {
        match self {
            ClientMessage::SetName { .. } => "setName",
            ClientMessage::Move { .. } => "move",
            ClientMessage::Build { .. } => "build",
            ClientMessage::Remove { .. } => "remove",
            ClientMessage::Message { .. } => "message",
        }
    }
}

/// Messages sent by the server, discriminated by the `type` field
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Human readable notice from the server itself
    #[serde(rename = "serverMessage")]
    Notice { message: String },
    PlayerJoined { name: String },
    PlayerLeft { name: String },
    AllPlayers { data: Vec<String> },
    AddBlocks { data: Vec<Block> },
    Move { x: f64, y: f64, name: String },
    /// `data` holds the block color
    Build { x: i32, y: i32, data: String },
    Remove { x: i32, y: i32 },
    Message { message: String, name: String },
}

impl ServerMessage {
    pub fn notice(message: impl Into<String>) -> Self {
        ServerMessage::Notice {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Extracts the `action` discriminant from a raw inbound body.
///
/// Returns None when the body is not a JSON object or carries no string
/// `action`; the transport then routes the frame to its default route.
pub fn route_key_of(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    value.get("action")?.as_str().map(str::to_owned)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Block {
    pub x: i32,
    pub y: i32,
    pub color: String,
}

impl Block {
    pub fn new(x: i32, y: i32, color: impl Into<String>) -> Self {
        Self {
            x,
            y,
            color: color.into(),
        }
    }

    pub fn key(&self) -> String {
        block_key(self.x, self.y)
    }

    pub fn is_at(&self, x: i32, y: i32) -> bool {
        self.x == x && self.y == y
    }
}

/// Storage key of the block at `(x, y)`
pub fn block_key(x: i32, y: i32) -> String {
    format!("{}:{}", x, y)
}

/// Parses a `"{x}:{y}"` storage key back into its coordinate
pub fn parse_block_key(key: &str) -> Option<(i32, i32)> {
    let (x, y) = key.split_once(':')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

/// Floors a world coordinate onto the block grid
pub fn snap_to_grid(value: f64) -> i32 {
    ((value / GRID_SIZE as f64).floor() as i32).saturating_mul(GRID_SIZE)
}

/// Blocks indexed by coordinate.
///
/// A coordinate holds at most one block; inserting onto an occupied
/// coordinate leaves the existing block untouched, so applying the same
/// block batch twice or in any order converges to the same set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockSet {
    blocks: BTreeMap<(i32, i32), String>,
}

impl BlockSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the coordinate was already occupied
    pub fn insert(&mut self, block: Block) -> bool {
        let coord = (block.x, block.y);
        if self.blocks.contains_key(&coord) {
            return false;
        }
        self.blocks.insert(coord, block.color);
        true
    }

    /// Places a block unconditionally, returning the one it replaced
    pub fn replace(&mut self, block: Block) -> Option<Block> {
        let (x, y) = (block.x, block.y);
        self.blocks
            .insert((x, y), block.color)
            .map(|color| Block::new(x, y, color))
    }

    /// Returns the number of newly placed blocks
    pub fn extend(&mut self, blocks: impl IntoIterator<Item = Block>) -> usize {
        blocks
            .into_iter()
            .map(|block| self.insert(block))
            .filter(|inserted| *inserted)
            .count()
    }

    pub fn remove(&mut self, x: i32, y: i32) -> Option<Block> {
        self.blocks
            .remove(&(x, y))
            .map(|color| Block::new(x, y, color))
    }

    pub fn color_at(&self, x: i32, y: i32) -> Option<&str> {
        self.blocks.get(&(x, y)).map(String::as_str)
    }

    pub fn is_occupied(&self, x: i32, y: i32) -> bool {
        self.blocks.contains_key(&(x, y))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Block> + '_ {
        self.blocks
            .iter()
            .map(|(&(x, y), color)| Block::new(x, y, color.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_client_message_uses_action_tag() {
        let json = serde_json::to_string(&ClientMessage::SetName {
            name: "Ann".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"action":"setName","name":"Ann"}"#);

        let parsed: ClientMessage =
            serde_json::from_str(r#"{"action":"build","x":20,"y":40,"color":"red"}"#).unwrap();
        assert_eq!(
            parsed,
            ClientMessage::Build {
                x: 20,
                y: 40,
                color: "red".to_string()
            }
        );
        assert_eq!(parsed.route_key(), "build");
    }

    #[test]
    fn test_move_accepts_integer_coordinates() {
        let parsed: ClientMessage = serde_json::from_str(r#"{"action":"move","x":3,"y":4.5}"#).unwrap();
        match parsed {
            ClientMessage::Move { x, y } => {
                assert_approx_eq!(x, 3.0);
                assert_approx_eq!(y, 4.5);
            }
            _ => panic!("Wrong message type after deserialization"),
        }
    }

    #[test]
    fn test_server_message_wire_names() {
        let cases = vec![
            (ServerMessage::notice("Ann joined the game"), "serverMessage"),
            (ServerMessage::PlayerJoined { name: "Ann".into() }, "playerJoined"),
            (ServerMessage::PlayerLeft { name: "Ann".into() }, "playerLeft"),
            (ServerMessage::AllPlayers { data: vec![] }, "allPlayers"),
            (ServerMessage::AddBlocks { data: vec![] }, "addBlocks"),
            (ServerMessage::Remove { x: 1, y: 2 }, "remove"),
        ];

        for (message, expected) in cases {
            let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
            assert_eq!(value["type"], expected);
        }
    }

    #[test]
    fn test_build_broadcast_carries_color_in_data() {
        let json = ServerMessage::Build {
            x: 20,
            y: 20,
            data: "red".to_string(),
        }
        .to_json()
        .unwrap();
        assert_eq!(json, r#"{"type":"build","x":20,"y":20,"data":"red"}"#);
    }

    #[test]
    fn test_route_key_of() {
        assert_eq!(route_key_of(r#"{"action":"move","x":1,"y":2}"#).as_deref(), Some("move"));
        assert_eq!(route_key_of(r#"{"action":"dance"}"#).as_deref(), Some("dance"));
        assert_eq!(route_key_of(r#"{"x":1}"#), None);
        assert_eq!(route_key_of(r#"{"action":7}"#), None);
        assert_eq!(route_key_of("not json"), None);
    }

    #[test]
    fn test_block_key_round_trip() {
        assert_eq!(block_key(20, -40), "20:-40");
        assert_eq!(parse_block_key("20:-40"), Some((20, -40)));
        assert_eq!(Block::new(1, 2, "red").key(), "1:2");
        assert_eq!(parse_block_key("20"), None);
        assert_eq!(parse_block_key("a:b"), None);
    }

    #[test]
    fn test_snap_to_grid() {
        assert_eq!(snap_to_grid(0.0), 0);
        assert_eq!(snap_to_grid(19.9), 0);
        assert_eq!(snap_to_grid(20.0), 20);
        assert_eq!(snap_to_grid(-0.5), -GRID_SIZE);
        assert_eq!(snap_to_grid(1e12), i32::MAX);
        assert_eq!(snap_to_grid(-1e12), i32::MIN);
    }

    #[test]
    fn test_block_set_first_write_wins() {
        let mut set = BlockSet::new();
        assert!(set.insert(Block::new(20, 20, "red")));
        assert!(!set.insert(Block::new(20, 20, "blue")));

        assert_eq!(set.len(), 1);
        assert_eq!(set.color_at(20, 20), Some("red"));
    }

    #[test]
    fn test_block_set_duplicate_batches_are_idempotent() {
        let batch = vec![
            Block::new(0, 0, "red"),
            Block::new(20, 0, "green"),
            Block::new(0, 0, "red"),
        ];

        let mut set = BlockSet::new();
        assert_eq!(set.extend(batch.clone()), 2);
        assert_eq!(set.extend(batch.into_iter().rev()), 0);
        assert_eq!(set.len(), 2);
        assert_eq!(set.color_at(20, 0), Some("green"));
        assert!(set.is_occupied(0, 0));
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![Block::new(0, 0, "red"), Block::new(20, 0, "green")]
        );
    }

    #[test]
    fn test_block_set_replace_overrides() {
        let mut set = BlockSet::new();
        assert_eq!(set.replace(Block::new(20, 20, "red")), None);
        assert_eq!(
            set.replace(Block::new(20, 20, "blue")),
            Some(Block::new(20, 20, "red"))
        );
        assert!(!set.insert(Block::new(20, 20, "green")));
        assert_eq!(set.color_at(20, 20), Some("blue"));
    }

    #[test]
    fn test_block_set_remove_missing_is_noop() {
        let mut set = BlockSet::new();
        set.insert(Block::new(20, 20, "red"));

        assert_eq!(set.remove(40, 40), None);
        assert_eq!(set.len(), 1);
        assert_eq!(set.remove(20, 20), Some(Block::new(20, 20, "red")));
        assert!(set.is_empty());
    }
}
