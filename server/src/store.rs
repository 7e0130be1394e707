//! Durable store adapter
//!
//! Two logical collections live behind the [`Store`] trait:
//! - the block set, one row per `"{x}:{y}"` coordinate
//! - the roster, either as the legacy singleton record under [`ROSTER_KEY`]
//!   or as one row per connection
//!
//! Implementations hold no business logic and perform no retries of their
//! own; whatever bounded retry the underlying I/O does, the caller only ever
//! sees the terminal [`SyncError::Store`].

use crate::error::SyncResult;
use crate::roster::{ConnectionId, Roster};
use async_trait::async_trait;
use shared::{block_key, parse_block_key, Block};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Key of the singleton roster record
pub const ROSTER_KEY: &str = "users";

#[async_trait]
pub trait Store: Send + Sync {
    /// Scans every stored block
    async fn get_all_blocks(&self) -> SyncResult<Vec<Block>>;

    /// Upserts the block at its coordinate
    async fn put_block(&self, block: &Block) -> SyncResult<()>;

    /// Deletes the block at `(x, y)`; deleting an absent block succeeds
    async fn delete_block(&self, x: i32, y: i32) -> SyncResult<()>;

    /// Counts stored blocks without reading their payloads
    async fn count_blocks(&self) -> SyncResult<usize>;

    /// Reads the singleton roster record, None when it was never written
    async fn get_roster(&self) -> SyncResult<Option<Roster>>;

    /// Overwrites the singleton roster record wholesale
    async fn put_roster(&self, roster: &Roster) -> SyncResult<()>;

    /// Scans the per-connection roster rows
    async fn get_players(&self) -> SyncResult<Roster>;

    async fn put_player(&self, id: &ConnectionId, name: &str) -> SyncResult<()>;

    async fn delete_player(&self, id: &ConnectionId) -> SyncResult<()>;
}

#[derive(Debug, Default)]
struct Tables {
    blocks: BTreeMap<String, String>,
    roster_record: Option<Roster>,
    players: BTreeMap<ConnectionId, String>,
}

/// In-process store used when no data directory is configured
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with blocks
    pub fn with_blocks(blocks: impl IntoIterator<Item = Block>) -> Self {
        let tables = Tables {
            blocks: blocks
                .into_iter()
                .map(|block| (block.key(), block.color))
                .collect(),
            ..Tables::default()
        };
        Self {
            tables: RwLock::new(tables),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_all_blocks(&self) -> SyncResult<Vec<Block>> {
        let tables = self.tables.read().await;
        Ok(tables
            .blocks
            .iter()
            .filter_map(|(key, color)| {
                parse_block_key(key).map(|(x, y)| Block::new(x, y, color.clone()))
            })
            .collect())
    }

    async fn put_block(&self, block: &Block) -> SyncResult<()> {
        let mut tables = self.tables.write().await;
        tables.blocks.insert(block.key(), block.color.clone());
        Ok(())
    }

    async fn delete_block(&self, x: i32, y: i32) -> SyncResult<()> {
        let mut tables = self.tables.write().await;
        tables.blocks.remove(&block_key(x, y));
        Ok(())
    }

    async fn count_blocks(&self) -> SyncResult<usize> {
        Ok(self.tables.read().await.blocks.len())
    }

    async fn get_roster(&self) -> SyncResult<Option<Roster>> {
        Ok(self.tables.read().await.roster_record.clone())
    }

    async fn put_roster(&self, roster: &Roster) -> SyncResult<()> {
        self.tables.write().await.roster_record = Some(roster.clone());
        Ok(())
    }

    async fn get_players(&self) -> SyncResult<Roster> {
        let tables = self.tables.read().await;
        Ok(tables
            .players
            .iter()
            .map(|(id, name)| (id.clone(), name.clone()))
            .collect())
    }

    async fn put_player(&self, id: &ConnectionId, name: &str) -> SyncResult<()> {
        let mut tables = self.tables.write().await;
        tables.players.insert(id.clone(), name.to_string());
        Ok(())
    }

    async fn delete_player(&self, id: &ConnectionId) -> SyncResult<()> {
        self.tables.write().await.players.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_block_upserts_by_coordinate() {
        let store = MemoryStore::new();
        store.put_block(&Block::new(20, 20, "red")).await.unwrap();
        store.put_block(&Block::new(20, 20, "blue")).await.unwrap();
        store.put_block(&Block::new(40, 20, "green")).await.unwrap();

        assert_eq!(store.count_blocks().await.unwrap(), 2);
        let blocks = store.get_all_blocks().await.unwrap();
        assert!(blocks.contains(&Block::new(20, 20, "blue")));
        assert!(blocks.contains(&Block::new(40, 20, "green")));
    }

    #[tokio::test]
    async fn test_delete_absent_block_succeeds() {
        let store = MemoryStore::with_blocks(vec![Block::new(20, 20, "red")]);

        store.delete_block(40, 40).await.unwrap();
        assert_eq!(store.count_blocks().await.unwrap(), 1);

        store.delete_block(20, 20).await.unwrap();
        assert_eq!(store.count_blocks().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_roster_record_missing_until_written() {
        let store = MemoryStore::new();
        assert_eq!(store.get_roster().await.unwrap(), None);

        let mut roster = Roster::new();
        roster.insert(ConnectionId::from("c1"), "Ann");
        store.put_roster(&roster).await.unwrap();

        assert_eq!(store.get_roster().await.unwrap(), Some(roster));
    }

    #[tokio::test]
    async fn test_roster_record_overwrites_wholesale() {
        let store = MemoryStore::new();

        let mut first = Roster::new();
        first.insert(ConnectionId::from("c1"), "Ann");
        store.put_roster(&first).await.unwrap();

        let mut second = Roster::new();
        second.insert(ConnectionId::from("c2"), "Bea");
        store.put_roster(&second).await.unwrap();

        let stored = store.get_roster().await.unwrap().unwrap();
        assert!(!stored.contains(&ConnectionId::from("c1")));
        assert_eq!(stored.name_of(&ConnectionId::from("c2")), Some("Bea"));
    }

    #[tokio::test]
    async fn test_player_rows_are_independent() {
        let store = MemoryStore::new();
        store.put_player(&ConnectionId::from("c1"), "Ann").await.unwrap();
        store.put_player(&ConnectionId::from("c2"), "Bea").await.unwrap();
        store.delete_player(&ConnectionId::from("c1")).await.unwrap();
        store.delete_player(&ConnectionId::from("ghost")).await.unwrap();

        let players = store.get_players().await.unwrap();
        assert_eq!(players.names(), vec!["Bea".to_string()]);
    }
}
