//! Directory-backed durable store
//!
//! Layout under the data directory:
//! - `blocks/<hex key>.row`  one bincode row per block coordinate
//! - `players/<hex id>.row`  one bincode row per connection
//! - `users.bin`             the singleton roster record
//!
//! Rows are written to a temporary file and renamed into place, so a reader
//! never observes a half-written row. Every operation runs under the fixed
//! [`StorePolicy`]: each attempt is bounded by the operation timeout and
//! failed attempts are retried up to `max_retries` times.

use crate::config::StorePolicy;
use crate::error::{SyncError, SyncResult};
use crate::roster::{ConnectionId, Roster};
use crate::store::{Store, ROSTER_KEY};
use async_trait::async_trait;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::{block_key, parse_block_key, Block};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::time::{sleep, timeout};

const ROW_EXTENSION: &str = "row";

#[derive(Debug, Serialize, Deserialize)]
struct BlockRow {
    coord: String,
    color: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PlayerRow {
    connection_id: ConnectionId,
    name: String,
}

pub struct FileStore {
    root: PathBuf,
    policy: StorePolicy,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> SyncResult<Self> {
        Self::open_with_policy(root, StorePolicy::fixed()).await
    }

    pub async fn open_with_policy(root: impl Into<PathBuf>, policy: StorePolicy) -> SyncResult<Self> {
        let store = Self {
            root: root.into(),
            policy,
        };

        let blocks_dir = store.blocks_dir();
        let players_dir = store.players_dir();
        let prepare = async {
            fs::create_dir_all(&blocks_dir).await?;
            fs::create_dir_all(&players_dir).await
        };

        match timeout(policy.connect_timeout, prepare).await {
            Ok(Ok(())) => {
                info!("Opened block store at {}", store.root.display());
                Ok(store)
            }
            Ok(Err(e)) => Err(SyncError::store("open", e)),
            Err(_) => Err(SyncError::store(
                "open",
                format!("timed out after {:?}", policy.connect_timeout),
            )),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blocks_dir(&self) -> PathBuf {
        self.root.join("blocks")
    }

    fn players_dir(&self) -> PathBuf {
        self.root.join("players")
    }

    fn roster_path(&self) -> PathBuf {
        self.root.join(format!("{}.bin", ROSTER_KEY))
    }

    /// Runs one I/O operation under the store policy
    async fn with_policy<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = io::Result<T>>,
    {
        let mut retries = 0;
        loop {
            let reason = match timeout(self.policy.operation_timeout, attempt()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {:?}", self.policy.operation_timeout),
            };

            if retries >= self.policy.max_retries {
                return Err(SyncError::store(operation, reason));
            }
            retries += 1;
            debug!("Store {} attempt {} failed: {}", operation, retries, reason);
            sleep(self.policy.retry_backoff * retries).await;
        }
    }
}

/// File name of a row; hex keeps any key safe as a path component
fn row_file_name(key: &str) -> String {
    let hex: String = key.bytes().map(|b| format!("{:02x}", b)).collect();
    format!("{}.{}", hex, ROW_EXTENSION)
}

fn is_row(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(ROW_EXTENSION)
}

fn encode<T: Serialize>(value: &T) -> io::Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> io::Result<T> {
    bincode::deserialize(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

async fn write_atomic(path: PathBuf, bytes: Vec<u8>) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &bytes).await?;
    fs::rename(&tmp, &path).await
}

async fn remove_if_present(path: PathBuf) -> io::Result<()> {
    match fs::remove_file(&path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

async fn row_paths(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_row(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}

async fn read_rows<T: DeserializeOwned>(dir: PathBuf) -> io::Result<Vec<T>> {
    let mut rows = Vec::new();
    for path in row_paths(&dir).await? {
        match fs::read(&path).await {
            Ok(bytes) => rows.push(decode(&bytes)?),
            // Deleted between listing and reading
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(rows)
}

async fn read_roster(path: PathBuf) -> io::Result<Option<Roster>> {
    match fs::read(&path).await {
        Ok(bytes) => decode(&bytes).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl Store for FileStore {
    async fn get_all_blocks(&self) -> SyncResult<Vec<Block>> {
        let dir = self.blocks_dir();
        let rows: Vec<BlockRow> = self
            .with_policy("get_all_blocks", || read_rows::<BlockRow>(dir.clone()))
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                parse_block_key(&row.coord).map(|(x, y)| Block::new(x, y, row.color))
            })
            .collect())
    }

    async fn put_block(&self, block: &Block) -> SyncResult<()> {
        let key = block.key();
        let path = self.blocks_dir().join(row_file_name(&key));
        let bytes = encode(&BlockRow {
            coord: key,
            color: block.color.clone(),
        })
        .map_err(|e| SyncError::store("put_block", e))?;

        self.with_policy("put_block", || write_atomic(path.clone(), bytes.clone()))
            .await
    }

    async fn delete_block(&self, x: i32, y: i32) -> SyncResult<()> {
        let path = self.blocks_dir().join(row_file_name(&block_key(x, y)));
        self.with_policy("delete_block", || remove_if_present(path.clone()))
            .await
    }

    async fn count_blocks(&self) -> SyncResult<usize> {
        let dir = self.blocks_dir();
        self.with_policy("count_blocks", || {
            let dir = dir.clone();
            async move { row_paths(&dir).await.map(|paths| paths.len()) }
        })
        .await
    }

    async fn get_roster(&self) -> SyncResult<Option<Roster>> {
        let path = self.roster_path();
        self.with_policy("get_roster", || read_roster(path.clone()))
            .await
    }

    async fn put_roster(&self, roster: &Roster) -> SyncResult<()> {
        let path = self.roster_path();
        let bytes = encode(roster).map_err(|e| SyncError::store("put_roster", e))?;
        self.with_policy("put_roster", || write_atomic(path.clone(), bytes.clone()))
            .await
    }

    async fn get_players(&self) -> SyncResult<Roster> {
        let dir = self.players_dir();
        let rows: Vec<PlayerRow> = self
            .with_policy("get_players", || read_rows::<PlayerRow>(dir.clone()))
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.connection_id, row.name))
            .collect())
    }

    async fn put_player(&self, id: &ConnectionId, name: &str) -> SyncResult<()> {
        let path = self.players_dir().join(row_file_name(id.as_str()));
        let bytes = encode(&PlayerRow {
            connection_id: id.clone(),
            name: name.to_string(),
        })
        .map_err(|e| SyncError::store("put_player", e))?;

        self.with_policy("put_player", || write_atomic(path.clone(), bytes.clone()))
            .await
    }

    async fn delete_player(&self, id: &ConnectionId) -> SyncResult<()> {
        let path = self.players_dir().join(row_file_name(id.as_str()));
        self.with_policy("delete_player", || remove_if_present(path.clone()))
            .await
    }
}
