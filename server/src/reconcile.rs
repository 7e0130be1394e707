//! Rebuilds the world snapshot from the durable store
//!
//! Runs before every handler. Nothing in process memory is assumed to have
//! survived since the previous event, so the roster is always re-read. The
//! block list carried in from the previous invocation (empty on a cold
//! start) is only replaced when the store's cheap count disagrees with it.

use crate::config::RosterMode;
use crate::roster::Roster;
use crate::store::Store;
use crate::world::WorldSnapshot;
use log::{debug, warn};
use shared::Block;

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub world: WorldSnapshot,
    /// Whether the full block set was fetched
    pub refetched: bool,
}

pub async fn reconcile(
    store: &dyn Store,
    roster_mode: RosterMode,
    carried_blocks: Vec<Block>,
) -> Reconciliation {
    let roster = load_roster(store, roster_mode).await;

    let diverged = match store.count_blocks().await {
        Ok(count) if count == carried_blocks.len() => false,
        Ok(count) => {
            debug!(
                "Block count drifted: store has {}, carried {}",
                count,
                carried_blocks.len()
            );
            true
        }
        Err(e) => {
            warn!("{}; refetching blocks", e);
            true
        }
    };

    if !diverged {
        return Reconciliation {
            world: WorldSnapshot::new(roster, carried_blocks),
            refetched: false,
        };
    }

    let blocks = match store.get_all_blocks().await {
        Ok(blocks) => blocks,
        Err(e) => {
            warn!("{}; continuing with no known blocks", e);
            Vec::new()
        }
    };

    Reconciliation {
        world: WorldSnapshot::new(roster, blocks),
        refetched: true,
    }
}

async fn load_roster(store: &dyn Store, roster_mode: RosterMode) -> Roster {
    let loaded = match roster_mode {
        RosterMode::Record => store.get_roster().await.map(Option::unwrap_or_default),
        RosterMode::PerConnection => store.get_players().await,
    };

    loaded.unwrap_or_else(|e| {
        warn!("{}; continuing with an empty roster", e);
        Roster::new()
    })
}
