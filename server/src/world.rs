//! Per-invocation view of players and blocks
//!
//! A [`WorldSnapshot`] is rebuilt from the store at the start of every
//! invocation and never trusted beyond it. Handlers mutate it as they go so
//! later steps of the same invocation see their own changes.

use crate::roster::Roster;
use shared::Block;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldSnapshot {
    pub roster: Roster,
    pub blocks: Vec<Block>,
}

impl WorldSnapshot {
    pub fn new(roster: Roster, blocks: Vec<Block>) -> Self {
        Self { roster, blocks }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn find_block(&self, x: i32, y: i32) -> Option<&Block> {
        self.blocks.iter().find(|block| block.is_at(x, y))
    }

    /// Records a placed block, replacing whatever held its coordinate
    pub fn place_block(&mut self, block: Block) -> Option<Block> {
        match self.blocks.iter_mut().find(|b| b.is_at(block.x, block.y)) {
            Some(existing) => Some(std::mem::replace(existing, block)),
            None => {
                self.blocks.push(block);
                None
            }
        }
    }

    pub fn take_block(&mut self, x: i32, y: i32) -> Option<Block> {
        let index = self.blocks.iter().position(|block| block.is_at(x, y))?;
        Some(self.blocks.remove(index))
    }

    /// Hands the block list back so the next invocation can compare counts
    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }
}
