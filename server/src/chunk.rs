//! Splits a block set into bounded onboarding batches

use shared::Block;

/// Lazily yields consecutive slices of at most `max_chunk_size` blocks.
///
/// A zero size is treated as one so the sequence always makes progress.
/// Concatenating the slices reproduces `blocks` exactly.
pub fn chunks(blocks: &[Block], max_chunk_size: usize) -> impl Iterator<Item = &[Block]> {
    blocks.chunks(max_chunk_size.max(1))
}
