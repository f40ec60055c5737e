//!
//! Defines error types for gridgroup-core.
//!
//! The binding and channel core never fails: every invalid state (missing
//! group, missing grid, closed handle, vanished block) degrades to a no-op.
//! Errors only come out of the `Topology` driver, which validates the
//! structural edits it is asked to perform before raising any event.

use crate::types::{BlockId, GridId};

/// Errors raised by `Topology` mutators. No event has been raised when one
/// of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    /// The grid is not (or no longer) part of this topology.
    #[error("Unknown grid {0}")]
    UnknownGrid(GridId),
    /// The block is not (or no longer) part of this topology.
    #[error("Unknown block {0}")]
    UnknownBlock(BlockId),
    /// The grid was retired by a merge.
    #[error("Grid {0} has been closed")]
    GridClosed(GridId),
    /// A grid cannot be merged into itself.
    #[error("Cannot merge grid {0} into itself")]
    SelfMerge(GridId),
    /// A grid cannot be linked to itself.
    #[error("Cannot link grid {0} to itself")]
    SelfLink(GridId),
    /// A split named a block that does not sit on the grid being split.
    #[error("Block {block} is not on grid {grid}")]
    BlockNotOnGrid { block: BlockId, grid: GridId },
    /// A split was requested without any block to move.
    #[error("Split of grid {0} moves no blocks")]
    EmptySplit(GridId),
    /// A split would leave the original grid without blocks; use a merge or
    /// remove the grid instead.
    #[error("Split of grid {0} would move every block")]
    SplitTakesAllBlocks(GridId),
}
