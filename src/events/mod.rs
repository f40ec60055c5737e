//!
//! Topology events and the callback slots that carry them.
//!
//! Every event a grid or group can raise has one payload struct here. The
//! payloads hold cheap `Rc` handles, so listeners can clone what they need.

pub mod slot;

pub use slot::{EventSlot, ListenerId};

use crate::topology::{Grid, GridGroup};

/// Raised on the original grid after some of its blocks moved to `new_grid`.
#[derive(Debug, Clone)]
pub struct GridSplit {
    pub original: Grid,
    pub new_grid: Grid,
}

/// Raised on both grids after every block of `lost` moved onto `kept`.
#[derive(Debug, Clone)]
pub struct GridMerge {
    pub kept: Grid,
    pub lost: Grid,
}

/// Raised on `new_group` after `grid` joined it. `old_group` is the group the
/// grid came from, if any.
#[derive(Debug, Clone)]
pub struct GridAddedToGroup {
    pub new_group: GridGroup,
    pub grid: Grid,
    pub old_group: Option<GridGroup>,
}

/// Raised on `old_group` after `grid` left it. `new_group` is where the grid
/// went, or `None` when the grid was retired.
#[derive(Debug, Clone)]
pub struct GridRemovedFromGroup {
    pub old_group: GridGroup,
    pub grid: Grid,
    pub new_group: Option<GridGroup>,
}
