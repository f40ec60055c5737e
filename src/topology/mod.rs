//!
//! In-memory blocks, grids and grid groups.
//!
//! These are the collaborators a binder or channel consumes: blocks sit on
//! grids, grids are joined into one group per link type, and every structural
//! change is announced through the `EventSlot`s on each object. [`Topology`]
//! owns the objects and drives the changes.

pub mod block;
pub mod grid;
pub mod group;
pub mod world;

pub use block::{Block, WeakBlock};
pub use grid::Grid;
pub use group::GridGroup;
pub use world::{GridSnapshot, GroupSnapshot, Link, Topology, TopologySnapshot};
