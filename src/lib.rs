#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(deprecated)]

//!
//! Gridgroup-Core keeps entities subscribed to the group their container
//! currently belongs to, and lets entities that share a group and a channel
//! key notify each other without polling.
//!
//! - [`binder::Binder`] follows one block through grid merges, grid splits
//!   and group changes, and reports every change through [`binder::GroupHooks`].
//! - [`channel::Channel`] builds on a binder: it joins a per-group
//!   [`channel::ChannelRegistry`] and broadcasts "entered", "left" and "data
//!   changed" to its peers.
//! - [`topology`] is the in-memory world both of them observe.
//!
//! Everything is single-threaded and synchronous; callbacks run inline.

// Identifiers, link types and channel keys.
pub mod types;

// Errors returned by topology mutators.
pub mod error;

// Typed callback slots and event payloads.
pub mod events;

// Blocks, grids, groups and the driver that edits them.
pub mod topology;

// Group-rebinding state machine.
pub mod binder;

// Per-group channels on top of the binder.
pub mod channel;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use binder::{Binder, GroupHooks, Lifecycle};
pub use channel::{Channel, ChannelHooks, ChannelOptions, ChannelRegistry, Peer};
pub use error::TopologyError;
pub use topology::{Block, Grid, GridGroup, Topology};
pub use types::{BlockId, ChannelKey, GridId, GroupId, HandleId, LinkType};
