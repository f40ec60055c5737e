//!
//! Per-group publish/subscribe channels.
//!
//! Every [`Channel`] with the same [`ChannelKey`](crate::types::ChannelKey)
//! whose block sits in the same group shares one [`ChannelRegistry`] stored
//! in that group's variable store. Members learn about each other through
//! [`ChannelHooks`] without polling.

pub mod handle;
pub mod options;
pub mod registry;


pub use handle::{Channel, ChannelHooks, ChannelState, Peer};
pub use options::ChannelOptions;
pub use registry::ChannelRegistry;
