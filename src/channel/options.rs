//! Per-channel configuration.

use serde::{Deserialize, Serialize};

/// Behaviour switches for a [`Channel`](crate::channel::Channel).
///
/// Missing fields deserialize to their defaults, so a stored config only
/// needs to name what it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelOptions {
    /// Remove a group's registry entry once its last member leaves.
    pub prune_empty_entries: bool,
    /// Broadcast "data changed" to peers on every `set_data`/`update_data`.
    pub broadcast_on_set: bool,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        ChannelOptions {
            prune_empty_entries: true,
            broadcast_on_set: true,
        }
    }
}

impl ChannelOptions {
    /// Keep empty registry entries in the group's variable store.
    #[must_use]
    pub fn retain_empty_entries(mut self) -> Self {
        self.prune_empty_entries = false;
        self
    }

    /// Only broadcast data changes through `notify_data_changed`.
    #[must_use]
    pub fn manual_broadcast(mut self) -> Self {
        self.broadcast_on_set = false;
        self
    }
}
