//!
//! Shared identifier and enum types for gridgroup-core.
//!
//! Identities are plain `u64` newtypes handed out by their owner (the
//! `Topology` for blocks/grids/groups, the binder module for handles). They
//! serialize transparently so diagnostic snapshots stay readable.

use std::cell::Cell;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Identities -------------------------------------------------------------

/// Identity of a block (the entity owning a handle).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u64);

/// Identity of a grid (the container a block currently sits on).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridId(pub u64);

/// Identity of a grid group.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

/// Identity of a handle (a `Binder` or `Channel` subscription).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(pub u64);

thread_local! {
    static NEXT_HANDLE_ID: Cell<u64> = const { Cell::new(1) };
}

impl HandleId {
    /// Allocates a handle id unique within the calling thread. Handles never
    /// cross threads, so ids from different threads may repeat.
    pub(crate) fn next() -> Self {
        NEXT_HANDLE_ID.with(|next| {
            let id = next.get();
            next.set(id.saturating_add(1));
            HandleId(id)
        })
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block#{}", self.0)
    }
}

impl fmt::Display for GridId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grid#{}", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

// --- Link types -------------------------------------------------------------

/// The kind of connection that ties grids into a group.
///
/// Each link type has its own, independent grouping: two grids can share a
/// `Logical` group while sitting in different `Physical` groups.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LinkType {
    /// Grids that can exchange control signals (e.g. via antennas or connectors).
    Logical = 0,
    /// Grids that are physically attached and move as one body.
    Physical = 1,
    /// Grids joined by rotors, pistons and hinges.
    Mechanical = 2,
    /// Grids sharing a power network.
    Electrical = 3,
    /// Grids that ignore contact damage against each other.
    NoContactDamage = 4,
}

impl LinkType {
    /// Every link type, in tag order.
    pub const ALL: [LinkType; 5] = [
        LinkType::Logical,
        LinkType::Physical,
        LinkType::Mechanical,
        LinkType::Electrical,
        LinkType::NoContactDamage,
    ];
}

impl TryFrom<u8> for LinkType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LinkType::Logical),
            1 => Ok(LinkType::Physical),
            2 => Ok(LinkType::Mechanical),
            3 => Ok(LinkType::Electrical),
            4 => Ok(LinkType::NoContactDamage),
            _ => Err(format!("Invalid LinkType tag: {}", value)),
        }
    }
}

// --- Channel keys -----------------------------------------------------------

/// Names one logical notification channel among the handles of a group.
///
/// The key doubles as the variable key under which the channel's registry is
/// stored in the group's variable store, so pick a fixed key per feature
/// (`ChannelKey::from_u128(0x..)`) rather than generating one per handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelKey(pub Uuid);

impl ChannelKey {
    /// A fresh random key.
    pub fn new_random() -> Self {
        ChannelKey(Uuid::new_v4())
    }

    pub const fn from_u128(value: u128) -> Self {
        ChannelKey(Uuid::from_u128(value))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for ChannelKey {
    fn from(value: Uuid) -> Self {
        ChannelKey(value)
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_type_tags_round_trip() {
        for link in LinkType::ALL {
            assert_eq!(LinkType::try_from(link as u8), Ok(link));
        }
        assert!(LinkType::try_from(5).is_err());
    }

    #[test]
    fn handle_ids_are_unique() {
        let a = HandleId::next();
        let b = HandleId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn handle_ids_are_counted_per_thread() {
        let _ = HandleId::next();
        let first = std::thread::spawn(HandleId::next).join().unwrap();
        assert_eq!(first, HandleId(1));
    }

    #[test]
    fn channel_key_display_includes_uuid() {
        let key = ChannelKey::from_u128(0x0e72d3d4_35cc_45d4_b6ba_691877bdc829);
        assert_eq!(key.to_string(), "channel:0e72d3d4-35cc-45d4-b6ba-691877bdc829");
    }
}
