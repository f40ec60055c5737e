//!
//! Per-group, per-key membership of channel handles.
//!
//! A `ChannelRegistry<D>` lives in a group's variable store under the channel
//! key. The group owns it; members are held weakly, so a handle dropped
//! without closing simply disappears from the registry the next time it is
//! read.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::topology::{Block, GridGroup};
use crate::types::{ChannelKey, HandleId};

/// What a registry needs from a member handle.
///
/// Implemented by the binder behind every `Channel<D, _>`; the peer
/// notifications are ignored once the member is closed.
pub(crate) trait ChannelMember<D> {
    fn member_id(&self) -> HandleId;
    fn block(&self) -> Option<Block>;
    fn generation(&self) -> u64;
    fn data_cell(&self) -> &RefCell<D>;
    fn is_active(&self) -> bool;
    fn peer_entered(self: Rc<Self>, peer: &Block);
    fn peer_left(self: Rc<Self>, peer: &Block);
    fn peer_data_changed(self: Rc<Self>, peer: &Block);
}

pub(crate) enum Lookup<D> {
    Found(Rc<ChannelRegistry<D>>),
    Missing,
    /// Something else is stored under the key.
    TypeMismatch,
}

/// The set of channel handles sharing one group and one key.
pub struct ChannelRegistry<D> {
    members: RefCell<BTreeMap<HandleId, Weak<dyn ChannelMember<D>>>>,
    joins: Cell<u64>,
}

impl<D: 'static> ChannelRegistry<D> {
    pub(crate) fn with_member(id: HandleId, member: Weak<dyn ChannelMember<D>>) -> Self {
        let registry = ChannelRegistry {
            members: RefCell::new(BTreeMap::new()),
            joins: Cell::new(0),
        };
        registry.insert(id, member);
        registry
    }

    pub(crate) fn lookup(group: &GridGroup, key: ChannelKey) -> Lookup<D> {
        match group.try_get_variable::<ChannelRegistry<D>>(key.as_uuid()) {
            Some(registry) => Lookup::Found(registry),
            None if group.has_variable(key.as_uuid()) => Lookup::TypeMismatch,
            None => Lookup::Missing,
        }
    }

    /// Ids of the live members of `group`'s entry for `key`, in id order.
    /// Empty when there is no entry or it holds another payload type.
    pub fn member_ids(group: &GridGroup, key: ChannelKey) -> Vec<HandleId> {
        match Self::lookup(group, key) {
            Lookup::Found(registry) => registry.live_ids(),
            Lookup::Missing | Lookup::TypeMismatch => Vec::new(),
        }
    }

    /// Adds `member`. Returns `false` if it was already present.
    pub(crate) fn insert(&self, id: HandleId, member: Weak<dyn ChannelMember<D>>) -> bool {
        let mut members = self.members.borrow_mut();
        if members.contains_key(&id) {
            return false;
        }
        members.insert(id, member);
        self.joins.set(self.joins.get().saturating_add(1));
        true
    }

    pub(crate) fn remove(&self, id: HandleId) -> bool {
        self.members.borrow_mut().remove(&id).is_some()
    }

    pub fn contains(&self, id: HandleId) -> bool {
        self.members.borrow().contains_key(&id)
    }

    /// Number of live members.
    pub fn len(&self) -> usize {
        self.prune();
        self.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total successful joins over the entry's lifetime.
    pub fn join_count(&self) -> u64 {
        self.joins.get()
    }

    pub fn live_ids(&self) -> Vec<HandleId> {
        self.prune();
        self.members.borrow().keys().copied().collect()
    }

    /// Snapshot of the live members. Taken before any callback runs, so
    /// callers may mutate the registry while iterating the result.
    pub(crate) fn members(&self) -> Vec<Rc<dyn ChannelMember<D>>> {
        self.prune();
        self.members.borrow().values().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn members_except(&self, id: HandleId) -> Vec<Rc<dyn ChannelMember<D>>> {
        self.members()
            .into_iter()
            .filter(|member| member.member_id() != id)
            .collect()
    }

    fn prune(&self) {
        let mut members = self.members.borrow_mut();
        let before = members.len();
        members.retain(|_, member| member.strong_count() > 0);
        let dropped = before - members.len();
        if dropped > 0 {
            tracing::trace!(dropped, "pruned dropped channel members");
        }
    }
}

impl<D> fmt::Debug for ChannelRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("members", &self.members.borrow().keys().collect::<Vec<_>>())
            .field("joins", &self.joins.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GroupId, LinkType};

    struct Stub {
        id: HandleId,
        data: RefCell<u32>,
    }

    impl ChannelMember<u32> for Stub {
        fn member_id(&self) -> HandleId {
            self.id
        }
        fn block(&self) -> Option<Block> {
            None
        }
        fn generation(&self) -> u64 {
            0
        }
        fn data_cell(&self) -> &RefCell<u32> {
            &self.data
        }
        fn is_active(&self) -> bool {
            true
        }
        fn peer_entered(self: Rc<Self>, _peer: &Block) {}
        fn peer_left(self: Rc<Self>, _peer: &Block) {}
        fn peer_data_changed(self: Rc<Self>, _peer: &Block) {}
    }

    fn stub(id: u64) -> Rc<Stub> {
        Rc::new(Stub {
            id: HandleId(id),
            data: RefCell::new(0),
        })
    }

    fn weak(member: &Rc<Stub>) -> Weak<dyn ChannelMember<u32>> {
        let weak: Weak<Stub> = Rc::downgrade(member);
        weak
    }

    #[test]
    fn insert_is_idempotent() {
        let a = stub(1);
        let registry = ChannelRegistry::with_member(HandleId(1), weak(&a));
        assert!(!registry.insert(HandleId(1), weak(&a)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.join_count(), 1);
    }

    #[test]
    fn dropped_members_are_pruned_on_read() {
        let a = stub(1);
        let b = stub(2);
        let registry = ChannelRegistry::with_member(HandleId(1), weak(&a));
        registry.insert(HandleId(2), weak(&b));
        drop(b);

        assert_eq!(registry.live_ids(), vec![HandleId(1)]);
        assert!(!registry.contains(HandleId(2)));
        assert_eq!(registry.members_except(HandleId(1)).len(), 0);
    }

    #[test]
    fn lookup_distinguishes_missing_and_mismatched_entries() {
        let group = GridGroup::new(GroupId(9), LinkType::Logical);
        let key = ChannelKey::from_u128(5);
        assert!(matches!(ChannelRegistry::<u32>::lookup(&group, key), Lookup::Missing));

        group.set_variable(key.as_uuid(), Rc::new(String::from("not a registry")));
        assert!(matches!(ChannelRegistry::<u32>::lookup(&group, key), Lookup::TypeMismatch));
        assert!(ChannelRegistry::<u32>::member_ids(&group, key).is_empty());

        let a = stub(3);
        group.set_variable(key.as_uuid(), Rc::new(ChannelRegistry::with_member(HandleId(3), weak(&a))));
        assert_eq!(ChannelRegistry::<u32>::member_ids(&group, key), vec![HandleId(3)]);
        assert!(matches!(ChannelRegistry::<String>::lookup(&group, key), Lookup::TypeMismatch));
    }
}
