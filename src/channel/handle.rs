//!
//! Notifying handle: a binder that also takes part in a per-group channel.
//!
//! # Membership
//!
//! A channel is a member of at most one registry entry at a time and
//! remembers which group that entry lives in. The binder may record a new
//! group before the group reports the grid as added, so leaving, peer reads
//! and broadcasts go through the joined group rather than the binder's.
//! Whenever the binder reports a group change the channel leaves the joined
//! entry, resets its payload and joins the new one, in that order. Closing
//! leaves the entry before the grid and group listeners come off.
//!
//! # Notifications
//!
//! Joining tells every other member "entered", leaving tells the remaining
//! members "left" (only while the leaving block is still alive), and payload
//! writes tell them "data changed". Each broadcast walks a snapshot of the
//! members taken before the first callback, and members closed in the
//! meantime are skipped.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::binder::{Binder, BinderInner, GroupHooks, Lifecycle};
use crate::channel::options::ChannelOptions;
use crate::channel::registry::{ChannelMember, ChannelRegistry, Lookup};
use crate::topology::{Block, Grid, GridGroup};
use crate::types::{ChannelKey, HandleId, LinkType};

/// Callbacks a channel raises. All default to no-ops.
///
/// Peer callbacks name the peer's block. The channel passed in is the one
/// receiving the callback; it holds no internal borrow while a hook runs, so
/// hooks may read peers, write data or close the channel.
pub trait ChannelHooks<D: Clone + 'static>: Sized + 'static {
    fn on_peer_entered(&self, _channel: &Channel<D, Self>, _peer: &Block) {}

    fn on_peer_left(&self, _channel: &Channel<D, Self>, _peer: &Block) {}

    fn on_peer_data_changed(&self, _channel: &Channel<D, Self>, _peer: &Block) {}

    /// Puts the payload back into its "fresh group" state. Runs on every
    /// group change, between leaving the old entry and joining the new one.
    fn on_reset_data(&self, _data: &mut D) {}

    /// Runs after the channel has moved to its new entry.
    fn on_group_changed(&self, _channel: &Channel<D, Self>, _old_group: Option<&GridGroup>) {}

    fn on_grid_added_to_group(&self, _channel: &Channel<D, Self>, _grid: &Grid, _old_group: Option<&GridGroup>) {}

    fn on_grid_removed_from_group(&self, _channel: &Channel<D, Self>, _grid: &Grid, _new_group: Option<&GridGroup>) {}
}

impl<D: Clone + 'static> ChannelHooks<D> for () {}

/// Channel-side state carried by the binder as its hooks.
pub struct ChannelState<D: Clone + 'static, H: ChannelHooks<D>> {
    key: ChannelKey,
    options: ChannelOptions,
    data: RefCell<D>,
    generation: Cell<u64>,
    joined: RefCell<Option<GridGroup>>,
    hooks: H,
}

type ChannelBinder<D, H> = Binder<ChannelState<D, H>>;

impl<D: Clone + 'static, H: ChannelHooks<D>> ChannelState<D, H> {
    fn new(key: ChannelKey, options: ChannelOptions, data: D, hooks: H) -> Self {
        ChannelState {
            key,
            options,
            data: RefCell::new(data),
            generation: Cell::new(0),
            joined: RefCell::new(None),
            hooks,
        }
    }

    fn bump(&self) {
        self.generation.set(self.generation.get().saturating_add(1));
    }

    fn reset_data(&self) {
        self.hooks.on_reset_data(&mut *self.data.borrow_mut());
        self.bump();
    }

    fn join(&self, binder: &ChannelBinder<D, H>, group: &GridGroup) {
        let me: Weak<dyn ChannelMember<D>> = {
            let weak: Weak<BinderInner<ChannelState<D, H>>> = Rc::downgrade(binder.inner());
            weak
        };
        match ChannelRegistry::<D>::lookup(group, self.key) {
            Lookup::Found(registry) => {
                let inserted = registry.insert(binder.id(), me);
                *self.joined.borrow_mut() = Some(group.clone());
                if !inserted {
                    return;
                }
                self.bump();
                tracing::trace!(handle = %binder.id(), group = %group.id(), key = %self.key, "joined channel");
                if let Some(block) = binder.block() {
                    for peer in registry.members_except(binder.id()) {
                        peer.peer_entered(&block);
                    }
                }
            }
            Lookup::Missing => {
                let registry = ChannelRegistry::with_member(binder.id(), me);
                group.set_variable(self.key.as_uuid(), Rc::new(registry));
                *self.joined.borrow_mut() = Some(group.clone());
                self.bump();
                tracing::trace!(handle = %binder.id(), group = %group.id(), key = %self.key, "opened channel entry");
            }
            Lookup::TypeMismatch => {
                tracing::warn!(
                    handle = %binder.id(),
                    group = %group.id(),
                    key = %self.key,
                    expected = std::any::type_name::<D>(),
                    "group variable under channel key has another payload type; not joining"
                );
            }
        }
    }

    fn joined(&self) -> Option<GridGroup> {
        self.joined.borrow().clone()
    }

    /// Leaves the joined entry, if any.
    fn leave(&self, binder: &ChannelBinder<D, H>) {
        let joined = self.joined.borrow_mut().take();
        let Some(group) = joined.as_ref() else {
            return;
        };
        let registry = match ChannelRegistry::<D>::lookup(group, self.key) {
            Lookup::Found(registry) => registry,
            Lookup::Missing | Lookup::TypeMismatch => return,
        };
        if !registry.remove(binder.id()) {
            return;
        }
        self.bump();
        tracing::trace!(handle = %binder.id(), group = %group.id(), key = %self.key, "left channel");

        if let Some(block) = binder.block() {
            for peer in registry.members() {
                peer.peer_left(&block);
            }
        }

        if self.options.prune_empty_entries && registry.is_empty() {
            // Only drop the entry we just left, not one created since.
            if let Lookup::Found(current) = ChannelRegistry::<D>::lookup(group, self.key) {
                if Rc::ptr_eq(&current, &registry) {
                    group.remove_variable(self.key.as_uuid());
                    tracing::trace!(group = %group.id(), key = %self.key, "pruned empty channel entry");
                }
            }
        }
    }

    fn broadcast_changed(&self, binder: &ChannelBinder<D, H>, group: &GridGroup) {
        let Some(block) = binder.block() else {
            return;
        };
        if let Lookup::Found(registry) = ChannelRegistry::<D>::lookup(group, self.key) {
            let peers = registry.members_except(binder.id());
            tracing::trace!(handle = %binder.id(), group = %group.id(), peers = peers.len(), "broadcasting data change");
            for peer in peers {
                peer.peer_data_changed(&block);
            }
        }
    }
}

impl<D: Clone + 'static, H: ChannelHooks<D>> GroupHooks for ChannelState<D, H> {
    fn on_grid_added_to_group(&self, binder: &Binder<Self>, grid: &Grid, old_group: Option<&GridGroup>) {
        let channel = Channel::from_binder(binder.clone());
        self.hooks.on_grid_added_to_group(&channel, grid, old_group);
    }

    fn on_grid_removed_from_group(&self, binder: &Binder<Self>, grid: &Grid, new_group: Option<&GridGroup>) {
        let channel = Channel::from_binder(binder.clone());
        self.hooks.on_grid_removed_from_group(&channel, grid, new_group);
    }

    fn on_group_changed(&self, binder: &Binder<Self>, old_group: Option<&GridGroup>) {
        self.leave(binder);
        self.reset_data();
        if let Some(group) = binder.group() {
            self.join(binder, &group);
        }
        let channel = Channel::from_binder(binder.clone());
        self.hooks.on_group_changed(&channel, old_group);
    }

    fn on_group_released(&self, binder: &Binder<Self>, group: &GridGroup) {
        if self.joined().as_ref() == Some(group) {
            self.leave(binder);
        }
    }

    fn on_closing(&self, binder: &Binder<Self>) {
        self.leave(binder);
    }
}

impl<D: Clone + 'static, H: ChannelHooks<D>> ChannelMember<D> for BinderInner<ChannelState<D, H>> {
    fn member_id(&self) -> HandleId {
        self.id()
    }

    fn block(&self) -> Option<Block> {
        BinderInner::block(self)
    }

    fn generation(&self) -> u64 {
        self.hooks().generation.get()
    }

    fn data_cell(&self) -> &RefCell<D> {
        &self.hooks().data
    }

    fn is_active(&self) -> bool {
        self.lifecycle() == Lifecycle::Active
    }

    fn peer_entered(self: Rc<Self>, peer: &Block) {
        if ChannelMember::is_active(&*self) {
            let channel = Channel::from_binder(Binder::from_inner(self));
            channel.hooks().on_peer_entered(&channel, peer);
        }
    }

    fn peer_left(self: Rc<Self>, peer: &Block) {
        if ChannelMember::is_active(&*self) {
            let channel = Channel::from_binder(Binder::from_inner(self));
            channel.hooks().on_peer_left(&channel, peer);
        }
    }

    fn peer_data_changed(self: Rc<Self>, peer: &Block) {
        if ChannelMember::is_active(&*self) {
            let channel = Channel::from_binder(Binder::from_inner(self));
            channel.hooks().on_peer_data_changed(&channel, peer);
        }
    }
}

/// A binder that shares a payload of type `D` with every other channel on
/// the same group under the same key.
///
/// Cloning yields another handle to the same channel.
pub struct Channel<D: Clone + 'static, H: ChannelHooks<D> = ()> {
    binder: ChannelBinder<D, H>,
}

impl<D: Clone + 'static, H: ChannelHooks<D>> Clone for Channel<D, H> {
    fn clone(&self) -> Self {
        Channel {
            binder: self.binder.clone(),
        }
    }
}

impl<D: Clone + 'static, H: ChannelHooks<D>> Channel<D, H> {
    /// Binds to `block` and joins the `key` entry of its current group.
    pub fn new(block: &Block, link_type: LinkType, key: ChannelKey, data: D, hooks: H) -> Self {
        Self::with_options(block, link_type, key, data, hooks, ChannelOptions::default())
    }

    pub fn with_options(
        block: &Block,
        link_type: LinkType,
        key: ChannelKey,
        data: D,
        hooks: H,
        options: ChannelOptions,
    ) -> Self {
        let binder = Binder::new(block, link_type, ChannelState::new(key, options, data, hooks));
        if binder.is_active() {
            if let Some(group) = binder.group() {
                binder.hooks().join(&binder, &group);
            }
        }
        Channel { binder }
    }

    /// Like [`Channel::new`], but refuses ghost blocks.
    pub fn attach(block: &Block, link_type: LinkType, key: ChannelKey, data: D, hooks: H) -> Option<Self> {
        if block.is_ghost() {
            tracing::trace!(block = %block.id(), key = %key, "not attaching channel to ghost block");
            return None;
        }
        Some(Self::new(block, link_type, key, data, hooks))
    }

    fn from_binder(binder: ChannelBinder<D, H>) -> Self {
        Channel { binder }
    }

    // --- Binder passthrough ---------------------------------------------------

    pub fn close(&self) {
        self.binder.close();
    }

    pub fn is_active(&self) -> bool {
        self.binder.is_active()
    }

    pub fn id(&self) -> HandleId {
        self.binder.id()
    }

    pub fn block(&self) -> Option<Block> {
        self.binder.block()
    }

    pub fn grid(&self) -> Option<Grid> {
        self.binder.grid()
    }

    pub fn group(&self) -> Option<GridGroup> {
        self.binder.group()
    }

    pub fn link_type(&self) -> LinkType {
        self.binder.link_type()
    }

    pub fn key(&self) -> ChannelKey {
        self.state().key
    }

    pub fn options(&self) -> ChannelOptions {
        self.state().options
    }

    /// The consumer hooks this channel was created with.
    pub fn hooks(&self) -> &H {
        &self.state().hooks
    }

    pub fn binder(&self) -> &Binder<ChannelState<D, H>> {
        &self.binder
    }

    fn state(&self) -> &ChannelState<D, H> {
        self.binder.hooks()
    }

    // --- Payload --------------------------------------------------------------

    pub fn data(&self) -> D {
        self.state().data.borrow().clone()
    }

    /// Runs `f` against the payload without cloning it. Writing the payload
    /// from inside `f` panics.
    pub fn with_data<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        f(&*self.state().data.borrow())
    }

    /// Replaces the payload.
    pub fn set_data(&self, data: D) {
        *self.state().data.borrow_mut() = data;
        self.after_write();
    }

    /// Edits the payload in place.
    pub fn update_data(&self, f: impl FnOnce(&mut D)) {
        f(&mut *self.state().data.borrow_mut());
        self.after_write();
    }

    /// Runs the `on_reset_data` hook and bumps the generation. No broadcast.
    pub fn reset_data(&self) {
        self.state().reset_data();
    }

    /// Bumped on every payload write, reset and real membership change.
    pub fn generation(&self) -> u64 {
        self.state().generation.get()
    }

    fn after_write(&self) {
        self.state().bump();
        if self.state().options.broadcast_on_set {
            self.notify_data_changed();
        }
    }

    // --- Peers ----------------------------------------------------------------

    /// The other members of the joined entry. Empty when closed or not
    /// joined.
    pub fn peers(&self) -> Vec<Peer<D>> {
        if !self.is_active() {
            return Vec::new();
        }
        let Some(group) = self.state().joined() else {
            return Vec::new();
        };
        match ChannelRegistry::<D>::lookup(&group, self.key()) {
            Lookup::Found(registry) => registry
                .members_except(self.id())
                .into_iter()
                .map(|member| Peer { member })
                .collect(),
            Lookup::Missing | Lookup::TypeMismatch => Vec::new(),
        }
    }

    pub fn peer_count(&self) -> usize {
        self.peers().len()
    }

    /// Tells every peer in the joined entry that this channel's data
    /// changed. Does not touch the generation.
    pub fn notify_data_changed(&self) {
        if let Some(group) = self.state().joined() {
            self.notify_data_changed_in(&group);
        }
    }

    /// Like [`Channel::notify_data_changed`], for an explicit group.
    pub fn notify_data_changed_in(&self, group: &GridGroup) {
        if self.is_active() {
            self.state().broadcast_changed(&self.binder, group);
        }
    }
}

impl<D: Clone + 'static, H: ChannelHooks<D>> PartialEq for Channel<D, H> {
    fn eq(&self, other: &Self) -> bool {
        self.binder == other.binder
    }
}

impl<D: Clone + 'static, H: ChannelHooks<D>> fmt::Debug for Channel<D, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("binder", &self.binder)
            .field("key", &self.state().key)
            .field("generation", &self.generation())
            .finish()
    }
}

/// Read-only view of another member of the same entry.
pub struct Peer<D> {
    member: Rc<dyn ChannelMember<D>>,
}

impl<D: Clone + 'static> Peer<D> {
    pub fn id(&self) -> HandleId {
        self.member.member_id()
    }

    pub fn block(&self) -> Option<Block> {
        self.member.block()
    }

    pub fn generation(&self) -> u64 {
        self.member.generation()
    }

    pub fn data(&self) -> D {
        self.member.data_cell().borrow().clone()
    }

    pub fn with_data<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        f(&*self.member.data_cell().borrow())
    }
}

impl<D> fmt::Debug for Peer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.member.member_id())
            .field("generation", &self.member.generation())
            .finish()
    }
}
