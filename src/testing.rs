//! Recording hooks for tests.
//!
//! [`RecordingHooks`] implements both [`GroupHooks`] and [`ChannelHooks`] and
//! appends one [`HookEvent`] per callback to a shared [`HookLog`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::binder::{Binder, GroupHooks};
use crate::channel::{Channel, ChannelHooks};
use crate::topology::{Block, Grid, GridGroup};
use crate::types::{BlockId, GridId, GroupId};

/// One recorded callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    PeerEntered(BlockId),
    PeerLeft(BlockId),
    PeerDataChanged(BlockId),
    ResetData,
    GroupChanged { old: Option<GroupId> },
    GridAdded(GridId),
    GridRemoved(GridId),
    GroupReleased(GroupId),
    Closing,
}

/// Shared, clonable list of recorded callbacks.
#[derive(Debug, Clone, Default)]
pub struct HookLog(Rc<RefCell<Vec<HookEvent>>>);

impl HookLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: HookEvent) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<HookEvent> {
        self.0.borrow().clone()
    }

    /// Returns everything recorded so far and clears the log.
    pub fn take(&self) -> Vec<HookEvent> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn count(&self, event: &HookEvent) -> usize {
        self.0.borrow().iter().filter(|e| *e == event).count()
    }

    pub fn count_matching(&self, pred: impl Fn(&HookEvent) -> bool) -> usize {
        self.0.borrow().iter().filter(|e| pred(e)).count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingHooks {
    pub log: HookLog,
}

impl RecordingHooks {
    pub fn new(log: &HookLog) -> Self {
        RecordingHooks { log: log.clone() }
    }
}

fn group_id(group: Option<&GridGroup>) -> Option<GroupId> {
    group.map(GridGroup::id)
}

impl GroupHooks for RecordingHooks {
    fn on_grid_added_to_group(&self, _binder: &Binder<Self>, grid: &Grid, _old_group: Option<&GridGroup>) {
        self.log.push(HookEvent::GridAdded(grid.id()));
    }

    fn on_grid_removed_from_group(&self, _binder: &Binder<Self>, grid: &Grid, _new_group: Option<&GridGroup>) {
        self.log.push(HookEvent::GridRemoved(grid.id()));
    }

    fn on_group_changed(&self, _binder: &Binder<Self>, old_group: Option<&GridGroup>) {
        self.log.push(HookEvent::GroupChanged { old: group_id(old_group) });
    }

    fn on_group_released(&self, _binder: &Binder<Self>, group: &GridGroup) {
        self.log.push(HookEvent::GroupReleased(group.id()));
    }

    fn on_closing(&self, _binder: &Binder<Self>) {
        self.log.push(HookEvent::Closing);
    }
}

impl<D: Clone + 'static> ChannelHooks<D> for RecordingHooks {
    fn on_peer_entered(&self, _channel: &Channel<D, Self>, peer: &Block) {
        self.log.push(HookEvent::PeerEntered(peer.id()));
    }

    fn on_peer_left(&self, _channel: &Channel<D, Self>, peer: &Block) {
        self.log.push(HookEvent::PeerLeft(peer.id()));
    }

    fn on_peer_data_changed(&self, _channel: &Channel<D, Self>, peer: &Block) {
        self.log.push(HookEvent::PeerDataChanged(peer.id()));
    }

    fn on_reset_data(&self, _data: &mut D) {
        self.log.push(HookEvent::ResetData);
    }

    fn on_group_changed(&self, _channel: &Channel<D, Self>, old_group: Option<&GridGroup>) {
        self.log.push(HookEvent::GroupChanged { old: group_id(old_group) });
    }

    fn on_grid_added_to_group(&self, _channel: &Channel<D, Self>, grid: &Grid, _old_group: Option<&GridGroup>) {
        self.log.push(HookEvent::GridAdded(grid.id()));
    }

    fn on_grid_removed_from_group(&self, _channel: &Channel<D, Self>, grid: &Grid, _new_group: Option<&GridGroup>) {
        self.log.push(HookEvent::GridRemoved(grid.id()));
    }
}
