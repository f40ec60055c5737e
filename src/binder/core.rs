//!
//! Group-rebinding state machine.
//!
//! A binder is subscribed to exactly three sources at any time: its block
//! (mark-for-close), its recorded grid (split, merge) and its recorded group
//! (grid added, grid removed, released). Every transition detaches the old
//! listeners before attaching new ones, so no event is ever delivered twice.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::binder::hooks::{GroupHooks, Lifecycle};
use crate::events::{GridAddedToGroup, GridMerge, GridRemovedFromGroup, GridSplit, ListenerId};
use crate::topology::{Block, Grid, GridGroup, WeakBlock};
use crate::types::{HandleId, LinkType};

#[derive(Default)]
struct BindState {
    lifecycle: Lifecycle,
    grid: Option<Grid>,
    group: Option<GridGroup>,
    block_listener: Option<ListenerId>,
    grid_listeners: Option<(Grid, ListenerId, ListenerId)>,
    group_listeners: Option<(GridGroup, [ListenerId; 3])>,
}

pub(crate) struct BinderInner<H: GroupHooks> {
    id: HandleId,
    block: WeakBlock,
    link_type: LinkType,
    state: RefCell<BindState>,
    hooks: H,
}

/// Keeps one block subscribed to the group its grid currently belongs to.
///
/// Cloning a `Binder` yields another handle to the same binder. The binder
/// stays subscribed until it is closed, either explicitly or because its block
/// was marked for close. If every handle is dropped while still active, the
/// topology listeners are detached silently.
pub struct Binder<H: GroupHooks> {
    inner: Rc<BinderInner<H>>,
}

impl<H: GroupHooks> Clone for Binder<H> {
    fn clone(&self) -> Self {
        Binder {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H: GroupHooks> Binder<H> {
    /// Binds to `block`'s current grid and that grid's group for `link_type`.
    ///
    /// A block that is already closed yields a closed binder with no
    /// subscriptions.
    pub fn new(block: &Block, link_type: LinkType, hooks: H) -> Self {
        let grid = block.grid();
        let group = grid.as_ref().and_then(|g| g.group(link_type));
        let binder = Binder {
            inner: Rc::new(BinderInner {
                id: HandleId::next(),
                block: block.downgrade(),
                link_type,
                state: RefCell::new(BindState {
                    grid: grid.clone(),
                    group: group.clone(),
                    ..BindState::default()
                }),
                hooks,
            }),
        };

        if block.is_closed() {
            binder.inner.state.borrow_mut().lifecycle = Lifecycle::Closed;
            return binder;
        }

        binder.subscribe_block(block);
        if let Some(grid) = &grid {
            binder.subscribe_grid(grid);
        }
        if let Some(group) = &group {
            binder.subscribe_group(group);
        }
        tracing::debug!(
            handle = %binder.id(),
            block = %block.id(),
            grid = ?grid.as_ref().map(Grid::id),
            group = ?group.as_ref().map(GridGroup::id),
            ?link_type,
            "binder attached"
        );
        binder
    }

    /// Like [`Binder::new`], but refuses ghost blocks (no grid, or a grid
    /// without physics).
    pub fn attach(block: &Block, link_type: LinkType, hooks: H) -> Option<Self> {
        if block.is_ghost() {
            tracing::trace!(block = %block.id(), "not binding ghost block");
            return None;
        }
        Some(Self::new(block, link_type, hooks))
    }

    pub(crate) fn from_inner(inner: Rc<BinderInner<H>>) -> Self {
        Binder { inner }
    }

    pub(crate) fn inner(&self) -> &Rc<BinderInner<H>> {
        &self.inner
    }

    // --- Accessors ------------------------------------------------------------

    pub fn id(&self) -> HandleId {
        self.inner.id
    }

    /// The owning block, or `None` once nothing else keeps it alive.
    pub fn block(&self) -> Option<Block> {
        self.inner.block.upgrade()
    }

    /// The recorded grid.
    pub fn grid(&self) -> Option<Grid> {
        self.inner.state.borrow().grid.clone()
    }

    /// The recorded group.
    pub fn group(&self) -> Option<GridGroup> {
        self.inner.state.borrow().group.clone()
    }

    pub fn link_type(&self) -> LinkType {
        self.inner.link_type
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle()
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle() == Lifecycle::Active
    }

    pub fn hooks(&self) -> &H {
        &self.inner.hooks
    }

    /// Closes the binder. Idempotent.
    ///
    /// Listeners come off in the order block, grid, group; `on_closing` runs
    /// between the first and the second.
    pub fn close(&self) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.lifecycle == Lifecycle::Closed {
                return;
            }
            state.lifecycle = Lifecycle::Closed;
        }
        tracing::debug!(handle = %self.id(), block = %self.inner.block.id(), "binder closing");

        self.inner.detach_block();
        self.inner.hooks.on_closing(self);
        self.inner.detach_grid();
        self.inner.detach_group();
    }

    // --- Subscriptions --------------------------------------------------------

    fn subscribe_block(&self, block: &Block) {
        self.inner.detach_block();
        let id = block
            .on_mark_for_close()
            .subscribe(self.forward(Self::handle_mark_for_close));
        self.inner.state.borrow_mut().block_listener = Some(id);
    }

    fn subscribe_grid(&self, grid: &Grid) {
        self.inner.detach_grid();
        let split = grid.on_split().subscribe(self.forward(Self::handle_split));
        let merge = grid.on_merge().subscribe(self.forward(Self::handle_merge));
        self.inner.state.borrow_mut().grid_listeners = Some((grid.clone(), split, merge));
    }

    fn subscribe_group(&self, group: &GridGroup) {
        self.inner.detach_group();
        let ids = [
            group.on_grid_added().subscribe(self.forward(Self::handle_grid_added)),
            group.on_grid_removed().subscribe(self.forward(Self::handle_grid_removed)),
            group.on_released().subscribe(self.forward(Self::handle_released)),
        ];
        self.inner.state.borrow_mut().group_listeners = Some((group.clone(), ids));
    }

    /// Wraps `handler` into a listener that holds the binder weakly.
    fn forward<A: 'static>(&self, handler: fn(&Self, &A)) -> impl Fn(&A) + 'static {
        let weak: Weak<BinderInner<H>> = Rc::downgrade(&self.inner);
        move |event: &A| {
            if let Some(inner) = weak.upgrade() {
                handler(&Binder { inner }, event);
            }
        }
    }

    // --- Handlers -------------------------------------------------------------

    fn handle_mark_for_close(&self, closing: &Block) {
        if self.inner.block.id() == closing.id() {
            self.close();
        }
    }

    fn handle_merge(&self, event: &GridMerge) {
        if !self.is_active() {
            return;
        }
        let Some(block) = self.block() else {
            return;
        };
        let current = block.grid();
        if current == self.grid() || current.as_ref() == Some(&event.lost) {
            return;
        }
        self.rebind_grid(event.kept.clone());
    }

    fn handle_split(&self, event: &GridSplit) {
        if !self.is_active() {
            return;
        }
        let Some(block) = self.block() else {
            return;
        };
        let current = block.grid();
        if current == self.grid() {
            return;
        }
        self.rebind_grid(event.new_grid.clone());
    }

    fn handle_grid_added(&self, event: &GridAddedToGroup) {
        if !self.is_active() {
            return;
        }
        if self.grid().as_ref() != Some(&event.grid) {
            self.inner
                .hooks
                .on_grid_added_to_group(self, &event.grid, event.old_group.as_ref());
            return;
        }

        if self.group().as_ref() != Some(&event.new_group) {
            self.set_group(Some(event.new_group.clone()));
        }
        tracing::debug!(
            handle = %self.id(),
            group = %event.new_group.id(),
            old_group = ?event.old_group.as_ref().map(GridGroup::id),
            "own grid joined group"
        );
        self.inner.hooks.on_group_changed(self, event.old_group.as_ref());
    }

    fn handle_grid_removed(&self, event: &GridRemovedFromGroup) {
        if !self.is_active() {
            return;
        }
        if self.grid().as_ref() != Some(&event.grid) {
            self.inner
                .hooks
                .on_grid_removed_from_group(self, &event.grid, event.new_group.as_ref());
            return;
        }
        self.set_group(event.new_group.clone());
    }

    fn handle_released(&self, group: &GridGroup) {
        if !self.is_active() || self.group().as_ref() != Some(group) {
            return;
        }
        self.inner.detach_group();
        self.inner.state.borrow_mut().group = None;
        tracing::debug!(handle = %self.id(), group = %group.id(), "group released under binder");
        self.inner.hooks.on_group_released(self, group);
    }

    // --- Transitions ----------------------------------------------------------

    /// Records `group` and moves the group listeners onto it.
    fn set_group(&self, group: Option<GridGroup>) {
        self.inner.detach_group();
        self.inner.state.borrow_mut().group = group.clone();
        if let Some(group) = &group {
            self.subscribe_group(group);
        }
    }

    /// Moves the binder onto `grid` and that grid's group, then reports the
    /// change. Runs even when the group stays the same.
    fn rebind_grid(&self, grid: Grid) {
        self.inner.detach_grid();
        self.inner.detach_group();

        let group = grid.group(self.inner.link_type);
        let old_group = {
            let mut state = self.inner.state.borrow_mut();
            state.grid = Some(grid.clone());
            std::mem::replace(&mut state.group, group.clone())
        };

        self.subscribe_grid(&grid);
        if let Some(group) = &group {
            self.subscribe_group(group);
        }
        tracing::debug!(
            handle = %self.id(),
            grid = %grid.id(),
            group = ?group.as_ref().map(GridGroup::id),
            old_group = ?old_group.as_ref().map(GridGroup::id),
            "binder rebound"
        );
        self.inner.hooks.on_group_changed(self, old_group.as_ref());
    }
}

impl<H: GroupHooks> PartialEq for Binder<H> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<H: GroupHooks> Eq for Binder<H> {}

impl<H: GroupHooks> fmt::Debug for Binder<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Binder")
            .field("id", &self.inner.id)
            .field("block", &self.inner.block.id())
            .field("link_type", &self.inner.link_type)
            .field("lifecycle", &state.lifecycle)
            .field("grid", &state.grid.as_ref().map(Grid::id))
            .field("group", &state.group.as_ref().map(GridGroup::id))
            .finish()
    }
}

impl<H: GroupHooks> BinderInner<H> {
    pub(crate) fn id(&self) -> HandleId {
        self.id
    }

    pub(crate) fn block(&self) -> Option<Block> {
        self.block.upgrade()
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        self.state.borrow().lifecycle
    }

    pub(crate) fn hooks(&self) -> &H {
        &self.hooks
    }

    fn detach_block(&self) {
        let listener = self.state.borrow_mut().block_listener.take();
        if let (Some(id), Some(block)) = (listener, self.block.upgrade()) {
            block.on_mark_for_close().unsubscribe(id);
        }
    }

    fn detach_grid(&self) {
        let listeners = self.state.borrow_mut().grid_listeners.take();
        if let Some((grid, split, merge)) = listeners {
            grid.on_split().unsubscribe(split);
            grid.on_merge().unsubscribe(merge);
        }
    }

    fn detach_group(&self) {
        let listeners = self.state.borrow_mut().group_listeners.take();
        if let Some((group, [added, removed, released])) = listeners {
            group.on_grid_added().unsubscribe(added);
            group.on_grid_removed().unsubscribe(removed);
            group.on_released().unsubscribe(released);
        }
    }
}

impl<H: GroupHooks> Drop for BinderInner<H> {
    fn drop(&mut self) {
        if self.state.get_mut().lifecycle == Lifecycle::Active {
            tracing::trace!(handle = %self.id, "binder dropped while active");
            self.detach_block();
            self.detach_grid();
            self.detach_group();
        }
    }
}
