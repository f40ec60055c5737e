//! Grids: the containers blocks sit on.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::events::{EventSlot, GridMerge, GridSplit};
use crate::topology::GridGroup;
use crate::types::{BlockId, GridId, LinkType};

pub(crate) struct GridInner {
    id: GridId,
    name: String,
    physics: bool,
    closed: Cell<bool>,
    blocks: RefCell<Vec<BlockId>>,
    groups: RefCell<BTreeMap<LinkType, GridGroup>>,
    on_split: EventSlot<GridSplit>,
    on_merge: EventSlot<GridMerge>,
}

/// Shared handle to a grid. Clones refer to the same grid; equality is
/// identity.
#[derive(Clone)]
pub struct Grid {
    inner: Rc<GridInner>,
}

impl Grid {
    pub(crate) fn new(id: GridId, name: String, physics: bool) -> Self {
        Grid {
            inner: Rc::new(GridInner {
                id,
                name,
                physics,
                closed: Cell::new(false),
                blocks: RefCell::new(Vec::new()),
                groups: RefCell::new(BTreeMap::new()),
                on_split: EventSlot::new(),
                on_merge: EventSlot::new(),
            }),
        }
    }

    pub fn id(&self) -> GridId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The group this grid belongs to for `link_type`. `None` only for a
    /// grid retired by a merge.
    pub fn group(&self, link_type: LinkType) -> Option<GridGroup> {
        self.inner.groups.borrow().get(&link_type).cloned()
    }

    /// Ghost grids (projections, previews) have no physics.
    pub fn has_physics(&self) -> bool {
        self.inner.physics
    }

    /// `true` once the grid has been merged away.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    pub fn block_ids(&self) -> Vec<BlockId> {
        self.inner.blocks.borrow().clone()
    }

    pub fn block_count(&self) -> usize {
        self.inner.blocks.borrow().len()
    }

    pub fn on_split(&self) -> &EventSlot<GridSplit> {
        &self.inner.on_split
    }

    pub fn on_merge(&self) -> &EventSlot<GridMerge> {
        &self.inner.on_merge
    }

    pub(crate) fn set_group(&self, link_type: LinkType, group: Option<GridGroup>) {
        let mut groups = self.inner.groups.borrow_mut();
        match group {
            Some(group) => {
                groups.insert(link_type, group);
            }
            None => {
                groups.remove(&link_type);
            }
        }
    }

    pub(crate) fn push_block(&self, id: BlockId) {
        let mut blocks = self.inner.blocks.borrow_mut();
        if !blocks.contains(&id) {
            blocks.push(id);
        }
    }

    pub(crate) fn remove_block(&self, id: BlockId) -> bool {
        let mut blocks = self.inner.blocks.borrow_mut();
        let before = blocks.len();
        blocks.retain(|b| *b != id);
        blocks.len() != before
    }

    pub(crate) fn take_blocks(&self) -> Vec<BlockId> {
        std::mem::take(&mut *self.inner.blocks.borrow_mut())
    }

    pub(crate) fn mark_closed(&self) {
        self.inner.closed.set(true);
    }
}

impl PartialEq for Grid {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Grid {}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("blocks", &self.inner.blocks.borrow().len())
            .field("closed", &self.inner.closed.get())
            .finish()
    }
}
