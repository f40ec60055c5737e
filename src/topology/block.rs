//! Blocks: the entities that own handles.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::events::EventSlot;
use crate::topology::Grid;
use crate::types::BlockId;

pub(crate) struct BlockInner {
    id: BlockId,
    name: String,
    grid: RefCell<Option<Grid>>,
    closed: Cell<bool>,
    on_mark_for_close: EventSlot<Block>,
}

/// Shared handle to a block. Clones refer to the same block; equality is
/// identity.
#[derive(Clone)]
pub struct Block {
    inner: Rc<BlockInner>,
}

impl Block {
    pub(crate) fn new(id: BlockId, name: String) -> Self {
        Block {
            inner: Rc::new(BlockInner {
                id,
                name,
                grid: RefCell::new(None),
                closed: Cell::new(false),
                on_mark_for_close: EventSlot::new(),
            }),
        }
    }

    pub fn id(&self) -> BlockId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The grid the block currently sits on.
    pub fn grid(&self) -> Option<Grid> {
        self.inner.grid.borrow().clone()
    }

    /// `true` once the block has been marked for close.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// A ghost is a placeholder block (build projections, paste previews)
    /// whose grid has no physics. Handles should not be created for ghosts.
    pub fn is_ghost(&self) -> bool {
        self.grid().map_or(true, |grid| !grid.has_physics())
    }

    /// Raised once, with the closing block as payload, when the block is
    /// marked for close.
    pub fn on_mark_for_close(&self) -> &EventSlot<Block> {
        &self.inner.on_mark_for_close
    }

    pub fn downgrade(&self) -> WeakBlock {
        WeakBlock {
            id: self.inner.id,
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub(crate) fn set_grid(&self, grid: Option<Grid>) {
        *self.inner.grid.borrow_mut() = grid;
    }

    pub(crate) fn mark_closed(&self) {
        self.inner.closed.set(true);
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Block {}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("closed", &self.inner.closed.get())
            .finish()
    }
}

/// Non-owning reference to a block. Upgrading fails once the topology has
/// forgotten the block and no other strong handle remains.
#[derive(Clone)]
pub struct WeakBlock {
    id: BlockId,
    inner: Weak<BlockInner>,
}

impl WeakBlock {
    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Block> {
        self.inner.upgrade().map(|inner| Block { inner })
    }
}

impl fmt::Debug for WeakBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakBlock")
            .field("id", &self.id)
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}
