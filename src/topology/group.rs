//! Grid groups and their keyed variable store.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use uuid::Uuid;

use crate::events::{EventSlot, GridAddedToGroup, GridRemovedFromGroup};
use crate::types::{GridId, GroupId, LinkType};

pub(crate) struct GroupInner {
    id: GroupId,
    link_type: LinkType,
    grids: RefCell<Vec<GridId>>,
    variables: RefCell<HashMap<Uuid, Rc<dyn Any>>>,
    released: Cell<bool>,
    on_grid_added: EventSlot<GridAddedToGroup>,
    on_grid_removed: EventSlot<GridRemovedFromGroup>,
    on_released: EventSlot<GridGroup>,
}

/// Shared handle to the set of grids connected under one link type.
///
/// Besides membership, a group carries a variable store that lets unrelated
/// features hang shared state off the group. Values live exactly as long as
/// the group does.
#[derive(Clone)]
pub struct GridGroup {
    inner: Rc<GroupInner>,
}

impl GridGroup {
    pub(crate) fn new(id: GroupId, link_type: LinkType) -> Self {
        GridGroup {
            inner: Rc::new(GroupInner {
                id,
                link_type,
                grids: RefCell::new(Vec::new()),
                variables: RefCell::new(HashMap::new()),
                released: Cell::new(false),
                on_grid_added: EventSlot::new(),
                on_grid_removed: EventSlot::new(),
                on_released: EventSlot::new(),
            }),
        }
    }

    pub fn id(&self) -> GroupId {
        self.inner.id
    }

    pub fn link_type(&self) -> LinkType {
        self.inner.link_type
    }

    pub fn grid_ids(&self) -> Vec<GridId> {
        self.inner.grids.borrow().clone()
    }

    pub fn contains_grid(&self, id: GridId) -> bool {
        self.inner.grids.borrow().contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.grids.borrow().is_empty()
    }

    /// `true` once the topology has dropped this group.
    pub fn is_released(&self) -> bool {
        self.inner.released.get()
    }

    // --- Variable store -----------------------------------------------------

    /// Returns the value stored under `key` if it exists and has type `T`.
    pub fn try_get_variable<T: Any>(&self, key: Uuid) -> Option<Rc<T>> {
        let value = self.inner.variables.borrow().get(&key).cloned()?;
        value.downcast::<T>().ok()
    }

    /// Stores `value` under `key`, replacing whatever was there.
    pub fn set_variable<T: Any>(&self, key: Uuid, value: Rc<T>) {
        self.inner.variables.borrow_mut().insert(key, value);
    }

    pub fn remove_variable(&self, key: Uuid) -> bool {
        self.inner.variables.borrow_mut().remove(&key).is_some()
    }

    /// `true` if anything (of any type) is stored under `key`.
    pub fn has_variable(&self, key: Uuid) -> bool {
        self.inner.variables.borrow().contains_key(&key)
    }

    pub fn variable_count(&self) -> usize {
        self.inner.variables.borrow().len()
    }

    // --- Events -------------------------------------------------------------

    pub fn on_grid_added(&self) -> &EventSlot<GridAddedToGroup> {
        &self.inner.on_grid_added
    }

    pub fn on_grid_removed(&self) -> &EventSlot<GridRemovedFromGroup> {
        &self.inner.on_grid_removed
    }

    /// Raised once when the group loses its last grid and is dropped by the
    /// topology.
    pub fn on_released(&self) -> &EventSlot<GridGroup> {
        &self.inner.on_released
    }

    pub(crate) fn attach_grid(&self, id: GridId) {
        let mut grids = self.inner.grids.borrow_mut();
        if !grids.contains(&id) {
            grids.push(id);
        }
    }

    pub(crate) fn detach_grid(&self, id: GridId) {
        self.inner.grids.borrow_mut().retain(|g| *g != id);
    }

    pub(crate) fn mark_released(&self) {
        self.inner.released.set(true);
    }
}

impl PartialEq for GridGroup {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for GridGroup {}

impl fmt::Debug for GridGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridGroup")
            .field("id", &self.inner.id)
            .field("link_type", &self.inner.link_type)
            .field("grids", &*self.inner.grids.borrow())
            .field("variables", &self.inner.variables.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_store_is_typed() {
        let group = GridGroup::new(GroupId(1), LinkType::Physical);
        let key = Uuid::from_u128(42);

        group.set_variable(key, Rc::new(17u32));
        assert_eq!(group.try_get_variable::<u32>(key).as_deref(), Some(&17));
        assert!(group.try_get_variable::<String>(key).is_none());
        assert!(group.has_variable(key));

        assert!(group.remove_variable(key));
        assert!(!group.remove_variable(key));
        assert_eq!(group.variable_count(), 0);
    }

    #[test]
    fn set_variable_replaces_previous_value() {
        let group = GridGroup::new(GroupId(1), LinkType::Logical);
        let key = Uuid::from_u128(7);
        group.set_variable(key, Rc::new(String::from("first")));
        group.set_variable(key, Rc::new(String::from("second")));
        assert_eq!(
            group.try_get_variable::<String>(key).as_deref().map(String::as_str),
            Some("second")
        );
        assert_eq!(group.variable_count(), 1);
    }
}
