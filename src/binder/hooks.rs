//! Extension points of a [`Binder`](crate::binder::Binder).

use serde::{Deserialize, Serialize};

use crate::binder::Binder;
use crate::topology::{Grid, GridGroup};

/// Lifecycle of a binder. There is no way back from `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Lifecycle {
    #[default]
    Active,
    Closed,
}

/// Callbacks a binder raises while it follows its block around.
///
/// All methods default to no-ops. Each receives the binder that raised it, so
/// implementations can read the current grid and group or close the binder
/// from inside the callback. The binder holds no internal borrow while a hook
/// runs.
pub trait GroupHooks: Sized + 'static {
    /// Another grid joined the group this binder is in. `old_group` is where
    /// that grid came from.
    fn on_grid_added_to_group(&self, _binder: &Binder<Self>, _grid: &Grid, _old_group: Option<&GridGroup>) {}

    /// Another grid left the group this binder is in. `new_group` is where
    /// that grid went, if anywhere.
    fn on_grid_removed_from_group(&self, _binder: &Binder<Self>, _grid: &Grid, _new_group: Option<&GridGroup>) {}

    /// The binder's own grid or group changed. `binder.group()` is already
    /// the new group; `old_group` is the one it left.
    fn on_group_changed(&self, _binder: &Binder<Self>, _old_group: Option<&GridGroup>) {}

    /// The group the binder was in has been released by the topology. The
    /// binder no longer records a group when this runs.
    fn on_group_released(&self, _binder: &Binder<Self>, _group: &GridGroup) {}

    /// The binder is closing. Runs once, after the block listener is removed
    /// and before the grid and group listeners are.
    fn on_closing(&self, _binder: &Binder<Self>) {}
}

impl GroupHooks for () {}
