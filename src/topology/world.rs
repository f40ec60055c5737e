//! In-memory topology driver.
//!
//! `Topology` owns every block, grid and group and performs the structural
//! edits a host engine would: merging and splitting grids, linking and
//! unlinking them, and removing blocks. Each edit updates ownership first and
//! then raises the same events, in the same order, the host raises:
//!
//! - merge: `on_merge(kept, lost)` on kept, then on lost; then lost leaves its
//!   groups (`on_grid_removed` with no new group); then every link type is
//!   regrouped.
//! - split: blocks move to a fresh grid with fresh groups; then
//!   `on_split(original, new_grid)` on the original grid.
//! - regroup: for each grid changing group, `on_grid_removed` on the old group
//!   strictly before `on_grid_added` on the new one; groups left empty raise
//!   `on_released` last.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::TopologyError;
use crate::events::{GridAddedToGroup, GridMerge, GridRemovedFromGroup, GridSplit};
use crate::topology::{Block, Grid, GridGroup};
use crate::types::{BlockId, GridId, GroupId, LinkType};

/// An undirected link of one type between two grids. `a < b` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    pub link_type: LinkType,
    pub a: GridId,
    pub b: GridId,
}

impl Link {
    pub fn new(link_type: LinkType, x: GridId, y: GridId) -> Self {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        Link { link_type, a, b }
    }

    fn touches(&self, grid: GridId) -> bool {
        self.a == grid || self.b == grid
    }

    /// Replaces `from` with `to`; `None` if the link would become a self-loop.
    fn rewire(&self, from: GridId, to: GridId) -> Option<Link> {
        let a = if self.a == from { to } else { self.a };
        let b = if self.b == from { to } else { self.b };
        (a != b).then(|| Link::new(self.link_type, a, b))
    }
}

/// Owner of all blocks, grids and groups of one world.
#[derive(Debug, Default)]
pub struct Topology {
    blocks: BTreeMap<BlockId, Block>,
    grids: BTreeMap<GridId, Grid>,
    groups: BTreeMap<GroupId, GridGroup>,
    links: BTreeSet<Link>,
    next_id: u64,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Lookup ---------------------------------------------------------------

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn grid(&self, id: GridId) -> Option<&Grid> {
        self.grids.get(&id)
    }

    pub fn group(&self, id: GroupId) -> Option<&GridGroup> {
        self.groups.get(&id)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn grids(&self) -> impl Iterator<Item = &Grid> {
        self.grids.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &GridGroup> {
        self.groups.values()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.iter()
    }

    // --- Construction ---------------------------------------------------------

    /// Creates a grid with physics, alone in a fresh group for every link type.
    pub fn create_grid(&mut self, name: impl Into<String>) -> Grid {
        self.spawn_grid(name.into(), true)
    }

    /// Creates a grid without physics. Blocks on it are ghosts.
    pub fn create_ghost_grid(&mut self, name: impl Into<String>) -> Grid {
        self.spawn_grid(name.into(), false)
    }

    pub fn add_block(&mut self, grid: &Grid, name: impl Into<String>) -> Result<Block, TopologyError> {
        let grid = self.live_grid(grid)?;
        let block = Block::new(BlockId(self.alloc()), name.into());
        block.set_grid(Some(grid.clone()));
        grid.push_block(block.id());
        self.blocks.insert(block.id(), block.clone());
        tracing::trace!(block = %block.id(), grid = %grid.id(), "block added");
        Ok(block)
    }

    /// Marks `block` for close, raises its `on_mark_for_close` event and
    /// forgets it.
    pub fn remove_block(&mut self, block: &Block) -> Result<(), TopologyError> {
        let block = match self.blocks.get(&block.id()) {
            Some(known) if known == block => known.clone(),
            _ => return Err(TopologyError::UnknownBlock(block.id())),
        };

        block.mark_closed();
        block.on_mark_for_close().emit(&block);

        if let Some(grid) = block.grid() {
            grid.remove_block(block.id());
        }
        self.blocks.remove(&block.id());
        tracing::debug!(block = %block.id(), "block removed");
        Ok(())
    }

    // --- Links ----------------------------------------------------------------

    /// Links two grids under `link_type`. Returns `false` if the link already
    /// existed (nothing is raised in that case).
    pub fn connect(&mut self, a: &Grid, b: &Grid, link_type: LinkType) -> Result<bool, TopologyError> {
        let (a, b) = self.link_ends(a, b)?;
        let added = self.links.insert(Link::new(link_type, a, b));
        if added {
            tracing::debug!(%a, %b, ?link_type, "grids linked");
            self.regroup(link_type);
        }
        Ok(added)
    }

    /// Removes the link between two grids. Returns `false` if there was none.
    pub fn disconnect(&mut self, a: &Grid, b: &Grid, link_type: LinkType) -> Result<bool, TopologyError> {
        let (a, b) = self.link_ends(a, b)?;
        let removed = self.links.remove(&Link::new(link_type, a, b));
        if removed {
            tracing::debug!(%a, %b, ?link_type, "grids unlinked");
            self.regroup(link_type);
        }
        Ok(removed)
    }

    // --- Merge / split ----------------------------------------------------------

    /// Moves every block of `lost` onto `kept` and retires `lost`.
    pub fn merge_grids(&mut self, kept: &Grid, lost: &Grid) -> Result<(), TopologyError> {
        let kept = self.live_grid(kept)?;
        let lost = self.live_grid(lost)?;
        if kept == lost {
            return Err(TopologyError::SelfMerge(kept.id()));
        }

        for id in lost.take_blocks() {
            if let Some(block) = self.blocks.get(&id) {
                block.set_grid(Some(kept.clone()));
            }
            kept.push_block(id);
        }

        let touching: Vec<Link> = self.links.iter().filter(|l| l.touches(lost.id())).copied().collect();
        for link in touching {
            self.links.remove(&link);
            if let Some(rewired) = link.rewire(lost.id(), kept.id()) {
                self.links.insert(rewired);
            }
        }

        tracing::debug!(kept = %kept.id(), lost = %lost.id(), "merging grids");
        let merge = GridMerge {
            kept: kept.clone(),
            lost: lost.clone(),
        };
        kept.on_merge().emit(&merge);
        lost.on_merge().emit(&merge);

        lost.mark_closed();
        self.grids.remove(&lost.id());
        for link_type in LinkType::ALL {
            if let Some(group) = lost.group(link_type) {
                lost.set_group(link_type, None);
                group.detach_grid(lost.id());
                group.on_grid_removed().emit(&GridRemovedFromGroup {
                    old_group: group.clone(),
                    grid: lost.clone(),
                    new_group: None,
                });
            }
        }

        for link_type in LinkType::ALL {
            self.regroup(link_type);
        }
        Ok(())
    }

    /// Moves the listed blocks of `original` onto a new grid and returns it.
    pub fn split_grid(
        &mut self,
        original: &Grid,
        moving: &[BlockId],
        name: impl Into<String>,
    ) -> Result<Grid, TopologyError> {
        let original = self.live_grid(original)?;
        if moving.is_empty() {
            return Err(TopologyError::EmptySplit(original.id()));
        }

        let on_grid = original.block_ids();
        let moving: BTreeSet<BlockId> = moving.iter().copied().collect();
        for id in &moving {
            if !self.blocks.contains_key(id) {
                return Err(TopologyError::UnknownBlock(*id));
            }
            if !on_grid.contains(id) {
                return Err(TopologyError::BlockNotOnGrid {
                    block: *id,
                    grid: original.id(),
                });
            }
        }
        if moving.len() == on_grid.len() {
            return Err(TopologyError::SplitTakesAllBlocks(original.id()));
        }

        let new_grid = self.spawn_grid(name.into(), original.has_physics());
        for id in &moving {
            original.remove_block(*id);
            new_grid.push_block(*id);
            if let Some(block) = self.blocks.get(id) {
                block.set_grid(Some(new_grid.clone()));
            }
        }

        tracing::debug!(original = %original.id(), new_grid = %new_grid.id(), moved = moving.len(), "grid split");
        original.on_split().emit(&GridSplit {
            original: original.clone(),
            new_grid: new_grid.clone(),
        });
        Ok(new_grid)
    }

    // --- Diagnostics ------------------------------------------------------------

    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            grids: self
                .grids
                .values()
                .map(|grid| GridSnapshot {
                    id: grid.id(),
                    name: grid.name().to_string(),
                    physics: grid.has_physics(),
                    blocks: grid.block_ids(),
                    groups: LinkType::ALL
                        .iter()
                        .filter_map(|lt| grid.group(*lt).map(|g| (*lt, g.id())))
                        .collect(),
                })
                .collect(),
            groups: self
                .groups
                .values()
                .map(|group| GroupSnapshot {
                    id: group.id(),
                    link_type: group.link_type(),
                    grids: group.grid_ids(),
                    variables: group.variable_count(),
                })
                .collect(),
            links: self.links.iter().copied().collect(),
        }
    }

    // --- Internals ------------------------------------------------------------

    fn alloc(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn spawn_grid(&mut self, name: String, physics: bool) -> Grid {
        let grid = Grid::new(GridId(self.alloc()), name, physics);
        for link_type in LinkType::ALL {
            let group = self.spawn_group(link_type);
            group.attach_grid(grid.id());
            grid.set_group(link_type, Some(group));
        }
        self.grids.insert(grid.id(), grid.clone());
        tracing::trace!(grid = %grid.id(), physics, "grid created");
        grid
    }

    fn spawn_group(&mut self, link_type: LinkType) -> GridGroup {
        let group = GridGroup::new(GroupId(self.alloc()), link_type);
        self.groups.insert(group.id(), group.clone());
        group
    }

    /// Resolves `grid` to the instance this topology owns.
    fn live_grid(&self, grid: &Grid) -> Result<Grid, TopologyError> {
        if grid.is_closed() {
            return Err(TopologyError::GridClosed(grid.id()));
        }
        match self.grids.get(&grid.id()) {
            Some(known) if known == grid => Ok(known.clone()),
            _ => Err(TopologyError::UnknownGrid(grid.id())),
        }
    }

    fn link_ends(&self, a: &Grid, b: &Grid) -> Result<(GridId, GridId), TopologyError> {
        let a = self.live_grid(a)?;
        let b = self.live_grid(b)?;
        if a == b {
            return Err(TopologyError::SelfLink(a.id()));
        }
        Ok((a.id(), b.id()))
    }

    /// Recomputes the groups of `link_type` from the current links and raises
    /// the membership events for every grid that changed group.
    fn regroup(&mut self, link_type: LinkType) {
        let components = self.components(link_type);

        let mut claimed: BTreeSet<GroupId> = BTreeSet::new();
        let mut moves: Vec<(Grid, Option<GridGroup>, GridGroup)> = Vec::new();
        for component in components {
            let mut counts: BTreeMap<GroupId, usize> = BTreeMap::new();
            for id in &component {
                if let Some(group) = self.grids.get(id).and_then(|g| g.group(link_type)) {
                    *counts.entry(group.id()).or_default() += 1;
                }
            }
            // Keep the group holding most of the component; lowest id on ties.
            let keep = counts
                .iter()
                .filter(|(id, _)| !claimed.contains(*id))
                .max_by(|x, y| x.1.cmp(y.1).then(y.0.cmp(x.0)))
                .map(|(id, _)| *id);
            let target = match keep.and_then(|id| self.groups.get(&id).cloned()) {
                Some(group) => group,
                None => self.spawn_group(link_type),
            };
            claimed.insert(target.id());

            for id in &component {
                if let Some(grid) = self.grids.get(id) {
                    let current = grid.group(link_type);
                    if current.as_ref() != Some(&target) {
                        moves.push((grid.clone(), current, target.clone()));
                    }
                }
            }
        }

        for (grid, old_group, new_group) in moves {
            if let Some(old) = &old_group {
                old.detach_grid(grid.id());
            }
            new_group.attach_grid(grid.id());
            grid.set_group(link_type, Some(new_group.clone()));
            tracing::trace!(grid = %grid.id(), group = %new_group.id(), ?link_type, "grid regrouped");

            if let Some(old) = &old_group {
                old.on_grid_removed().emit(&GridRemovedFromGroup {
                    old_group: old.clone(),
                    grid: grid.clone(),
                    new_group: Some(new_group.clone()),
                });
            }
            new_group.on_grid_added().emit(&GridAddedToGroup {
                new_group: new_group.clone(),
                grid: grid.clone(),
                old_group: old_group.clone(),
            });
        }

        let empty: Vec<GroupId> = self
            .groups
            .values()
            .filter(|g| g.link_type() == link_type && g.is_empty())
            .map(GridGroup::id)
            .collect();
        for id in empty {
            if let Some(group) = self.groups.remove(&id) {
                group.mark_released();
                tracing::debug!(group = %id, ?link_type, "group released");
                group.on_released().emit(&group);
            }
        }
    }

    /// Connected components of live grids under `link_type`, each sorted,
    /// ordered by their smallest grid id.
    fn components(&self, link_type: LinkType) -> Vec<Vec<GridId>> {
        let ids: Vec<GridId> = self.grids.keys().copied().collect();
        let index: BTreeMap<GridId, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut parent: Vec<usize> = (0..ids.len()).collect();

        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        for link in self.links.iter().filter(|l| l.link_type == link_type) {
            if let (Some(&a), Some(&b)) = (index.get(&link.a), index.get(&link.b)) {
                let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                if ra != rb {
                    parent[ra.max(rb)] = ra.min(rb);
                }
            }
        }

        let mut components: BTreeMap<usize, Vec<GridId>> = BTreeMap::new();
        for (i, id) in ids.iter().enumerate() {
            let root = find(&mut parent, i);
            components.entry(root).or_default().push(*id);
        }
        components.into_values().collect()
    }
}

// --- Snapshot ---------------------------------------------------------------

/// Serializable view of a topology, for logs and test assertions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub grids: Vec<GridSnapshot>,
    pub groups: Vec<GroupSnapshot>,
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub id: GridId,
    pub name: String,
    pub physics: bool,
    pub blocks: Vec<BlockId>,
    pub groups: Vec<(LinkType, GroupId)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub id: GroupId,
    pub link_type: LinkType,
    pub grids: Vec<GridId>,
    pub variables: usize,
}

impl TopologySnapshot {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// The group id of `grid` for `link_type`, if both exist.
    pub fn group_of(&self, grid: GridId, link_type: LinkType) -> Option<GroupId> {
        self.grids
            .iter()
            .find(|g| g.id == grid)?
            .groups
            .iter()
            .find(|(lt, _)| *lt == link_type)
            .map(|(_, id)| *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn new_grid_gets_a_singleton_group_per_link_type() {
        let mut topo = Topology::new();
        let grid = topo.create_grid("alpha");
        for link_type in LinkType::ALL {
            let group = grid.group(link_type).expect("grid must have a group");
            assert_eq!(group.grid_ids(), vec![grid.id()]);
            assert_eq!(group.link_type(), link_type);
        }
        assert_eq!(topo.groups().count(), LinkType::ALL.len());
    }

    #[test]
    fn connect_merges_groups_and_raises_removed_before_added() {
        let mut topo = Topology::new();
        let a = topo.create_grid("a");
        let b = topo.create_grid("b");
        let group_a = a.group(LinkType::Physical).unwrap();
        let group_b = b.group(LinkType::Physical).unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        group_b.on_grid_removed().subscribe(move |ev| l.borrow_mut().push(format!("removed {}", ev.grid.id())));
        let l = Rc::clone(&log);
        group_a.on_grid_added().subscribe(move |ev| l.borrow_mut().push(format!("added {}", ev.grid.id())));
        let l = Rc::clone(&log);
        group_b.on_released().subscribe(move |g| l.borrow_mut().push(format!("released {}", g.id())));

        assert!(topo.connect(&a, &b, LinkType::Physical).unwrap());
        assert!(!topo.connect(&a, &b, LinkType::Physical).unwrap());

        assert_eq!(a.group(LinkType::Physical), b.group(LinkType::Physical));
        assert_eq!(a.group(LinkType::Physical).unwrap(), group_a);
        assert!(group_b.is_released());
        assert_eq!(
            *log.borrow(),
            vec![
                format!("removed {}", b.id()),
                format!("added {}", b.id()),
                format!("released {}", group_b.id()),
            ]
        );
        // Other link types are untouched.
        assert_ne!(a.group(LinkType::Logical), b.group(LinkType::Logical));
    }

    #[test]
    fn disconnect_splits_group_again() {
        let mut topo = Topology::new();
        let a = topo.create_grid("a");
        let b = topo.create_grid("b");
        let c = topo.create_grid("c");
        topo.connect(&a, &b, LinkType::Mechanical).unwrap();
        topo.connect(&b, &c, LinkType::Mechanical).unwrap();
        let shared = a.group(LinkType::Mechanical).unwrap();
        assert_eq!(shared.grid_ids().len(), 3);

        assert!(topo.disconnect(&b, &c, LinkType::Mechanical).unwrap());
        assert_eq!(a.group(LinkType::Mechanical).unwrap(), shared);
        assert_eq!(b.group(LinkType::Mechanical).unwrap(), shared);
        let c_group = c.group(LinkType::Mechanical).unwrap();
        assert_ne!(c_group, shared);
        assert_eq!(c_group.grid_ids(), vec![c.id()]);
        assert!(!topo.disconnect(&b, &c, LinkType::Mechanical).unwrap());
    }

    #[test]
    fn merge_moves_blocks_and_retires_lost_grid() {
        let mut topo = Topology::new();
        let kept = topo.create_grid("kept");
        let lost = topo.create_grid("lost");
        let other = topo.create_grid("other");
        topo.add_block(&kept, "k1").unwrap();
        let moved = topo.add_block(&lost, "l1").unwrap();
        topo.connect(&lost, &other, LinkType::Logical).unwrap();

        let merges = Rc::new(RefCell::new(Vec::new()));
        let m = Rc::clone(&merges);
        kept.on_merge().subscribe(move |_| m.borrow_mut().push("kept"));
        let m = Rc::clone(&merges);
        lost.on_merge().subscribe(move |_| m.borrow_mut().push("lost"));

        topo.merge_grids(&kept, &lost).unwrap();

        assert_eq!(*merges.borrow(), vec!["kept", "lost"]);
        assert_eq!(moved.grid(), Some(kept.clone()));
        assert_eq!(kept.block_count(), 2);
        assert!(lost.is_closed());
        assert!(topo.grid(lost.id()).is_none());
        assert!(lost.group(LinkType::Logical).is_none());
        // The logical link moved over to the kept grid.
        assert_eq!(kept.group(LinkType::Logical), other.group(LinkType::Logical));
        assert_eq!(
            topo.merge_grids(&kept, &lost),
            Err(TopologyError::GridClosed(lost.id()))
        );
    }

    #[test]
    fn split_moves_listed_blocks_to_a_new_grid() {
        let mut topo = Topology::new();
        let original = topo.create_grid("ship");
        let stay = topo.add_block(&original, "stay").unwrap();
        let go = topo.add_block(&original, "go").unwrap();

        let splits = Rc::new(RefCell::new(0));
        let s = Rc::clone(&splits);
        original.on_split().subscribe(move |ev| {
            assert_ne!(ev.original, ev.new_grid);
            *s.borrow_mut() += 1;
        });

        let new_grid = topo.split_grid(&original, &[go.id()], "debris").unwrap();
        assert_eq!(*splits.borrow(), 1);
        assert_eq!(go.grid(), Some(new_grid.clone()));
        assert_eq!(stay.grid(), Some(original.clone()));
        assert_ne!(new_grid.group(LinkType::Physical), original.group(LinkType::Physical));
    }

    #[test]
    fn split_validation() {
        let mut topo = Topology::new();
        let a = topo.create_grid("a");
        let b = topo.create_grid("b");
        let only = topo.add_block(&a, "only").unwrap();
        let elsewhere = topo.add_block(&b, "elsewhere").unwrap();

        assert_eq!(topo.split_grid(&a, &[], "x"), Err(TopologyError::EmptySplit(a.id())));
        assert_eq!(
            topo.split_grid(&a, &[only.id()], "x"),
            Err(TopologyError::SplitTakesAllBlocks(a.id()))
        );
        assert_eq!(
            topo.split_grid(&a, &[elsewhere.id()], "x"),
            Err(TopologyError::BlockNotOnGrid {
                block: elsewhere.id(),
                grid: a.id()
            })
        );
        assert_eq!(topo.merge_grids(&a, &a), Err(TopologyError::SelfMerge(a.id())));
        assert_eq!(
            topo.connect(&b, &b, LinkType::Physical),
            Err(TopologyError::SelfLink(b.id()))
        );
    }

    #[test]
    fn remove_block_raises_mark_for_close_once() {
        let mut topo = Topology::new();
        let grid = topo.create_grid("g");
        let block = topo.add_block(&grid, "b").unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        block.on_mark_for_close().subscribe(move |b| s.borrow_mut().push(b.id()));

        topo.remove_block(&block).unwrap();
        assert_eq!(*seen.borrow(), vec![block.id()]);
        assert!(block.is_closed());
        assert_eq!(grid.block_count(), 0);
        assert_eq!(topo.remove_block(&block), Err(TopologyError::UnknownBlock(block.id())));
    }

    #[test]
    fn ghost_grid_blocks_are_ghosts() {
        let mut topo = Topology::new();
        let ghost = topo.create_ghost_grid("projection");
        let real = topo.create_grid("real");
        assert!(topo.add_block(&ghost, "g").unwrap().is_ghost());
        assert!(!topo.add_block(&real, "r").unwrap().is_ghost());
    }

    #[test]
    fn snapshot_reflects_membership_and_serializes() {
        let mut topo = Topology::new();
        let a = topo.create_grid("a");
        let b = topo.create_grid("b");
        topo.connect(&a, &b, LinkType::Electrical).unwrap();

        let snap = topo.snapshot();
        assert_eq!(
            snap.group_of(a.id(), LinkType::Electrical),
            snap.group_of(b.id(), LinkType::Electrical)
        );
        let json = snap.to_json_pretty().unwrap();
        let back: TopologySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
