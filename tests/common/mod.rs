#![allow(dead_code)]

use gridgroup_core::testing::{HookLog, RecordingHooks};
use proptest::prelude::*;

use gridgroup_core::{Block, Channel, ChannelKey, Grid, LinkType, Topology};

pub const LINK: LinkType = LinkType::Physical;
pub const KEY: ChannelKey = ChannelKey::from_u128(0x0e72_d3d4_35cc_45d4_b6ba_6918_77bd_c829);

pub type Recorded = Channel<u32, RecordingHooks>;

/// Installs a fmt subscriber that writes through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

pub fn recorded(block: &Block) -> (Recorded, HookLog) {
    let log = HookLog::new();
    let channel = Channel::new(block, LINK, KEY, 0u32, RecordingHooks::new(&log));
    (channel, log)
}

/// One grid holding `names.len()` blocks.
pub fn grid_with_blocks(topo: &mut Topology, grid: &str, names: &[&str]) -> (Grid, Vec<Block>) {
    let grid = topo.create_grid(grid);
    let blocks = names
        .iter()
        .map(|name| topo.add_block(&grid, *name).expect("live grid accepts blocks"))
        .collect();
    (grid, blocks)
}

// --- Random topology driver ---

/// One step of a random topology history. Indices are reduced modulo the
/// number of live grids or channels when applied.
#[derive(Debug, Clone)]
pub enum Op {
    Merge(usize, usize),
    Split(usize, usize),
    Connect(usize, usize, u8),
    Disconnect(usize, usize, u8),
    AddBlock(usize),
    RemoveBlock(usize),
    SetData(usize, u32),
    Close(usize),
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..16usize, 0..16usize).prop_map(|(a, b)| Op::Merge(a, b)),
        (0..16usize, 0..16usize).prop_map(|(a, k)| Op::Split(a, k)),
        (0..16usize, 0..16usize, 0..5u8).prop_map(|(a, b, l)| Op::Connect(a, b, l)),
        (0..16usize, 0..16usize, 0..5u8).prop_map(|(a, b, l)| Op::Disconnect(a, b, l)),
        (0..16usize).prop_map(Op::AddBlock),
        (0..16usize).prop_map(Op::RemoveBlock),
        (0..16usize, any::<u32>()).prop_map(|(c, v)| Op::SetData(c, v)),
        (0..16usize).prop_map(Op::Close),
    ]
}

/// A topology with channels on every block. Channels alternate between the
/// physical and logical link types.
pub struct World {
    pub topo: Topology,
    pub channels: Vec<Recorded>,
}

impl World {
    pub fn new(grids: usize, blocks_per_grid: usize) -> Self {
        let mut world = World {
            topo: Topology::new(),
            channels: Vec::new(),
        };
        for g in 0..grids {
            let grid = world.topo.create_grid(format!("g{g}"));
            for _ in 0..blocks_per_grid {
                world.spawn_channel(&grid);
            }
        }
        world
    }

    fn spawn_channel(&mut self, grid: &Grid) {
        let link = if self.channels.len() % 2 == 0 {
            LinkType::Physical
        } else {
            LinkType::Logical
        };
        let name = format!("b{}", self.channels.len());
        if let Ok(block) = self.topo.add_block(grid, name) {
            let channel = Channel::new(&block, link, KEY, 0u32, RecordingHooks::new(&HookLog::new()));
            self.channels.push(channel);
        }
    }

    fn live_grids(&self) -> Vec<Grid> {
        self.topo.grids().cloned().collect()
    }

    pub fn apply(&mut self, op: &Op) {
        let grids = self.live_grids();
        let pick = |i: usize| grids[i % grids.len()].clone();
        match *op {
            Op::Merge(a, b) => {
                let _ = self.topo.merge_grids(&pick(a), &pick(b));
            }
            Op::Split(a, k) => {
                let grid = pick(a);
                let blocks = grid.block_ids();
                if blocks.len() >= 2 {
                    let take = k % (blocks.len() - 1) + 1;
                    let _ = self.topo.split_grid(&grid, &blocks[..take], "split");
                }
            }
            Op::Connect(a, b, l) => {
                let link = LinkType::ALL[l as usize % LinkType::ALL.len()];
                let _ = self.topo.connect(&pick(a), &pick(b), link);
            }
            Op::Disconnect(a, b, l) => {
                let link = LinkType::ALL[l as usize % LinkType::ALL.len()];
                let _ = self.topo.disconnect(&pick(a), &pick(b), link);
            }
            Op::AddBlock(a) => {
                let grid = pick(a);
                self.spawn_channel(&grid);
            }
            Op::RemoveBlock(c) => {
                if let Some(block) = self.channels[c % self.channels.len()].block() {
                    let _ = self.topo.remove_block(&block);
                }
            }
            Op::SetData(c, v) => {
                let index = c % self.channels.len();
                self.channels[index].set_data(v);
            }
            Op::Close(c) => {
                let index = c % self.channels.len();
                self.channels[index].close();
            }
        }
    }
}
