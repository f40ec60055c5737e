#![no_main]

use libfuzzer_sys::fuzz_target;
use gridgroup_core::{Channel, ChannelKey, ChannelRegistry, LinkType, Topology};

const KEY: ChannelKey = ChannelKey::from_u128(0xf022);

// One structural edit; indices are reduced modulo what currently exists.
#[derive(Debug, Clone, arbitrary::Arbitrary)]
enum FuzzOp {
    Merge(u8, u8),
    Split(u8, u8),
    Connect(u8, u8, u8),
    Disconnect(u8, u8, u8),
    AddBlock(u8),
    RemoveBlock(u8),
    SetData(u8, u16),
    Close(u8),
}

fuzz_target!(|ops: Vec<FuzzOp>| {
    let mut topo = Topology::new();
    let first = topo.create_grid("root");
    let mut channels: Vec<Channel<u16>> = Vec::new();
    if let Ok(block) = topo.add_block(&first, "seed") {
        channels.push(Channel::new(&block, LinkType::Physical, KEY, 0, ()));
    }

    for op in ops.iter().take(256) {
        let grids: Vec<_> = topo.grids().cloned().collect();
        let pick = |i: u8| grids[i as usize % grids.len()].clone();
        let link = |l: u8| LinkType::ALL[l as usize % LinkType::ALL.len()];
        match *op {
            FuzzOp::Merge(a, b) => {
                let _ = topo.merge_grids(&pick(a), &pick(b));
            }
            FuzzOp::Split(a, k) => {
                let grid = pick(a);
                let blocks = grid.block_ids();
                if blocks.len() >= 2 {
                    let take = k as usize % (blocks.len() - 1) + 1;
                    let _ = topo.split_grid(&grid, &blocks[..take], "split");
                }
            }
            FuzzOp::Connect(a, b, l) => {
                let _ = topo.connect(&pick(a), &pick(b), link(l));
            }
            FuzzOp::Disconnect(a, b, l) => {
                let _ = topo.disconnect(&pick(a), &pick(b), link(l));
            }
            FuzzOp::AddBlock(a) => {
                let grid = pick(a);
                if let Ok(block) = topo.add_block(&grid, "fuzz") {
                    channels.push(Channel::new(&block, link(a), KEY, 0, ()));
                }
            }
            FuzzOp::RemoveBlock(c) if !channels.is_empty() => {
                if let Some(block) = channels[c as usize % channels.len()].block() {
                    let _ = topo.remove_block(&block);
                }
            }
            FuzzOp::SetData(c, v) if !channels.is_empty() => {
                channels[c as usize % channels.len()].set_data(v);
            }
            FuzzOp::Close(c) if !channels.is_empty() => {
                channels[c as usize % channels.len()].close();
            }
            _ => {}
        }

        for channel in channels.iter().filter(|c| c.is_active()) {
            let group = channel.grid().and_then(|g| g.group(channel.link_type()));
            assert_eq!(channel.group(), group);
            let group = group.expect("active channel has a group");
            assert!(ChannelRegistry::<u16>::member_ids(&group, KEY).contains(&channel.id()));
        }
    }
});
