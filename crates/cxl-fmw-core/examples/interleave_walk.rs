//! Walks a 4-way interleaved fixed memory window and prints where each
//! granule lands.
//!
//! Two host bridges each fan out to two root ports, giving a window-level
//! 2-way interleave on top of a 2-way interleave inside each bridge.
//!
//! ## Usage
//!
//! ```sh
//! cargo run -p cxl-fmw-core --example interleave_walk
//! ```

#![allow(clippy::pedantic)]

use cxl_fmw_core::{
    dispatch, route, AccessSize, FixedWindowRegistry, HdmDecoderConfig, HostBridge,
    HostBridgeKind, MemTxAttrs, RootBus, RootPort, SecondaryBus, TargetPortList, Topology,
    Type3Device, WindowConfig, ENDPOINT_DEVFN, MIB,
};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use serde_json as _;
use thiserror as _;
use tracing as _;

const WINDOW_GRANULARITY: u64 = 256;
const TOTAL_WAYS: usize = 4;
const GRANULES: u64 = 8;

fn endpoint() -> Type3Device {
    let mut device = Type3Device::new(MIB as usize);
    device
        .hdm_mut()
        .commit(&HdmDecoderConfig {
            base: 0,
            size: 256 * MIB,
            ways: TOTAL_WAYS,
            granularity: WINDOW_GRANULARITY,
            target_ports: TargetPortList::default(),
            lock_on_commit: true,
        })
        .expect("endpoint decoder programs");
    device
}

fn host_bridge(name: &str, ports: [u8; 2]) -> HostBridge {
    let mut bus = RootBus::cxl();
    for port in ports {
        let mut secondary = SecondaryBus::new();
        secondary.attach(ENDPOINT_DEVFN, Box::new(endpoint()));
        bus.add_port(RootPort::new(port).with_secondary_bus(secondary));
    }

    let mut bridge = HostBridge::new(name, HostBridgeKind::Cxl).with_root_bus(bus);
    bridge
        .hdm_mut()
        .commit(&HdmDecoderConfig {
            base: 0,
            size: 256 * MIB,
            ways: 2,
            granularity: WINDOW_GRANULARITY * 2,
            target_ports: TargetPortList::new([ports[0], ports[1], 0, 0, 0, 0, 0, 0]),
            lock_on_commit: true,
        })
        .expect("host bridge decoder programs");
    bridge
}

fn main() {
    let mut topology = Topology::new();
    topology
        .add_host_bridge(host_bridge("cxl.0", [0, 1]))
        .expect("unique host bridge name");
    topology
        .add_host_bridge(host_bridge("cxl.1", [2, 3]))
        .expect("unique host bridge name");

    let mut registry = FixedWindowRegistry::new();
    registry
        .configure_window(
            &WindowConfig::new(["cxl.0", "cxl.1"], 256 * MIB)
                .with_granularity(WINDOW_GRANULARITY),
        )
        .expect("window configures");
    registry.link_targets(&topology).expect("window links");
    let window = registry.window(0).expect("window 0 exists");

    println!("granule  offset    host bridge  port");
    for granule in 0..GRANULES {
        let offset = granule * WINDOW_GRANULARITY;
        let hop = route(window, offset, &topology).expect("granule decodes");
        let name = topology
            .host_bridge(hop.host_bridge)
            .map_or("?", HostBridge::name);
        println!("{granule:>7}  {offset:#08x}  {name:>11}  {:>4}", hop.port);
    }

    let attrs = MemTxAttrs::UNSPECIFIED;
    for granule in 0..GRANULES {
        let offset = granule * WINDOW_GRANULARITY;
        let status =
            dispatch::write(window, &mut topology, offset, granule, AccessSize::Qword, attrs);
        println!("{offset:#08x} <- {granule} ({status:?})");
    }
    println!();
    println!("read back:");
    for granule in 0..GRANULES {
        let offset = granule * WINDOW_GRANULARITY;
        let (value, status) =
            dispatch::read(window, &mut topology, offset, AccessSize::Qword, attrs);
        println!("{offset:#08x} -> {value} ({status:?})");
    }
}
