#![no_main]

use cxl_fmw_core::{
    dispatch, AccessSize, FixedWindowRegistry, HostBridge, HostBridgeKind, MemTxAttrs, RootBus,
    RootPort, SecondaryBus, Topology, Type3Device, WindowConfig, ENDPOINT_DEVFN,
    HDM_DECODER0_BASE_HI, HDM_DECODER0_BASE_LO, HDM_DECODER0_CTRL, HDM_DECODER0_SIZE_HI,
    HDM_DECODER0_SIZE_LO, HDM_DECODER0_TARGET_LIST_HI, HDM_DECODER0_TARGET_LIST_LO, MIB,
};
use libfuzzer_sys::fuzz_target;

const REGISTERS: [u16; 7] = [
    HDM_DECODER0_BASE_LO,
    HDM_DECODER0_BASE_HI,
    HDM_DECODER0_SIZE_LO,
    HDM_DECODER0_SIZE_HI,
    HDM_DECODER0_CTRL,
    HDM_DECODER0_TARGET_LIST_LO,
    HDM_DECODER0_TARGET_LIST_HI,
];

fn word(bytes: &[u8]) -> u32 {
    let mut buf = [0_u8; 4];
    buf[..bytes.len().min(4)].copy_from_slice(&bytes[..bytes.len().min(4)]);
    u32::from_le_bytes(buf)
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 + REGISTERS.len() * 4 * 2 {
        return;
    }
    let (header, rest) = data.split_at(2);
    let (registers, accesses) = rest.split_at(REGISTERS.len() * 4 * 2);

    let mut topology = Topology::new();
    let mut targets = Vec::new();
    for (index, block) in registers.chunks_exact(REGISTERS.len() * 4).enumerate() {
        let mut bus = RootBus::cxl();
        for port in 0..4_u8 {
            let mut secondary = SecondaryBus::new();
            let mut device = Type3Device::new(4096);
            for (offset, value) in REGISTERS.iter().zip(block.chunks_exact(4)) {
                device.hdm_mut().write(*offset, word(value).rotate_left(u32::from(port)));
            }
            secondary.attach(ENDPOINT_DEVFN, Box::new(device));
            bus.add_port(RootPort::new(port).with_secondary_bus(secondary));
        }
        let name = format!("hb{index}");
        let mut bridge = HostBridge::new(name.as_str(), HostBridgeKind::Cxl).with_root_bus(bus);
        for (offset, value) in REGISTERS.iter().zip(block.chunks_exact(4)) {
            bridge.hdm_mut().write(*offset, word(value));
        }
        let _ = topology.add_host_bridge(bridge);
        targets.push(name);
    }

    let mut registry = FixedWindowRegistry::new();
    let granularity = 256_u64 << (header[0] % 8);
    let config = WindowConfig::new(targets, 256 * MIB).with_granularity(granularity);
    if registry.configure_window(&config).is_err() {
        return;
    }
    let _ = registry.link_targets(&topology);

    for access in accesses.chunks(8) {
        let hpa = u64::from(word(access)) | (u64::from(header[1]) << 32);
        let size = AccessSize::ALL[usize::from(access.first().copied().unwrap_or(0) % 4)];
        let value = u64::from(word(access.get(4..).unwrap_or(&[])));
        let attrs = MemTxAttrs::UNSPECIFIED;
        let _ = registry.write_hpa(&mut topology, hpa, value, size, attrs);
        let _ = registry.read_hpa(&mut topology, hpa, size, attrs);
        if let Some(window) = registry.window(0) {
            let _ = dispatch::read(window, &mut topology, hpa, size, attrs);
        }
    }
});
