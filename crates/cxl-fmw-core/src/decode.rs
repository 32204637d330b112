//! Window address decode: offset -> host bridge -> root port -> endpoint.
//!
//! Two interleave levels are applied. The window spreads consecutive
//! granularity-sized chunks across its host bridges in target-list order;
//! each host bridge's HDM decoder then spreads its share across root ports
//! using its own ways/granularity and target-port list.

use crate::{
    CxlEndpoint, DecodeMiss, FixedWindow, HdmDecoderState, HostBridge, HostBridgeId, RootBus,
    Topology, MAX_GRANULARITY_ENCODING,
};

/// Devfn consulted on a root port's secondary bus.
pub const ENDPOINT_DEVFN: u8 = 0;

/// Host bridge and root port an address decodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Route {
    /// Selected host bridge.
    pub host_bridge: HostBridgeId,
    /// Root-port number selected by the host bridge decoder.
    pub port: u8,
    /// Host physical address of the access.
    pub hpa: u64,
}

/// First-level interleave: index into the window's target list.
///
/// # Errors
///
/// Returns [`DecodeMiss::OffsetOutOfWindow`] when `offset >= window.size()`.
#[allow(clippy::cast_possible_truncation)]
pub fn host_bridge_index(window: &FixedWindow, offset: u64) -> Result<usize, DecodeMiss> {
    if offset >= window.size() {
        return Err(DecodeMiss::OffsetOutOfWindow);
    }
    let absolute = window.base() + offset;
    let ways = window.target_count() as u64;
    Ok(((absolute / window.granularity()) % ways) as usize)
}

/// Second-level interleave: root-port number from a host-bridge decoder.
///
/// # Errors
///
/// - [`DecodeMiss::DecoderNotCommitted`] when the decoder is not committed.
/// - [`DecodeMiss::InvalidDecoderEncoding`] for an unassigned ways or
///   granularity encoding, or an interleave index past the 8-entry list.
#[allow(clippy::cast_possible_truncation)]
pub fn find_port(state: &HdmDecoderState, absolute: u64) -> Result<u8, DecodeMiss> {
    if !state.committed {
        return Err(DecodeMiss::DecoderNotCommitted);
    }
    if state.enc_granularity > MAX_GRANULARITY_ENCODING {
        return Err(DecodeMiss::InvalidDecoderEncoding);
    }
    let ways = state.ways().ok_or(DecodeMiss::InvalidDecoderEncoding)? as u64;
    let target_index = (absolute / state.granularity()) % ways;
    state
        .target_ports
        .get(target_index as usize)
        .ok_or(DecodeMiss::InvalidDecoderEncoding)
}

/// Endpoint occupying slot 0 below root port `port`.
///
/// # Errors
///
/// - [`DecodeMiss::NoCxlRootBus`] when the bridge has no CXL root bus.
/// - [`DecodeMiss::PortNotFound`] when no root port has number `port`.
/// - [`DecodeMiss::NoSecondaryBus`] when the port links to nothing.
/// - [`DecodeMiss::EmptySlot`] when slot 0 is empty.
/// - [`DecodeMiss::NotCxlEndpoint`] when the device is not a CXL endpoint.
pub fn resolve_device(
    bridge: &mut HostBridge,
    port: u8,
) -> Result<&mut dyn CxlEndpoint, DecodeMiss> {
    let bus = bridge
        .root_bus_mut()
        .filter(|bus| bus.is_cxl())
        .ok_or(DecodeMiss::NoCxlRootBus)?;
    let root_port = bus
        .find_port_mut(port)
        .ok_or(DecodeMiss::PortNotFound { port })?;
    let secondary = root_port
        .secondary_bus_mut()
        .ok_or(DecodeMiss::NoSecondaryBus { port })?;
    let device = secondary
        .device_mut(ENDPOINT_DEVFN)
        .ok_or(DecodeMiss::EmptySlot { port })?;
    device
        .as_cxl_endpoint()
        .ok_or(DecodeMiss::NotCxlEndpoint { port })
}

/// Decodes `offset` down to a host bridge and root port.
///
/// # Errors
///
/// Any [`DecodeMiss`] raised before device lookup.
pub fn route(window: &FixedWindow, offset: u64, topology: &Topology) -> Result<Route, DecodeMiss> {
    let host_bridges = window
        .targets()
        .host_bridges()
        .ok_or(DecodeMiss::WindowNotLinked)?;
    let index = host_bridge_index(window, offset)?;
    let host_bridge = host_bridges
        .get(index)
        .copied()
        .ok_or(DecodeMiss::WindowNotLinked)?;
    let name = window.targets().names().get(index);
    let bridge = topology
        .host_bridge(host_bridge)
        .filter(|bridge| name.is_some_and(|name| name == bridge.name()))
        .ok_or(DecodeMiss::UnknownHostBridge)?;
    if !bridge.root_bus().is_some_and(RootBus::is_cxl) {
        return Err(DecodeMiss::NoCxlRootBus);
    }

    let hpa = window.base() + offset;
    let port = find_port(&bridge.hdm_snapshot(), hpa)?;
    Ok(Route {
        host_bridge,
        port,
        hpa,
    })
}

/// Decodes `offset` all the way to the owning endpoint.
///
/// # Errors
///
/// Any [`DecodeMiss`] from [`route`] or [`resolve_device`].
pub fn resolve<'t>(
    window: &FixedWindow,
    offset: u64,
    topology: &'t mut Topology,
) -> Result<&'t mut dyn CxlEndpoint, DecodeMiss> {
    let Route {
        host_bridge, port, ..
    } = route(window, offset, topology)?;
    let bridge = topology
        .host_bridge_mut(host_bridge)
        .ok_or(DecodeMiss::UnknownHostBridge)?;
    resolve_device(bridge, port)
}
