//! Core crate for emulated CXL fixed memory windows.
//!
//! Windows are configured into a [`FixedWindowRegistry`], linked against a
//! [`Topology`] of host bridges, then serve little-endian accesses by routing
//! each one through two interleave levels to a [`CxlEndpoint`].

/// Fault taxonomy for configuration, linking and decode.
pub mod fault;
pub use fault::{ConfigError, DecodeMiss, LinkError, MissStage, TopologyError};

/// Interleave ways/granularity encode and decode tables.
pub mod interleave;
pub use interleave::{
    decode_granularity, decode_ways, encode_granularity, encode_ways, is_three_way_multiple,
    INTERLEAVE_WAYS_TABLE, MAX_GRANULARITY_ENCODING, MIN_INTERLEAVE_GRANULARITY,
};

/// HDM decoder 0 register block and decode snapshot.
pub mod hdm;
pub use hdm::{
    HdmDecoderConfig, HdmDecoderRegisters, HdmDecoderState, TargetPortList,
    HDM_CTRL_COMMIT, HDM_CTRL_COMMITTED, HDM_CTRL_ERR, HDM_CTRL_IG_MASK, HDM_CTRL_IW_MASK,
    HDM_CTRL_IW_SHIFT, HDM_CTRL_LOCK_ON_COMMIT, HDM_CTRL_TYPE, HDM_DECODER0_BASE_HI,
    HDM_DECODER0_BASE_LO, HDM_DECODER0_CTRL, HDM_DECODER0_SIZE_HI, HDM_DECODER0_SIZE_LO,
    HDM_DECODER0_TARGET_LIST_HI, HDM_DECODER0_TARGET_LIST_LO, HDM_DECODER_ADDR_LO_MASK,
    TARGET_PORT_LIST_LEN,
};

/// Memory transaction primitives and fixed memory window layout.
pub mod memory;
pub use memory::{
    load_le, store_le, AccessSize, AccessSizeError, CxlEndpoint, FixedWindow,
    FixedWindowRegistry, MemTxAttrs, MemTxResult, WindowConfig, WindowTargets, MIB,
    WINDOW_SIZE_ALIGN,
};

/// Host bridge hierarchy owned by the platform.
pub mod topology;
pub use topology::{
    HostBridge, HostBridgeId, HostBridgeKind, PciFunction, RootBus, RootPort, SecondaryBus,
    Topology,
};

/// Window target resolution against the topology.
mod link;

/// Two-level interleave decode down to an endpoint.
pub mod decode;
pub use decode::{
    find_port, host_bridge_index, resolve, resolve_device, route, Route, ENDPOINT_DEVFN,
};

/// Window read/write entry points.
pub mod dispatch;

/// Endpoint device models.
pub mod peripherals;
pub use peripherals::Type3Device;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use serde_json as _;
