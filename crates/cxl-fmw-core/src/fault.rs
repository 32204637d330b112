use thiserror::Error;

/// Configuration-time rejection of a window descriptor or codec input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ConfigError {
    /// Window size is zero or not a multiple of 256 MiB.
    #[error("size of a CXL fixed memory window must be a multiple of 256MiB (got {size:#x})")]
    UnalignedSize {
        /// Requested window size in bytes.
        size: u64,
    },
    /// Target count is not one of the supported interleave ways.
    #[error("interleave ways: {ways} not supported")]
    UnsupportedWays {
        /// Requested number of interleave targets.
        ways: usize,
    },
    /// Granularity is not one of the supported power-of-two chunk sizes.
    #[error("interleave granularity: {granularity} not supported")]
    UnsupportedGranularity {
        /// Requested granularity in bytes.
        granularity: u64,
    },
    /// Window would extend past the end of the 64-bit host address space.
    #[error("no host address space left for a {size:#x} byte window")]
    AddressSpaceExhausted {
        /// Requested window size in bytes.
        size: u64,
    },
    /// HDM decoder range is not aligned to 256 MiB.
    #[error("hdm decoder range {base:#x}+{size:#x} is not 256MiB aligned")]
    UnalignedDecoderRange {
        /// Requested decoder base.
        base: u64,
        /// Requested decoder size.
        size: u64,
    },
    /// HDM decoder is committed with lock-on-commit and cannot be reprogrammed.
    #[error("hdm decoder is locked")]
    DecoderLocked,
}

/// Link-time failure to bind a symbolic window target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum LinkError {
    /// No CXL host bridge is registered under the target name.
    #[error("could not resolve CXL fixed memory window {window} target {target}")]
    UnresolvedTarget {
        /// Index of the window in configuration order.
        window: usize,
        /// Target identifier that failed to resolve.
        target: String,
    },
}

/// Topology construction failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum TopologyError {
    /// A host bridge with the same name already exists.
    #[error("host bridge name {name} is already registered")]
    DuplicateName {
        /// Conflicting host bridge name.
        name: String,
    },
}

/// Decode-chain stage at which an address failed to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MissStage {
    /// The window itself cannot route (unlinked or out of range).
    Window,
    /// The selected host bridge has no usable CXL root bus.
    HostBridge,
    /// The host bridge HDM decoder is not programmed.
    Decoder,
    /// The decoded root port or its secondary bus is missing.
    Port,
    /// No CXL endpoint occupies the port's first slot.
    Device,
}

/// Runtime failure to route an address to any endpoint.
///
/// Not fatal: the dispatcher converts it into read poison or a dropped write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DecodeMiss {
    /// Window targets have not been linked to host bridges.
    #[error("window targets are not linked")]
    WindowNotLinked,
    /// Offset does not fall inside the window.
    #[error("offset lies outside the window")]
    OffsetOutOfWindow,
    /// Linked host-bridge reference does not name a bridge of this topology.
    #[error("linked host bridge is not present in the topology")]
    UnknownHostBridge,
    /// Host bridge has no root bus, or the root bus is not CXL.
    #[error("host bridge has no CXL root bus")]
    NoCxlRootBus,
    /// HDM decoder 0 is not committed.
    #[error("hdm decoder is not committed")]
    DecoderNotCommitted,
    /// HDM decoder holds an unassigned ways or granularity encoding.
    #[error("hdm decoder holds an invalid interleave encoding")]
    InvalidDecoderEncoding,
    /// No root port carries the decoded port number.
    #[error("no root port with port number {port}")]
    PortNotFound {
        /// Decoded port number.
        port: u8,
    },
    /// Root port has no secondary bus attached.
    #[error("root port {port} has no secondary bus")]
    NoSecondaryBus {
        /// Decoded port number.
        port: u8,
    },
    /// Secondary bus slot 0 is empty.
    #[error("no device below root port {port}")]
    EmptySlot {
        /// Decoded port number.
        port: u8,
    },
    /// Device below the port does not implement the CXL endpoint contract.
    #[error("device below root port {port} is not a CXL endpoint")]
    NotCxlEndpoint {
        /// Decoded port number.
        port: u8,
    },
}

impl DecodeMiss {
    /// Returns the decode-chain stage that produced this miss.
    #[must_use]
    pub const fn stage(self) -> MissStage {
        match self {
            Self::WindowNotLinked | Self::OffsetOutOfWindow => MissStage::Window,
            Self::UnknownHostBridge | Self::NoCxlRootBus => MissStage::HostBridge,
            Self::DecoderNotCommitted | Self::InvalidDecoderEncoding => MissStage::Decoder,
            Self::PortNotFound { .. } | Self::NoSecondaryBus { .. } => MissStage::Port,
            Self::EmptySlot { .. } | Self::NotCxlEndpoint { .. } => MissStage::Device,
        }
    }
}
