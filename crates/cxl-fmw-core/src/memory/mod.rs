//! Memory transaction primitives and fixed memory window layout.

/// Access widths, transaction attributes/status and the endpoint contract.
pub mod access;
/// Fixed memory window descriptors and registry.
pub mod window;

pub use access::{
    load_le, store_le, AccessSize, AccessSizeError, CxlEndpoint, MemTxAttrs, MemTxResult,
};
pub use window::{
    FixedWindow, FixedWindowRegistry, WindowConfig, WindowTargets, MIB, WINDOW_SIZE_ALIGN,
};
