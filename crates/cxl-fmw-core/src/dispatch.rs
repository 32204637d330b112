//! Memory access entry points for fixed memory windows.
//!
//! Decode misses are not errors to the caller: reads complete with value 0
//! and [`MemTxResult::Error`], writes complete with [`MemTxResult::Ok`] and
//! are dropped. Nothing on this path allocates or logs.

use crate::{
    decode, AccessSize, FixedWindow, FixedWindowRegistry, MemTxAttrs, MemTxResult, Topology,
};

/// Reads `size` bytes at `offset` within `window`.
///
/// A decoded access is forwarded to the endpoint at `window.base() + offset`
/// and its result is returned unchanged.
#[must_use]
pub fn read(
    window: &FixedWindow,
    topology: &mut Topology,
    offset: u64,
    size: AccessSize,
    attrs: MemTxAttrs,
) -> (u64, MemTxResult) {
    match decode::resolve(window, offset, topology) {
        Ok(endpoint) => endpoint.sized_read(window.base() + offset, size, attrs),
        Err(_) => (0, MemTxResult::Error),
    }
}

/// Writes the low `size` bytes of `value` at `offset` within `window`.
///
/// A write that does not decode is discarded and reported as
/// [`MemTxResult::Ok`].
pub fn write(
    window: &FixedWindow,
    topology: &mut Topology,
    offset: u64,
    value: u64,
    size: AccessSize,
    attrs: MemTxAttrs,
) -> MemTxResult {
    match decode::resolve(window, offset, topology) {
        Ok(endpoint) => endpoint.sized_write(window.base() + offset, value, size, attrs),
        Err(_) => MemTxResult::Ok,
    }
}

impl FixedWindowRegistry {
    /// Reads at a host physical address through whichever window holds it.
    ///
    /// Addresses outside every window read as 0 with
    /// [`MemTxResult::DecodeError`].
    #[must_use]
    pub fn read_hpa(
        &self,
        topology: &mut Topology,
        hpa: u64,
        size: AccessSize,
        attrs: MemTxAttrs,
    ) -> (u64, MemTxResult) {
        match self.find_window(hpa) {
            Some((_, window)) => read(window, topology, hpa - window.base(), size, attrs),
            None => (0, MemTxResult::DecodeError),
        }
    }

    /// Writes at a host physical address through whichever window holds it.
    ///
    /// Addresses outside every window return [`MemTxResult::DecodeError`].
    pub fn write_hpa(
        &self,
        topology: &mut Topology,
        hpa: u64,
        value: u64,
        size: AccessSize,
        attrs: MemTxAttrs,
    ) -> MemTxResult {
        match self.find_window(hpa) {
            Some((_, window)) => write(window, topology, hpa - window.base(), value, size, attrs),
            None => MemTxResult::DecodeError,
        }
    }
}
