//! Devices that terminate fixed memory window traffic.

/// Volatile CXL type-3 memory expander.
pub mod type3;

pub use type3::Type3Device;
