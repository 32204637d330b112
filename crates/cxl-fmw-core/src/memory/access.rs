//! Memory transaction primitives and the downstream endpoint contract.

use thiserror::Error;

/// Access width accepted by fixed memory windows and endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum AccessSize {
    /// 1-byte access.
    Byte = 1,
    /// 2-byte access.
    Word = 2,
    /// 4-byte access.
    Dword = 4,
    /// 8-byte access.
    Qword = 8,
}

/// Rejected access width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("invalid access size {0}: must be 1, 2, 4 or 8 bytes")]
pub struct AccessSizeError(pub u8);

impl AccessSize {
    /// All accepted widths in ascending order.
    pub const ALL: [Self; 4] = [Self::Byte, Self::Word, Self::Dword, Self::Qword];

    /// Converts a byte count into an access width.
    ///
    /// # Errors
    ///
    /// Returns [`AccessSizeError`] for any width other than 1, 2, 4 or 8.
    pub const fn from_bytes(bytes: u8) -> Result<Self, AccessSizeError> {
        match bytes {
            1 => Ok(Self::Byte),
            2 => Ok(Self::Word),
            4 => Ok(Self::Dword),
            8 => Ok(Self::Qword),
            _ => Err(AccessSizeError(bytes)),
        }
    }

    /// Width in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Mask selecting the low `bytes() * 8` bits of a value.
    #[must_use]
    pub const fn value_mask(self) -> u64 {
        match self {
            Self::Qword => u64::MAX,
            Self::Byte | Self::Word | Self::Dword => (1 << (self as u32 * 8)) - 1,
        }
    }
}

impl TryFrom<u8> for AccessSize {
    type Error = AccessSizeError;

    fn try_from(bytes: u8) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

/// Transaction attributes carried alongside each access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemTxAttrs {
    /// Requester did not specify attributes.
    pub unspecified: bool,
    /// Secure-world access.
    pub secure: bool,
    /// Unprivileged access.
    pub user: bool,
    /// Requester identifier (bus/device/function of the initiator).
    pub requester_id: u16,
}

impl MemTxAttrs {
    /// Attributes for an access whose initiator supplied none.
    pub const UNSPECIFIED: Self = Self {
        unspecified: true,
        secure: false,
        user: false,
        requester_id: 0,
    };
}

/// Completion status of a memory transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MemTxResult {
    /// Access completed.
    Ok,
    /// Access failed at the target; read data is poison.
    Error,
    /// No target decodes the address.
    DecodeError,
}

impl MemTxResult {
    /// Returns `true` for [`MemTxResult::Ok`].
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Contract for devices that terminate CXL.mem traffic.
///
/// Addresses are host physical addresses; endpoints apply their own HDM
/// decoding.
pub trait CxlEndpoint {
    /// Reads `size` bytes at `hpa`, returning the little-endian value and status.
    fn sized_read(&mut self, hpa: u64, size: AccessSize, attrs: MemTxAttrs) -> (u64, MemTxResult);

    /// Writes the low `size` bytes of `value` at `hpa`.
    fn sized_write(
        &mut self,
        hpa: u64,
        value: u64,
        size: AccessSize,
        attrs: MemTxAttrs,
    ) -> MemTxResult;
}

/// Assembles a little-endian value from `bytes`, which must hold `size` bytes.
#[must_use]
pub fn load_le(bytes: &[u8], size: AccessSize) -> Option<u64> {
    let src = bytes.get(..size.bytes())?;
    let mut buf = [0_u8; 8];
    buf[..src.len()].copy_from_slice(src);
    Some(u64::from_le_bytes(buf))
}

/// Stores the low `size` bytes of `value` little-endian into `bytes`.
///
/// Returns `false` without touching `bytes` when it is shorter than `size`.
pub fn store_le(bytes: &mut [u8], value: u64, size: AccessSize) -> bool {
    let Some(dst) = bytes.get_mut(..size.bytes()) else {
        return false;
    };
    dst.copy_from_slice(&value.to_le_bytes()[..size.bytes()]);
    true
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{load_le, store_le, AccessSize, AccessSizeError, MemTxAttrs, MemTxResult};

    #[rstest]
    #[case(1, AccessSize::Byte, 0xFF)]
    #[case(2, AccessSize::Word, 0xFFFF)]
    #[case(4, AccessSize::Dword, 0xFFFF_FFFF)]
    #[case(8, AccessSize::Qword, u64::MAX)]
    fn accepted_widths_convert_and_mask(
        #[case] bytes: u8,
        #[case] expected: AccessSize,
        #[case] mask: u64,
    ) {
        let size = AccessSize::try_from(bytes).unwrap();
        assert_eq!(size, expected);
        assert_eq!(size.bytes(), usize::from(bytes));
        assert_eq!(size.value_mask(), mask);
    }

    #[test]
    fn other_widths_are_rejected() {
        for bytes in [0_u8, 3, 5, 6, 7, 9, 16, u8::MAX] {
            assert_eq!(AccessSize::from_bytes(bytes), Err(AccessSizeError(bytes)));
        }
    }

    #[test]
    fn little_endian_load_and_store() {
        let mut bytes = [0_u8; 8];
        assert!(store_le(&mut bytes, 0x1122_3344_5566_7788, AccessSize::Dword));
        assert_eq!(bytes, [0x88, 0x77, 0x66, 0x55, 0, 0, 0, 0]);
        assert_eq!(load_le(&bytes, AccessSize::Word), Some(0x7788));
        assert_eq!(load_le(&bytes, AccessSize::Qword), Some(0x5566_7788));
    }

    #[test]
    fn short_buffers_are_not_touched() {
        let mut bytes = [0xAA_u8; 3];
        assert!(!store_le(&mut bytes, 0, AccessSize::Dword));
        assert_eq!(bytes, [0xAA; 3]);
        assert_eq!(load_le(&bytes, AccessSize::Dword), None);
    }

    #[test]
    fn unspecified_attrs_and_status_helpers() {
        assert!(MemTxAttrs::UNSPECIFIED.unspecified);
        assert!(!MemTxAttrs::default().unspecified);
        assert!(MemTxResult::Ok.is_ok());
        assert!(!MemTxResult::Error.is_ok());
        assert!(!MemTxResult::DecodeError.is_ok());
    }
}
