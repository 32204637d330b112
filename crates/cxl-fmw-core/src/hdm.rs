//! HDM decoder 0 register block and decode-time snapshot.
//!
//! The same block layout backs both host-bridge decoders (which select a
//! root port) and endpoint decoders (which translate HPA to DPA). Offsets are
//! relative to the HDM decoder capability structure.

use crate::{decode_granularity, decode_ways, encode_granularity, encode_ways, ConfigError};

/// Offset of decoder 0 `BASE_LO`.
pub const HDM_DECODER0_BASE_LO: u16 = 0x10;
/// Offset of decoder 0 `BASE_HI`.
pub const HDM_DECODER0_BASE_HI: u16 = 0x14;
/// Offset of decoder 0 `SIZE_LO`.
pub const HDM_DECODER0_SIZE_LO: u16 = 0x18;
/// Offset of decoder 0 `SIZE_HI`.
pub const HDM_DECODER0_SIZE_HI: u16 = 0x1C;
/// Offset of decoder 0 `CTRL`.
pub const HDM_DECODER0_CTRL: u16 = 0x20;
/// Offset of decoder 0 `TARGET_LIST_LO` (interleave indices 0..=3).
pub const HDM_DECODER0_TARGET_LIST_LO: u16 = 0x24;
/// Offset of decoder 0 `TARGET_LIST_HI` (interleave indices 4..=7).
pub const HDM_DECODER0_TARGET_LIST_HI: u16 = 0x28;

/// `CTRL` interleave granularity field (`IG`, bits 3..0).
pub const HDM_CTRL_IG_MASK: u32 = 0x0000_000F;
/// `CTRL` interleave ways field (`IW`, bits 7..4).
pub const HDM_CTRL_IW_MASK: u32 = 0x0000_00F0;
/// Bit position of the `IW` field.
pub const HDM_CTRL_IW_SHIFT: u32 = 4;
/// `CTRL` lock-on-commit bit.
pub const HDM_CTRL_LOCK_ON_COMMIT: u32 = 1 << 8;
/// `CTRL` commit request bit.
pub const HDM_CTRL_COMMIT: u32 = 1 << 9;
/// `CTRL` committed status bit (read-only).
pub const HDM_CTRL_COMMITTED: u32 = 1 << 10;
/// `CTRL` commit error status bit (read-only).
pub const HDM_CTRL_ERR: u32 = 1 << 11;
/// `CTRL` target type bit (device-coherent vs. host-only).
pub const HDM_CTRL_TYPE: u32 = 1 << 12;

const HDM_CTRL_WRITABLE_MASK: u32 =
    HDM_CTRL_IG_MASK | HDM_CTRL_IW_MASK | HDM_CTRL_LOCK_ON_COMMIT | HDM_CTRL_COMMIT | HDM_CTRL_TYPE;

/// Implemented bits of `BASE_LO`/`SIZE_LO`; decoders are 256 MiB aligned.
pub const HDM_DECODER_ADDR_LO_MASK: u32 = 0xF000_0000;

const HDM_DECODER_RANGE_ALIGN: u64 = 1 << HDM_DECODER_ADDR_LO_MASK.trailing_zeros();

/// Number of entries in a packed target-port list.
pub const TARGET_PORT_LIST_LEN: usize = 8;

/// Ordered root-port numbers selected by interleave index.
///
/// Entries `0..=3` live in `TARGET_LIST_LO`, `4..=7` in `TARGET_LIST_HI`,
/// one byte per entry, lowest entry in the least significant byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TargetPortList([u8; TARGET_PORT_LIST_LEN]);

impl TargetPortList {
    /// Builds a list from explicit port numbers.
    #[must_use]
    pub const fn new(ports: [u8; TARGET_PORT_LIST_LEN]) -> Self {
        Self(ports)
    }

    /// Unpacks the `TARGET_LIST_LO`/`TARGET_LIST_HI` register pair.
    #[must_use]
    pub const fn from_words(lo: u32, hi: u32) -> Self {
        let [p0, p1, p2, p3] = lo.to_le_bytes();
        let [p4, p5, p6, p7] = hi.to_le_bytes();
        Self([p0, p1, p2, p3, p4, p5, p6, p7])
    }

    /// Packs the list back into `(TARGET_LIST_LO, TARGET_LIST_HI)`.
    #[must_use]
    pub const fn to_words(self) -> (u32, u32) {
        let [p0, p1, p2, p3, p4, p5, p6, p7] = self.0;
        (
            u32::from_le_bytes([p0, p1, p2, p3]),
            u32::from_le_bytes([p4, p5, p6, p7]),
        )
    }

    /// Returns the port for an interleave index, `None` past the last entry.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<u8> {
        self.0.get(index).copied()
    }

    /// Returns all entries in interleave order.
    #[must_use]
    pub const fn ports(&self) -> &[u8; TARGET_PORT_LIST_LEN] {
        &self.0
    }
}

/// Consistent view of decoder 0 taken at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct HdmDecoderState {
    /// `CTRL.COMMITTED`.
    pub committed: bool,
    /// `CTRL.IG` encoding.
    pub enc_granularity: u8,
    /// `CTRL.IW` encoding.
    pub enc_ways: u8,
    /// Unpacked target-port list.
    pub target_ports: TargetPortList,
}

impl HdmDecoderState {
    /// Decoded interleave granularity in bytes.
    #[must_use]
    pub const fn granularity(&self) -> u64 {
        decode_granularity(self.enc_granularity)
    }

    /// Decoded interleave ways, `None` for an unassigned `IW` encoding.
    #[must_use]
    pub fn ways(&self) -> Option<usize> {
        decode_ways(self.enc_ways)
    }
}

/// Programming request for [`HdmDecoderRegisters::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HdmDecoderConfig {
    /// Decoded HPA base; must be 256 MiB aligned.
    pub base: u64,
    /// Decoded HPA range size; must be a multiple of 256 MiB.
    pub size: u64,
    /// Interleave ways.
    pub ways: usize,
    /// Interleave granularity in bytes.
    pub granularity: u64,
    /// Root-port numbers by interleave index (host bridges only).
    pub target_ports: TargetPortList,
    /// Freeze the register block once committed.
    pub lock_on_commit: bool,
}

/// Register storage for HDM decoder 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct HdmDecoderRegisters {
    base_lo: u32,
    base_hi: u32,
    size_lo: u32,
    size_hi: u32,
    ctrl: u32,
    target_list_lo: u32,
    target_list_hi: u32,
}

impl HdmDecoderRegisters {
    /// Creates an uncommitted, zeroed register block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a 32-bit register. Unimplemented offsets read as zero.
    #[must_use]
    pub const fn read(&self, offset: u16) -> u32 {
        match offset {
            HDM_DECODER0_BASE_LO => self.base_lo,
            HDM_DECODER0_BASE_HI => self.base_hi,
            HDM_DECODER0_SIZE_LO => self.size_lo,
            HDM_DECODER0_SIZE_HI => self.size_hi,
            HDM_DECODER0_CTRL => self.ctrl,
            HDM_DECODER0_TARGET_LIST_LO => self.target_list_lo,
            HDM_DECODER0_TARGET_LIST_HI => self.target_list_hi,
            _ => 0,
        }
    }

    /// Writes a 32-bit register.
    ///
    /// Setting `CTRL.COMMIT` commits the decoder (`COMMITTED=1`, `ERR=0`,
    /// `COMMIT` self-clears). Writing `CTRL` without `COMMIT` uncommits it.
    /// A committed decoder with `LOCK_ON_COMMIT` ignores every write.
    pub const fn write(&mut self, offset: u16, value: u32) {
        if self.is_locked() {
            return;
        }
        match offset {
            HDM_DECODER0_BASE_LO => self.base_lo = value & HDM_DECODER_ADDR_LO_MASK,
            HDM_DECODER0_BASE_HI => self.base_hi = value,
            HDM_DECODER0_SIZE_LO => self.size_lo = value & HDM_DECODER_ADDR_LO_MASK,
            HDM_DECODER0_SIZE_HI => self.size_hi = value,
            HDM_DECODER0_CTRL => {
                let mut ctrl = value & HDM_CTRL_WRITABLE_MASK;
                if ctrl & HDM_CTRL_COMMIT != 0 {
                    ctrl = (ctrl & !HDM_CTRL_COMMIT) | HDM_CTRL_COMMITTED;
                }
                self.ctrl = ctrl;
            }
            HDM_DECODER0_TARGET_LIST_LO => self.target_list_lo = value,
            HDM_DECODER0_TARGET_LIST_HI => self.target_list_hi = value,
            _ => {}
        }
    }

    /// Programs and commits the decoder through the register interface.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::DecoderLocked`] when the decoder is committed with
    ///   lock-on-commit.
    /// - [`ConfigError::UnalignedDecoderRange`] when `base` or `size` is not
    ///   256 MiB aligned.
    /// - [`ConfigError::UnsupportedWays`] or
    ///   [`ConfigError::UnsupportedGranularity`] when the interleave cannot be
    ///   encoded.
    ///
    /// The register block is untouched on error.
    pub fn commit(&mut self, config: &HdmDecoderConfig) -> Result<(), ConfigError> {
        if self.is_locked() {
            return Err(ConfigError::DecoderLocked);
        }
        if !config.base.is_multiple_of(HDM_DECODER_RANGE_ALIGN)
            || !config.size.is_multiple_of(HDM_DECODER_RANGE_ALIGN)
        {
            return Err(ConfigError::UnalignedDecoderRange {
                base: config.base,
                size: config.size,
            });
        }
        let iw = encode_ways(config.ways)?;
        let ig = encode_granularity(config.granularity)?;
        let (list_lo, list_hi) = config.target_ports.to_words();

        self.write(HDM_DECODER0_BASE_LO, low_word(config.base));
        self.write(HDM_DECODER0_BASE_HI, high_word(config.base));
        self.write(HDM_DECODER0_SIZE_LO, low_word(config.size));
        self.write(HDM_DECODER0_SIZE_HI, high_word(config.size));
        self.write(HDM_DECODER0_TARGET_LIST_LO, list_lo);
        self.write(HDM_DECODER0_TARGET_LIST_HI, list_hi);

        let mut ctrl =
            u32::from(ig) | (u32::from(iw) << HDM_CTRL_IW_SHIFT) | HDM_CTRL_COMMIT;
        if config.lock_on_commit {
            ctrl |= HDM_CTRL_LOCK_ON_COMMIT;
        }
        self.write(HDM_DECODER0_CTRL, ctrl);
        Ok(())
    }

    /// Returns `true` when `CTRL.COMMITTED` is set.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        self.ctrl & HDM_CTRL_COMMITTED != 0
    }

    /// Returns `true` when the block is committed with lock-on-commit.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.is_committed() && self.ctrl & HDM_CTRL_LOCK_ON_COMMIT != 0
    }

    /// Decoded HPA base.
    #[must_use]
    pub const fn base(&self) -> u64 {
        ((self.base_hi as u64) << 32) | self.base_lo as u64
    }

    /// Decoded HPA range size.
    #[must_use]
    pub const fn size(&self) -> u64 {
        ((self.size_hi as u64) << 32) | self.size_lo as u64
    }

    /// Copies out the fields consulted by address decode.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn snapshot(&self) -> HdmDecoderState {
        HdmDecoderState {
            committed: self.is_committed(),
            enc_granularity: (self.ctrl & HDM_CTRL_IG_MASK) as u8,
            enc_ways: ((self.ctrl & HDM_CTRL_IW_MASK) >> HDM_CTRL_IW_SHIFT) as u8,
            target_ports: TargetPortList::from_words(self.target_list_lo, self.target_list_hi),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn low_word(value: u64) -> u32 {
    value as u32
}

const fn high_word(value: u64) -> u32 {
    (value >> 32) as u32
}
