//! CXL type-3 memory expander with volatile backing store.
//!
//! The device owns its own HDM decoder. An incoming host physical address is
//! rebased onto the decoder range and the interleave bits selecting other
//! devices are squeezed out to form the device physical address (DPA).

use std::fmt;

use crate::{
    is_three_way_multiple, load_le, store_le, AccessSize, CxlEndpoint, HdmDecoderRegisters,
    MemTxAttrs, MemTxResult, PciFunction, MAX_GRANULARITY_ENCODING,
};

/// Log2 of the smallest interleave granularity.
const GRANULARITY_SHIFT: u32 = 8;

/// Type-3 endpoint with zero-initialized volatile memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Type3Device {
    memory: Box<[u8]>,
    hdm: HdmDecoderRegisters,
}

impl fmt::Debug for Type3Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Type3Device")
            .field("memory_size", &self.memory.len())
            .field("hdm", &self.hdm)
            .finish()
    }
}

impl Type3Device {
    /// Creates a device with `memory_size` bytes of zeroed memory and an
    /// uncommitted decoder.
    #[must_use]
    pub fn new(memory_size: usize) -> Self {
        Self {
            memory: vec![0; memory_size].into_boxed_slice(),
            hdm: HdmDecoderRegisters::new(),
        }
    }

    /// Volatile memory capacity in bytes.
    #[must_use]
    pub fn memory_size(&self) -> usize {
        self.memory.len()
    }

    /// Backing store, indexed by DPA.
    #[must_use]
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Decoder register block.
    #[must_use]
    pub const fn hdm(&self) -> &HdmDecoderRegisters {
        &self.hdm
    }

    /// Decoder register block.
    #[must_use]
    pub fn hdm_mut(&mut self) -> &mut HdmDecoderRegisters {
        &mut self.hdm
    }

    /// Translates a host physical address to a device physical address.
    ///
    /// Returns `None` when the decoder is not committed, `hpa` falls outside
    /// the decoded range, or the decoder holds an unassigned encoding.
    #[must_use]
    pub fn translate(&self, hpa: u64) -> Option<u64> {
        let state = self.hdm.snapshot();
        if !state.committed || state.enc_granularity > MAX_GRANULARITY_ENCODING {
            return None;
        }
        let offset = hpa.checked_sub(self.hdm.base())?;
        if offset >= self.hdm.size() {
            return None;
        }

        let chunk_shift = GRANULARITY_SHIFT + u32::from(state.enc_granularity);
        let low = offset & ((1_u64 << chunk_shift) - 1);
        let high = match state.enc_ways {
            iw @ 0..=4 => offset >> (chunk_shift + u32::from(iw)),
            iw if is_three_way_multiple(iw) => (offset >> (chunk_shift + u32::from(iw - 8))) / 3,
            _ => return None,
        };
        Some(low | (high << chunk_shift))
    }

    fn backing(&mut self, hpa: u64, size: AccessSize) -> Option<&mut [u8]> {
        let dpa = usize::try_from(self.translate(hpa)?).ok()?;
        let end = dpa.checked_add(size.bytes())?;
        self.memory.get_mut(dpa..end)
    }
}

impl CxlEndpoint for Type3Device {
    fn sized_read(&mut self, hpa: u64, size: AccessSize, _attrs: MemTxAttrs) -> (u64, MemTxResult) {
        self.backing(hpa, size)
            .and_then(|bytes| load_le(bytes, size))
            .map_or((0, MemTxResult::Error), |value| (value, MemTxResult::Ok))
    }

    fn sized_write(
        &mut self,
        hpa: u64,
        value: u64,
        size: AccessSize,
        _attrs: MemTxAttrs,
    ) -> MemTxResult {
        match self.backing(hpa, size) {
            Some(bytes) => {
                if store_le(bytes, value, size) {
                    MemTxResult::Ok
                } else {
                    MemTxResult::Error
                }
            }
            None => MemTxResult::Error,
        }
    }
}

impl PciFunction for Type3Device {
    fn as_cxl_endpoint(&mut self) -> Option<&mut dyn CxlEndpoint> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::Type3Device;
    use crate::{
        AccessSize, CxlEndpoint, HdmDecoderConfig, MemTxAttrs, MemTxResult, TargetPortList, MIB,
    };

    fn committed(base: u64, ways: usize, granularity: u64) -> Type3Device {
        let mut device = Type3Device::new(4096);
        device
            .hdm_mut()
            .commit(&HdmDecoderConfig {
                base,
                size: 256 * MIB,
                ways,
                granularity,
                target_ports: TargetPortList::default(),
                lock_on_commit: false,
            })
            .unwrap();
        device
    }

    #[test]
    fn uncommitted_device_rejects_accesses() {
        let mut device = Type3Device::new(64);
        assert_eq!(device.translate(0), None);
        assert_eq!(
            device.sized_read(0, AccessSize::Byte, MemTxAttrs::default()),
            (0, MemTxResult::Error)
        );
        assert_eq!(
            device.sized_write(0, 1, AccessSize::Byte, MemTxAttrs::default()),
            MemTxResult::Error
        );
    }

    #[rstest]
    #[case(1, 256, 0x123, 0x123)]
    #[case(2, 256, 0x000, 0x000)]
    #[case(2, 256, 0x0FF, 0x0FF)]
    #[case(2, 256, 0x200, 0x100)]
    #[case(2, 256, 0x2FF, 0x1FF)]
    #[case(4, 1024, 0x1000, 0x400)]
    #[case(4, 1024, 0x1234, 0x634)]
    fn power_of_two_ways_drop_interleave_bits(
        #[case] ways: usize,
        #[case] granularity: u64,
        #[case] offset: u64,
        #[case] dpa: u64,
    ) {
        let device = committed(256 * MIB, ways, granularity);
        assert_eq!(device.translate(256 * MIB + offset), Some(dpa));
    }

    #[rstest]
    #[case(3, 0x000, 0x000)]
    #[case(3, 0x300, 0x100)]
    #[case(3, 0x6FF, 0x2FF)]
    #[case(6, 0x600, 0x100)]
    #[case(12, 0xC00, 0x100)]
    fn three_way_multiples_divide_the_chunk_index(
        #[case] ways: usize,
        #[case] offset: u64,
        #[case] dpa: u64,
    ) {
        let device = committed(0, ways, 256);
        assert_eq!(device.translate(offset), Some(dpa));
    }

    #[test]
    fn addresses_outside_decoder_range_do_not_translate() {
        let device = committed(256 * MIB, 1, 256);
        assert_eq!(device.translate(256 * MIB - 1), None);
        assert_eq!(device.translate(512 * MIB), None);
    }

    #[test]
    fn unaligned_little_endian_round_trip() {
        let mut device = committed(0, 1, 256);
        let attrs = MemTxAttrs::default();

        assert_eq!(
            device.sized_write(3, 0x0102_0304_0506_0708, AccessSize::Qword, attrs),
            MemTxResult::Ok
        );
        assert_eq!(&device.memory()[3..11], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(
            device.sized_read(5, AccessSize::Word, attrs),
            (0x0506, MemTxResult::Ok)
        );
    }

    #[test]
    fn access_past_end_of_memory_fails_without_partial_write() {
        let mut device = committed(0, 1, 256);
        let attrs = MemTxAttrs::default();

        assert_eq!(
            device.sized_write(4094, u64::MAX, AccessSize::Dword, attrs),
            MemTxResult::Error
        );
        assert!(device.memory().iter().all(|byte| *byte == 0));
        assert_eq!(
            device.sized_read(4096, AccessSize::Byte, attrs),
            (0, MemTxResult::Error)
        );
    }

    #[test]
    fn device_exposes_endpoint_capability() {
        use crate::PciFunction;

        let mut device = Type3Device::new(16);
        assert!(device.as_cxl_endpoint().is_some());
    }
}
