//! Fixed memory window descriptors and the owning registry.

use crate::{decode_granularity, encode_granularity, encode_ways, ConfigError, HostBridgeId};

/// One mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// Required alignment of every window size and base (256 MiB).
pub const WINDOW_SIZE_ALIGN: u64 = 256 * MIB;

/// Window descriptor as supplied by machine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct WindowConfig {
    /// Host-bridge identifiers in interleave order.
    pub targets: Vec<String>,
    /// Window size in bytes.
    pub size: u64,
    /// Interleave granularity in bytes; 256 when absent.
    #[cfg_attr(feature = "serde", serde(default))]
    pub interleave_granularity: Option<u64>,
}

impl WindowConfig {
    /// Creates a descriptor with the default 256-byte granularity.
    #[must_use]
    pub fn new<I, S>(targets: I, size: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            size,
            interleave_granularity: None,
        }
    }

    /// Sets an explicit interleave granularity.
    #[must_use]
    pub const fn with_granularity(mut self, granularity: u64) -> Self {
        self.interleave_granularity = Some(granularity);
        self
    }
}

/// Target list of a window across the two binding phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowTargets {
    /// Symbolic names captured at configuration time.
    Unresolved(Vec<String>),
    /// Names bound to host bridges by the link phase.
    Resolved {
        /// Original identifiers in interleave order.
        names: Vec<String>,
        /// Host bridge for each name, same order.
        host_bridges: Vec<HostBridgeId>,
    },
}

impl Default for WindowTargets {
    fn default() -> Self {
        Self::Unresolved(Vec::new())
    }
}

impl WindowTargets {
    /// Target identifiers in interleave order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        match self {
            Self::Unresolved(names) | Self::Resolved { names, .. } => names,
        }
    }

    /// Bound host bridges, `None` before linking.
    #[must_use]
    pub fn host_bridges(&self) -> Option<&[HostBridgeId]> {
        match self {
            Self::Unresolved(_) => None,
            Self::Resolved { host_bridges, .. } => Some(host_bridges),
        }
    }

    fn into_names(self) -> Vec<String> {
        match self {
            Self::Unresolved(names) | Self::Resolved { names, .. } => names,
        }
    }
}

/// A configured CXL fixed memory window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedWindow {
    base: u64,
    size: u64,
    targets: WindowTargets,
    enc_int_ways: u8,
    enc_int_gran: u8,
}

impl FixedWindow {
    /// Host physical base address.
    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Number of interleave targets.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.targets.names().len()
    }

    /// Target list in its current binding phase.
    #[must_use]
    pub const fn targets(&self) -> &WindowTargets {
        &self.targets
    }

    /// IW encoding of the target count.
    #[must_use]
    pub const fn enc_ways(&self) -> u8 {
        self.enc_int_ways
    }

    /// IG encoding of the window granularity.
    #[must_use]
    pub const fn enc_granularity(&self) -> u8 {
        self.enc_int_gran
    }

    /// Window interleave granularity in bytes.
    #[must_use]
    pub const fn granularity(&self) -> u64 {
        decode_granularity(self.enc_int_gran)
    }

    /// Returns `true` once the link phase bound every target.
    #[must_use]
    pub const fn is_linked(&self) -> bool {
        matches!(self.targets, WindowTargets::Resolved { .. })
    }

    /// Returns `true` when `hpa` lies in `[base, base + size)`.
    #[must_use]
    pub const fn contains(&self, hpa: u64) -> bool {
        hpa >= self.base && hpa - self.base < self.size
    }

    /// Window-relative offset of `hpa`, if it lies inside the window.
    #[must_use]
    pub const fn offset_of(&self, hpa: u64) -> Option<u64> {
        if self.contains(hpa) {
            Some(hpa - self.base)
        } else {
            None
        }
    }

    pub(crate) fn bind(&mut self, host_bridges: Vec<HostBridgeId>) {
        let names = std::mem::take(&mut self.targets).into_names();
        self.targets = WindowTargets::Resolved {
            names,
            host_bridges,
        };
    }
}

/// Ordered collection of fixed memory windows owned by one machine.
///
/// Windows are placed back to back starting at the registry base, in
/// configuration order. A window may end exactly at the top of the 64-bit
/// address space, after which no further window can be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedWindowRegistry {
    windows: Vec<FixedWindow>,
    next_base: Option<u64>,
}

impl Default for FixedWindowRegistry {
    fn default() -> Self {
        Self {
            windows: Vec::new(),
            next_base: Some(0),
        }
    }
}

impl FixedWindowRegistry {
    /// Creates an empty registry whose first window starts at address 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry whose first window starts at `base`
    /// rounded up to [`WINDOW_SIZE_ALIGN`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AddressSpaceExhausted`] when rounding overflows.
    pub const fn with_base(base: u64) -> Result<Self, ConfigError> {
        match base.checked_next_multiple_of(WINDOW_SIZE_ALIGN) {
            Some(next_base) => Ok(Self {
                windows: Vec::new(),
                next_base: Some(next_base),
            }),
            None => Err(ConfigError::AddressSpaceExhausted {
                size: WINDOW_SIZE_ALIGN,
            }),
        }
    }

    /// Validates `config` and appends a window with unresolved targets.
    ///
    /// Nothing is appended when validation fails.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnsupportedWays`] when the target count cannot be
    ///   interleaved.
    /// - [`ConfigError::UnalignedSize`] when the size is zero or not a
    ///   multiple of 256 MiB.
    /// - [`ConfigError::UnsupportedGranularity`] for an invalid granularity.
    /// - [`ConfigError::AddressSpaceExhausted`] when the window does not fit
    ///   below the top of the address space.
    pub fn configure_window(&mut self, config: &WindowConfig) -> Result<&FixedWindow, ConfigError> {
        let enc_int_ways = encode_ways(config.targets.len())?;

        if config.size == 0 || !config.size.is_multiple_of(WINDOW_SIZE_ALIGN) {
            return Err(ConfigError::UnalignedSize { size: config.size });
        }

        let enc_int_gran = match config.interleave_granularity {
            Some(granularity) => encode_granularity(granularity)?,
            None => 0,
        };

        let exhausted = ConfigError::AddressSpaceExhausted { size: config.size };
        let base = self.next_base.ok_or(exhausted)?;
        if config.size - 1 > u64::MAX - base {
            return Err(exhausted);
        }
        let next_base = base.checked_add(config.size);

        tracing::debug!(
            window = self.windows.len(),
            base = format_args!("{base:#x}"),
            size = format_args!("{:#x}", config.size),
            targets = ?config.targets,
            granularity = decode_granularity(enc_int_gran),
            "configured CXL fixed memory window"
        );

        self.next_base = next_base;
        self.windows.push(FixedWindow {
            base,
            size: config.size,
            targets: WindowTargets::Unresolved(config.targets.clone()),
            enc_int_ways,
            enc_int_gran,
        });
        Ok(&self.windows[self.windows.len() - 1])
    }

    /// Windows in configuration order.
    #[must_use]
    pub fn windows(&self) -> &[FixedWindow] {
        &self.windows
    }

    /// Window at `index` in configuration order.
    #[must_use]
    pub fn window(&self, index: usize) -> Option<&FixedWindow> {
        self.windows.get(index)
    }

    /// Number of configured windows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Returns `true` when no window is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Base address the next configured window will receive, `None` once a
    /// window ends at the top of the address space.
    #[must_use]
    pub const fn next_base(&self) -> Option<u64> {
        self.next_base
    }

    /// Finds the window containing `hpa` and its index.
    #[must_use]
    pub fn find_window(&self, hpa: u64) -> Option<(usize, &FixedWindow)> {
        self.windows
            .iter()
            .enumerate()
            .find(|(_, window)| window.contains(hpa))
    }

    pub(crate) fn windows_mut(&mut self) -> &mut [FixedWindow] {
        &mut self.windows
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{FixedWindowRegistry, WindowConfig, WindowTargets, MIB, WINDOW_SIZE_ALIGN};
    use crate::{ConfigError, HostBridgeId};

    #[test]
    fn configure_appends_unresolved_window_at_registry_base() {
        let mut registry = FixedWindowRegistry::new();
        let window = registry
            .configure_window(&WindowConfig::new(["hb0", "hb1"], 256 * MIB))
            .unwrap();

        assert_eq!(window.base(), 0);
        assert_eq!(window.size(), 256 * MIB);
        assert_eq!(window.target_count(), 2);
        assert_eq!(window.enc_ways(), 1);
        assert_eq!(window.enc_granularity(), 0);
        assert_eq!(window.granularity(), 256);
        assert!(!window.is_linked());
        assert_eq!(
            window.targets(),
            &WindowTargets::Unresolved(vec!["hb0".to_string(), "hb1".to_string()])
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn windows_are_laid_out_back_to_back() {
        let mut registry = FixedWindowRegistry::with_base(0x1_0000_0001).unwrap();
        assert_eq!(registry.next_base(), Some(0x1_1000_0000));

        registry
            .configure_window(&WindowConfig::new(["a"], 512 * MIB))
            .unwrap();
        registry
            .configure_window(&WindowConfig::new(["b"], 256 * MIB).with_granularity(4096))
            .unwrap();

        assert_eq!(registry.windows()[0].base(), 0x1_1000_0000);
        assert_eq!(registry.windows()[1].base(), 0x1_3000_0000);
        assert_eq!(registry.windows()[1].enc_granularity(), 4);
        assert_eq!(registry.next_base(), Some(0x1_4000_0000));
    }

    #[rstest]
    #[case(100 * MIB)]
    #[case(WINDOW_SIZE_ALIGN + 1)]
    #[case(WINDOW_SIZE_ALIGN - 1)]
    #[case(0)]
    fn misaligned_sizes_are_rejected(#[case] size: u64) {
        let mut registry = FixedWindowRegistry::new();
        assert_eq!(
            registry.configure_window(&WindowConfig::new(["hb0"], size)),
            Err(ConfigError::UnalignedSize { size })
        );
        assert!(registry.is_empty());
        assert_eq!(registry.next_base(), Some(0));
    }

    #[test]
    fn unsupported_target_count_is_rejected() {
        let mut registry = FixedWindowRegistry::new();
        let targets = ["a", "b", "c", "d", "e"];
        assert_eq!(
            registry.configure_window(&WindowConfig::new(targets, 256 * MIB)),
            Err(ConfigError::UnsupportedWays { ways: 5 })
        );
        assert_eq!(
            registry.configure_window(&WindowConfig::new(Vec::<String>::new(), 256 * MIB)),
            Err(ConfigError::UnsupportedWays { ways: 0 })
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn unsupported_granularity_is_rejected() {
        let mut registry = FixedWindowRegistry::new();
        assert_eq!(
            registry.configure_window(&WindowConfig::new(["a"], 256 * MIB).with_granularity(100)),
            Err(ConfigError::UnsupportedGranularity { granularity: 100 })
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn window_past_top_of_address_space_is_rejected() {
        let top = u64::MAX - (u64::MAX % WINDOW_SIZE_ALIGN);
        let mut registry = FixedWindowRegistry::with_base(top).unwrap();
        assert_eq!(
            registry.configure_window(&WindowConfig::new(["a"], 512 * MIB)),
            Err(ConfigError::AddressSpaceExhausted { size: 512 * MIB })
        );
        assert!(FixedWindowRegistry::with_base(top + 1).is_err());
    }

    #[test]
    fn window_may_end_exactly_at_top_of_address_space() {
        let top = u64::MAX - (WINDOW_SIZE_ALIGN - 1);
        let mut registry = FixedWindowRegistry::with_base(top).unwrap();

        let window = registry
            .configure_window(&WindowConfig::new(["a"], WINDOW_SIZE_ALIGN))
            .unwrap();
        assert_eq!(window.base(), top);
        assert!(window.contains(u64::MAX));
        assert_eq!(registry.next_base(), None);
        assert_eq!(registry.find_window(u64::MAX).map(|(i, _)| i), Some(0));

        assert_eq!(
            registry.configure_window(&WindowConfig::new(["b"], WINDOW_SIZE_ALIGN)),
            Err(ConfigError::AddressSpaceExhausted {
                size: WINDOW_SIZE_ALIGN
            })
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn find_window_uses_half_open_ranges() {
        let mut registry = FixedWindowRegistry::new();
        registry
            .configure_window(&WindowConfig::new(["a"], 256 * MIB))
            .unwrap();
        registry
            .configure_window(&WindowConfig::new(["b"], 256 * MIB))
            .unwrap();

        assert_eq!(registry.find_window(0).map(|(i, _)| i), Some(0));
        assert_eq!(registry.find_window(256 * MIB - 1).map(|(i, _)| i), Some(0));
        assert_eq!(registry.find_window(256 * MIB).map(|(i, _)| i), Some(1));
        assert!(registry.find_window(512 * MIB).is_none());
        assert_eq!(registry.windows()[1].offset_of(256 * MIB + 8), Some(8));
        assert_eq!(registry.windows()[1].offset_of(8), None);
    }

    #[test]
    fn bind_keeps_names_and_records_host_bridges() {
        let mut registry = FixedWindowRegistry::new();
        registry
            .configure_window(&WindowConfig::new(["hb0", "hb1"], 256 * MIB))
            .unwrap();

        registry.windows_mut()[0].bind(vec![HostBridgeId::new(1), HostBridgeId::new(0)]);

        let window = &registry.windows()[0];
        assert!(window.is_linked());
        assert_eq!(window.targets().names(), ["hb0", "hb1"]);
        assert_eq!(
            window.targets().host_bridges(),
            Some(&[HostBridgeId::new(1), HostBridgeId::new(0)][..])
        );
    }
}
