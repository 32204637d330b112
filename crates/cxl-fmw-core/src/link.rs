//! Link phase: binds symbolic window targets to host bridges.

use crate::{FixedWindowRegistry, LinkError, Topology};

impl FixedWindowRegistry {
    /// Resolves every unresolved window target to a CXL host bridge.
    ///
    /// Must run after every host bridge has been added to `topology` and
    /// before any access is dispatched. Windows are bound all-or-nothing: a
    /// window whose targets do not all resolve stays unresolved, and accesses
    /// to it miss. Windows bound by an earlier call are left untouched, so
    /// calling this again after success is a no-op.
    ///
    /// Accesses must be dispatched against the same `topology`; a bound
    /// reference that names a different bridge there decodes as
    /// [`DecodeMiss::UnknownHostBridge`](crate::DecodeMiss::UnknownHostBridge).
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::UnresolvedTarget`] for the first target name that
    /// does not name a CXL host bridge; later windows are not visited.
    pub fn link_targets(&mut self, topology: &Topology) -> Result<(), LinkError> {
        for (index, window) in self.windows_mut().iter_mut().enumerate() {
            if window.is_linked() {
                continue;
            }

            let host_bridges = window
                .targets()
                .names()
                .iter()
                .map(|name| {
                    topology.resolve_cxl_host_bridge(name).ok_or_else(|| {
                        tracing::warn!(
                            window = index,
                            target = %name,
                            "unresolved CXL fixed memory window target"
                        );
                        LinkError::UnresolvedTarget {
                            window: index,
                            target: name.clone(),
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            tracing::info!(
                window = index,
                base = format_args!("{:#x}", window.base()),
                targets = ?window.targets().names(),
                "linked CXL fixed memory window targets"
            );
            window.bind(host_bridges);
        }
        Ok(())
    }
}
