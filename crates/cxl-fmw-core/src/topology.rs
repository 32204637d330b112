//! Host bridges, root ports and the devices below them.
//!
//! This is the minimal slice of a PCIe hierarchy the window decoder walks:
//! host bridge -> root bus -> root port (by port number) -> secondary bus
//! slot 0. The topology owns every entity; windows refer to host bridges
//! through [`HostBridgeId`] only.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::{CxlEndpoint, HdmDecoderRegisters, HdmDecoderState, TopologyError};

/// Non-owning reference to a host bridge inside a [`Topology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostBridgeId(usize);

impl HostBridgeId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Arena index of the host bridge.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Host bridge flavour; only CXL bridges can back a fixed memory window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum HostBridgeKind {
    /// CXL-capable expander bridge.
    Cxl,
    /// Plain PCIe expander bridge.
    Pci,
}

/// A function that can sit on a secondary bus.
pub trait PciFunction {
    /// Returns the CXL.mem endpoint view of this function, if it has one.
    fn as_cxl_endpoint(&mut self) -> Option<&mut dyn CxlEndpoint> {
        None
    }
}

/// Bus behind a root port, holding functions by devfn.
#[derive(Default)]
pub struct SecondaryBus {
    devices: BTreeMap<u8, Box<dyn PciFunction>>,
}

impl fmt::Debug for SecondaryBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondaryBus")
            .field("occupied_devfns", &self.devices.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SecondaryBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `device` at `devfn`, returning whatever occupied it before.
    pub fn attach(
        &mut self,
        devfn: u8,
        device: Box<dyn PciFunction>,
    ) -> Option<Box<dyn PciFunction>> {
        self.devices.insert(devfn, device)
    }

    /// Removes the function at `devfn`.
    pub fn detach(&mut self, devfn: u8) -> Option<Box<dyn PciFunction>> {
        self.devices.remove(&devfn)
    }

    /// Function at `devfn`.
    #[must_use]
    pub fn device_mut(&mut self, devfn: u8) -> Option<&mut (dyn PciFunction + 'static)> {
        self.devices.get_mut(&devfn).map(|device| &mut **device)
    }
}

/// Root port identified by its PCIe port number.
#[derive(Debug)]
pub struct RootPort {
    port_number: u8,
    secondary_bus: Option<SecondaryBus>,
}

impl RootPort {
    /// Creates a root port with nothing linked below it.
    #[must_use]
    pub const fn new(port_number: u8) -> Self {
        Self {
            port_number,
            secondary_bus: None,
        }
    }

    /// PCIe port number (Link Capabilities register).
    #[must_use]
    pub const fn port_number(&self) -> u8 {
        self.port_number
    }

    /// Attaches a secondary bus, replacing any existing one.
    #[must_use]
    pub fn with_secondary_bus(mut self, bus: SecondaryBus) -> Self {
        self.secondary_bus = Some(bus);
        self
    }

    /// Bus behind this port, if linked.
    #[must_use]
    pub fn secondary_bus_mut(&mut self) -> Option<&mut SecondaryBus> {
        self.secondary_bus.as_mut()
    }
}

/// Primary bus of a host bridge.
#[derive(Debug)]
pub struct RootBus {
    cxl: bool,
    ports: Vec<RootPort>,
}

impl RootBus {
    /// Creates a CXL root bus.
    #[must_use]
    pub const fn cxl() -> Self {
        Self {
            cxl: true,
            ports: Vec::new(),
        }
    }

    /// Creates a plain PCIe root bus.
    #[must_use]
    pub const fn pcie() -> Self {
        Self {
            cxl: false,
            ports: Vec::new(),
        }
    }

    /// Returns `true` for a CXL root bus.
    #[must_use]
    pub const fn is_cxl(&self) -> bool {
        self.cxl
    }

    /// Adds a root port to the bus.
    #[must_use]
    pub fn with_port(mut self, port: RootPort) -> Self {
        self.ports.push(port);
        self
    }

    /// Adds a root port to the bus.
    pub fn add_port(&mut self, port: RootPort) {
        self.ports.push(port);
    }

    /// First root port whose port number is `port_number`.
    #[must_use]
    pub fn find_port_mut(&mut self, port_number: u8) -> Option<&mut RootPort> {
        self.ports
            .iter_mut()
            .find(|port| port.port_number == port_number)
    }
}

/// A host bridge with its single HDM decoder and optional root bus.
#[derive(Debug)]
pub struct HostBridge {
    name: String,
    kind: HostBridgeKind,
    hdm: HdmDecoderRegisters,
    root_bus: Option<RootBus>,
}

impl HostBridge {
    /// Creates a host bridge with an uncommitted decoder and no root bus.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: HostBridgeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            hdm: HdmDecoderRegisters::new(),
            root_bus: None,
        }
    }

    /// Attaches the primary bus.
    #[must_use]
    pub fn with_root_bus(mut self, bus: RootBus) -> Self {
        self.root_bus = Some(bus);
        self
    }

    /// Identifier used by window target lists.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bridge flavour.
    #[must_use]
    pub const fn kind(&self) -> HostBridgeKind {
        self.kind
    }

    /// Decoder register block.
    #[must_use]
    pub const fn hdm(&self) -> &HdmDecoderRegisters {
        &self.hdm
    }

    /// Decoder register block, for the bridge's own configuration interface.
    #[must_use]
    pub fn hdm_mut(&mut self) -> &mut HdmDecoderRegisters {
        &mut self.hdm
    }

    /// Consistent snapshot of decoder 0.
    #[must_use]
    pub const fn hdm_snapshot(&self) -> HdmDecoderState {
        self.hdm.snapshot()
    }

    /// Primary bus.
    #[must_use]
    pub const fn root_bus(&self) -> Option<&RootBus> {
        self.root_bus.as_ref()
    }

    /// Primary bus.
    #[must_use]
    pub fn root_bus_mut(&mut self) -> Option<&mut RootBus> {
        self.root_bus.as_mut()
    }
}

/// Owner of all host bridges and the hierarchy below them.
#[derive(Debug, Default)]
pub struct Topology {
    host_bridges: Vec<HostBridge>,
    by_name: HashMap<String, HostBridgeId>,
}

impl Topology {
    /// Creates an empty topology.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a host bridge and returns its reference.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::DuplicateName`] when the name is taken.
    pub fn add_host_bridge(&mut self, bridge: HostBridge) -> Result<HostBridgeId, TopologyError> {
        if self.by_name.contains_key(bridge.name()) {
            return Err(TopologyError::DuplicateName {
                name: bridge.name().to_string(),
            });
        }
        let id = HostBridgeId::new(self.host_bridges.len());
        self.by_name.insert(bridge.name().to_string(), id);
        self.host_bridges.push(bridge);
        Ok(id)
    }

    /// Host bridge registered under `name`, of any kind.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<HostBridgeId> {
        self.by_name.get(name).copied()
    }

    /// Host bridge registered under `name` if it is CXL-capable.
    #[must_use]
    pub fn resolve_cxl_host_bridge(&self, name: &str) -> Option<HostBridgeId> {
        self.lookup(name)
            .filter(|id| self.host_bridges[id.index()].kind == HostBridgeKind::Cxl)
    }

    /// Host bridge behind `id`.
    #[must_use]
    pub fn host_bridge(&self, id: HostBridgeId) -> Option<&HostBridge> {
        self.host_bridges.get(id.index())
    }

    /// Host bridge behind `id`.
    #[must_use]
    pub fn host_bridge_mut(&mut self, id: HostBridgeId) -> Option<&mut HostBridge> {
        self.host_bridges.get_mut(id.index())
    }

    /// Number of host bridges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.host_bridges.len()
    }

    /// Returns `true` when no host bridge exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.host_bridges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        HostBridge, HostBridgeKind, PciFunction, RootBus, RootPort, SecondaryBus, Topology,
    };
    use crate::TopologyError;

    struct PlainFunction;

    impl PciFunction for PlainFunction {}

    #[test]
    fn host_bridges_are_indexed_in_insertion_order() {
        let mut topology = Topology::new();
        let hb0 = topology
            .add_host_bridge(HostBridge::new("hb0", HostBridgeKind::Cxl))
            .unwrap();
        let hb1 = topology
            .add_host_bridge(HostBridge::new("hb1", HostBridgeKind::Cxl))
            .unwrap();

        assert_eq!(hb0.index(), 0);
        assert_eq!(hb1.index(), 1);
        assert_eq!(topology.lookup("hb1"), Some(hb1));
        assert_eq!(topology.host_bridge(hb0).unwrap().name(), "hb0");
        assert_eq!(topology.len(), 2);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut topology = Topology::new();
        topology
            .add_host_bridge(HostBridge::new("hb0", HostBridgeKind::Cxl))
            .unwrap();
        assert_eq!(
            topology.add_host_bridge(HostBridge::new("hb0", HostBridgeKind::Pci)),
            Err(TopologyError::DuplicateName {
                name: "hb0".to_string()
            })
        );
        assert_eq!(topology.len(), 1);
    }

    #[test]
    fn cxl_resolution_filters_by_kind() {
        let mut topology = Topology::new();
        let cxl = topology
            .add_host_bridge(HostBridge::new("cxl.0", HostBridgeKind::Cxl))
            .unwrap();
        let pci = topology
            .add_host_bridge(HostBridge::new("pxb.0", HostBridgeKind::Pci))
            .unwrap();

        assert_eq!(topology.resolve_cxl_host_bridge("cxl.0"), Some(cxl));
        assert_eq!(topology.lookup("pxb.0"), Some(pci));
        assert_eq!(topology.resolve_cxl_host_bridge("pxb.0"), None);
        assert_eq!(topology.resolve_cxl_host_bridge("missing"), None);
    }

    #[test]
    fn root_port_lookup_is_by_port_number() {
        let mut bus = RootBus::cxl()
            .with_port(RootPort::new(2))
            .with_port(RootPort::new(7).with_secondary_bus(SecondaryBus::new()));
        assert!(bus.is_cxl());
        assert!(bus.find_port_mut(0).is_none());
        assert!(bus.find_port_mut(2).unwrap().secondary_bus_mut().is_none());
        assert!(bus.find_port_mut(7).unwrap().secondary_bus_mut().is_some());
    }

    #[test]
    fn secondary_bus_attach_replaces_and_detach_empties() {
        let mut bus = SecondaryBus::new();
        assert!(bus.attach(0, Box::new(PlainFunction)).is_none());
        assert!(bus.attach(0, Box::new(PlainFunction)).is_some());
        assert!(bus.device_mut(0).unwrap().as_cxl_endpoint().is_none());
        assert!(bus.detach(0).is_some());
        assert!(bus.device_mut(0).is_none());
    }
}
