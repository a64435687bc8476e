//! Core types for the tunnel bridge manager.

use crate::tables::TunnelTable;

/// ICMPv6 router advertisement message type.
pub const ICMPV6_TYPE_RA: u8 = 134;

/// Overlay tunnel encapsulation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TunnelType {
    /// GRE encapsulation.
    Gre,
    /// VXLAN encapsulation.
    Vxlan,
}

impl TunnelType {
    /// Type name as carried in topology events.
    pub fn as_str(&self) -> &'static str {
        match self {
            TunnelType::Gre => "gre",
            TunnelType::Vxlan => "vxlan",
        }
    }

    /// The provisioning table for tunnels of this type.
    pub fn tun_table(&self) -> TunnelTable {
        match self {
            TunnelType::Gre => TunnelTable::GreTunToLv,
            TunnelType::Vxlan => TunnelTable::VxlanTunToLv,
        }
    }
}

impl std::str::FromStr for TunnelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gre" => Ok(TunnelType::Gre),
            "vxlan" => Ok(TunnelType::Vxlan),
            other => Err(format!("unknown tunnel type: {}", other)),
        }
    }
}

/// A tenant network's binding to a locally-significant VLAN tag.
///
/// Created when the network is first bound on this node, destroyed when
/// its last local user goes away. Both directions of the mapping are
/// unique at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVlanMapping {
    /// Encapsulation of the tenant network.
    pub network_type: TunnelType,
    /// Overlay segmentation ID (e.g. VXLAN VNI).
    pub segmentation_id: u64,
    /// Local VLAN tag multiplexing the network on this bridge.
    pub local_vlan: u16,
    /// Whether DVR routing applies (provisioning bypasses MAC learning).
    pub distributed: bool,
}

/// Flood domain for one local VLAN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloodGroup {
    /// Tunnel ID flooded frames are tagged with.
    pub tun_id: u64,
    /// Egress tunnel ports, in caller-supplied order.
    pub ports: Vec<u32>,
}

/// Known-unicast binding of a MAC to a tunnel port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnicastEntry {
    /// Egress tunnel port.
    pub port: u32,
    /// Tunnel ID frames are tagged with.
    pub tun_id: u64,
}
