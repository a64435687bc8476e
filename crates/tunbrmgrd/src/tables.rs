//! Pipeline table identifiers for the tunnel bridge.
//!
//! The stage wiring is fixed at bootstrap; feature managers only add and
//! remove rules *within* their own stage. Keeping the identifiers in a
//! closed enum prevents stage-wiring drift as features are added.

/// Processing stages of the tunnel bridge pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TunnelTable {
    /// Table 0: ingress classification by in_port.
    LocalSwitching = 0,
    /// DVR processing for traffic arriving from the integration bridge.
    DvrProcess = 1,
    /// Dispatch for traffic from the patch port, split by dst MAC class.
    PatchLvToTun = 2,
    /// GRE segmentation-id to local-VLAN provisioning.
    GreTunToLv = 3,
    /// VXLAN segmentation-id to local-VLAN provisioning.
    VxlanTunToLv = 4,
    /// DVR-sourced traffic that must bypass MAC learning.
    DvrNotLearn = 9,
    /// MAC learning on tunnel ingress.
    LearnFromTun = 10,
    /// Known-unicast forwarding out over tunnels.
    UcastToTun = 20,
    /// Local ARP reply synthesis.
    ArpResponder = 21,
    /// Broadcast/multicast/unknown-unicast flooding.
    FloodToTun = 22,
}

impl TunnelTable {
    /// The numeric table identifier on the switch.
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for TunnelTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Hard timeout, in seconds, for reciprocal unicast rules produced by the
/// switch-native learn action.
pub const LEARN_HARD_TIMEOUT_SECS: u32 = 300;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ids_are_wire_values() {
        assert_eq!(TunnelTable::LocalSwitching.id(), 0);
        assert_eq!(TunnelTable::DvrProcess.id(), 1);
        assert_eq!(TunnelTable::PatchLvToTun.id(), 2);
        assert_eq!(TunnelTable::GreTunToLv.id(), 3);
        assert_eq!(TunnelTable::VxlanTunToLv.id(), 4);
        assert_eq!(TunnelTable::DvrNotLearn.id(), 9);
        assert_eq!(TunnelTable::LearnFromTun.id(), 10);
        assert_eq!(TunnelTable::UcastToTun.id(), 20);
        assert_eq!(TunnelTable::ArpResponder.id(), 21);
        assert_eq!(TunnelTable::FloodToTun.id(), 22);
    }

    #[test]
    fn test_display() {
        assert_eq!(TunnelTable::FloodToTun.to_string(), "22");
    }
}
