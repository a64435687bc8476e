//! Action-string builders for tunnel bridge flow rules.
//!
//! Every action list a manager installs is rendered here, so the exact
//! wire syntax (including the numeric EUI-48 / IPv4 register encodings in
//! the ARP responder) lives in one place.

use std::net::Ipv4Addr;

use ovstun_flow_common::MacAddress;

use crate::tables::{TunnelTable, LEARN_HARD_TIMEOUT_SECS};

/// The drop action.
pub const DROP: &str = "drop";

/// Resubmit to another pipeline table.
pub fn resubmit(table: TunnelTable) -> String {
    format!("resubmit(,{})", table.id())
}

/// Output to a single port.
pub fn output(port: u32) -> String {
    format!("output:{}", port)
}

/// Rewrite incoming tunnel traffic onto a local VLAN and hand it to the
/// next stage (learning, or DVR bypass for distributed networks).
pub fn build_provision_actions(local_vlan: u16, next_table: TunnelTable) -> String {
    format!("mod_vlan_vid:{},{}", local_vlan, resubmit(next_table))
}

/// The bootstrap learn rule: for each (VLAN, source MAC) seen on tunnel
/// ingress the switch programs a reciprocal unicast rule back out the
/// ingress port, tagged with the tunnel ID the frame arrived with. The
/// reciprocal rule is soft state with a hard timeout; the packet itself
/// continues to the patch port.
pub fn build_learn_action(patch_port: u32) -> String {
    format!(
        "learn(table={},priority=1,hard_timeout={},NXM_OF_VLAN_TCI[0..11],\
         NXM_OF_ETH_DST[]=NXM_OF_ETH_SRC[],load:0->NXM_OF_VLAN_TCI[],\
         load:NXM_NX_TUN_ID[]->NXM_NX_TUN_ID[],output:NXM_OF_IN_PORT[]),output:{}",
        TunnelTable::UcastToTun.id(),
        LEARN_HARD_TIMEOUT_SECS,
        patch_port
    )
}

/// Flood a frame to every port of the flood domain, tunnel-tagged.
/// An empty port set renders no output action, which drops the frame.
pub fn build_flood_actions(tun_id: u64, ports: &[u32]) -> String {
    let base = format!("strip_vlan,set_tunnel:{}", tun_id);
    if ports.is_empty() {
        return base;
    }
    let ports = ports
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("{},output:{}", base, ports)
}

/// Send a known-unicast frame out a single tunnel port, tunnel-tagged.
pub fn build_unicast_actions(tun_id: u64, port: u32) -> String {
    format!("strip_vlan,set_tunnel:{},{}", tun_id, output(port))
}

/// Synthesize an ARP reply in place and send it back out the ingress
/// port. The MAC and IP are embedded as raw register loads, so their
/// canonical numeric encodings (EUI-48 and dotted-quad-as-integer) are
/// part of the wire format.
pub fn build_arp_responder_actions(mac: MacAddress, ip: Ipv4Addr) -> String {
    format!(
        "move:NXM_OF_ETH_SRC[]->NXM_OF_ETH_DST[],mod_dl_src:{mac},\
         load:0x2->NXM_OF_ARP_OP[],move:NXM_NX_ARP_SHA[]->NXM_NX_ARP_THA[],\
         move:NXM_OF_ARP_SPA[]->NXM_OF_ARP_TPA[],load:{mac_hex:#x}->NXM_NX_ARP_SHA[],\
         load:{ip_hex:#x}->NXM_OF_ARP_SPA[],in_port",
        mac = mac,
        mac_hex = mac.to_u64(),
        ip_hex = u32::from(ip),
    )
}

/// Rewrite the source MAC of routed traffic to the distributed router's
/// MAC and resubmit to the dispatch stage.
pub fn build_dvr_process_actions(dvr_mac: MacAddress, next_table: TunnelTable) -> String {
    format!("mod_dl_src:{},{}", dvr_mac, resubmit(next_table))
}
