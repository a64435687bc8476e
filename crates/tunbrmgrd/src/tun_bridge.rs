//! TunnelBridge - OpenFlow pipeline manager for the overlay tunnel bridge.
//!
//! Owns the multi-table pipeline of one bridge: the static skeleton wired
//! at bootstrap, plus the per-VLAN, per-MAC, per-IP and per-port rule sets
//! the feature managers maintain as tunnels, tenant networks and ports
//! come and go. Every operation is idempotent; replaying any install or
//! delete is safe.
//!
//! All mutations go through `&mut self`, so flow operations on one bridge
//! are serialized by ownership. Individual executor calls are atomic;
//! multi-rule sequences are ordered so that a crash mid-sequence leaves
//! the pipeline dropping, never misrouting.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use tracing::{debug, info, instrument};

use ovstun_flow_common::{
    FlowError, FlowExecutor, FlowResult, FlowRule, MacAddress, MatchField, Protocol,
};

use crate::flows::{
    build_arp_responder_actions, build_dvr_process_actions, build_flood_actions,
    build_learn_action, build_provision_actions, build_unicast_actions, output, resubmit, DROP,
};
use crate::tables::TunnelTable;
use crate::types::{FloodGroup, LocalVlanMapping, TunnelType, UnicastEntry, ICMPV6_TYPE_RA};

/// Pipeline manager for one tunnel bridge.
pub struct TunnelBridge<E: FlowExecutor> {
    /// Bridge name, for logging only.
    name: String,

    /// Transport to the switch.
    executor: E,

    /// Whether the ARP responder stage was wired at bootstrap.
    /// `None` until the default table has been set up.
    arp_responder_enabled: Option<bool>,

    /// segmentation_id -> local VLAN binding
    vlan_map: HashMap<u64, LocalVlanMapping>,

    /// local VLAN -> flood domain
    flood_groups: HashMap<u16, FloodGroup>,

    /// (local VLAN, dst MAC) -> unicast binding
    unicast_entries: HashMap<(u16, MacAddress), UnicastEntry>,

    /// (local VLAN, target IP) -> responder MAC
    arp_entries: HashMap<(u16, Ipv4Addr), MacAddress>,

    /// Tunnel ports participating in ingress dispatch
    tunnel_ports: HashSet<u32>,

    /// DVR router MAC -> owning port
    dvr_mac_routes: HashMap<MacAddress, u32>,
}

impl<E: FlowExecutor> TunnelBridge<E> {
    /// Creates a manager for the named bridge.
    pub fn new(name: impl Into<String>, executor: E) -> Self {
        Self {
            name: name.into(),
            executor,
            arp_responder_enabled: None,
            vlan_map: HashMap::new(),
            flood_groups: HashMap::new(),
            unicast_entries: HashMap::new(),
            arp_entries: HashMap::new(),
            tunnel_ports: HashSet::new(),
            dvr_mac_routes: HashMap::new(),
        }
    }

    /// Bridge name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying executor (tests inspect the mock through this).
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Mutable access to the underlying executor.
    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    /// The local VLAN currently bound to a segmentation ID, if any.
    pub fn local_vlan_for(&self, segmentation_id: u64) -> Option<u16> {
        self.vlan_map.get(&segmentation_id).map(|m| m.local_vlan)
    }

    /// Whether the ARP responder stage was wired at bootstrap. `None`
    /// until the default table has been set up.
    pub fn arp_responder_enabled(&self) -> Option<bool> {
        self.arp_responder_enabled
    }

    /// The flood domain for a local VLAN, if one is installed.
    pub fn flood_group(&self, vlan: u16) -> Option<&FloodGroup> {
        self.flood_groups.get(&vlan)
    }

    /// The unicast binding for (VLAN, MAC), if one is installed.
    pub fn unicast_entry(&self, vlan: u16, mac: MacAddress) -> Option<UnicastEntry> {
        self.unicast_entries.get(&(vlan, mac)).copied()
    }

    /// The responder MAC for (VLAN, target IP), if one is installed.
    pub fn arp_entry(&self, vlan: u16, ip: Ipv4Addr) -> Option<MacAddress> {
        self.arp_entries.get(&(vlan, ip)).copied()
    }

    /// Whether a tunnel port currently participates in ingress dispatch.
    pub fn has_tunnel_port(&self, port: u32) -> bool {
        self.tunnel_ports.contains(&port)
    }

    /// The owning port for a DVR router MAC, if routed.
    pub fn dvr_mac_port(&self, mac: MacAddress) -> Option<u32> {
        self.dvr_mac_routes.get(&mac).copied()
    }

    async fn add_flow(
        &mut self,
        table: TunnelTable,
        priority: u16,
        matches: Vec<MatchField>,
        actions: impl Into<String>,
    ) -> FlowResult<()> {
        self.executor
            .add_flow(FlowRule::new(table.id(), priority, matches, actions))
            .await
    }

    /// Installs the static pipeline skeleton. Safe to re-run: re-issuing
    /// the sequence onto a partially populated table set converges to the
    /// same end state. Install order keeps later rules from shadowing
    /// earlier catch-alls during the window.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn setup_default_table(
        &mut self,
        patch_int_ofport: u32,
        arp_responder_enabled: bool,
    ) -> FlowResult<()> {
        self.add_flow(
            TunnelTable::LocalSwitching,
            1,
            vec![MatchField::InPort(patch_int_ofport)],
            resubmit(TunnelTable::PatchLvToTun),
        )
        .await?;
        self.add_flow(TunnelTable::LocalSwitching, 0, vec![], DROP)
            .await?;

        if arp_responder_enabled {
            // Preempts the unicast/flood split only for ARP broadcast
            self.add_flow(
                TunnelTable::PatchLvToTun,
                1,
                vec![
                    MatchField::Proto(Protocol::Arp),
                    MatchField::DlDst(MacAddress::BROADCAST),
                ],
                resubmit(TunnelTable::ArpResponder),
            )
            .await?;
        }

        self.add_flow(
            TunnelTable::PatchLvToTun,
            0,
            vec![MatchField::DlDstMasked(
                MacAddress::ZERO,
                MacAddress::MULTICAST_MASK,
            )],
            resubmit(TunnelTable::UcastToTun),
        )
        .await?;
        self.add_flow(
            TunnelTable::PatchLvToTun,
            0,
            vec![MatchField::DlDstMasked(
                MacAddress::MULTICAST_MASK,
                MacAddress::MULTICAST_MASK,
            )],
            resubmit(TunnelTable::FloodToTun),
        )
        .await?;

        self.add_flow(TunnelTable::GreTunToLv, 0, vec![], DROP)
            .await?;
        self.add_flow(TunnelTable::VxlanTunToLv, 0, vec![], DROP)
            .await?;

        self.add_flow(
            TunnelTable::LearnFromTun,
            1,
            vec![],
            build_learn_action(patch_int_ofport),
        )
        .await?;

        self.add_flow(
            TunnelTable::UcastToTun,
            0,
            vec![],
            resubmit(TunnelTable::FloodToTun),
        )
        .await?;

        if arp_responder_enabled {
            self.add_flow(
                TunnelTable::ArpResponder,
                0,
                vec![],
                resubmit(TunnelTable::FloodToTun),
            )
            .await?;
        }

        self.add_flow(TunnelTable::FloodToTun, 0, vec![], DROP)
            .await?;

        self.arp_responder_enabled = Some(arp_responder_enabled);
        info!(
            patch_int_ofport,
            arp_responder_enabled, "Installed default tables"
        );
        Ok(())
    }

    /// Binds a tenant network's segmentation ID to a local VLAN: incoming
    /// tunnel traffic is rewritten onto the VLAN and handed to learning
    /// (or to the DVR bypass for distributed networks).
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn provision_local_vlan(
        &mut self,
        network_type: TunnelType,
        lvid: u16,
        segmentation_id: u64,
        distributed: bool,
    ) -> FlowResult<()> {
        if let Some(existing) = self.vlan_map.get(&segmentation_id) {
            if existing.local_vlan != lvid {
                return Err(FlowError::MappingConflict {
                    segmentation_id,
                    local_vlan: lvid,
                });
            }
        }
        if self
            .vlan_map
            .values()
            .any(|m| m.local_vlan == lvid && m.segmentation_id != segmentation_id)
        {
            return Err(FlowError::MappingConflict {
                segmentation_id,
                local_vlan: lvid,
            });
        }

        let next_table = if distributed {
            TunnelTable::DvrNotLearn
        } else {
            TunnelTable::LearnFromTun
        };
        self.add_flow(
            network_type.tun_table(),
            1,
            vec![MatchField::TunId(segmentation_id)],
            build_provision_actions(lvid, next_table),
        )
        .await?;

        self.vlan_map.insert(
            segmentation_id,
            LocalVlanMapping {
                network_type,
                segmentation_id,
                local_vlan: lvid,
                distributed,
            },
        );
        info!(segmentation_id, lvid, "Provisioned local VLAN");
        Ok(())
    }

    /// Unbinds a segmentation ID. A no-op when the VLAN was never
    /// provisioned.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn reclaim_local_vlan(
        &mut self,
        network_type: TunnelType,
        segmentation_id: u64,
    ) -> FlowResult<()> {
        self.executor
            .delete_flows(
                Some(network_type.tun_table().id()),
                vec![MatchField::TunId(segmentation_id)],
            )
            .await?;
        if self.vlan_map.remove(&segmentation_id).is_some() {
            info!(segmentation_id, "Reclaimed local VLAN");
        }
        Ok(())
    }

    /// Replaces the flood rule for a VLAN with the given tunnel-port set.
    /// A modify, not an add: the rule set never accumulates. Callers
    /// should delete the group instead when the last port leaves.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn install_flood_to_tun(
        &mut self,
        vlan: u16,
        tun_id: u64,
        ports: Vec<u32>,
    ) -> FlowResult<()> {
        self.executor
            .mod_flow(
                TunnelTable::FloodToTun.id(),
                vec![MatchField::DlVlan(vlan)],
                build_flood_actions(tun_id, &ports),
            )
            .await?;
        self.flood_groups.insert(vlan, FloodGroup { tun_id, ports });
        Ok(())
    }

    /// Removes the flood rule for a VLAN.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn delete_flood_to_tun(&mut self, vlan: u16) -> FlowResult<()> {
        self.executor
            .delete_flows(
                Some(TunnelTable::FloodToTun.id()),
                vec![MatchField::DlVlan(vlan)],
            )
            .await?;
        self.flood_groups.remove(&vlan);
        Ok(())
    }

    /// Directs known-unicast frames for (VLAN, MAC) out a tunnel port.
    /// Priority 2 shadows both learned reciprocal entries (priority 1)
    /// and the table default.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn install_unicast_to_tun(
        &mut self,
        vlan: u16,
        tun_id: u64,
        port: u32,
        mac: MacAddress,
    ) -> FlowResult<()> {
        self.add_flow(
            TunnelTable::UcastToTun,
            2,
            vec![MatchField::DlDst(mac), MatchField::DlVlan(vlan)],
            build_unicast_actions(tun_id, port),
        )
        .await?;
        self.unicast_entries
            .insert((vlan, mac), UnicastEntry { port, tun_id });
        Ok(())
    }

    /// Removes a unicast binding; `mac = None` wildcards every unicast
    /// entry for the VLAN (full teardown when the VLAN is reclaimed).
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn delete_unicast_to_tun(
        &mut self,
        vlan: u16,
        mac: Option<MacAddress>,
    ) -> FlowResult<()> {
        let matches = match mac {
            Some(mac) => vec![MatchField::DlDst(mac), MatchField::DlVlan(vlan)],
            None => vec![MatchField::DlVlan(vlan)],
        };
        self.executor
            .delete_flows(Some(TunnelTable::UcastToTun.id()), matches)
            .await?;
        match mac {
            Some(mac) => {
                self.unicast_entries.remove(&(vlan, mac));
            }
            None => self.unicast_entries.retain(|(v, _), _| *v != vlan),
        }
        Ok(())
    }

    /// Synthesizes ARP replies for `ip` locally, suppressing tunnel-wide
    /// ARP flooding. Rejected when the responder stage was not wired at
    /// bootstrap.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn install_arp_responder(
        &mut self,
        vlan: u16,
        ip: Ipv4Addr,
        mac: MacAddress,
    ) -> FlowResult<()> {
        if self.arp_responder_enabled == Some(false) {
            return Err(FlowError::malformed(
                "ARP responder table is not wired into the pipeline",
            ));
        }
        self.add_flow(
            TunnelTable::ArpResponder,
            1,
            vec![
                MatchField::Proto(Protocol::Arp),
                MatchField::DlVlan(vlan),
                MatchField::NwDst(ip),
            ],
            build_arp_responder_actions(mac, ip),
        )
        .await?;
        self.arp_entries.insert((vlan, ip), mac);
        Ok(())
    }

    /// Removes a responder entry; `ip = None` wildcards every ARP entry
    /// for the VLAN.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn delete_arp_responder(
        &mut self,
        vlan: u16,
        ip: Option<Ipv4Addr>,
    ) -> FlowResult<()> {
        let mut matches = vec![
            MatchField::DlVlan(vlan),
            MatchField::Proto(Protocol::Arp),
        ];
        if let Some(ip) = ip {
            matches.push(MatchField::NwDst(ip));
        }
        self.executor
            .delete_flows(Some(TunnelTable::ArpResponder.id()), matches)
            .await?;
        match ip {
            Some(ip) => {
                self.arp_entries.remove(&(vlan, ip));
            }
            None => self.arp_entries.retain(|(v, _), _| *v != vlan),
        }
        Ok(())
    }

    /// Routes ingress traffic from a newly added tunnel port into the
    /// provisioning table for its encapsulation type.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn setup_tunnel_port(
        &mut self,
        network_type: TunnelType,
        port: u32,
    ) -> FlowResult<()> {
        self.add_flow(
            TunnelTable::LocalSwitching,
            1,
            vec![MatchField::InPort(port)],
            resubmit(network_type.tun_table()),
        )
        .await?;
        self.tunnel_ports.insert(port);
        debug!(port, "Tunnel port set up");
        Ok(())
    }

    /// Removes every rule keyed on a departed tunnel port, in all tables.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn cleanup_tunnel_port(&mut self, port: u32) -> FlowResult<()> {
        self.executor
            .delete_flows(None, vec![MatchField::InPort(port)])
            .await?;
        self.tunnel_ports.remove(&port);
        debug!(port, "Tunnel port cleaned up");
        Ok(())
    }

    /// Routes frames sourced from a distributed-router MAC directly to
    /// the owning port, bypassing learning.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn add_dvr_mac_tun(&mut self, mac: MacAddress, port: u32) -> FlowResult<()> {
        self.add_flow(
            TunnelTable::DvrNotLearn,
            1,
            vec![MatchField::DlSrc(mac)],
            output(port),
        )
        .await?;
        self.dvr_mac_routes.insert(mac, port);
        Ok(())
    }

    /// Removes a DVR MAC route. The delete keys on the OXM `eth_src`
    /// spelling while the install uses `dl_src`; both name the same
    /// header field.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn remove_dvr_mac_tun(&mut self, mac: MacAddress) -> FlowResult<()> {
        self.executor
            .delete_flows(
                Some(TunnelTable::DvrNotLearn.id()),
                vec![MatchField::EthSrc(mac)],
            )
            .await?;
        self.dvr_mac_routes.remove(&mac);
        Ok(())
    }

    /// Installs the DVR processing pair for a router interface: frames
    /// *to* the interface MAC are dropped here, frames *from* it are
    /// rewritten to the node's DVR MAC before dispatch.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn install_dvr_process(
        &mut self,
        vlan_tag: u16,
        vif_mac: MacAddress,
        dvr_mac: MacAddress,
    ) -> FlowResult<()> {
        self.add_flow(
            TunnelTable::DvrProcess,
            2,
            vec![MatchField::DlVlan(vlan_tag), MatchField::DlDst(vif_mac)],
            DROP,
        )
        .await?;
        self.add_flow(
            TunnelTable::DvrProcess,
            1,
            vec![MatchField::DlVlan(vlan_tag), MatchField::DlSrc(vif_mac)],
            build_dvr_process_actions(dvr_mac, TunnelTable::PatchLvToTun),
        )
        .await?;
        Ok(())
    }

    /// Removes the DVR processing pair for a router interface.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn delete_dvr_process(
        &mut self,
        vlan_tag: u16,
        vif_mac: MacAddress,
    ) -> FlowResult<()> {
        self.executor
            .delete_flows(
                Some(TunnelTable::DvrProcess.id()),
                vec![MatchField::DlVlan(vlan_tag), MatchField::DlDst(vif_mac)],
            )
            .await?;
        self.executor
            .delete_flows(
                Some(TunnelTable::DvrProcess.id()),
                vec![MatchField::DlVlan(vlan_tag), MatchField::DlSrc(vif_mac)],
            )
            .await?;
        Ok(())
    }

    /// Suppresses ARP for a distributed gateway address.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn install_dvr_process_ipv4(
        &mut self,
        vlan_tag: u16,
        gateway_ip: Ipv4Addr,
    ) -> FlowResult<()> {
        self.add_flow(
            TunnelTable::DvrProcess,
            3,
            vec![
                MatchField::DlVlan(vlan_tag),
                MatchField::Proto(Protocol::Arp),
                MatchField::NwDst(gateway_ip),
            ],
            DROP,
        )
        .await
    }

    /// Removes the ARP suppression rule for a distributed gateway.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn delete_dvr_process_ipv4(
        &mut self,
        vlan_tag: u16,
        gateway_ip: Ipv4Addr,
    ) -> FlowResult<()> {
        self.executor
            .delete_flows(
                Some(TunnelTable::DvrProcess.id()),
                vec![
                    MatchField::DlVlan(vlan_tag),
                    MatchField::Proto(Protocol::Arp),
                    MatchField::NwDst(gateway_ip),
                ],
            )
            .await?;
        Ok(())
    }

    /// Suppresses router advertisements from a distributed gateway MAC.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn install_dvr_process_ipv6(
        &mut self,
        vlan_tag: u16,
        gateway_mac: MacAddress,
    ) -> FlowResult<()> {
        self.add_flow(
            TunnelTable::DvrProcess,
            3,
            vec![
                MatchField::DlVlan(vlan_tag),
                MatchField::Proto(Protocol::Icmp6),
                MatchField::IcmpType(ICMPV6_TYPE_RA),
                MatchField::DlSrc(gateway_mac),
            ],
            DROP,
        )
        .await
    }

    /// Removes the RA suppression rule for a distributed gateway MAC.
    #[instrument(skip(self), fields(bridge = %self.name))]
    pub async fn delete_dvr_process_ipv6(
        &mut self,
        vlan_tag: u16,
        gateway_mac: MacAddress,
    ) -> FlowResult<()> {
        self.executor
            .delete_flows(
                Some(TunnelTable::DvrProcess.id()),
                vec![
                    MatchField::DlVlan(vlan_tag),
                    MatchField::Proto(Protocol::Icmp6),
                    MatchField::IcmpType(ICMPV6_TYPE_RA),
                    MatchField::DlSrc(gateway_mac),
                ],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovstun_flow_common::MockFlowExecutor;
    use pretty_assertions::assert_eq;

    fn bridge() -> TunnelBridge<MockFlowExecutor> {
        TunnelBridge::new("br-tun", MockFlowExecutor::new())
    }

    fn mac(s: &str) -> MacAddress {
        MacAddress::parse(s).unwrap()
    }

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    /// Sorted flow table snapshot for before/after comparisons.
    fn snapshot(br: &TunnelBridge<MockFlowExecutor>) -> Vec<String> {
        let mut flows: Vec<String> = br.executor().flows().iter().map(|f| f.to_string()).collect();
        flows.sort();
        flows
    }

    #[tokio::test]
    async fn test_setup_default_table() {
        let mut br = bridge();
        br.setup_default_table(5555, false).await.unwrap();

        let expected = vec![
            "add-flow table=0,priority=1,in_port=5555,actions=resubmit(,2)",
            "add-flow table=0,priority=0,actions=drop",
            "add-flow table=2,priority=0,dl_dst=00:00:00:00:00:00/01:00:00:00:00:00,\
             actions=resubmit(,20)",
            "add-flow table=2,priority=0,dl_dst=01:00:00:00:00:00/01:00:00:00:00:00,\
             actions=resubmit(,22)",
            "add-flow table=3,priority=0,actions=drop",
            "add-flow table=4,priority=0,actions=drop",
            "add-flow table=10,priority=1,actions=learn(table=20,priority=1,hard_timeout=300,\
             NXM_OF_VLAN_TCI[0..11],NXM_OF_ETH_DST[]=NXM_OF_ETH_SRC[],\
             load:0->NXM_OF_VLAN_TCI[],load:NXM_NX_TUN_ID[]->NXM_NX_TUN_ID[],\
             output:NXM_OF_IN_PORT[]),output:5555",
            "add-flow table=20,priority=0,actions=resubmit(,22)",
            "add-flow table=22,priority=0,actions=drop",
        ];
        assert_eq!(br.executor().calls(), &expected[..]);
        // ARP responder stage left unwired
        assert!(br.executor().flows_in_table(21).is_empty());
    }

    #[tokio::test]
    async fn test_setup_default_table_arp_responder_enabled() {
        let mut br = bridge();
        br.setup_default_table(5555, true).await.unwrap();

        let expected = vec![
            "add-flow table=0,priority=1,in_port=5555,actions=resubmit(,2)",
            "add-flow table=0,priority=0,actions=drop",
            "add-flow table=2,priority=1,proto=arp,dl_dst=ff:ff:ff:ff:ff:ff,\
             actions=resubmit(,21)",
            "add-flow table=2,priority=0,dl_dst=00:00:00:00:00:00/01:00:00:00:00:00,\
             actions=resubmit(,20)",
            "add-flow table=2,priority=0,dl_dst=01:00:00:00:00:00/01:00:00:00:00:00,\
             actions=resubmit(,22)",
            "add-flow table=3,priority=0,actions=drop",
            "add-flow table=4,priority=0,actions=drop",
            "add-flow table=10,priority=1,actions=learn(table=20,priority=1,hard_timeout=300,\
             NXM_OF_VLAN_TCI[0..11],NXM_OF_ETH_DST[]=NXM_OF_ETH_SRC[],\
             load:0->NXM_OF_VLAN_TCI[],load:NXM_NX_TUN_ID[]->NXM_NX_TUN_ID[],\
             output:NXM_OF_IN_PORT[]),output:5555",
            "add-flow table=20,priority=0,actions=resubmit(,22)",
            "add-flow table=21,priority=0,actions=resubmit(,22)",
            "add-flow table=22,priority=0,actions=drop",
        ];
        assert_eq!(br.executor().calls(), &expected[..]);
    }

    #[tokio::test]
    async fn test_setup_default_table_rerun_converges() {
        let mut br = bridge();
        br.setup_default_table(5555, true).await.unwrap();
        let first = snapshot(&br);

        br.setup_default_table(5555, true).await.unwrap();
        assert_eq!(snapshot(&br), first);
    }

    #[tokio::test]
    async fn test_provision_local_vlan() {
        let mut br = bridge();
        br.provision_local_vlan(TunnelType::Vxlan, 888, 777, false)
            .await
            .unwrap();

        assert_eq!(
            br.executor().calls(),
            &["add-flow table=4,priority=1,tun_id=777,actions=mod_vlan_vid:888,resubmit(,10)"]
        );
        assert_eq!(br.local_vlan_for(777), Some(888));
    }

    #[tokio::test]
    async fn test_provision_local_vlan_gre() {
        let mut br = bridge();
        br.provision_local_vlan(TunnelType::Gre, 888, 777, false)
            .await
            .unwrap();

        assert_eq!(
            br.executor().calls(),
            &["add-flow table=3,priority=1,tun_id=777,actions=mod_vlan_vid:888,resubmit(,10)"]
        );
    }

    #[tokio::test]
    async fn test_provision_local_vlan_distributed() {
        let mut br = bridge();
        br.provision_local_vlan(TunnelType::Vxlan, 888, 777, true)
            .await
            .unwrap();

        assert_eq!(
            br.executor().calls(),
            &["add-flow table=4,priority=1,tun_id=777,actions=mod_vlan_vid:888,resubmit(,9)"]
        );
    }

    #[tokio::test]
    async fn test_provision_local_vlan_idempotent() {
        let mut br = bridge();
        br.provision_local_vlan(TunnelType::Vxlan, 888, 777, false)
            .await
            .unwrap();
        br.provision_local_vlan(TunnelType::Vxlan, 888, 777, false)
            .await
            .unwrap();

        assert_eq!(br.executor().flows_in_table(4).len(), 1);
    }

    #[tokio::test]
    async fn test_provision_local_vlan_conflicts() {
        let mut br = bridge();
        br.provision_local_vlan(TunnelType::Vxlan, 888, 777, false)
            .await
            .unwrap();

        // Same segmentation ID, different VLAN
        let err = br
            .provision_local_vlan(TunnelType::Vxlan, 999, 777, false)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::MappingConflict { .. }));

        // Same VLAN, different segmentation ID
        let err = br
            .provision_local_vlan(TunnelType::Vxlan, 888, 776, false)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::MappingConflict { .. }));
    }

    #[tokio::test]
    async fn test_reclaim_local_vlan() {
        let mut br = bridge();
        let before = snapshot(&br);
        br.provision_local_vlan(TunnelType::Vxlan, 888, 777, false)
            .await
            .unwrap();
        br.reclaim_local_vlan(TunnelType::Vxlan, 777).await.unwrap();

        assert_eq!(
            br.executor().calls().last().unwrap(),
            "del-flows table=4,tun_id=777"
        );
        assert_eq!(snapshot(&br), before);
        assert_eq!(br.local_vlan_for(777), None);

        // Reclaiming again is a silent no-op
        br.reclaim_local_vlan(TunnelType::Vxlan, 777).await.unwrap();
    }

    #[tokio::test]
    async fn test_install_flood_to_tun() {
        let mut br = bridge();
        br.install_flood_to_tun(3333, 2222, vec![11, 44, 22, 33])
            .await
            .unwrap();

        assert_eq!(
            br.executor().calls(),
            &["mod-flows table=22,dl_vlan=3333,actions=strip_vlan,set_tunnel:2222,\
               output:11,44,22,33"]
        );
        assert_eq!(
            br.flood_group(3333),
            Some(&crate::types::FloodGroup {
                tun_id: 2222,
                ports: vec![11, 44, 22, 33],
            })
        );
    }

    #[tokio::test]
    async fn test_install_flood_to_tun_replaces() {
        let mut br = bridge();
        br.install_flood_to_tun(3333, 2222, vec![11, 44, 22, 33])
            .await
            .unwrap();
        br.install_flood_to_tun(3333, 2222, vec![11]).await.unwrap();

        let flood = br.executor().flows_in_table(22);
        assert_eq!(flood.len(), 1);
        assert_eq!(flood[0].actions, "strip_vlan,set_tunnel:2222,output:11");
    }

    #[tokio::test]
    async fn test_install_flood_to_tun_no_ports() {
        let mut br = bridge();
        br.install_flood_to_tun(3333, 2222, vec![]).await.unwrap();

        let flood = br.executor().flows_in_table(22);
        assert_eq!(flood.len(), 1);
        // No output action: the flood group drops
        assert_eq!(flood[0].actions, "strip_vlan,set_tunnel:2222");
    }

    #[tokio::test]
    async fn test_delete_flood_to_tun() {
        let mut br = bridge();
        br.install_flood_to_tun(3333, 2222, vec![11]).await.unwrap();
        br.delete_flood_to_tun(3333).await.unwrap();

        assert_eq!(
            br.executor().calls().last().unwrap(),
            "del-flows table=22,dl_vlan=3333"
        );
        assert!(br.executor().flows_in_table(22).is_empty());
    }

    #[tokio::test]
    async fn test_install_unicast_to_tun() {
        let mut br = bridge();
        br.install_unicast_to_tun(3333, 2222, 55, mac("08:60:6e:7f:74:e7"))
            .await
            .unwrap();

        assert_eq!(
            br.executor().calls(),
            &["add-flow table=20,priority=2,dl_dst=08:60:6e:7f:74:e7,dl_vlan=3333,\
               actions=strip_vlan,set_tunnel:2222,output:55"]
        );
    }

    #[tokio::test]
    async fn test_delete_unicast_to_tun() {
        let mut br = bridge();
        br.install_unicast_to_tun(3333, 2222, 55, mac("08:60:6e:7f:74:e7"))
            .await
            .unwrap();
        br.delete_unicast_to_tun(3333, Some(mac("08:60:6e:7f:74:e7")))
            .await
            .unwrap();

        assert_eq!(
            br.executor().calls().last().unwrap(),
            "del-flows table=20,dl_dst=08:60:6e:7f:74:e7,dl_vlan=3333"
        );
        assert!(br.executor().flows_in_table(20).is_empty());
        assert_eq!(br.unicast_entry(3333, mac("08:60:6e:7f:74:e7")), None);
    }

    #[tokio::test]
    async fn test_delete_unicast_to_tun_without_mac() {
        let mut br = bridge();
        br.install_unicast_to_tun(3333, 2222, 55, mac("08:60:6e:7f:74:e7"))
            .await
            .unwrap();
        br.install_unicast_to_tun(3333, 2222, 56, mac("00:02:b3:13:fe:3d"))
            .await
            .unwrap();
        br.install_unicast_to_tun(4444, 2223, 57, mac("08:60:6e:7f:74:e7"))
            .await
            .unwrap();

        br.delete_unicast_to_tun(3333, None).await.unwrap();

        assert_eq!(
            br.executor().calls().last().unwrap(),
            "del-flows table=20,dl_vlan=3333"
        );
        // Every entry for VLAN 3333 is gone; VLAN 4444 untouched
        let remaining = br.executor().flows_in_table(20);
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].matches_filter(&[MatchField::DlVlan(4444)]));
    }

    #[tokio::test]
    async fn test_install_arp_responder() {
        let mut br = bridge();
        br.install_arp_responder(3333, ip("192.0.2.1"), mac("08:60:6e:7f:74:e7"))
            .await
            .unwrap();

        assert_eq!(
            br.executor().calls(),
            &["add-flow table=21,priority=1,proto=arp,dl_vlan=3333,nw_dst=192.0.2.1,\
               actions=move:NXM_OF_ETH_SRC[]->NXM_OF_ETH_DST[],mod_dl_src:08:60:6e:7f:74:e7,\
               load:0x2->NXM_OF_ARP_OP[],move:NXM_NX_ARP_SHA[]->NXM_NX_ARP_THA[],\
               move:NXM_OF_ARP_SPA[]->NXM_OF_ARP_TPA[],load:0x8606e7f74e7->NXM_NX_ARP_SHA[],\
               load:0xc0000201->NXM_OF_ARP_SPA[],in_port"]
        );
        assert_eq!(
            br.arp_entry(3333, ip("192.0.2.1")),
            Some(mac("08:60:6e:7f:74:e7"))
        );
    }

    #[tokio::test]
    async fn test_install_arp_responder_rejected_when_disabled() {
        let mut br = bridge();
        br.setup_default_table(5555, false).await.unwrap();

        let err = br
            .install_arp_responder(3333, ip("192.0.2.1"), mac("08:60:6e:7f:74:e7"))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::MalformedRule { .. }));
        assert!(br.executor().flows_in_table(21).is_empty());
    }

    #[tokio::test]
    async fn test_delete_arp_responder() {
        let mut br = bridge();
        br.delete_arp_responder(3333, Some(ip("192.0.2.1")))
            .await
            .unwrap();

        assert_eq!(
            br.executor().calls(),
            &["del-flows table=21,dl_vlan=3333,proto=arp,nw_dst=192.0.2.1"]
        );
    }

    #[tokio::test]
    async fn test_delete_arp_responder_without_ip() {
        let mut br = bridge();
        br.install_arp_responder(3333, ip("192.0.2.1"), mac("08:60:6e:7f:74:e7"))
            .await
            .unwrap();
        br.install_arp_responder(3333, ip("192.0.2.2"), mac("08:60:6e:7f:74:e7"))
            .await
            .unwrap();
        br.install_arp_responder(4444, ip("192.0.2.1"), mac("00:02:b3:13:fe:3d"))
            .await
            .unwrap();

        br.delete_arp_responder(3333, None).await.unwrap();

        assert_eq!(
            br.executor().calls().last().unwrap(),
            "del-flows table=21,dl_vlan=3333,proto=arp"
        );
        let remaining = br.executor().flows_in_table(21);
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].matches_filter(&[MatchField::DlVlan(4444)]));
    }

    #[tokio::test]
    async fn test_setup_tunnel_port() {
        let mut br = bridge();
        br.setup_tunnel_port(TunnelType::Vxlan, 11111).await.unwrap();

        assert_eq!(
            br.executor().calls(),
            &["add-flow table=0,priority=1,in_port=11111,actions=resubmit(,4)"]
        );

        let mut br = bridge();
        br.setup_tunnel_port(TunnelType::Gre, 11111).await.unwrap();
        assert_eq!(
            br.executor().calls(),
            &["add-flow table=0,priority=1,in_port=11111,actions=resubmit(,3)"]
        );
    }

    #[tokio::test]
    async fn test_cleanup_tunnel_port() {
        let mut br = bridge();
        br.setup_tunnel_port(TunnelType::Vxlan, 11111).await.unwrap();
        br.cleanup_tunnel_port(11111).await.unwrap();

        assert_eq!(
            br.executor().calls().last().unwrap(),
            "del-flows in_port=11111"
        );
        assert!(br.executor().flows().is_empty());
        assert!(!br.has_tunnel_port(11111));
    }

    #[tokio::test]
    async fn test_add_dvr_mac_tun() {
        let mut br = bridge();
        br.add_dvr_mac_tun(mac("00:02:b3:13:fe:3d"), 8888)
            .await
            .unwrap();

        assert_eq!(
            br.executor().calls(),
            &["add-flow table=9,priority=1,dl_src=00:02:b3:13:fe:3d,actions=output:8888"]
        );
        assert_eq!(br.dvr_mac_port(mac("00:02:b3:13:fe:3d")), Some(8888));
    }

    #[tokio::test]
    async fn test_remove_dvr_mac_tun() {
        let mut br = bridge();
        br.add_dvr_mac_tun(mac("00:02:b3:13:fe:3d"), 8888)
            .await
            .unwrap();
        br.remove_dvr_mac_tun(mac("00:02:b3:13:fe:3d")).await.unwrap();

        // Delete keys on the OXM spelling but removes the dl_src rule
        assert_eq!(
            br.executor().calls().last().unwrap(),
            "del-flows table=9,eth_src=00:02:b3:13:fe:3d"
        );
        assert!(br.executor().flows_in_table(9).is_empty());
    }

    #[tokio::test]
    async fn test_install_dvr_process() {
        let mut br = bridge();
        br.install_dvr_process(888, mac("fa:16:3e:aa:bb:cc"), mac("00:02:b3:13:fe:3d"))
            .await
            .unwrap();

        let expected = vec![
            "add-flow table=1,priority=2,dl_vlan=888,dl_dst=fa:16:3e:aa:bb:cc,actions=drop",
            "add-flow table=1,priority=1,dl_vlan=888,dl_src=fa:16:3e:aa:bb:cc,\
             actions=mod_dl_src:00:02:b3:13:fe:3d,resubmit(,2)",
        ];
        assert_eq!(br.executor().calls(), &expected[..]);
    }

    #[tokio::test]
    async fn test_delete_dvr_process() {
        let mut br = bridge();
        let before = snapshot(&br);
        br.install_dvr_process(888, mac("fa:16:3e:aa:bb:cc"), mac("00:02:b3:13:fe:3d"))
            .await
            .unwrap();
        br.delete_dvr_process(888, mac("fa:16:3e:aa:bb:cc"))
            .await
            .unwrap();

        let expected_tail = vec![
            "del-flows table=1,dl_vlan=888,dl_dst=fa:16:3e:aa:bb:cc",
            "del-flows table=1,dl_vlan=888,dl_src=fa:16:3e:aa:bb:cc",
        ];
        let calls = br.executor().calls();
        assert_eq!(&calls[calls.len() - 2..], &expected_tail[..]);
        assert_eq!(snapshot(&br), before);
    }

    #[tokio::test]
    async fn test_dvr_process_ipv4_round_trip() {
        let mut br = bridge();
        br.install_dvr_process_ipv4(888, ip("192.0.2.254"))
            .await
            .unwrap();
        assert_eq!(
            br.executor().calls(),
            &["add-flow table=1,priority=3,dl_vlan=888,proto=arp,nw_dst=192.0.2.254,actions=drop"]
        );

        br.delete_dvr_process_ipv4(888, ip("192.0.2.254"))
            .await
            .unwrap();
        assert!(br.executor().flows().is_empty());
    }

    #[tokio::test]
    async fn test_dvr_process_ipv6_round_trip() {
        let mut br = bridge();
        br.install_dvr_process_ipv6(888, mac("fa:16:3e:aa:bb:cc"))
            .await
            .unwrap();
        assert_eq!(
            br.executor().calls(),
            &["add-flow table=1,priority=3,dl_vlan=888,proto=icmp6,icmp_type=134,\
               dl_src=fa:16:3e:aa:bb:cc,actions=drop"]
        );

        br.delete_dvr_process_ipv6(888, mac("fa:16:3e:aa:bb:cc"))
            .await
            .unwrap();
        assert!(br.executor().flows().is_empty());
    }

    #[tokio::test]
    async fn test_install_operations_idempotent() {
        let mut br = bridge();
        br.setup_default_table(5555, true).await.unwrap();
        br.install_unicast_to_tun(3333, 2222, 55, mac("08:60:6e:7f:74:e7"))
            .await
            .unwrap();
        br.install_arp_responder(3333, ip("192.0.2.1"), mac("08:60:6e:7f:74:e7"))
            .await
            .unwrap();
        let once = snapshot(&br);

        br.install_unicast_to_tun(3333, 2222, 55, mac("08:60:6e:7f:74:e7"))
            .await
            .unwrap();
        br.install_arp_responder(3333, ip("192.0.2.1"), mac("08:60:6e:7f:74:e7"))
            .await
            .unwrap();
        assert_eq!(snapshot(&br), once);
    }

    #[tokio::test]
    async fn test_full_round_trip_restores_bootstrap_state() {
        let mut br = bridge();
        br.setup_default_table(5555, true).await.unwrap();
        let baseline = snapshot(&br);

        br.setup_tunnel_port(TunnelType::Vxlan, 11111).await.unwrap();
        br.provision_local_vlan(TunnelType::Vxlan, 888, 777, false)
            .await
            .unwrap();
        br.install_flood_to_tun(888, 777, vec![11111]).await.unwrap();
        br.install_unicast_to_tun(888, 777, 11111, mac("08:60:6e:7f:74:e7"))
            .await
            .unwrap();
        br.install_arp_responder(888, ip("192.0.2.1"), mac("08:60:6e:7f:74:e7"))
            .await
            .unwrap();
        br.add_dvr_mac_tun(mac("00:02:b3:13:fe:3d"), 8888)
            .await
            .unwrap();

        br.remove_dvr_mac_tun(mac("00:02:b3:13:fe:3d")).await.unwrap();
        br.delete_arp_responder(888, None).await.unwrap();
        br.delete_unicast_to_tun(888, None).await.unwrap();
        br.delete_flood_to_tun(888).await.unwrap();
        br.reclaim_local_vlan(TunnelType::Vxlan, 777).await.unwrap();
        br.cleanup_tunnel_port(11111).await.unwrap();

        assert_eq!(snapshot(&br), baseline);
    }
}
