//! Flow rule value model.
//!
//! A [`FlowRule`] is the canonical (table, priority, match, actions) tuple
//! every manager produces. Matches are an ordered list of field predicates;
//! actions are the rendered `ovs-ofctl` action list. Rules are immutable
//! once constructed.
//!
//! Equality rules: installs compare the full tuple; deletions compare a
//! match *subset* (every filter predicate must appear in the rule), with
//! the legacy and OXM spellings of a field (`dl_src`/`eth_src`) treated as
//! the same predicate.

use std::net::Ipv4Addr;

use crate::types::MacAddress;

/// Priority OpenFlow assigns when a modify inserts a rule that did not
/// previously exist (OFP_DEFAULT_PRIORITY).
pub const DEFAULT_PRIORITY: u16 = 0x8000;

/// IP-layer protocol selectors usable in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Address Resolution Protocol.
    Arp,
    /// ICMPv6 (router advertisements etc.).
    Icmp6,
}

impl Protocol {
    /// The `ovs-ofctl` keyword for this protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Arp => "arp",
            Protocol::Icmp6 => "icmp6",
        }
    }
}

/// A single match-field predicate.
///
/// `DlSrc` and `EthSrc` name the same header field; `EthSrc` exists so
/// callers that key deletions on the OXM spelling render it verbatim while
/// still matching rules installed with the legacy spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    /// Ingress switch port.
    InPort(u32),
    /// VLAN tag.
    DlVlan(u16),
    /// Ethernet source address (legacy spelling).
    DlSrc(MacAddress),
    /// Ethernet source address (OXM spelling).
    EthSrc(MacAddress),
    /// Ethernet destination address.
    DlDst(MacAddress),
    /// Ethernet destination address under a mask.
    DlDstMasked(MacAddress, MacAddress),
    /// Tunnel segmentation ID from the outer header.
    TunId(u64),
    /// IP-layer protocol.
    Proto(Protocol),
    /// IPv4 destination (ARP target address for proto=arp).
    NwDst(Ipv4Addr),
    /// ICMP type (ICMPv6 router advertisement filtering).
    IcmpType(u8),
}

impl MatchField {
    /// The field name as rendered into a flow string.
    pub fn key(&self) -> &'static str {
        match self {
            MatchField::InPort(_) => "in_port",
            MatchField::DlVlan(_) => "dl_vlan",
            MatchField::DlSrc(_) => "dl_src",
            MatchField::EthSrc(_) => "eth_src",
            MatchField::DlDst(_) | MatchField::DlDstMasked(..) => "dl_dst",
            MatchField::TunId(_) => "tun_id",
            MatchField::Proto(_) => "proto",
            MatchField::NwDst(_) => "nw_dst",
            MatchField::IcmpType(_) => "icmp_type",
        }
    }

    /// The field name with OXM aliases folded onto the legacy spelling.
    /// Used for match comparison, never for rendering.
    fn canonical_key(&self) -> &'static str {
        match self {
            MatchField::EthSrc(_) => "dl_src",
            _ => self.key(),
        }
    }

    /// The rendered predicate value.
    pub fn value(&self) -> String {
        match self {
            MatchField::InPort(port) => port.to_string(),
            MatchField::DlVlan(vlan) => vlan.to_string(),
            MatchField::DlSrc(mac) | MatchField::EthSrc(mac) | MatchField::DlDst(mac) => {
                mac.to_string()
            }
            MatchField::DlDstMasked(mac, mask) => format!("{}/{}", mac, mask),
            MatchField::TunId(id) => id.to_string(),
            MatchField::Proto(proto) => proto.as_str().to_string(),
            MatchField::NwDst(ip) => ip.to_string(),
            MatchField::IcmpType(ty) => ty.to_string(),
        }
    }

    /// Whether two predicates constrain the same field to the same value.
    pub fn same_predicate(&self, other: &MatchField) -> bool {
        self.canonical_key() == other.canonical_key() && self.value() == other.value()
    }
}

impl std::fmt::Display for MatchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key(), self.value())
    }
}

/// Renders a match list as a comma-joined fragment, or `None` when empty.
pub fn render_matches(matches: &[MatchField]) -> Option<String> {
    if matches.is_empty() {
        return None;
    }
    Some(
        matches
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// An immutable match+action+priority+table tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRule {
    /// Pipeline table this rule lives in.
    pub table: u8,
    /// Rule priority within the table.
    pub priority: u16,
    /// Ordered match predicates; empty means match-all.
    pub matches: Vec<MatchField>,
    /// Rendered action list.
    pub actions: String,
}

impl FlowRule {
    /// Creates a new flow rule.
    pub fn new(
        table: u8,
        priority: u16,
        matches: Vec<MatchField>,
        actions: impl Into<String>,
    ) -> Self {
        Self {
            table,
            priority,
            matches,
            actions: actions.into(),
        }
    }

    /// True when every predicate in `filter` appears in this rule's match.
    /// An empty filter matches every rule.
    pub fn matches_filter(&self, filter: &[MatchField]) -> bool {
        filter
            .iter()
            .all(|f| self.matches.iter().any(|m| m.same_predicate(f)))
    }

    /// True when `other` constrains exactly the same fields to the same
    /// values, ignoring predicate order and field spelling.
    pub fn same_match(&self, other: &[MatchField]) -> bool {
        self.matches.len() == other.len() && self.matches_filter(other)
    }
}

impl std::fmt::Display for FlowRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "table={},priority={}", self.table, self.priority)?;
        if let Some(rendered) = render_matches(&self.matches) {
            write!(f, ",{}", rendered)?;
        }
        write!(f, ",actions={}", self.actions)
    }
}
