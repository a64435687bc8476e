//! tunbrmgrd - OpenFlow pipeline manager for the overlay tunnel bridge
//!
//! Maintains the multi-table flow pipeline of a software-switch tunnel
//! bridge: per-tenant local VLANs mapped to tunnel segmentation IDs,
//! flood domains, known-unicast forwarding, local ARP reply synthesis,
//! and DVR MAC routing.

mod flows;
mod ofctl;
mod tables;
mod tun_bridge;
mod types;

pub use flows::*;
pub use ofctl::OfctlFlowExecutor;
pub use tables::*;
pub use tun_bridge::TunnelBridge;
pub use types::*;
