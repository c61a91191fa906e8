pub mod consensus_flows;
pub mod network_flows;
