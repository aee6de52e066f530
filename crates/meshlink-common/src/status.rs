//! Model of `tailscale status --json` output.
//!
//! Only the fields used for address resolution and liveness are modeled;
//! everything else in the document is ignored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// Top-level status document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusReport {
    /// Daemon state machine position (e.g. "Running", "NeedsLogin", "Stopped")
    #[serde(rename = "BackendState", default)]
    pub backend_state: String,
    /// The local node
    #[serde(rename = "Self", default, skip_serializing_if = "Option::is_none")]
    pub self_node: Option<NodeStatus>,
    /// Peers keyed by node public key
    #[serde(rename = "Peer", alias = "Peer[]", default, deserialize_with = "null_as_empty")]
    pub peers: BTreeMap<String, NodeStatus>,
}

/// One node in the status document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeStatus {
    #[serde(rename = "HostName", default)]
    pub host_name: String,
    #[serde(rename = "DNSName", default)]
    pub dns_name: String,
    #[serde(rename = "TailscaleIPs", default, deserialize_with = "null_as_empty")]
    pub tailscale_ips: Vec<String>,
    #[serde(rename = "Online", default)]
    pub online: bool,
}

impl StatusReport {
    pub fn parse(stdout: &str) -> serde_json::Result<Self> {
        serde_json::from_str(stdout)
    }

    /// Peer whose host name matches `hostname`
    pub fn find_peer(&self, hostname: &str) -> Option<&NodeStatus> {
        self.peers.values().find(|peer| peer.matches(hostname))
    }

    /// The local node, if it matches `hostname`
    pub fn find_self(&self, hostname: &str) -> Option<&NodeStatus> {
        self.self_node.as_ref().filter(|node| node.matches(hostname))
    }
}

impl NodeStatus {
    /// Case-insensitive exact match on the first DNS label of HostName or DNSName
    pub fn matches(&self, hostname: &str) -> bool {
        let wanted = first_label(hostname);
        if wanted.is_empty() {
            return false;
        }
        [self.host_name.as_str(), self.dns_name.as_str()]
            .iter()
            .map(|name| first_label(name))
            .any(|label| label.eq_ignore_ascii_case(wanted))
    }

    pub fn first_ipv4(&self) -> Option<Ipv4Addr> {
        self.tailscale_ips
            .iter()
            .find_map(|ip| ip.parse::<Ipv4Addr>().ok())
    }
}

fn first_label(name: &str) -> &str {
    name.trim().split('.').next().unwrap_or("")
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
