//! Bootstrap peer types.

use crate::*;

pub use libp2p_identity::PeerId;
pub use multiaddr::Multiaddr;

/// A bootstrap peer as it appears in configuration.
///
/// ```text
/// [{ "ID": "12D3KooW...", "Addrs": ["/dns/example.org/tcp/4001"] }]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PeerDescriptor {
    /// The base58 encoded peer identity.
    #[serde(rename = "ID")]
    pub id: String,

    /// Multiaddr strings at which the peer may be reached.
    #[serde(rename = "Addrs", default)]
    pub addrs: Vec<String>,
}

impl PeerDescriptor {
    /// Decode the peer id and every address.
    pub fn resolve(&self) -> PullResult<PeerAddrInfo> {
        let id: PeerId = self.id.parse().map_err(|e| {
            PullError::other_src(format!("invalid peer id {:?}", self.id), e)
        })?;

        let addrs = self
            .addrs
            .iter()
            .map(|a| {
                a.parse::<Multiaddr>().map_err(|e| {
                    PullError::other_src(format!("invalid multiaddr {a:?}"), e)
                })
            })
            .collect::<PullResult<Vec<_>>>()?;

        Ok(PeerAddrInfo { id, addrs })
    }
}

/// A decoded peer identity with its known addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddrInfo {
    /// The peer identity.
    pub id: PeerId,

    /// Addresses at which the peer may be reached.
    pub addrs: Vec<Multiaddr>,
}

/// Parse a json peer list.
pub fn parse_peer_list(json: &str) -> PullResult<Vec<PeerDescriptor>> {
    serde_json::from_str(json)
        .map_err(|e| PullError::other_src("could not parse peer list", e))
}

/// Resolve every descriptor, failing on the first malformed entry.
pub fn resolve_peers(
    peers: &[PeerDescriptor],
) -> PullResult<Vec<PeerAddrInfo>> {
    peers.iter().map(PeerDescriptor::resolve).collect()
}
