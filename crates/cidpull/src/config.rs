//! config types.

use cidpull_api::*;
use cidpull_core::factories::gateway_node::GatewayNodeConfig;
use cidpull_core::{BootstrapConfig, FetchConfig};

/// The default location of the identifier list.
pub const DEFAULT_CIDS_SOURCE: &str =
    "https://bafybeifcghbafml4yrk43m3pvplin4auibnwrdv5v3rnwnovjjpkt6tkju.ipfs.dweb.link/";

/// Peer id of the default bootstrap peer.
pub const DEFAULT_PEER_ID: &str =
    "12D3KooWB5HcweB1wdgK8bjfTRHcZdvMFd6ffrn6XqMMyUG7pakP";

/// Addresses of the default bootstrap peer.
pub const DEFAULT_PEER_ADDRS: [&str; 2] = [
    "/dns/bacalhau.dokterbob.net/tcp/4001",
    "/dns/bacalhau.dokterbob.net/udp/4001/quic",
];

fn default_peers() -> Vec<PeerDescriptor> {
    vec![PeerDescriptor {
        id: DEFAULT_PEER_ID.into(),
        addrs: DEFAULT_PEER_ADDRS.iter().map(|a| a.to_string()).collect(),
    }]
}

/// Configuration for a retrieval run.
///
/// Every property may be omitted from a config file, in which case the
/// value from [RunConfig::default] is used.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConfig {
    /// Where to load the newline-delimited identifier list from.
    /// Either an `http(s)://` url or a local file path.
    ///
    /// Default: the public list at [DEFAULT_CIDS_SOURCE].
    pub cids_source: String,

    /// Peers to connect to and protect before fetching.
    ///
    /// Default: [DEFAULT_PEER_ID] at [DEFAULT_PEER_ADDRS].
    pub peers: Vec<PeerDescriptor>,

    /// Deadline for downloading the identifier list. Default: 60s.
    pub source_timeout_ms: u32,

    /// Fetches allowed in flight at once. This also sizes the batches.
    ///
    /// Default: the number of cpus.
    pub concurrency: usize,

    /// Gateway node settings. See [RunConfig::gateway_config] for the
    /// settings actually used.
    pub node: GatewayNodeConfig,

    /// Per-fetch deadline and retry settings.
    pub fetch: FetchConfig,

    /// Bootstrap peer settings.
    pub bootstrap: BootstrapConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            cids_source: DEFAULT_CIDS_SOURCE.into(),
            peers: default_peers(),
            source_timeout_ms: 60_000,
            concurrency: num_cpus::get(),
            node: GatewayNodeConfig::default(),
            fetch: FetchConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl RunConfig {
    /// Get a config suitable for testing: no peers, two slots, short
    /// deadlines and no retry delay.
    pub fn testing() -> Self {
        Self {
            cids_source: String::new(),
            peers: Vec::new(),
            source_timeout_ms: 1_000,
            concurrency: 2,
            node: GatewayNodeConfig::default(),
            fetch: FetchConfig {
                fetch_timeout_ms: 1_000,
                max_retries: 0,
                min_retry_delay_ms: 1,
                max_retry_delay_ms: 1,
            },
            bootstrap: BootstrapConfig {
                connect_timeout_ms: 1_000,
                ..Default::default()
            },
        }
    }

    /// Get the identifier list deadline as a [Duration].
    pub fn source_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.source_timeout_ms as u64)
    }

    /// The gateway node settings, with the request deadline capped at
    /// nine tenths of the fetch deadline.
    ///
    /// A gateway request runs on a blocking thread that outlives a fetch
    /// which has given up on it. Ending every request before its fetch
    /// deadline keeps open requests within the gate's capacity.
    pub fn gateway_config(&self) -> GatewayNodeConfig {
        let fetch_ms = self.fetch.fetch_timeout_ms;
        let cap = (fetch_ms - fetch_ms / 10).max(1);
        GatewayNodeConfig {
            request_timeout_ms: self.node.request_timeout_ms.clamp(1, cap),
            ..self.node.clone()
        }
    }

    /// Load a json config file.
    pub fn from_file(path: &std::path::Path) -> PullResult<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            PullError::other_src(
                format!("could not read config {}", path.display()),
                e,
            )
        })?;
        serde_json::from_str(&data).map_err(|e| {
            PullError::other_src(
                format!("could not parse config {}", path.display()),
                e,
            )
        })
    }
}
