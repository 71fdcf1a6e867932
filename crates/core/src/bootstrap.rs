//! Connecting to and protecting the configured bootstrap peers.

use cidpull_api::*;
use tokio_util::sync::CancellationToken;

/// PeerBootstrapper configuration types.
pub mod config {
    use std::time::Duration;

    /// What to do when a bootstrap peer cannot be reached.
    #[derive(
        Debug,
        Default,
        Clone,
        Copy,
        PartialEq,
        Eq,
        serde::Serialize,
        serde::Deserialize,
    )]
    #[serde(rename_all = "camelCase")]
    pub enum BootstrapPolicy {
        /// Abort bootstrapping on the first connection error.
        #[default]
        FailFast,

        /// Attempt every peer, reporting the unreachable ones.
        Continue,
    }

    /// Configuration parameters for
    /// [PeerBootstrapper](super::PeerBootstrapper).
    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct BootstrapConfig {
        /// How long bootstrap addresses stay in the address book.
        /// Default: 1 hour.
        pub addr_ttl_s: u32,
        /// The tag connections are protected under. Default: "pinning".
        pub protect_tag: String,
        /// Deadline for connecting to a single peer. Default: 30s.
        pub connect_timeout_ms: u32,
        /// Unreachable peer policy. Default: fail fast.
        pub policy: BootstrapPolicy,
    }

    impl Default for BootstrapConfig {
        fn default() -> Self {
            Self {
                addr_ttl_s: 60 * 60,
                protect_tag: "pinning".into(),
                connect_timeout_ms: 30_000,
                policy: BootstrapPolicy::FailFast,
            }
        }
    }

    impl BootstrapConfig {
        /// Get the address ttl as a [Duration].
        pub fn addr_ttl(&self) -> Duration {
            Duration::from_secs(self.addr_ttl_s as u64)
        }

        /// Get the connect timeout as a [Duration].
        pub fn connect_timeout(&self) -> Duration {
            Duration::from_millis(self.connect_timeout_ms as u64)
        }
    }
}

pub use config::*;

/// The peers a bootstrap pass touched.
#[derive(Debug, Clone, Default)]
pub struct BootstrapReport {
    /// Peers connected and protected by this pass.
    pub connected: Vec<PeerId>,

    /// Peers that were already connected. These are left untouched.
    pub already_connected: Vec<PeerId>,

    /// Peers that could not be reached, under [BootstrapPolicy::Continue].
    pub unreachable: Vec<(PeerId, PullError)>,
}

/// Seeds connectivity by connecting to a fixed list of peers.
#[derive(Debug)]
pub struct PeerBootstrapper {
    node: DynContentNode,
    config: BootstrapConfig,
    cancel: CancellationToken,
}

impl PeerBootstrapper {
    /// Construct a new PeerBootstrapper.
    pub fn new(
        node: DynContentNode,
        config: BootstrapConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            node,
            config,
            cancel,
        }
    }

    /// Register, connect and protect each peer in order.
    ///
    /// Under [BootstrapPolicy::FailFast] the first connection error is
    /// returned and later peers are not attempted.
    pub async fn bootstrap(
        &self,
        peers: &[PeerAddrInfo],
    ) -> PullResult<BootstrapReport> {
        let mut report = BootstrapReport::default();

        for peer in peers {
            self.node.add_addresses(
                peer.id,
                peer.addrs.clone(),
                self.config.addr_ttl(),
            );

            if self.node.is_connected(&peer.id) {
                tracing::debug!(peer = %peer.id, "already connected");
                report.already_connected.push(peer.id);
                continue;
            }

            match self.connect(peer.id).await {
                Ok(()) => {
                    self.node.protect(&peer.id, &self.config.protect_tag);
                    tracing::info!(
                        peer = %peer.id,
                        "connected to bootstrap peer"
                    );
                    report.connected.push(peer.id);
                }
                Err(err) => match self.config.policy {
                    BootstrapPolicy::FailFast => {
                        return Err(PullError::other_src(
                            format!("failed to connect to peer {}", peer.id),
                            err,
                        ));
                    }
                    BootstrapPolicy::Continue => {
                        tracing::warn!(
                            peer = %peer.id,
                            ?err,
                            "bootstrap peer unreachable"
                        );
                        report.unreachable.push((peer.id, err));
                    }
                },
            }
        }

        Ok(report)
    }

    async fn connect(&self, peer: PeerId) -> PullResult<()> {
        let timeout = self.config.connect_timeout();

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                Err(PullError::other("bootstrap cancelled"))
            }
            res = tokio::time::timeout(timeout, self.node.connect(peer)) => {
                res.map_err(|e| PullError::other_src("connect timed out", e))?
            }
        }
    }
}
