//! A content node retrieving blocks through a trustless HTTP gateway.
//!
//! Blocks are requested as raw blocks (`?format=raw`) and cached as flat
//! files named by cid under `<repo>/blocks`. Every block is checked
//! against the multihash of its cid, whether it came from the gateway or
//! from the cache. Bootstrap peers are dialed
//! directly over tcp using the `ip4`, `ip6`, `dns`, `dns4` or `dns6`
//! component of their multiaddrs. Addresses without a tcp port are
//! skipped.

use super::peer_table::PeerTable;
use cidpull_api::id::{MH_IDENTITY, MH_SHA2_256};
use cidpull_api::*;
use multiaddr::Protocol;
use std::collections::HashMap;
use std::io::Read;
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Blocks larger than this are rejected.
pub const MAX_BLOCK_SIZE: u64 = 4 * 1024 * 1024;

/// GatewayNode configuration types.
pub mod config {
    /// Configuration parameters for [GatewayNode](super::GatewayNode).
    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct GatewayNodeConfig {
        /// Base url of the gateway. Default: "https://dweb.link".
        pub gateway_url: String,

        /// Directory holding the block cache. Default: "./cidpull".
        pub repo: std::path::PathBuf,

        /// Deadline for a whole gateway request, from dialing to the last
        /// byte of the body. Default: 55s.
        ///
        /// This should stay below the fetch deadline so that a request is
        /// finished before the fetch holding its gate slot gives up.
        pub request_timeout_ms: u32,
    }

    impl Default for GatewayNodeConfig {
        fn default() -> Self {
            Self {
                gateway_url: "https://dweb.link".into(),
                repo: "./cidpull".into(),
                request_timeout_ms: 55_000,
            }
        }
    }

    impl GatewayNodeConfig {
        /// Get the request timeout as a [Duration].
        pub fn request_timeout(&self) -> std::time::Duration {
            std::time::Duration::from_millis(self.request_timeout_ms as u64)
        }
    }
}

pub use config::*;

#[derive(Debug, Default)]
struct Peers {
    table: PeerTable,
    conns: HashMap<PeerId, TcpStream>,
}

/// A [ContentNode] backed by an HTTP gateway and a local block cache.
#[derive(Debug)]
pub struct GatewayNode {
    gateway: url::Url,
    agent: ureq::Agent,
    blocks_dir: PathBuf,
    tmp_seq: AtomicU64,
    peers: Mutex<Peers>,
}

impl GatewayNode {
    /// Construct a new GatewayNode, creating the block cache directory.
    pub fn create(config: GatewayNodeConfig) -> PullResult<Arc<Self>> {
        let gateway = url::Url::parse(&config.gateway_url).map_err(|e| {
            PullError::other_src(
                format!("invalid gateway url {:?}", config.gateway_url),
                e,
            )
        })?;

        let blocks_dir = config.repo.join("blocks");
        std::fs::create_dir_all(&blocks_dir).map_err(|e| {
            let dir = blocks_dir.display();
            PullError::other_src(
                format!("could not create block cache {dir}"),
                e,
            )
        })?;

        let timeout = config.request_timeout();
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();

        Ok(Arc::new(Self {
            gateway,
            agent,
            blocks_dir,
            tmp_seq: AtomicU64::new(0),
            peers: Mutex::new(Peers::default()),
        }))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Peers> {
        self.peers.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn block_url(&self, id: &ContentId) -> url::Url {
        let mut url = self.gateway.clone();
        url.set_path(&format!("ipfs/{id}"));
        url.set_query(Some("format=raw"));
        url
    }

    /// Drop every connection that is not protected. Returns the count of
    /// dropped connections.
    pub fn trim_connections(&self) -> usize {
        let mut lock = self.lock();
        let Peers { table, conns } = &mut *lock;
        let before = conns.len();
        conns.retain(|p, _| table.is_protected(p));
        before - conns.len()
    }

    fn block_path(&self, id: &ContentId) -> PathBuf {
        self.blocks_dir.join(id.to_string())
    }

    /// A cached block, if present and intact. Entries that do not hash to
    /// their cid are evicted.
    async fn cached(&self, id: &ContentId) -> PullResult<Option<bytes::Bytes>> {
        let path = self.block_path(id);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(None)
            }
            Err(err) => {
                return Err(PullError::other_src(
                    "could not read cached block",
                    err,
                ))
            }
        };

        if let Err(err) = verify_block(id, &data) {
            tracing::warn!(cid = %id, %err, "evicting corrupt cache entry");
            if let Err(err) = tokio::fs::remove_file(&path).await {
                tracing::warn!(cid = %id, ?err, "could not evict cache entry");
            }
            return Ok(None);
        }

        Ok(Some(data.into()))
    }

    /// Write a block to the cache. The block is written to a temporary
    /// file first and renamed into place, so a cache entry is never
    /// observed half written.
    async fn store(&self, id: &ContentId, data: &[u8]) -> std::io::Result<()> {
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self.blocks_dir.join(format!(".{id}.{seq}.tmp"));
        if let Err(err) = tokio::fs::write(&tmp, data).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err);
        }
        if let Err(err) = tokio::fs::rename(&tmp, self.block_path(id)).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err);
        }
        Ok(())
    }
}

/// Check `data` against the multihash of `id`.
fn verify_block(id: &ContentId, data: &[u8]) -> PullResult<()> {
    use sha2::Digest;

    let expect = id.hash().digest();
    let matches = match id.hash_code() {
        MH_IDENTITY => expect == data,
        MH_SHA2_256 => sha2::Sha256::digest(data).as_slice() == expect,
        code => {
            return Err(PullError::other(format!(
                "cannot verify cid {id}: unsupported multihash 0x{code:x}"
            )))
        }
    };

    if !matches {
        return Err(PullError::other(format!(
            "block of {} bytes does not hash to cid {id}",
            data.len()
        )));
    }

    Ok(())
}

/// Note the `blocking_` prefix. This must be run on a blocking task.
fn blocking_get_block(
    agent: &ureq::Agent,
    url: url::Url,
) -> Result<bytes::Bytes, RetrieveError> {
    let resp = agent
        .get(url.as_str())
        .set("Accept", "application/vnd.ipld.raw")
        .call()
        .map_err(|e| {
            PullError::other_src(format!("gateway request {url}"), e)
        })?;

    let mut reader = resp.into_reader().take(MAX_BLOCK_SIZE + 1);
    let mut data = Vec::new();
    let mut buf = [0_u8; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => (),
            Err(err) => {
                return Err(RetrieveError::partial(
                    data.len() as u64,
                    PullError::other_src("gateway response interrupted", err),
                ));
            }
        }
    }

    if data.len() as u64 > MAX_BLOCK_SIZE {
        return Err(RetrieveError::partial(
            data.len() as u64,
            PullError::other(format!(
                "block exceeds {MAX_BLOCK_SIZE} bytes"
            )),
        ));
    }

    Ok(data.into())
}

/// Peek a non-blocking socket. Pending data or nothing to read means the
/// remote end is still there, end of stream or an error means it is not.
fn socket_open(stream: &TcpStream) -> bool {
    let mut byte = [0_u8; 1];
    match stream.peek(&mut byte) {
        Ok(0) => false,
        Ok(_) => true,
        Err(err) => err.kind() == std::io::ErrorKind::WouldBlock,
    }
}

fn tcp_target(addr: &Multiaddr) -> Option<(String, u16)> {
    let mut host = None;
    let mut port = None;
    for proto in addr.iter() {
        match proto {
            Protocol::Ip4(ip) => host = Some(ip.to_string()),
            Protocol::Ip6(ip) => host = Some(ip.to_string()),
            Protocol::Dns(h) | Protocol::Dns4(h) | Protocol::Dns6(h) => {
                host = Some(h.to_string())
            }
            Protocol::Tcp(p) => port = Some(p),
            _ => (),
        }
    }
    Some((host?, port?))
}

impl ContentClient for GatewayNode {
    fn get(&self, id: ContentId) -> BoxFut<'_, Result<Object, RetrieveError>> {
        Box::pin(async move {
            if let Some(data) = self.cached(&id).await? {
                tracing::trace!(cid = %id, "served from block cache");
                return Ok(Object::raw(data));
            }

            let url = self.block_url(&id);
            let agent = self.agent.clone();
            let data = tokio::task::spawn_blocking(move || {
                blocking_get_block(&agent, url)
            })
            .await
            .map_err(|e| PullError::other_src("gateway task failed", e))??;

            verify_block(&id, &data)
                .map_err(|e| RetrieveError::partial(data.len() as u64, e))?;

            if let Err(err) = self.store(&id, &data).await {
                tracing::warn!(cid = %id, ?err, "could not cache block");
            }

            Ok(Object::raw(data))
        })
    }
}

impl PeerHost for GatewayNode {
    fn add_addresses(
        &self,
        peer: PeerId,
        addrs: Vec<Multiaddr>,
        ttl: Duration,
    ) {
        self.lock().table.add_addresses(peer, addrs, ttl);
    }

    /// A peer counts as connected while its socket has not been closed
    /// by the remote end. Closed sockets are dropped here.
    fn is_connected(&self, peer: &PeerId) -> bool {
        let mut lock = self.lock();
        let alive = match lock.conns.get(peer) {
            None => return false,
            Some(stream) => socket_open(stream),
        };
        if !alive {
            tracing::debug!(%peer, "peer connection closed");
            lock.conns.remove(peer);
        }
        alive
    }

    fn connect(&self, peer: PeerId) -> BoxFut<'_, PullResult<()>> {
        Box::pin(async move {
            let targets = self
                .lock()
                .table
                .live_addresses(&peer)
                .iter()
                .filter_map(tcp_target)
                .collect::<Vec<_>>();

            if targets.is_empty() {
                return Err(PullError::other(format!(
                    "no tcp addresses for peer {peer}"
                )));
            }

            let mut last_err = None;
            for (host, port) in targets {
                let dial =
                    tokio::net::TcpStream::connect((host.as_str(), port))
                        .await
                        .and_then(|s| s.into_std());
                match dial {
                    Ok(stream) => {
                        tracing::debug!(%peer, %host, port, "dialed peer");
                        self.lock().conns.insert(peer, stream);
                        return Ok(());
                    }
                    Err(err) => {
                        tracing::debug!(
                            %peer,
                            %host,
                            port,
                            ?err,
                            "dial failed"
                        );
                        last_err = Some(err);
                    }
                }
            }

            Err(match last_err {
                Some(err) => PullError::other_src(
                    format!("could not dial peer {peer}"),
                    err,
                ),
                None => PullError::other(format!("could not dial peer {peer}")),
            })
        })
    }

    fn protect(&self, peer: &PeerId, tag: &str) {
        self.lock().table.protect(peer, tag);
    }
}

#[cfg(test)]
mod test;
