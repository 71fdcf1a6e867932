//! An in-memory content node.
//!
//! Blocks live in a hash map and peer "connections" are bookkeeping only.
//! Peers must be marked reachable before they can be connected to.
//! Latency and failures can be injected, and every retrieval is counted,
//! which makes this the node of choice for exercising the fetch pipeline.

use super::peer_table::PeerTable;
use cidpull_api::*;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct State {
    blocks: HashMap<ContentId, bytes::Bytes>,
    failures: HashMap<ContentId, VecDeque<RetrieveError>>,
    latency: Duration,
    peers: PeerTable,
    reachable: HashSet<PeerId>,
    connected: HashSet<PeerId>,
    connect_attempts: Vec<PeerId>,
}

/// An in-memory [ContentNode].
#[derive(Debug, Default)]
pub struct MemContentNode {
    state: Mutex<State>,
    get_calls: AtomicUsize,
    gets_in_flight: AtomicUsize,
    peak_gets: AtomicUsize,
}

impl MemContentNode {
    /// Construct a new, empty MemContentNode.
    pub fn create() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Store a block under `id`.
    pub fn insert(&self, id: ContentId, data: bytes::Bytes) {
        self.lock().blocks.insert(id, data);
    }

    /// Make the next `count` retrievals of `id` fail, reporting
    /// `partial_size` bytes received.
    pub fn fail_next(
        &self,
        id: ContentId,
        count: usize,
        partial_size: Option<u64>,
    ) {
        let mut lock = self.lock();
        let queue = lock.failures.entry(id).or_default();
        for _ in 0..count {
            queue.push_back(RetrieveError {
                partial_size,
                source: PullError::other(format!("injected failure for {id}")),
            });
        }
    }

    /// Delay every retrieval by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Allow connections to `peer`.
    pub fn set_reachable(&self, peer: PeerId) {
        self.lock().reachable.insert(peer);
    }

    /// Total calls to [ContentClient::get].
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// The most retrievals that were ever running at once.
    pub fn peak_concurrent_gets(&self) -> usize {
        self.peak_gets.load(Ordering::SeqCst)
    }

    /// Peers [PeerHost::connect] was called for, in call order.
    pub fn connect_attempts(&self) -> Vec<PeerId> {
        self.lock().connect_attempts.clone()
    }

    /// Unexpired addresses known for `peer`.
    pub fn addresses(&self, peer: &PeerId) -> Vec<Multiaddr> {
        self.lock().peers.live_addresses(peer)
    }

    /// Returns true if the connection to `peer` is protected under `tag`.
    pub fn is_protected(&self, peer: &PeerId, tag: &str) -> bool {
        self.lock().peers.has_tag(peer, tag)
    }

    /// Drop every connection that is not protected. Returns the count of
    /// dropped connections.
    pub fn trim_connections(&self) -> usize {
        let mut lock = self.lock();
        let State {
            peers, connected, ..
        } = &mut *lock;
        let before = connected.len();
        connected.retain(|p| peers.is_protected(p));
        before - connected.len()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ContentClient for MemContentNode {
    fn get(&self, id: ContentId) -> BoxFut<'_, Result<Object, RetrieveError>> {
        Box::pin(async move {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            let now = self.gets_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_gets.fetch_max(now, Ordering::SeqCst);
            let _in_flight = InFlight(&self.gets_in_flight);

            let latency = self.lock().latency;
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }

            let mut lock = self.lock();
            if let Some(err) =
                lock.failures.get_mut(&id).and_then(VecDeque::pop_front)
            {
                return Err(err);
            }

            match lock.blocks.get(&id) {
                Some(data) => Ok(Object::raw(data.clone())),
                None => Err(PullError::other(format!("block {id} not found"))
                    .into()),
            }
        })
    }
}

impl PeerHost for MemContentNode {
    fn add_addresses(
        &self,
        peer: PeerId,
        addrs: Vec<Multiaddr>,
        ttl: Duration,
    ) {
        self.lock().peers.add_addresses(peer, addrs, ttl);
    }

    fn is_connected(&self, peer: &PeerId) -> bool {
        self.lock().connected.contains(peer)
    }

    fn connect(&self, peer: PeerId) -> BoxFut<'_, PullResult<()>> {
        Box::pin(async move {
            let mut lock = self.lock();
            lock.connect_attempts.push(peer);

            if lock.peers.live_addresses(&peer).is_empty() {
                return Err(PullError::other(format!(
                    "no addresses for peer {peer}"
                )));
            }

            if !lock.reachable.contains(&peer) {
                return Err(PullError::other(format!(
                    "connection to peer {peer} refused"
                )));
            }

            lock.connected.insert(peer);
            Ok(())
        })
    }

    fn protect(&self, peer: &PeerId, tag: &str) {
        self.lock().peers.protect(peer, tag);
    }
}

#[cfg(test)]
mod test;
