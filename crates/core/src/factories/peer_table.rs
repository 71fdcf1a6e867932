//! Address book and connection protection bookkeeping shared by the
//! node implementations.

use cidpull_api::*;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub(crate) struct PeerTable {
    // a `None` expiry never expires
    addrs: HashMap<PeerId, Vec<(Multiaddr, Option<Instant>)>>,
    protected: HashMap<PeerId, HashSet<String>>,
}

impl PeerTable {
    pub fn add_addresses(
        &mut self,
        peer: PeerId,
        addrs: Vec<Multiaddr>,
        ttl: Duration,
    ) {
        let expires = Instant::now().checked_add(ttl);
        let list = self.addrs.entry(peer).or_default();
        for addr in addrs {
            match list.iter_mut().find(|(a, _)| *a == addr) {
                Some((_, cur)) => {
                    *cur = match (*cur, expires) {
                        (Some(a), Some(b)) => Some(a.max(b)),
                        _ => None,
                    };
                }
                None => list.push((addr, expires)),
            }
        }
    }

    /// Unexpired addresses of a peer. Expired entries are dropped.
    pub fn live_addresses(&mut self, peer: &PeerId) -> Vec<Multiaddr> {
        let now = Instant::now();
        let Some(list) = self.addrs.get_mut(peer) else {
            return Vec::new();
        };
        list.retain(|(_, exp)| exp.map(|e| e > now).unwrap_or(true));
        let out = list.iter().map(|(a, _)| a.clone()).collect::<Vec<_>>();
        if list.is_empty() {
            self.addrs.remove(peer);
        }
        out
    }

    pub fn protect(&mut self, peer: &PeerId, tag: &str) {
        self.protected
            .entry(*peer)
            .or_default()
            .insert(tag.to_string());
    }

    pub fn is_protected(&self, peer: &PeerId) -> bool {
        self.protected.get(peer).is_some_and(|t| !t.is_empty())
    }

    pub fn has_tag(&self, peer: &PeerId, tag: &str) -> bool {
        self.protected.get(peer).is_some_and(|t| t.contains(tag))
    }
}
