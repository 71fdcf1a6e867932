//! The content-addressed network node consumed by the fetch pipeline.
//!
//! Block resolution, transport and discovery live behind these traits.
//! The pipeline only ever calls the operations declared here.

use crate::*;
use std::sync::Arc;
use std::time::Duration;

/// A retrieved block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    /// The block bytes.
    pub data: bytes::Bytes,

    /// Identifiers this block links to, if the codec was decoded.
    pub links: Vec<ContentId>,
}

impl Object {
    /// A block without decoded links.
    pub fn raw(data: bytes::Bytes) -> Self {
        Self {
            data,
            links: Vec::new(),
        }
    }

    /// The size of the block in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Links that a traversal could follow to fetchable blocks.
    pub fn walkable_links(&self) -> Vec<ContentId> {
        id::filter_unwalkable_links(&self.links)
    }
}

/// Retrieval of blocks by content identifier.
pub trait ContentClient: 'static + Send + Sync + std::fmt::Debug {
    /// Fetch the block addressed by `id`.
    fn get(&self, id: ContentId) -> BoxFut<'_, Result<Object, RetrieveError>>;
}

/// Peer address book and connection management.
pub trait PeerHost: 'static + Send + Sync + std::fmt::Debug {
    /// Record addresses for a peer, valid for `ttl`.
    fn add_addresses(&self, peer: PeerId, addrs: Vec<Multiaddr>, ttl: Duration);

    /// Returns true if there is a live connection to the peer.
    fn is_connected(&self, peer: &PeerId) -> bool;

    /// Connect to a peer, resolving its addresses from the address book.
    fn connect(&self, peer: PeerId) -> BoxFut<'_, PullResult<()>>;

    /// Exempt the connection to `peer` from idle pruning.
    fn protect(&self, peer: &PeerId, tag: &str);
}

/// A full node: retrieval plus peer management.
pub trait ContentNode: ContentClient + PeerHost {}

impl<T: ContentClient + PeerHost> ContentNode for T {}

/// Trait-object [ContentNode].
pub type DynContentNode = Arc<dyn ContentNode>;
