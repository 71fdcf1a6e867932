#![deny(missing_docs)]
//! cidpull api contains the traits and basic types shared by the
//! retrieval pipeline and the content node implementations.
//!
//! If you want to run a retrieval, please see the cidpull crate.

/// Boxed future type.
pub type BoxFut<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

mod error;
pub use error::*;

pub mod id;
pub use id::ContentId;

pub mod peer;
pub use peer::{Multiaddr, PeerAddrInfo, PeerDescriptor, PeerId};

pub mod node;
pub use node::*;
