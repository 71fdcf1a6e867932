//! Content node implementations.

mod peer_table;

pub mod mem_node;
pub use mem_node::MemContentNode;

pub mod gateway_node;
pub use gateway_node::GatewayNode;
