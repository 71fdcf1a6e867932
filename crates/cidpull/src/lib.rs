#![deny(missing_docs)]
//! cidpull retrieves a list of content identifiers from a
//! content-addressed p2p network.
//!
//! A run connects to a fixed set of bootstrap peers, splits the
//! identifier list into batches sized to the available parallelism,
//! then fetches each batch concurrently through a shared admission gate.
//! Batches run one after another. Failures of individual identifiers are
//! collected into the [RunReport] and never abort the run.
//!
//! ```no_run
//! # async fn example() -> cidpull_api::PullResult<()> {
//! use cidpull::*;
//! use cidpull_core::factories::GatewayNode;
//!
//! let config = RunConfig::default();
//! let node = GatewayNode::create(config.gateway_config())?;
//! let report = RunOrchestrator::new(config, node).run_from_source().await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

mod config;
pub use config::*;

mod source;
pub use source::*;

mod run;
pub use run::*;
