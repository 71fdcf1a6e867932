#![deny(missing_docs)]
//! cidpull core contains the bounded-concurrency retrieval pipeline:
//! batch planning, the admission gate, fetch workers, the batch
//! coordinator and the bootstrap step, along with the content node
//! implementations they run against.

mod gate;
pub use gate::*;

pub mod planner;
pub use planner::plan_batches;

mod outcome;
pub use outcome::*;

pub mod worker;
pub use worker::{FetchConfig, FetchWorker};

mod coordinator;
pub use coordinator::*;

pub mod bootstrap;
pub use bootstrap::{
    BootstrapConfig, BootstrapPolicy, BootstrapReport, PeerBootstrapper,
};

pub mod factories;
