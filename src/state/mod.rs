//! State module for tracking workers
//!
//! # Components
//!
//! - `WorkerStatus`: the coordinator's view of a worker (ready or working)
//! - `WorkerState`: the worker's own lifecycle (starting, ready, working, stopped)

mod worker_state;

pub use worker_state::{WorkerState, WorkerStatus};
