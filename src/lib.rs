//! Wholesale power market co-simulation: clock, time synchronization,
//! per-tick orchestration and stopping rules.

pub mod agents;
pub mod archive;
/// Event-bus abstraction and payload formatting.
pub mod bus;
pub mod cli;
pub mod config;
pub mod error;
pub mod io;
/// Learning collaborator seam and convergence tracking.
pub mod learning;
pub mod market;
pub mod noise;
/// Clock, time gate, tick driver and stopping rules.
pub mod sim;
