//! VVB Simulation Substrate
//!
//! The deterministic discrete-time core of the virtual vehicle bench:
//! a broadcast bus with pluggable fault injection and a bounded message
//! log, the node capability traits shared by plants and ECUs, and the
//! engine that sequences one simulation tick.
//!
//! # Module Structure
//!
//! - [`node`] - `Node` / `Plant` capability traits and `NodeError`
//! - [`log`] - bounded ring log of delivered broadcasts
//! - [`fault`] - fault injector (drop / corrupt / delay)
//! - [`bus`] - the virtual message bus and node registry
//! - [`engine`] - tick sequencing and run control
//!
//! # Scheduling model
//!
//! Single-threaded, cooperative, synchronous. One engine tick advances
//! every plant (physics, then sensor publication) in registration
//! order, then runs every ECU's periodic step in registration order.
//! Broadcasts fan out synchronously and depth-first: a nested broadcast
//! issued from inside a `receive` completes before the outer fan-out
//! continues.

pub mod bus;
pub mod engine;
pub mod fault;
pub mod log;
pub mod node;

pub use bus::{Bus, BusError};
pub use engine::Engine;
pub use fault::{Fault, FaultInjector, FaultKind, FaultTarget, FaultVerdict};
pub use log::{LogRecord, MessageLog, BUS_LOG_CAPACITY};
pub use node::{Node, NodeError, NodeId, Plant};
