//! VVB Bench Library
//!
//! Assembles the standard vehicle rig from a [`BenchConfig`] and
//! provides the scenario drivers and log export used by the bench
//! binary. Test suites build smaller rigs directly from the plant and
//! ECU crates; this crate is the full-vehicle composition.
//!
//! [`BenchConfig`]: vvb_common::config::BenchConfig

pub mod export;
pub mod rig;
pub mod scenario;

pub use export::export_log;
pub use rig::{Rig, RigNodes};
