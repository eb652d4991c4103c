//! VVB Common Library
//!
//! Shared types for all VVB workspace crates: the bus message catalog
//! (closed id/payload sum types), well-known node names, and bench
//! configuration loading.
//!
//! # Module Structure
//!
//! - [`msg`] - Message catalog: `MsgId`, `Payload`, and payload types
//! - [`names`] - Well-known node name constants
//! - [`config`] - Configuration loading traits and types

pub mod config;
pub mod msg;
pub mod names;
