//! VVB Electronic Control Units
//!
//! Control logic nodes: each consumes sensor broadcasts and emits
//! commands or protocol responses. All receivers are total over their
//! payload domain — malformed input degrades to the unit's safe state
//! instead of propagating across the bus.
//!
//! # Module Structure
//!
//! - [`adas`] - AEB and LKA control laws
//! - [`bms`] - battery safety monitoring and charging FSM
//! - [`gateway`] - IDS, OTA, OBD-II, UDS, V2X routing
//! - [`body`] - odometer / trip meters with NVM persistence
//! - [`esc`] - yaw-rate stability intervention
//! - [`airbag`] - crash detection and restraint deployment

pub mod adas;
pub mod airbag;
pub mod bms;
pub mod body;
pub mod esc;
pub mod gateway;

pub use adas::AdasEcu;
pub use airbag::AirbagEcu;
pub use bms::{BmsEcu, ChargingState, SafetyViolation};
pub use body::BodyEcu;
pub use esc::EscEcu;
pub use gateway::GatewayEcu;
