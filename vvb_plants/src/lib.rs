//! VVB Plant Models
//!
//! Stateful physical simulation elements. Each plant integrates its
//! continuous state in `advance_physics` and emits sensor broadcasts in
//! `publish_sensors`; actuator commands and environment overrides
//! arrive over the bus.
//!
//! # Module Structure
//!
//! - [`vehicle`] - nonlinear bicycle model with split-mu braking
//! - [`battery`] - HV pack: coulomb counting, thermals, sensor drift
//! - [`radar`] - synthetic object-list radar
//! - [`camera`] - lane camera mock with visibility-driven confidence
//! - [`charger`] - DC fast charging station (EVSE)
//! - [`v2x`] - V2X radio beaconing basic safety messages

pub mod battery;
pub mod camera;
pub mod charger;
pub mod radar;
pub mod v2x;
pub mod vehicle;

pub use battery::BatteryPlant;
pub use camera::CameraPlant;
pub use charger::ChargingStation;
pub use radar::RadarGenerator;
pub use v2x::V2xRadio;
pub use vehicle::VehicleDynamics;
