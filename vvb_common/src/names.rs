//! Well-known node names.
//!
//! Node names double as bus addresses: the bus excludes the sender of a
//! broadcast by name, and the Gateway's intrusion detection checks the
//! sender of command messages against an allowlist of these constants.

/// Vehicle dynamics plant.
pub const VEHICLE_DYNAMICS: &str = "VehicleDynamics";
/// High-voltage battery plant.
pub const BATTERY_PLANT: &str = "BatteryPlant";
/// Radar object-list generator plant.
pub const RADAR_GENERATOR: &str = "RadarGen";
/// Lane camera mock plant.
pub const CAMERA_PLANT: &str = "CameraPlant";
/// DC fast charging station plant.
pub const CHARGING_STATION: &str = "DC_Charger";
/// V2X radio plant.
pub const V2X_RADIO: &str = "V2XRadio";

/// ADAS ECU (AEB + LKA).
pub const ADAS_ECU: &str = "ADAS_ECU";
/// Battery management system ECU.
pub const BMS_ECU: &str = "BMS_ECU";
/// Central gateway ECU.
pub const GATEWAY_ECU: &str = "Gateway";
/// Body control module ECU.
pub const BODY_ECU: &str = "BodyECU";
/// Electronic stability control ECU.
pub const ESC_ECU: &str = "ESC_ECU";
/// Airbag control unit ECU.
pub const AIRBAG_ECU: &str = "AirbagECU";

/// Test harness sender name.
///
/// Present in the Gateway IDS allowlist as a bench-only convenience so
/// tests can issue command messages directly. A production gateway
/// would not carry this entry.
pub const TEST_HARNESS: &str = "TestHarness";
