//! Configuration loading traits and types.
//!
//! Provides a standardized way to load the bench TOML configuration:
//! a [`ConfigLoader`] trait with a blanket implementation for any
//! deserializable type, plus the [`BenchConfig`] aggregate with strict
//! parsing (`deny_unknown_fields`), per-field defaults, and semantic
//! validation with numeric-bounds messages.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Log level for configuration.
///
/// Serializes to lowercase strings: "trace", "debug", "info", "warn", "error".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level verbosity.
    Trace,
    /// Debug-level verbosity.
    Debug,
    /// Info-level verbosity (default).
    Info,
    /// Warning-level verbosity.
    Warn,
    /// Error-level verbosity.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_filter(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// Unknown field in TOML (strict parsing with `deny_unknown_fields`).
    #[error("Unknown field: {0}")]
    UnknownField(String),
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
/// - Returns `ConfigError::UnknownField` for fields rejected by strict parsing
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| {
            let msg = e.to_string();
            if msg.contains("unknown field") {
                ConfigError::UnknownField(msg)
            } else {
                ConfigError::ParseError(msg)
            }
        })
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Bench Section ─────────────────────────────────────────────────

fn default_dt() -> f64 {
    0.01
}
fn default_duration() -> f64 {
    10.0
}

/// Simulation clock section (`[bench]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    /// Fixed time step [s] (0 < dt <= 1).
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Default run duration [s].
    #[serde(default = "default_duration")]
    pub duration: f64,
    /// Log verbosity.
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            duration: default_duration(),
            log_level: default_log_level(),
        }
    }
}

impl SimConfig {
    /// Validate clock bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dt > 0.0 && self.dt <= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "bench.dt={} out of range (0, 1]",
                self.dt
            )));
        }
        if self.duration <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "bench.duration={} must be > 0",
                self.duration
            )));
        }
        Ok(())
    }
}

// ─── Vehicle Section ───────────────────────────────────────────────

fn default_wheelbase() -> f64 {
    2.5
}
fn default_track_width() -> f64 {
    1.6
}
fn default_mass() -> f64 {
    1500.0
}
fn default_yaw_inertia() -> f64 {
    2500.0
}
fn default_max_drive_force() -> f64 {
    3000.0
}
fn default_max_brake_per_side() -> f64 {
    8000.0
}
fn default_drive_efficiency() -> f64 {
    0.85
}
fn default_regen_efficiency() -> f64 {
    0.5
}
fn default_pack_voltage() -> f64 {
    400.0
}

/// Vehicle dynamics parameters (`[vehicle]`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VehicleParams {
    /// Wheelbase L [m].
    #[serde(default = "default_wheelbase")]
    pub wheelbase: f64,
    /// Track width T [m].
    #[serde(default = "default_track_width")]
    pub track_width: f64,
    /// Vehicle mass [kg].
    #[serde(default = "default_mass")]
    pub mass: f64,
    /// Yaw inertia Iz [kg·m²].
    #[serde(default = "default_yaw_inertia")]
    pub yaw_inertia: f64,
    /// Maximum drive force at full throttle [N].
    #[serde(default = "default_max_drive_force")]
    pub max_drive_force: f64,
    /// Maximum brake force per side at full pedal [N].
    #[serde(default = "default_max_brake_per_side")]
    pub max_brake_per_side: f64,
    /// Drivetrain efficiency under traction.
    #[serde(default = "default_drive_efficiency")]
    pub drive_efficiency: f64,
    /// Recuperation efficiency when coasting.
    #[serde(default = "default_regen_efficiency")]
    pub regen_efficiency: f64,
    /// Nominal HV pack voltage [V] used for current accounting.
    #[serde(default = "default_pack_voltage")]
    pub pack_voltage: f64,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            wheelbase: default_wheelbase(),
            track_width: default_track_width(),
            mass: default_mass(),
            yaw_inertia: default_yaw_inertia(),
            max_drive_force: default_max_drive_force(),
            max_brake_per_side: default_max_brake_per_side(),
            drive_efficiency: default_drive_efficiency(),
            regen_efficiency: default_regen_efficiency(),
            pack_voltage: default_pack_voltage(),
        }
    }
}

impl VehicleParams {
    /// Validate physical plausibility.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("vehicle.wheelbase", self.wheelbase),
            ("vehicle.track_width", self.track_width),
            ("vehicle.mass", self.mass),
            ("vehicle.yaw_inertia", self.yaw_inertia),
            ("vehicle.max_drive_force", self.max_drive_force),
            ("vehicle.max_brake_per_side", self.max_brake_per_side),
            ("vehicle.pack_voltage", self.pack_voltage),
        ];
        for (field, val) in positive {
            if val <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{field}={val} must be > 0"
                )));
            }
        }
        if !(0.0 < self.drive_efficiency && self.drive_efficiency <= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "vehicle.drive_efficiency={} out of range (0, 1]",
                self.drive_efficiency
            )));
        }
        if !(0.0..=1.0).contains(&self.regen_efficiency) {
            return Err(ConfigError::ValidationError(format!(
                "vehicle.regen_efficiency={} out of range [0, 1]",
                self.regen_efficiency
            )));
        }
        Ok(())
    }
}

// ─── Battery Section ───────────────────────────────────────────────

fn default_capacity_kwh() -> f64 {
    60.0
}
fn default_internal_resistance() -> f64 {
    0.05
}
fn default_ambient_temp() -> f64 {
    25.0
}

/// HV battery plant parameters (`[battery]`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatteryConfig {
    /// Pack capacity [kWh].
    #[serde(default = "default_capacity_kwh")]
    pub capacity_kwh: f64,
    /// Internal resistance [Ω].
    #[serde(default = "default_internal_resistance")]
    pub internal_resistance: f64,
    /// Initial ambient temperature [°C].
    #[serde(default = "default_ambient_temp")]
    pub ambient_temp: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: default_capacity_kwh(),
            internal_resistance: default_internal_resistance(),
            ambient_temp: default_ambient_temp(),
        }
    }
}

impl BatteryConfig {
    /// Validate physical plausibility.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity_kwh <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "battery.capacity_kwh={} must be > 0",
                self.capacity_kwh
            )));
        }
        if self.internal_resistance <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "battery.internal_resistance={} must be > 0",
                self.internal_resistance
            )));
        }
        Ok(())
    }
}

// ─── BMS Section ───────────────────────────────────────────────────

fn default_min_voltage() -> f64 {
    320.0
}
fn default_max_voltage() -> f64 {
    420.0
}
fn default_max_temp() -> f64 {
    60.0
}
fn default_target_soc() -> f64 {
    90.0
}
fn default_initial_soc() -> f64 {
    100.0
}

/// BMS safety limits and charging targets (`[bms]`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BmsConfig {
    /// Undervoltage limit [V].
    #[serde(default = "default_min_voltage")]
    pub min_voltage: f64,
    /// Overvoltage limit [V].
    #[serde(default = "default_max_voltage")]
    pub max_voltage: f64,
    /// Overtemperature limit [°C].
    #[serde(default = "default_max_temp")]
    pub max_temp: f64,
    /// Charge-to SoC target [%].
    #[serde(default = "default_target_soc")]
    pub target_soc: f64,
    /// SoC estimate at startup [%].
    #[serde(default = "default_initial_soc")]
    pub initial_soc: f64,
}

impl Default for BmsConfig {
    fn default() -> Self {
        Self {
            min_voltage: default_min_voltage(),
            max_voltage: default_max_voltage(),
            max_temp: default_max_temp(),
            target_soc: default_target_soc(),
            initial_soc: default_initial_soc(),
        }
    }
}

impl BmsConfig {
    /// Validate limit ordering and SoC ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_voltage >= self.max_voltage {
            return Err(ConfigError::ValidationError(format!(
                "bms.min_voltage ({}) must be < bms.max_voltage ({})",
                self.min_voltage, self.max_voltage
            )));
        }
        for (field, val) in [
            ("bms.target_soc", self.target_soc),
            ("bms.initial_soc", self.initial_soc),
        ] {
            if !(0.0..=100.0).contains(&val) {
                return Err(ConfigError::ValidationError(format!(
                    "{field}={val} out of range [0, 100]"
                )));
            }
        }
        Ok(())
    }
}

// ─── Body Section ──────────────────────────────────────────────────

fn default_nvm_path() -> String {
    "odometer_nvm.json".to_string()
}

/// Body ECU persistence (`[body]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BodyConfig {
    /// Path of the odometer NVM document.
    #[serde(default = "default_nvm_path")]
    pub nvm_path: String,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            nvm_path: default_nvm_path(),
        }
    }
}

// ─── BenchConfig ───────────────────────────────────────────────────

/// Top-level bench configuration — loaded from `bench.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    /// Simulation clock.
    #[serde(default)]
    pub bench: SimConfig,
    /// Vehicle dynamics parameters.
    #[serde(default)]
    pub vehicle: VehicleParams,
    /// Battery plant parameters.
    #[serde(default)]
    pub battery: BatteryConfig,
    /// BMS limits and targets.
    #[serde(default)]
    pub bms: BmsConfig,
    /// Body ECU persistence.
    #[serde(default)]
    pub body: BodyConfig,
}

impl BenchConfig {
    /// Validate all sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bench.validate()?;
        self.vehicle.validate()?;
        self.battery.validate()?;
        self.bms.validate()?;
        Ok(())
    }
}
