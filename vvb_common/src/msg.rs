//! Bus message catalog.
//!
//! Every message on the virtual bus is a `(MsgId, Payload, sender)`
//! triple. `MsgId` is a closed enum of symbolic identifiers; `Payload`
//! is a tagged variant whose shape is fixed per id. Receivers dispatch
//! by pattern match, so a payload of the wrong shape for its id is
//! detected exhaustively instead of by runtime field probing.

use serde::{Deserialize, Serialize};

// ─── Message Identifiers ────────────────────────────────────────────

/// Symbolic message identifier.
///
/// `as_str()` yields the wire name used in exported logs; the naming
/// follows the in-vehicle convention of `*_CMD` for actuator commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MsgId {
    /// Steering command [rad].
    SteeringCmd,
    /// Throttle command [0..1].
    AccelCmd,
    /// Brake command [0..1].
    BrakeCmd,
    /// Vehicle speed [m/s].
    WheelSpeed,
    /// Yaw rate [rad/s].
    YawRate,
    /// Lateral acceleration [m/s²].
    LateralAccel,
    /// Vehicle position {x, y} [m].
    GpsPos,
    /// Longitudinal acceleration [m/s²].
    AccelX,
    /// Traction current demand on the HV pack [A].
    LoadCurrent,
    /// Radar object list.
    RadarObjects,
    /// Lane geometry from the camera.
    CameraLane,
    /// Sensed pack voltage [V].
    HvVoltage,
    /// Sensed pack current [A].
    HvCurrent,
    /// Sensed pack temperature [°C].
    HvTemp,
    /// State of charge estimate [%].
    BmsSoc,
    /// Contactor state (true = closed).
    ContactorState,
    /// BMS charging request to the EVSE.
    ChargeRequest,
    /// EVSE status announcement.
    ChargerStatus,
    /// EVSE supply output.
    ChargerOutput,
    /// Over-the-air update image.
    OtaUpdate,
    /// OTA procedure outcome.
    OtaStatus,
    /// OBD-II request.
    ObdRequest,
    /// OBD-II response.
    ObdResponse,
    /// UDS (ISO 14229) request.
    UdsRequest,
    /// UDS response.
    UdsResponse,
    /// Received V2X basic safety message.
    V2xRx,
    /// Driver-facing warning.
    HmiWarning,
    /// Intrusion detection alert.
    SecurityAlert,
    /// Environment: split friction coefficients.
    SetEnvMu,
    /// Environment: ambient thermal conditions.
    SetEnvThermal,
    /// Environment: camera visibility [0..1].
    SetEnvVisibility,
    /// Environment: sensor drift offsets.
    SetSensorDrift,
    /// Trip meter reset.
    ResetTrip,
    /// Odometer / trip readout.
    OdometerData,
    /// Stability control engagement state.
    EscStatus,
    /// Airbag squib fired.
    DeployAirbag,
    /// Seatbelt pretensioner fired.
    DeploySeatbelt,
    /// Post-crash emergency call with last position.
    PostCrashAlert,
}

impl MsgId {
    /// Wire name of this identifier.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SteeringCmd => "STEERING_CMD",
            Self::AccelCmd => "ACCEL_CMD",
            Self::BrakeCmd => "BRAKE_CMD",
            Self::WheelSpeed => "WHEEL_SPEED",
            Self::YawRate => "YAW_RATE",
            Self::LateralAccel => "LATERAL_ACCEL",
            Self::GpsPos => "GPS_POS",
            Self::AccelX => "ACCEL_X",
            Self::LoadCurrent => "LOAD_CURRENT",
            Self::RadarObjects => "RADAR_OBJECTS",
            Self::CameraLane => "CAMERA_LANE",
            Self::HvVoltage => "HV_VOLTAGE",
            Self::HvCurrent => "HV_CURRENT",
            Self::HvTemp => "HV_TEMP",
            Self::BmsSoc => "BMS_SOC",
            Self::ContactorState => "CONTACTOR_STATE",
            Self::ChargeRequest => "CHARGE_REQUEST",
            Self::ChargerStatus => "CHARGER_STATUS",
            Self::ChargerOutput => "CHARGER_OUTPUT",
            Self::OtaUpdate => "OTA_UPDATE",
            Self::OtaStatus => "OTA_STATUS",
            Self::ObdRequest => "OBD_REQUEST",
            Self::ObdResponse => "OBD_RESPONSE",
            Self::UdsRequest => "UDS_REQUEST",
            Self::UdsResponse => "UDS_RESPONSE",
            Self::V2xRx => "V2X_RX",
            Self::HmiWarning => "HMI_WARNING",
            Self::SecurityAlert => "SECURITY_ALERT",
            Self::SetEnvMu => "SET_ENV_MU",
            Self::SetEnvThermal => "SET_ENV_THERMAL",
            Self::SetEnvVisibility => "SET_ENV_VISIBILITY",
            Self::SetSensorDrift => "SET_SENSOR_DRIFT",
            Self::ResetTrip => "RESET_TRIP",
            Self::OdometerData => "ODOMETER_DATA",
            Self::EscStatus => "ESC_STATUS",
            Self::DeployAirbag => "DEPLOY_AIRBAG",
            Self::DeploySeatbelt => "DEPLOY_SEATBELT",
            Self::PostCrashAlert => "POST_CRASH_ALERT",
        }
    }

    /// Returns true for the actuator command family (`*_CMD` ids).
    ///
    /// The Gateway's intrusion detection applies its sender allowlist
    /// to exactly these ids.
    pub const fn is_command(&self) -> bool {
        matches!(self, Self::SteeringCmd | Self::AccelCmd | Self::BrakeCmd)
    }
}

impl std::fmt::Display for MsgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Payload Types ──────────────────────────────────────────────────

/// One radar-tracked object in ego-relative coordinates.
///
/// `rel_speed < 0` means the object is closing in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarObject {
    /// Track id.
    pub id: u32,
    /// Longitudinal distance [m].
    pub dist: f64,
    /// Relative longitudinal speed [m/s].
    pub rel_speed: f64,
    /// Lateral offset from ego centerline [m].
    pub lat_pos: f64,
    /// Lateral speed [m/s].
    pub lat_speed: f64,
}

/// Lane geometry as measured by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneData {
    /// Offset from lane center [m], positive = left.
    pub lane_offset: f64,
    /// Heading error relative to the lane [rad].
    pub heading_idx: f64,
    /// Lane curvature [1/m].
    pub curvature: f64,
    /// Measurement confidence [0..1].
    pub confidence: f64,
}

/// EVSE connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChargerState {
    /// No cable plugged.
    Disconnected,
    /// Cable plugged, waiting for BMS negotiation.
    Connected,
    /// Delivering power.
    Charging,
    /// Emergency stop latched.
    Error,
}

/// OTA update image metadata plus (simulated) binary content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaImage {
    /// Target version string.
    pub version: String,
    /// Detached signature over the image.
    pub signature: String,
    /// Image content stand-in.
    pub binary: String,
}

/// Outcome of an OTA procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OtaStatus {
    /// Image flashed, version bumped.
    Success,
    /// Signature verification rejected the image.
    FailedSigVerify,
    /// Flash failed mid-write; previous version restored.
    RollbackComplete,
}

/// OBD-II response data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObdData {
    /// Plain numeric value (monitor status, RPM).
    Scalar(u32),
    /// Stored diagnostic trouble codes.
    Dtcs(Vec<String>),
    /// Vehicle identification number.
    Vin(String),
}

/// UDS request (ISO 14229 subset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdsRequest {
    /// Service id.
    pub sid: u8,
    /// Sub-function, where the service takes one.
    pub sub_fn: Option<u8>,
    /// Data identifier, where the service takes one.
    pub did: Option<u16>,
    /// Request data (security key).
    pub data: Option<u32>,
}

/// UDS response payload data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UdsData {
    /// Session timing parameters returned by 0x10.
    SessionTiming {
        /// P2 server max [ms].
        p2_server_ms: u16,
        /// P2* server max [ms].
        p2_star_server_ms: u16,
    },
    /// VIN string (DID 0xF190).
    Vin(String),
    /// Numeric measurement (DID 0x0200).
    Measurement(f64),
    /// Security access seed (0x27 0x01).
    Seed(u16),
    /// Security access granted (0x27 0x02).
    Unlocked,
    /// Routine accepted and started (0x31 0x01).
    RoutineStarted,
}

/// UDS response: positive (`sid + 0x40`) or negative (`0x7F`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UdsResponse {
    /// Positive response.
    Positive {
        /// Response service id (`request sid + 0x40`).
        sid: u8,
        /// Echoed sub-function.
        sub_fn: u8,
        /// Service data, if any.
        data: Option<UdsData>,
    },
    /// Negative response.
    Negative {
        /// Service id of the rejected request.
        request_sid: u8,
        /// Negative response code.
        nrc: u8,
    },
}

impl UdsResponse {
    /// The leading response SID byte: `request + 0x40` or `0x7F`.
    pub const fn sid(&self) -> u8 {
        match self {
            Self::Positive { sid, .. } => *sid,
            Self::Negative { .. } => 0x7F,
        }
    }
}

/// V2X basic safety message (BSM).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicSafetyMessage {
    /// Sender station id.
    pub id: String,
    /// Latitude [deg].
    pub lat: f64,
    /// Longitude [deg].
    pub lon: f64,
    /// Ground speed [m/s].
    pub speed: f64,
    /// Heading [rad].
    pub heading: f64,
}

/// Driver-facing warning classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HmiWarning {
    /// Intersection movement assist: crossing-traffic collision risk.
    IntersectionCollisionRisk,
}

/// Intrusion detection alert classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    /// A command message arrived from a sender outside the allowlist.
    UnauthorizedAccess,
}

// ─── Payload ────────────────────────────────────────────────────────

/// Tagged message payload, one variant per id class.
///
/// The bus never inspects payloads; only the fault injector may replace
/// one with [`Payload::Corrupted`], which receivers must treat as
/// malformed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// Marker payload for trigger-style ids (RESET_TRIP).
    Empty,
    /// Plain float (speeds, rates, currents, commands).
    Scalar(f64),
    /// Plain boolean (contactors, deployment squibs, ESC state).
    Flag(bool),
    /// Planar position [m].
    Position {
        /// East coordinate.
        x: f64,
        /// North coordinate.
        y: f64,
    },
    /// Split road friction under left/right wheels.
    SurfaceMu {
        /// Friction coefficient, left side.
        mu_left: f64,
        /// Friction coefficient, right side.
        mu_right: f64,
    },
    /// Ambient thermal environment.
    Thermal {
        /// Ambient temperature [°C].
        ambient_temp: f64,
    },
    /// Camera visibility [0..1], 1.0 = clear.
    Visibility(f64),
    /// Additive sensor drift offsets for the battery telemetry.
    SensorDrift {
        /// Voltage offset [V].
        voltage: f64,
        /// Current offset [A].
        current: f64,
        /// Temperature offset [°C].
        temp: f64,
    },
    /// Radar object list.
    RadarObjects(Vec<RadarObject>),
    /// Camera lane geometry.
    LaneData(LaneData),
    /// EVSE status announcement.
    ChargerStatus {
        /// Connection state.
        state: ChargerState,
        /// Maximum deliverable power [W].
        max_power: f64,
    },
    /// EVSE supply output.
    ChargerOutput {
        /// Supply voltage [V].
        voltage: f64,
        /// Supply current [A].
        current: f64,
    },
    /// BMS charging request (CC-CV setpoints).
    ChargeRequest {
        /// Target pack voltage [V].
        voltage_target: f64,
        /// Target charge current [A].
        current_target: f64,
        /// False = stop delivering power.
        charging_enabled: bool,
    },
    /// OTA update image.
    OtaUpdate(OtaImage),
    /// OTA procedure outcome.
    OtaStatus(OtaStatus),
    /// OBD-II request.
    ObdRequest {
        /// Service mode.
        mode: u8,
        /// Parameter id, where the mode takes one.
        pid: Option<u8>,
    },
    /// OBD-II response.
    ObdResponse {
        /// Response mode (`request mode + 0x40`).
        mode: u8,
        /// Echoed parameter id.
        pid: u8,
        /// Response data; `None` for unsupported mode/pid pairs.
        data: Option<ObdData>,
    },
    /// UDS request.
    UdsRequest(UdsRequest),
    /// UDS response.
    UdsResponse(UdsResponse),
    /// V2X basic safety message.
    Bsm(BasicSafetyMessage),
    /// Driver-facing warning.
    HmiWarning(HmiWarning),
    /// Intrusion detection alert.
    SecurityAlert {
        /// Alert class.
        kind: AlertKind,
        /// Human-readable context (`sender->id`).
        details: String,
    },
    /// Odometer readout.
    Odometer {
        /// Lifetime distance [km].
        total_km: f64,
        /// Trip distance [km].
        trip_km: f64,
    },
    /// Fault-injection sentinel replacing the original payload.
    Corrupted,
}

impl Payload {
    /// The scalar value, if this payload carries one.
    pub const fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }
}

// ─── Message ────────────────────────────────────────────────────────

/// One broadcast on the virtual bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Symbolic identifier.
    pub id: MsgId,
    /// Tagged payload; shape fixed per id.
    pub payload: Payload,
    /// Originating node name.
    pub sender: String,
}

impl Message {
    /// Build a message from its parts.
    pub fn new(id: MsgId, payload: Payload, sender: &str) -> Self {
        Self {
            id,
            payload,
            sender: sender.to_string(),
        }
    }
}
