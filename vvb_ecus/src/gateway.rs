//! Central gateway ECU.
//!
//! Four responsibilities dispatched by message id:
//!
//! - **IDS** — command messages from senders outside the allowlist
//!   raise a security alert.
//! - **OTA** — signature-gated flash with rollback on write failure.
//! - **OBD-II** — a small fixed table of modes 0x01 / 0x03 / 0x09.
//! - **UDS** (ISO 14229 subset) — services 0x10, 0x22, 0x27, 0x31 with
//!   positive/negative response framing.
//! - **V2X** — intersection movement assist on remote basic safety
//!   messages.

use std::any::Any;

use tracing::{info, warn};
use vvb_common::msg::{
    AlertKind, BasicSafetyMessage, HmiWarning, Message, MsgId, ObdData, OtaImage, OtaStatus,
    Payload, UdsData, UdsRequest, UdsResponse,
};
use vvb_common::names;
use vvb_sim::{Bus, Node, NodeError};

/// Vehicle identification number served over OBD and UDS.
const VIN: &str = "1FA-VIRTUAL-CAR-001";

/// Security access seed handed out by service 0x27.
const SECURITY_SEED: u16 = 0x1234;

/// Remote station the intersection-movement-assist rule watches.
const IMA_STATION_ID: &str = "RemoteVehicle_1";

/// Remote speed above which a crossing BSM is a collision risk [m/s].
const IMA_SPEED_THRESHOLD: f64 = 10.0;

// ── UDS negative response codes ──
const NRC_SERVICE_NOT_SUPPORTED: u8 = 0x11;
const NRC_SUBFUNC_NOT_SUPPORTED: u8 = 0x12;
const NRC_REQUEST_OUT_OF_RANGE: u8 = 0x31;
const NRC_INVALID_KEY: u8 = 0x35;

/// Senders allowed to issue `*_CMD` messages.
///
/// `TestHarness` is a bench-only convenience so tests can drive
/// actuators directly; a production allowlist would not carry it.
const COMMAND_ALLOWLIST: [&str; 5] = [
    names::ADAS_ECU,
    names::BMS_ECU,
    names::VEHICLE_DYNAMICS,
    names::TEST_HARNESS,
    names::V2X_RADIO,
];

/// Central gateway ECU.
pub struct GatewayEcu {
    ids_enabled: bool,
    current_version: String,
    diagnostic_session: u8,
    /// Seed handed out by 0x27/0x01 and not yet consumed by a valid key.
    pending_seed: Option<u16>,
    security_unlocked: bool,
}

impl Default for GatewayEcu {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayEcu {
    /// Create a gateway in the default diagnostic session, locked.
    pub fn new() -> Self {
        Self {
            ids_enabled: true,
            current_version: "1.0".to_string(),
            diagnostic_session: 0x01,
            pending_seed: None,
            security_unlocked: false,
        }
    }

    /// Installed firmware version.
    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// Active diagnostic session (0x10 sub-function).
    pub fn diagnostic_session(&self) -> u8 {
        self.diagnostic_session
    }

    /// True once security access was granted via seed/key.
    pub fn security_unlocked(&self) -> bool {
        self.security_unlocked
    }

    /// Enable or disable intrusion detection.
    pub fn set_ids_enabled(&mut self, enabled: bool) {
        self.ids_enabled = enabled;
    }

    // ─── IDS ────────────────────────────────────────────────────────

    fn detect_intrusion(&mut self, bus: &mut Bus, msg: &Message) -> Result<(), NodeError> {
        if !self.ids_enabled || !msg.id.is_command() {
            return Ok(());
        }
        if COMMAND_ALLOWLIST.contains(&msg.sender.as_str()) {
            return Ok(());
        }
        warn!(sender = %msg.sender, id = %msg.id, "IDS: unauthorized command sender");
        bus.broadcast(
            MsgId::SecurityAlert,
            Payload::SecurityAlert {
                kind: AlertKind::UnauthorizedAccess,
                details: format!("{}->{}", msg.sender, msg.id),
            },
            names::GATEWAY_ECU,
        )?;
        Ok(())
    }

    // ─── OTA ────────────────────────────────────────────────────────

    fn handle_ota(&mut self, bus: &mut Bus, image: &OtaImage) -> Result<(), NodeError> {
        info!(version = %image.version, "gateway: received OTA update");

        if image.signature != "valid_sig" {
            warn!("gateway: OTA signature verification failed, rejecting");
            return self.send_ota_status(bus, OtaStatus::FailedSigVerify);
        }

        // A/B flash simulation: a corrupt chunk fails the write and
        // rolls back to the running partition.
        if image.binary == "corrupt_chunk" {
            warn!("gateway: flash write failed, rolling back");
            return self.send_ota_status(bus, OtaStatus::RollbackComplete);
        }

        self.current_version = image.version.clone();
        info!(version = %self.current_version, "gateway: update complete");
        self.send_ota_status(bus, OtaStatus::Success)
    }

    fn send_ota_status(&self, bus: &mut Bus, status: OtaStatus) -> Result<(), NodeError> {
        bus.broadcast(MsgId::OtaStatus, Payload::OtaStatus(status), names::GATEWAY_ECU)?;
        Ok(())
    }

    // ─── OBD-II ─────────────────────────────────────────────────────

    fn handle_obd(&self, bus: &mut Bus, mode: u8, pid: Option<u8>) -> Result<(), NodeError> {
        let data = match (mode, pid) {
            // Mode 01: current data.
            (0x01, Some(0x01)) => Some(ObdData::Scalar(0x00)), // Monitor status
            (0x01, Some(0x0C)) => Some(ObdData::Scalar(3000)), // Engine RPM
            // Mode 03: stored DTCs.
            (0x03, _) => Some(ObdData::Dtcs(vec!["P0123".to_string()])),
            // Mode 09: vehicle info.
            (0x09, Some(0x02)) => Some(ObdData::Vin(VIN.to_string())),
            _ => None,
        };

        bus.broadcast(
            MsgId::ObdResponse,
            Payload::ObdResponse {
                mode: mode.wrapping_add(0x40),
                pid: pid.unwrap_or(0x00),
                data,
            },
            names::GATEWAY_ECU,
        )?;
        Ok(())
    }

    // ─── UDS ────────────────────────────────────────────────────────

    fn handle_uds(&mut self, bus: &mut Bus, req: &UdsRequest) -> Result<(), NodeError> {
        let response = self.process_uds(req);
        bus.broadcast(MsgId::UdsResponse, Payload::UdsResponse(response), names::GATEWAY_ECU)?;
        Ok(())
    }

    fn process_uds(&mut self, req: &UdsRequest) -> UdsResponse {
        let sub_fn = req.sub_fn.unwrap_or(0x00);
        let positive = |data: Option<UdsData>| UdsResponse::Positive {
            sid: req.sid.wrapping_add(0x40),
            sub_fn,
            data,
        };
        let negative = |nrc: u8| UdsResponse::Negative {
            request_sid: req.sid,
            nrc,
        };

        match req.sid {
            // Diagnostic Session Control.
            0x10 => match sub_fn {
                0x01..=0x03 => {
                    self.diagnostic_session = sub_fn;
                    positive(Some(UdsData::SessionTiming {
                        p2_server_ms: 50,
                        p2_star_server_ms: 500,
                    }))
                }
                _ => negative(NRC_SUBFUNC_NOT_SUPPORTED),
            },

            // Read Data By Identifier.
            0x22 => match req.did {
                Some(0xF190) => positive(Some(UdsData::Vin(VIN.to_string()))),
                Some(0x0200) => positive(Some(UdsData::Measurement(400.5))),
                _ => negative(NRC_REQUEST_OUT_OF_RANGE),
            },

            // Security Access: seed, then key = seed + 1.
            0x27 => match sub_fn {
                0x01 => {
                    self.pending_seed = Some(SECURITY_SEED);
                    positive(Some(UdsData::Seed(SECURITY_SEED)))
                }
                0x02 => match self.pending_seed {
                    Some(seed) if req.data == Some(u32::from(seed) + 1) => {
                        self.security_unlocked = true;
                        self.pending_seed = None;
                        info!("gateway: security access granted");
                        positive(Some(UdsData::Unlocked))
                    }
                    _ => negative(NRC_INVALID_KEY),
                },
                _ => negative(NRC_INVALID_KEY),
            },

            // Routine Control.
            0x31 => match sub_fn {
                0x01 => match req.did {
                    Some(0x0100) => {
                        info!("gateway: starting wiper test routine");
                        positive(Some(UdsData::RoutineStarted))
                    }
                    _ => negative(NRC_REQUEST_OUT_OF_RANGE),
                },
                _ => negative(NRC_SUBFUNC_NOT_SUPPORTED),
            },

            _ => negative(NRC_SERVICE_NOT_SUPPORTED),
        }
    }

    // ─── V2X ────────────────────────────────────────────────────────

    fn handle_v2x(&self, bus: &mut Bus, bsm: &BasicSafetyMessage) -> Result<(), NodeError> {
        if bsm.id == IMA_STATION_ID && bsm.speed > IMA_SPEED_THRESHOLD {
            warn!(station = %bsm.id, speed = bsm.speed, "V2X: collision risk");
            bus.broadcast(
                MsgId::HmiWarning,
                Payload::HmiWarning(HmiWarning::IntersectionCollisionRisk),
                names::GATEWAY_ECU,
            )?;
        }
        Ok(())
    }
}

impl Node for GatewayEcu {
    fn name(&self) -> &str {
        names::GATEWAY_ECU
    }

    fn receive(&mut self, bus: &mut Bus, msg: &Message) -> Result<(), NodeError> {
        match (msg.id, &msg.payload) {
            (MsgId::OtaUpdate, Payload::OtaUpdate(image)) => self.handle_ota(bus, image),
            (MsgId::ObdRequest, Payload::ObdRequest { mode, pid }) => {
                self.handle_obd(bus, *mode, *pid)
            }
            (MsgId::UdsRequest, Payload::UdsRequest(req)) => self.handle_uds(bus, req),
            (MsgId::V2xRx, Payload::Bsm(bsm)) => self.handle_v2x(bus, bsm),
            (MsgId::OtaUpdate | MsgId::ObdRequest | MsgId::UdsRequest | MsgId::V2xRx, payload) => {
                // No recoverable service id in a malformed request; log
                // and stay silent rather than answer on a guess.
                warn!(id = %msg.id, ?payload, "gateway: malformed service request dropped");
                Ok(())
            }
            _ => self.detect_intrusion(bus, msg),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
