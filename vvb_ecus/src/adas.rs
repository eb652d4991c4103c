//! ADAS ECU: two independent control laws sharing the bus.
//!
//! **AEB** computes time-to-collision over the radar object list,
//! gated to the ego lane, and commands full braking below the
//! threshold. Malformed radar input releases the brakes and logs — a
//! perception glitch must never escalate into a phantom full stop.
//!
//! **LKA** steers against lane offset and heading error, but only
//! while the camera reports sufficient confidence (SOTIF
//! disengagement below the floor).

use std::any::Any;

use tracing::{debug, warn};
use vvb_common::msg::{LaneData, Message, MsgId, Payload, RadarObject};
use vvb_common::names;
use vvb_sim::{Bus, Node, NodeError};

/// AEB trigger threshold [s].
const TTC_THRESHOLD_S: f64 = 2.5;

/// Half of the assumed 3.5 m lane width [m]; objects beyond it are
/// not in the ego path.
const LANE_HALF_WIDTH_M: f64 = 1.75;

/// Camera confidence floor below which LKA stays silent.
const LKA_CONFIDENCE_FLOOR: f64 = 0.6;

/// Proportional steering gain per meter of lane offset.
const LKA_KP_OFFSET: f64 = 0.05;

/// Steering gain per radian of heading error.
const LKA_KP_HEADING: f64 = 1.5;

/// Steering command clamp [rad].
const LKA_MAX_STEER: f64 = 0.5;

/// Advanced driver assistance ECU.
#[derive(Default)]
pub struct AdasEcu {
    aeb_triggered: bool,
}

impl AdasEcu {
    /// Create an idle ADAS unit.
    pub fn new() -> Self {
        Self::default()
    }

    /// True while emergency braking is commanded.
    pub fn aeb_triggered(&self) -> bool {
        self.aeb_triggered
    }

    /// Evaluate TTC over the object list and command or release the
    /// emergency brake.
    fn process_radar(&mut self, bus: &mut Bus, objects: &[RadarObject]) -> Result<(), NodeError> {
        let mut min_ttc = f64::INFINITY;

        for obj in objects {
            if !(obj.dist.is_finite() && obj.rel_speed.is_finite() && obj.lat_pos.is_finite()) {
                warn!(id = obj.id, "AEB: non-finite radar track, releasing");
                return self.release_aeb(bus);
            }
            // Objects outside the ego lane do not gate braking.
            if obj.lat_pos.abs() > LANE_HALF_WIDTH_M {
                continue;
            }
            if obj.rel_speed < 0.0 {
                let ttc = -obj.dist / obj.rel_speed;
                min_ttc = min_ttc.min(ttc);
            }
        }

        if min_ttc < TTC_THRESHOLD_S {
            warn!(ttc = min_ttc, "AEB: emergency braking");
            self.trigger_aeb(bus)
        } else if self.aeb_triggered {
            self.release_aeb(bus)
        } else {
            Ok(())
        }
    }

    /// Steer toward lane center if the camera is confident enough.
    fn process_lane(&mut self, bus: &mut Bus, lane: &LaneData) -> Result<(), NodeError> {
        if !(lane.lane_offset.is_finite() && lane.heading_idx.is_finite()) {
            warn!("LKA: non-finite lane geometry, disengaged");
            return Ok(());
        }
        if lane.confidence < LKA_CONFIDENCE_FLOOR {
            debug!(confidence = lane.confidence, "LKA: low confidence, disengaged");
            return Ok(());
        }

        let steer = -(LKA_KP_OFFSET * lane.lane_offset + LKA_KP_HEADING * lane.heading_idx);
        let steer = steer.clamp(-LKA_MAX_STEER, LKA_MAX_STEER);
        bus.broadcast(MsgId::SteeringCmd, Payload::Scalar(steer), names::ADAS_ECU)?;
        Ok(())
    }

    fn trigger_aeb(&mut self, bus: &mut Bus) -> Result<(), NodeError> {
        self.aeb_triggered = true;
        bus.broadcast(MsgId::BrakeCmd, Payload::Scalar(1.0), names::ADAS_ECU)?;
        Ok(())
    }

    fn release_aeb(&mut self, bus: &mut Bus) -> Result<(), NodeError> {
        self.aeb_triggered = false;
        bus.broadcast(MsgId::BrakeCmd, Payload::Scalar(0.0), names::ADAS_ECU)?;
        Ok(())
    }
}

impl Node for AdasEcu {
    fn name(&self) -> &str {
        names::ADAS_ECU
    }

    fn receive(&mut self, bus: &mut Bus, msg: &Message) -> Result<(), NodeError> {
        match (msg.id, &msg.payload) {
            (MsgId::RadarObjects, Payload::RadarObjects(objects)) => {
                self.process_radar(bus, objects)?;
            }
            (MsgId::RadarObjects, payload) => {
                warn!(?payload, "AEB: malformed radar data, releasing");
                self.release_aeb(bus)?;
            }
            (MsgId::CameraLane, Payload::LaneData(lane)) => {
                self.process_lane(bus, lane)?;
            }
            (MsgId::CameraLane, payload) => {
                warn!(?payload, "LKA: malformed lane data, disengaged");
            }
            _ => {}
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
