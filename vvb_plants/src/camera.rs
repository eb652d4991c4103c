//! Lane camera mock.
//!
//! Projects the vehicle position onto a straight reference lane along
//! the x-axis: the lateral offset is the GPS y coordinate, the heading
//! error is the vehicle yaw. Visibility drives both the published
//! confidence and the magnitude of the measurement noise; the noise
//! source is a per-instance seeded generator so runs stay
//! reproducible.

use std::any::Any;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use vvb_common::msg::{LaneData, Message, MsgId, Payload};
use vvb_common::names;
use vvb_sim::{Bus, Node, NodeError, Plant};

/// Peak offset noise at zero visibility [m].
const MAX_OFFSET_NOISE: f64 = 0.5;

/// Lane camera plant.
pub struct CameraPlant {
    offset_from_center: f64,
    heading_error: f64,
    curvature: f64,
    /// Last received yaw rate [rad/s]; integrated into heading error.
    yaw_rate: f64,
    /// 0.0 = clear view, 1.0 = total occlusion.
    noise_level: f64,
    rng: SmallRng,
}

impl CameraPlant {
    /// Create a camera with a clear view; `seed` fixes the noise
    /// sequence.
    pub fn new(seed: u64) -> Self {
        Self {
            offset_from_center: 0.0,
            heading_error: 0.0,
            curvature: 0.0,
            yaw_rate: 0.0,
            noise_level: 0.0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Current confidence the camera would report.
    pub fn confidence(&self) -> f64 {
        (1.0 - self.noise_level).max(0.0)
    }
}

impl Node for CameraPlant {
    fn name(&self) -> &str {
        names::CAMERA_PLANT
    }

    fn receive(&mut self, _bus: &mut Bus, msg: &Message) -> Result<(), NodeError> {
        match (msg.id, &msg.payload) {
            (MsgId::GpsPos, Payload::Position { y, .. }) => {
                // Straight reference lane along the x-axis.
                self.offset_from_center = *y;
            }
            (MsgId::YawRate, Payload::Scalar(rate)) if rate.is_finite() => {
                self.yaw_rate = *rate;
            }
            (MsgId::SetEnvVisibility, Payload::Visibility(vis)) => {
                self.noise_level = (1.0 - vis.clamp(0.0, 1.0)).clamp(0.0, 1.0);
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

impl Plant for CameraPlant {
    fn advance_physics(&mut self, _bus: &mut Bus, dt: f64) -> Result<(), NodeError> {
        // The reference lane heading is zero, so the heading error is
        // the integrated vehicle yaw.
        self.heading_error += self.yaw_rate * dt;
        Ok(())
    }

    fn publish_sensors(&mut self, bus: &mut Bus) -> Result<(), NodeError> {
        let noise = self.rng.gen_range(-MAX_OFFSET_NOISE..=MAX_OFFSET_NOISE) * self.noise_level;
        let lane = LaneData {
            lane_offset: self.offset_from_center + noise,
            heading_idx: self.heading_error,
            curvature: self.curvature,
            confidence: self.confidence(),
        };
        bus.broadcast(MsgId::CameraLane, Payload::LaneData(lane), names::CAMERA_PLANT)?;
        Ok(())
    }
}
