//! Electronic stability control ECU.
//!
//! Threshold intervention on the yaw rate signal: above the limit the
//! unit latches active, announces itself, and applies stabilizing
//! braking; once the yaw settles it releases both.

use std::any::Any;

use tracing::{info, warn};
use vvb_common::msg::{Message, MsgId, Payload};
use vvb_common::names;
use vvb_sim::{Bus, Node, NodeError};

/// Yaw rate above which the vehicle is considered unstable [rad/s]
/// (~28 deg/s).
const YAW_RATE_LIMIT: f64 = 0.5;

/// Stabilizing brake command while active [0..1].
const STABILIZING_BRAKE: f64 = 0.8;

/// Stability control ECU.
#[derive(Default)]
pub struct EscEcu {
    active: bool,
}

impl EscEcu {
    /// Create an inactive ESC.
    pub fn new() -> Self {
        Self::default()
    }

    /// True while an intervention is running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    fn check_stability(&mut self, bus: &mut Bus, yaw_rate: f64) -> Result<(), NodeError> {
        if yaw_rate.abs() > YAW_RATE_LIMIT {
            if !self.active {
                warn!(yaw_rate, "ESC: high yaw rate, intervening");
                self.active = true;
                bus.broadcast(MsgId::EscStatus, Payload::Flag(true), names::ESC_ECU)?;
                bus.broadcast(
                    MsgId::BrakeCmd,
                    Payload::Scalar(STABILIZING_BRAKE),
                    names::ESC_ECU,
                )?;
            }
        } else if self.active {
            info!("ESC: yaw settled, releasing");
            self.active = false;
            bus.broadcast(MsgId::EscStatus, Payload::Flag(false), names::ESC_ECU)?;
            bus.broadcast(MsgId::BrakeCmd, Payload::Scalar(0.0), names::ESC_ECU)?;
        }
        Ok(())
    }
}

impl Node for EscEcu {
    fn name(&self) -> &str {
        names::ESC_ECU
    }

    fn receive(&mut self, bus: &mut Bus, msg: &Message) -> Result<(), NodeError> {
        if let (MsgId::YawRate, Payload::Scalar(rate)) = (msg.id, &msg.payload) {
            if rate.is_finite() {
                self.check_stability(bus, *rate)?;
            }
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
