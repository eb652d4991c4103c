//! Airbag control unit.
//!
//! Watches the longitudinal acceleration channel and fires the
//! restraint systems on a crash-level deceleration. Deployment is
//! one-shot: squibs do not re-arm.

use std::any::Any;

use tracing::warn;
use vvb_common::msg::{Message, MsgId, Payload};
use vvb_common::names;
use vvb_sim::{Bus, Node, NodeError};

/// Standard gravity [m/s²].
const G: f64 = 9.81;

/// Deployment threshold [g]; decelerations beyond this fire the squibs.
const CRASH_THRESHOLD_G: f64 = -5.0;

/// Airbag control unit.
#[derive(Default)]
pub struct AirbagEcu {
    deployed: bool,
    /// Last known position for the post-crash call.
    last_position: (f64, f64),
}

impl AirbagEcu {
    /// Create an armed, undeployed unit.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the restraints have fired.
    pub fn deployed(&self) -> bool {
        self.deployed
    }

    fn deploy(&mut self, bus: &mut Bus) -> Result<(), NodeError> {
        warn!("ACU: crash detected, deploying restraint systems");
        self.deployed = true;
        bus.broadcast(MsgId::DeployAirbag, Payload::Flag(true), names::AIRBAG_ECU)?;
        bus.broadcast(MsgId::DeploySeatbelt, Payload::Flag(true), names::AIRBAG_ECU)?;
        bus.broadcast(
            MsgId::PostCrashAlert,
            Payload::Position {
                x: self.last_position.0,
                y: self.last_position.1,
            },
            names::AIRBAG_ECU,
        )?;
        Ok(())
    }
}

impl Node for AirbagEcu {
    fn name(&self) -> &str {
        names::AIRBAG_ECU
    }

    fn receive(&mut self, bus: &mut Bus, msg: &Message) -> Result<(), NodeError> {
        match (msg.id, &msg.payload) {
            (MsgId::AccelX, Payload::Scalar(accel)) if accel.is_finite() => {
                let accel_g = accel / G;
                if accel_g < CRASH_THRESHOLD_G && !self.deployed {
                    self.deploy(bus)?;
                }
            }
            (MsgId::GpsPos, Payload::Position { x, y }) => {
                self.last_position = (*x, *y);
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

#[cfg(test)]
mod tests {
    use super::*;

    fn accel(a: f64) -> Message {
        Message::new(MsgId::AccelX, Payload::Scalar(a), names::VEHICLE_DYNAMICS)
    }

    #[test]
    fn hard_braking_does_not_deploy() {
        let mut acu = AirbagEcu::new();
        let mut bus = Bus::new();

        // ~1 g braking.
        acu.receive(&mut bus, &accel(-10.0)).unwrap();

        assert!(!acu.deployed());
        assert!(bus.log().is_empty());
    }

    #[test]
    fn crash_deceleration_fires_all_restraints() {
        let mut acu = AirbagEcu::new();
        let mut bus = Bus::new();

        acu.receive(
            &mut bus,
            &Message::new(
                MsgId::GpsPos,
                Payload::Position { x: 12.0, y: -3.0 },
                names::VEHICLE_DYNAMICS,
            ),
        )
        .unwrap();
        // ~6 g deceleration.
        acu.receive(&mut bus, &accel(-60.0)).unwrap();

        assert!(acu.deployed());
        assert!(bus.log().last(MsgId::DeployAirbag).is_some());
        assert!(bus.log().last(MsgId::DeploySeatbelt).is_some());
        match &bus.log().last(MsgId::PostCrashAlert).unwrap().payload {
            Payload::Position { x, y } => {
                assert_eq!((*x, *y), (12.0, -3.0));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn deployment_is_one_shot() {
        let mut acu = AirbagEcu::new();
        let mut bus = Bus::new();

        acu.receive(&mut bus, &accel(-60.0)).unwrap();
        acu.receive(&mut bus, &accel(-60.0)).unwrap();

        assert_eq!(bus.log().messages(MsgId::DeployAirbag).count(), 1);
    }

    #[test]
    fn positive_spike_does_not_deploy() {
        let mut acu = AirbagEcu::new();
        let mut bus = Bus::new();

        acu.receive(&mut bus, &accel(80.0)).unwrap();
        assert!(!acu.deployed());
    }
}
