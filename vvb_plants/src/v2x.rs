//! V2X radio plant.
//!
//! Beacons a basic safety message at 10 Hz, built from the vehicle
//! state observed on the bus. Position maps onto a fixed geodetic
//! anchor; remote traffic is injected by the harness as `V2X_RX`
//! broadcasts from other station ids.

use std::any::Any;

use vvb_common::msg::{BasicSafetyMessage, Message, MsgId, Payload};
use vvb_common::names;
use vvb_sim::{Bus, Node, NodeError, Plant};

/// Beacon interval [s] (10 Hz).
const BSM_INTERVAL_S: f64 = 0.1;

/// Geodetic anchor of the proving ground.
const ANCHOR_LAT: f64 = 37.7749;
const ANCHOR_LON: f64 = -122.4194;

/// Meters-to-degrees scale for the flat local projection.
const DEG_PER_METER: f64 = 1.0e-5;

/// V2X radio plant.
pub struct V2xRadio {
    since_last_bsm: f64,
    lat: f64,
    lon: f64,
    speed: f64,
    heading: f64,
}

impl Default for V2xRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl V2xRadio {
    /// Create a radio parked at the anchor position.
    pub fn new() -> Self {
        Self {
            since_last_bsm: 0.0,
            lat: ANCHOR_LAT,
            lon: ANCHOR_LON,
            speed: 0.0,
            heading: 0.0,
        }
    }

    fn broadcast_bsm(&self, bus: &mut Bus) -> Result<(), NodeError> {
        let bsm = BasicSafetyMessage {
            id: names::V2X_RADIO.to_string(),
            lat: self.lat,
            lon: self.lon,
            speed: self.speed,
            heading: self.heading,
        };
        bus.broadcast(MsgId::V2xRx, Payload::Bsm(bsm), names::V2X_RADIO)?;
        Ok(())
    }
}

impl Node for V2xRadio {
    fn name(&self) -> &str {
        names::V2X_RADIO
    }

    fn receive(&mut self, _bus: &mut Bus, msg: &Message) -> Result<(), NodeError> {
        match (msg.id, &msg.payload) {
            (MsgId::GpsPos, Payload::Position { x, y }) => {
                self.lat = ANCHOR_LAT + y * DEG_PER_METER;
                self.lon = ANCHOR_LON + x * DEG_PER_METER;
            }
            (MsgId::WheelSpeed, Payload::Scalar(speed)) if speed.is_finite() => {
                self.speed = *speed;
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

impl Plant for V2xRadio {
    fn advance_physics(&mut self, bus: &mut Bus, dt: f64) -> Result<(), NodeError> {
        self.since_last_bsm += dt;
        if self.since_last_bsm >= BSM_INTERVAL_S {
            self.broadcast_bsm(bus)?;
            self.since_last_bsm = 0.0;
        }
        Ok(())
    }

    fn publish_sensors(&mut self, _bus: &mut Bus) -> Result<(), NodeError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vvb_sim::Engine;

    #[test]
    fn beacons_at_ten_hertz() {
        let mut engine = Engine::new(0.1);
        engine.add_plant(Box::new(V2xRadio::new())).unwrap();

        for _ in 0..5 {
            engine.step().unwrap();
        }

        let bsm_count = engine
            .bus()
            .log()
            .messages(MsgId::V2xRx)
            .filter(|m| m.sender == names::V2X_RADIO)
            .count();
        assert_eq!(bsm_count, 5);
    }

    #[test]
    fn bsm_reflects_received_vehicle_state() {
        let mut radio = V2xRadio::new();
        let mut bus = Bus::new();

        radio
            .receive(
                &mut bus,
                &Message::new(
                    MsgId::GpsPos,
                    Payload::Position { x: 100.0, y: 50.0 },
                    names::VEHICLE_DYNAMICS,
                ),
            )
            .unwrap();
        radio
            .receive(
                &mut bus,
                &Message::new(
                    MsgId::WheelSpeed,
                    Payload::Scalar(13.0),
                    names::VEHICLE_DYNAMICS,
                ),
            )
            .unwrap();

        radio.advance_physics(&mut bus, 0.1).unwrap();

        match &bus.log().last(MsgId::V2xRx).unwrap().payload {
            Payload::Bsm(bsm) => {
                assert_eq!(bsm.id, names::V2X_RADIO);
                assert!((bsm.lat - (ANCHOR_LAT + 50.0 * DEG_PER_METER)).abs() < 1e-12);
                assert!((bsm.lon - (ANCHOR_LON + 100.0 * DEG_PER_METER)).abs() < 1e-12);
                assert_eq!(bsm.speed, 13.0);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn slow_tick_still_meets_interval() {
        let mut engine = Engine::new(0.5);
        engine.add_plant(Box::new(V2xRadio::new())).unwrap();
        engine.step().unwrap();
        // dt exceeds the interval; one beacon per tick.
        assert_eq!(engine.bus().log().messages(MsgId::V2xRx).count(), 1);
    }
}
