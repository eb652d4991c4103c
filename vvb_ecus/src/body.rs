//! Body control module: odometer and trip meter.
//!
//! Accumulates distance from the absolute wheel speed integrated over
//! the engine step, so reverse driving still increments the meters.
//! The counters persist in a small JSON document at a configurable
//! path; a missing or unreadable document falls back to zeroed meters.

use std::any::Any;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vvb_common::msg::{Message, MsgId, Payload};
use vvb_common::names;
use vvb_sim::{Bus, Node, NodeError};

/// Persisted NVM document, distances in meters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct NvmDocument {
    total_mileage: f64,
    trip_meter: f64,
}

/// Body ECU with persistent odometer state.
pub struct BodyEcu {
    nvm_path: PathBuf,
    /// Lifetime distance [m].
    total_mileage: f64,
    /// Resettable trip distance [m].
    trip_meter: f64,
    /// Last received wheel speed magnitude [m/s].
    wheel_speed: f64,
}

impl BodyEcu {
    /// Create a Body ECU, restoring the meters from `nvm_path`.
    ///
    /// A missing or corrupt document is tolerated: the meters start at
    /// zero and the next `save_to_nvm` rewrites the file.
    pub fn new(nvm_path: impl Into<PathBuf>) -> Self {
        let nvm_path = nvm_path.into();
        let doc = Self::load_nvm(&nvm_path);
        Self {
            nvm_path,
            total_mileage: doc.total_mileage,
            trip_meter: doc.trip_meter,
            wheel_speed: 0.0,
        }
    }

    fn load_nvm(path: &Path) -> NvmDocument {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "body: corrupt NVM, zeroing meters");
                    NvmDocument::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => NvmDocument::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "body: unreadable NVM, zeroing meters");
                NvmDocument::default()
            }
        }
    }

    /// Write the meters to the NVM document.
    pub fn save_to_nvm(&self) -> Result<(), NodeError> {
        let doc = NvmDocument {
            total_mileage: self.total_mileage,
            trip_meter: self.trip_meter,
        };
        let content = serde_json::to_string_pretty(&doc)
            .map_err(|e| NodeError::NvmFormat(e.to_string()))?;
        std::fs::write(&self.nvm_path, content)?;
        Ok(())
    }

    /// Lifetime distance [m].
    pub fn total_mileage(&self) -> f64 {
        self.total_mileage
    }

    /// Trip distance [m].
    pub fn trip_meter(&self) -> f64 {
        self.trip_meter
    }
}

impl Node for BodyEcu {
    fn name(&self) -> &str {
        names::BODY_ECU
    }

    fn receive(&mut self, _bus: &mut Bus, msg: &Message) -> Result<(), NodeError> {
        match (msg.id, &msg.payload) {
            (MsgId::WheelSpeed, Payload::Scalar(speed)) if speed.is_finite() => {
                // Odometers count distance, not displacement.
                self.wheel_speed = speed.abs();
            }
            (MsgId::WheelSpeed, payload) => {
                warn!(?payload, "body: malformed wheel speed ignored");
            }
            (MsgId::ResetTrip, _) => {
                if self.trip_meter != 0.0 {
                    info!("body: trip meter reset");
                }
                self.trip_meter = 0.0;
            }
            _ => {}
        }
        Ok(())
    }

    fn step(&mut self, bus: &mut Bus, dt: f64) -> Result<(), NodeError> {
        let increment = self.wheel_speed * dt;
        self.total_mileage += increment;
        self.trip_meter += increment;

        bus.broadcast(
            MsgId::OdometerData,
            Payload::Odometer {
                total_km: self.total_mileage / 1000.0,
                trip_km: self.trip_meter / 1000.0,
            },
            names::BODY_ECU,
        )?;
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

    fn wheel_speed(v: f64) -> Message {
        Message::new(MsgId::WheelSpeed, Payload::Scalar(v), names::VEHICLE_DYNAMICS)
    }

    #[test]
    fn accumulates_speed_times_dt() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = BodyEcu::new(dir.path().join("odo.json"));
        let mut bus = Bus::new();

        body.receive(&mut bus, &wheel_speed(20.0)).unwrap();
        for _ in 0..100 {
            body.step(&mut bus, 0.05).unwrap();
        }

        assert!((body.total_mileage() - 100.0).abs() < 1e-9);
        assert!((body.trip_meter() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn reverse_driving_still_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = BodyEcu::new(dir.path().join("odo.json"));
        let mut bus = Bus::new();

        body.receive(&mut bus, &wheel_speed(-5.0)).unwrap();
        body.step(&mut bus, 1.0).unwrap();

        assert!((body.total_mileage() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn trip_reset_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = BodyEcu::new(dir.path().join("odo.json"));
        let mut bus = Bus::new();

        body.receive(&mut bus, &wheel_speed(10.0)).unwrap();
        body.step(&mut bus, 1.0).unwrap();
        assert!(body.trip_meter() > 0.0);

        let reset = Message::new(MsgId::ResetTrip, Payload::Empty, names::TEST_HARNESS);
        body.receive(&mut bus, &reset).unwrap();
        assert_eq!(body.trip_meter(), 0.0);
        // A second reset on a zero trip stays zero.
        body.receive(&mut bus, &reset).unwrap();
        assert_eq!(body.trip_meter(), 0.0);
        // The lifetime meter is untouched.
        assert!((body.total_mileage() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odo.json");
        let mut bus = Bus::new();

        let mut body = BodyEcu::new(&path);
        body.receive(&mut bus, &wheel_speed(20.0)).unwrap();
        for _ in 0..10 {
            body.step(&mut bus, 0.1).unwrap();
        }
        let captured = body.total_mileage();
        body.save_to_nvm().unwrap();

        let restored = BodyEcu::new(&path);
        assert!((restored.total_mileage() - captured).abs() < 1e-6);
        assert!((restored.trip_meter() - captured).abs() < 1e-6);
    }

    #[test]
    fn missing_nvm_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let body = BodyEcu::new(dir.path().join("never_written.json"));
        assert_eq!(body.total_mileage(), 0.0);
        assert_eq!(body.trip_meter(), 0.0);
    }

    #[test]
    fn corrupt_nvm_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odo.json");
        std::fs::write(&path, "{not json").unwrap();

        let body = BodyEcu::new(&path);
        assert_eq!(body.total_mileage(), 0.0);
    }

    #[test]
    fn high_mileage_keeps_counting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odo.json");
        let high = 999_999_000.0; // 999,999 km in meters.
        std::fs::write(
            &path,
            format!("{{\"total_mileage\": {high}, \"trip_meter\": {high}}}"),
        )
        .unwrap();

        let mut body = BodyEcu::new(&path);
        let mut bus = Bus::new();
        body.receive(&mut bus, &wheel_speed(10.0)).unwrap();
        for _ in 0..100 {
            body.step(&mut bus, 0.05).unwrap();
        }

        assert!(body.total_mileage() > high);
    }
}
