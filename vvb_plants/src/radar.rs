//! Synthetic object-list radar.
//!
//! The bench injects objects with relative kinematics; the plant
//! advances them each tick and publishes the full list. Objects leaving
//! the detection window are removed with a retain pass, never while
//! iterating.

use std::any::Any;

use vvb_common::msg::{MsgId, Payload, RadarObject};
use vvb_common::names;
use vvb_sim::{Bus, Node, NodeError, Plant};

/// Detection window behind the ego vehicle [m].
const MIN_RANGE: f64 = -10.0;
/// Detection window ahead of the ego vehicle [m].
const MAX_RANGE: f64 = 200.0;

/// Object-list radar plant.
#[derive(Default)]
pub struct RadarGenerator {
    objects: Vec<RadarObject>,
}

impl RadarGenerator {
    /// Create a radar with an empty field of view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a synthetic object to the field of view.
    pub fn add_object(&mut self, object: RadarObject) {
        self.objects.push(object);
    }

    /// Currently tracked objects.
    pub fn objects(&self) -> &[RadarObject] {
        &self.objects
    }

    /// Mutable access for scenario scripting.
    pub fn objects_mut(&mut self) -> &mut Vec<RadarObject> {
        &mut self.objects
    }
}

impl Node for RadarGenerator {
    fn name(&self) -> &str {
        names::RADAR_GENERATOR
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Plant for RadarGenerator {
    fn advance_physics(&mut self, _bus: &mut Bus, dt: f64) -> Result<(), NodeError> {
        for obj in &mut self.objects {
            obj.dist += obj.rel_speed * dt;
            obj.lat_pos += obj.lat_speed * dt;
        }
        // Two-phase removal: integrate first, then drop out-of-window
        // tracks in a single retain pass.
        self.objects
            .retain(|o| (MIN_RANGE..=MAX_RANGE).contains(&o.dist));
        Ok(())
    }

    fn publish_sensors(&mut self, bus: &mut Bus) -> Result<(), NodeError> {
        bus.broadcast(
            MsgId::RadarObjects,
            Payload::RadarObjects(self.objects.clone()),
            names::RADAR_GENERATOR,
        )?;
        Ok(())
    }
}
