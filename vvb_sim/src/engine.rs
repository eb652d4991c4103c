//! Simulation engine.
//!
//! Owns the bus and two ordered node lists (plants, ECUs) and sequences
//! one tick: every plant integrates and publishes in registration
//! order, then every ECU steps in registration order. There is no
//! wall-clock pacing; the clock is purely logical.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::bus::{Bus, BusError};
use crate::node::{Node, NodeId, Plant};

/// Discrete-time simulation engine.
pub struct Engine {
    bus: Bus,
    dt: f64,
    tick: u64,
    plants: Vec<NodeId>,
    ecus: Vec<NodeId>,
    stop: Arc<AtomicBool>,
}

impl Engine {
    /// Create an engine with the given fixed time step.
    ///
    /// # Panics
    /// Panics if `dt` is not a positive finite number; a broken clock
    /// is a substrate invariant violation, not a recoverable input.
    pub fn new(dt: f64) -> Self {
        assert!(dt.is_finite() && dt > 0.0, "engine dt must be positive");
        Self {
            bus: Bus::new(),
            dt,
            tick: 0,
            plants: Vec::new(),
            ecus: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register a plant; it will advance before all ECUs, in
    /// registration order.
    pub fn add_plant(&mut self, plant: Box<dyn Plant>) -> Result<NodeId, BusError> {
        let id = self.bus.register_plant(plant)?;
        self.plants.push(id);
        Ok(id)
    }

    /// Register an ECU; it will step after all plants, in registration
    /// order.
    pub fn add_ecu(&mut self, ecu: Box<dyn Node>) -> Result<NodeId, BusError> {
        let id = self.bus.register_ecu(ecu)?;
        self.ecus.push(id);
        Ok(id)
    }

    /// The bus, for log inspection and harness broadcasts.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Mutable bus access between ticks (fault injection, harness
    /// broadcasts, node mutation).
    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// Fixed time step [s].
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Ticks executed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated time [s].
    pub fn time(&self) -> f64 {
        self.tick as f64 * self.dt
    }

    /// Shared stop flag; setting it ends `run` at the next tick
    /// boundary (the current tick completes). Safe to hand to a signal
    /// handler.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Request a stop at the next tick boundary.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Advance the simulation by one time step.
    pub fn step(&mut self) -> Result<(), BusError> {
        self.bus.begin_tick()?;

        for &id in &self.plants {
            self.bus.run_plant_phase(id, self.dt)?;
        }
        for &id in &self.ecus {
            self.bus.run_step_phase(id, self.dt)?;
        }

        self.tick += 1;
        Ok(())
    }

    /// Run for a duration in simulated seconds (`⌊duration/dt⌋` ticks)
    /// or until the stop flag is raised. Returns the number of ticks
    /// executed by this call.
    pub fn run(&mut self, duration: f64) -> Result<u64, BusError> {
        let steps = (duration / self.dt).floor() as u64;
        info!(duration, steps, "starting simulation");

        let mut executed = 0;
        for _ in 0..steps {
            if self.stop.load(Ordering::Relaxed) {
                info!(tick = self.tick, "stop requested, ending run");
                break;
            }
            self.step()?;
            executed += 1;
        }

        info!(ticks = executed, time = self.time(), "simulation complete");
        Ok(executed)
    }
}
