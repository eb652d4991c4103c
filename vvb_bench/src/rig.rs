//! Full-vehicle rig assembly.
//!
//! Registers every plant and ECU in the canonical order: plants first
//! (vehicle, battery, radar, camera, charger, V2X radio), then the
//! ECUs (ADAS, BMS, Gateway, Body, ESC, Airbag). Registration order is
//! delivery and scheduling order, so the full rig always behaves the
//! same way tick for tick.

use vvb_common::config::BenchConfig;
use vvb_ecus::{AdasEcu, AirbagEcu, BmsEcu, BodyEcu, EscEcu, GatewayEcu};
use vvb_plants::{
    BatteryPlant, CameraPlant, ChargingStation, RadarGenerator, V2xRadio, VehicleDynamics,
};
use vvb_sim::{BusError, Engine, NodeId};

/// Noise seed for the camera mock; fixed so full-rig runs reproduce.
const CAMERA_NOISE_SEED: u64 = 0x5EED;

/// Handles to every node in the standard rig.
#[derive(Debug, Clone, Copy)]
pub struct RigNodes {
    /// Vehicle dynamics plant.
    pub vehicle: NodeId,
    /// HV battery plant.
    pub battery: NodeId,
    /// Radar generator plant.
    pub radar: NodeId,
    /// Lane camera plant.
    pub camera: NodeId,
    /// Charging station plant.
    pub charger: NodeId,
    /// V2X radio plant.
    pub v2x: NodeId,
    /// ADAS ECU.
    pub adas: NodeId,
    /// BMS ECU.
    pub bms: NodeId,
    /// Gateway ECU.
    pub gateway: NodeId,
    /// Body ECU.
    pub body: NodeId,
    /// ESC ECU.
    pub esc: NodeId,
    /// Airbag ECU.
    pub airbag: NodeId,
}

/// The assembled bench: engine plus node handles.
pub struct Rig {
    /// The engine owning bus and nodes.
    pub engine: Engine,
    /// Handles for harness access.
    pub nodes: RigNodes,
}

impl Rig {
    /// Build the full vehicle rig from a validated configuration.
    pub fn build(config: &BenchConfig) -> Result<Self, BusError> {
        let mut engine = Engine::new(config.bench.dt);

        let vehicle = engine.add_plant(Box::new(VehicleDynamics::new(config.vehicle)))?;
        let battery = engine.add_plant(Box::new(BatteryPlant::new(config.battery)))?;
        let radar = engine.add_plant(Box::new(RadarGenerator::new()))?;
        let camera = engine.add_plant(Box::new(CameraPlant::new(CAMERA_NOISE_SEED)))?;
        let charger = engine.add_plant(Box::new(ChargingStation::new()))?;
        let v2x = engine.add_plant(Box::new(V2xRadio::new()))?;

        let adas = engine.add_ecu(Box::new(AdasEcu::new()))?;
        let bms = engine.add_ecu(Box::new(BmsEcu::new(config.bms)))?;
        let gateway = engine.add_ecu(Box::new(GatewayEcu::new()))?;
        let body = engine.add_ecu(Box::new(BodyEcu::new(&config.body.nvm_path)))?;
        let esc = engine.add_ecu(Box::new(EscEcu::new()))?;
        let airbag = engine.add_ecu(Box::new(AirbagEcu::new()))?;

        Ok(Self {
            engine,
            nodes: RigNodes {
                vehicle,
                battery,
                radar,
                camera,
                charger,
                v2x,
                adas,
                bms,
                gateway,
                body,
                esc,
                airbag,
            },
        })
    }
}
