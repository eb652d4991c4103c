//! Scripted scenarios for the bench binary.
//!
//! Each scenario seeds the rig, then drives it tick by tick while
//! collecting a run summary. The same conditions are exercised as
//! assertions in the integration suites; here they produce a readable
//! outcome for the operator instead.

use std::sync::atomic::Ordering;

use clap::ValueEnum;
use tracing::info;
use vvb_common::msg::{MsgId, Payload, RadarObject};
use vvb_common::names;
use vvb_plants::{RadarGenerator, VehicleDynamics};
use vvb_sim::BusError;

use crate::rig::Rig;

/// Available scripted scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Throttle pulse, cruise, then service braking.
    Drive,
    /// Stationary obstacle ahead; AEB must stop the vehicle.
    Aeb,
    /// Half braking on a split-friction surface.
    SplitMu,
}

/// Outcome of a scenario run.
#[derive(Debug, Clone, Copy)]
pub struct Summary {
    /// Ticks executed.
    pub ticks: u64,
    /// Speed at the end of the run [m/s].
    pub final_speed: f64,
    /// Largest yaw rate magnitude observed [rad/s].
    pub max_yaw_rate: f64,
    /// Whether AEB engaged at any point.
    pub aeb_triggered: bool,
    /// Closest obstacle distance observed [m], if any obstacle existed.
    pub min_obstacle_distance: Option<f64>,
}

/// Seed the rig and run one scenario for `duration` simulated seconds.
pub fn run_scenario(rig: &mut Rig, scenario: Scenario, duration: f64) -> Result<Summary, BusError> {
    info!(?scenario, duration, "seeding scenario");
    let dt = rig.engine.dt();

    match scenario {
        Scenario::Drive => {
            rig.engine.bus_mut().broadcast(
                MsgId::AccelCmd,
                Payload::Scalar(0.6),
                names::TEST_HARNESS,
            )?;
        }
        Scenario::Aeb => {
            set_vehicle_speed(rig, 20.0)?;
            let radar = rig.nodes.radar;
            rig.engine.bus_mut().with_node(radar, |node, _bus| {
                node.as_any_mut()
                    .downcast_mut::<RadarGenerator>()
                    .expect("radar slot")
                    .add_object(RadarObject {
                        id: 1,
                        dist: 100.0,
                        rel_speed: -20.0,
                        lat_pos: 0.0,
                        lat_speed: 0.0,
                    });
            })?;
        }
        Scenario::SplitMu => {
            set_vehicle_speed(rig, 25.0)?;
            rig.engine.bus_mut().broadcast(
                MsgId::SetEnvMu,
                Payload::SurfaceMu {
                    mu_left: 1.0,
                    mu_right: 0.2,
                },
                names::TEST_HARNESS,
            )?;
            rig.engine.bus_mut().broadcast(
                MsgId::BrakeCmd,
                Payload::Scalar(0.5),
                names::TEST_HARNESS,
            )?;
        }
    }

    let steps = (duration / dt).floor() as u64;
    let stop = rig.engine.stop_handle();
    let mut summary = Summary {
        ticks: 0,
        final_speed: 0.0,
        max_yaw_rate: 0.0,
        aeb_triggered: false,
        min_obstacle_distance: None,
    };

    for step in 0..steps {
        if stop.load(Ordering::Relaxed) {
            info!(tick = step, "stop requested, ending scenario");
            break;
        }

        // Drive scenario: lift off and brake for the final quarter.
        if scenario == Scenario::Drive && step == steps * 3 / 4 {
            rig.engine.bus_mut().broadcast(
                MsgId::AccelCmd,
                Payload::Scalar(0.0),
                names::TEST_HARNESS,
            )?;
            rig.engine.bus_mut().broadcast(
                MsgId::BrakeCmd,
                Payload::Scalar(0.4),
                names::TEST_HARNESS,
            )?;
        }

        rig.engine.step()?;
        summary.ticks += 1;

        let vehicle = rig
            .engine
            .bus()
            .node::<VehicleDynamics>(rig.nodes.vehicle)
            .expect("vehicle slot");
        summary.final_speed = vehicle.speed();
        summary.max_yaw_rate = summary.max_yaw_rate.max(vehicle.yaw_rate().abs());

        if let Some(adas) = rig.engine.bus().node::<vvb_ecus::AdasEcu>(rig.nodes.adas) {
            summary.aeb_triggered |= adas.aeb_triggered();
        }
        if let Some(radar) = rig
            .engine
            .bus()
            .node::<RadarGenerator>(rig.nodes.radar)
        {
            for obj in radar.objects() {
                let closest = summary.min_obstacle_distance.unwrap_or(f64::INFINITY);
                summary.min_obstacle_distance = Some(closest.min(obj.dist));
            }
        }

        // A stopped vehicle ends obstacle scenarios early.
        if scenario == Scenario::Aeb && vehicle.speed() == 0.0 {
            info!(tick = step, "vehicle stopped, scenario complete");
            break;
        }
    }

    Ok(summary)
}

fn set_vehicle_speed(rig: &mut Rig, speed: f64) -> Result<(), BusError> {
    let vehicle = rig.nodes.vehicle;
    rig.engine.bus_mut().with_node(vehicle, |node, _bus| {
        node.as_any_mut()
            .downcast_mut::<VehicleDynamics>()
            .expect("vehicle slot")
            .set_speed(speed);
    })
}
