//! Vehicle dynamics plant.
//!
//! A kinematic bicycle model extended with tire saturation and split-mu
//! differential braking. Longitudinal motion is force-based (drive
//! force minus per-side brake forces scaled by the local friction
//! coefficient); lateral motion tracks the kinematic ideal yaw rate
//! through a friction-dependent first-order lag, with a separate yaw
//! moment from asymmetric brake forces.
//!
//! Speed is a non-negative scalar; reverse is not modeled.

use std::any::Any;

use tracing::{trace, warn};
use vvb_common::config::VehicleParams;
use vvb_common::msg::{Message, MsgId, Payload};
use vvb_common::names;
use vvb_sim::{Bus, Node, NodeError, Plant};

/// Fixed sample period of the finite-difference IMU surrogate [s].
///
/// The longitudinal-acceleration channel divides the per-tick speed
/// delta by this 20 Hz period regardless of the engine step, matching
/// the calibration the airbag thresholds were tuned against.
const IMU_SAMPLE_PERIOD_S: f64 = 0.05;

/// Grip-limited yaw rate numerator [m/s²]: ω_max = g / (v + 0.1).
const YAW_GRIP_LIMIT: f64 = 9.8;

/// Vehicle dynamics plant state and inputs.
pub struct VehicleDynamics {
    params: VehicleParams,

    // ── Continuous state ──
    x: f64,
    y: f64,
    yaw: f64,
    v: f64,
    yaw_rate: f64,
    slip_angle: f64,
    prev_v: f64,

    // ── Actuator inputs (via bus) ──
    steering: f64,
    throttle: f64,
    brake: f64,

    // ── Environment ──
    mu_left: f64,
    mu_right: f64,
}

impl VehicleDynamics {
    /// Create a vehicle at rest at the origin on a uniform high-grip
    /// surface.
    pub fn new(params: VehicleParams) -> Self {
        Self {
            params,
            x: 0.0,
            y: 0.0,
            yaw: 0.0,
            v: 0.0,
            yaw_rate: 0.0,
            slip_angle: 0.0,
            prev_v: 0.0,
            steering: 0.0,
            throttle: 0.0,
            brake: 0.0,
            mu_left: 1.0,
            mu_right: 1.0,
        }
    }

    /// Set the initial speed [m/s] for scenario setup. Also aligns the
    /// IMU history so the first tick does not report a spurious jerk.
    pub fn set_speed(&mut self, v: f64) {
        self.v = v.max(0.0);
        self.prev_v = self.v;
    }

    /// Current speed [m/s].
    pub fn speed(&self) -> f64 {
        self.v
    }

    /// Current yaw rate [rad/s].
    pub fn yaw_rate(&self) -> f64 {
        self.yaw_rate
    }

    /// Current position [m].
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Current heading [rad].
    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    /// Reported slip angle [rad].
    pub fn slip_angle(&self) -> f64 {
        self.slip_angle
    }

    /// Current brake pedal input [0..1].
    pub fn brake_input(&self) -> f64 {
        self.brake
    }

    fn brake_forces(&self) -> (f64, f64) {
        let left = self.brake * self.params.max_brake_per_side * self.mu_left;
        let right = self.brake * self.params.max_brake_per_side * self.mu_right;
        (left, right)
    }
}

impl Node for VehicleDynamics {
    fn name(&self) -> &str {
        names::VEHICLE_DYNAMICS
    }

    fn receive(&mut self, _bus: &mut Bus, msg: &Message) -> Result<(), NodeError> {
        match (msg.id, &msg.payload) {
            (MsgId::SteeringCmd, Payload::Scalar(angle)) if angle.is_finite() => {
                self.steering = *angle;
            }
            (MsgId::AccelCmd, Payload::Scalar(throttle)) if throttle.is_finite() => {
                self.throttle = throttle.clamp(0.0, 1.0);
            }
            (MsgId::BrakeCmd, Payload::Scalar(brake)) if brake.is_finite() => {
                self.brake = brake.clamp(0.0, 1.0);
            }
            (MsgId::SetEnvMu, Payload::SurfaceMu { mu_left, mu_right }) => {
                self.mu_left = *mu_left;
                self.mu_right = *mu_right;
            }
            (
                MsgId::SteeringCmd | MsgId::AccelCmd | MsgId::BrakeCmd | MsgId::SetEnvMu,
                payload,
            ) => {
                // Malformed actuator input: hold the last valid command.
                warn!(id = %msg.id, ?payload, "vehicle: ignoring malformed command");
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

impl Plant for VehicleDynamics {
    fn advance_physics(&mut self, bus: &mut Bus, dt: f64) -> Result<(), NodeError> {
        let p = &self.params;

        // Longitudinal forces.
        let f_drive = self.throttle * p.max_drive_force;
        let (f_brake_l, f_brake_r) = self.brake_forces();
        let f_long = f_drive - (f_brake_l + f_brake_r);
        let accel = f_long / p.mass;

        // Position advances with the speed entering the tick.
        self.x += self.v * self.yaw.cos() * dt;
        self.y += self.v * self.yaw.sin() * dt;
        self.yaw += self.yaw_rate * dt;

        // Speed clamps at zero: reverse is not modeled.
        self.v = (self.v + accel * dt).max(0.0);

        // Kinematic ideal yaw rate, capped at the grip limit. Exceeding
        // the cap clips to 1.5x, permitting a bounded oversteer
        // overshoot instead of an unphysical spin-up.
        let mut ideal_yaw_rate = (self.v / p.wheelbase) * self.steering.tan();
        let max_yaw_rate = YAW_GRIP_LIMIT / (self.v + 0.1);
        if ideal_yaw_rate.abs() > max_yaw_rate {
            ideal_yaw_rate = ideal_yaw_rate.signum() * max_yaw_rate * 1.5;
        }

        // First-order lag toward the ideal; low grip slows the response.
        let avg_mu = 0.5 * (self.mu_left + self.mu_right);
        let tau = 0.2 / avg_mu.max(0.1);
        let yaw_accel_steer = (ideal_yaw_rate - self.yaw_rate) / tau;

        // Split-mu braking moment around the vertical axis.
        let split_moment = (f_brake_l - f_brake_r) * (p.track_width / 2.0);
        let yaw_accel_split = split_moment / p.yaw_inertia;

        self.yaw_rate += (yaw_accel_steer + yaw_accel_split) * dt;

        // Reporting-only slip surrogate.
        self.slip_angle = self.v * self.yaw_rate * 0.05;

        trace!(
            v = self.v,
            yaw_rate = self.yaw_rate,
            brake = self.brake,
            "vehicle state"
        );

        // Traction power accounting: drivetrain losses under traction,
        // partial recuperation otherwise.
        let power_out = f_drive * self.v;
        let power_in = if power_out > 0.0 {
            power_out / p.drive_efficiency
        } else {
            power_out * p.regen_efficiency
        };
        bus.broadcast(
            MsgId::LoadCurrent,
            Payload::Scalar(power_in / p.pack_voltage),
            names::VEHICLE_DYNAMICS,
        )?;
        Ok(())
    }

    fn publish_sensors(&mut self, bus: &mut Bus) -> Result<(), NodeError> {
        let me = names::VEHICLE_DYNAMICS;
        bus.broadcast(MsgId::WheelSpeed, Payload::Scalar(self.v), me)?;
        bus.broadcast(MsgId::YawRate, Payload::Scalar(self.yaw_rate), me)?;
        bus.broadcast(
            MsgId::LateralAccel,
            Payload::Scalar(self.v * self.yaw_rate),
            me,
        )?;
        bus.broadcast(
            MsgId::GpsPos,
            Payload::Position {
                x: self.x,
                y: self.y,
            },
            me,
        )?;

        let accel_x = (self.v - self.prev_v) / IMU_SAMPLE_PERIOD_S;
        self.prev_v = self.v;
        bus.broadcast(MsgId::AccelX, Payload::Scalar(accel_x), me)?;
        Ok(())
    }
}
