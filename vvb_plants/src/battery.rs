//! High-voltage battery plant.
//!
//! Coulomb-counting state of charge, I²R self-heating against ambient
//! cooling, and voltage sag under load. The published telemetry is the
//! true state plus configurable drift offsets, so sensor-fault
//! scenarios can skew what the BMS sees without touching the physics.

use std::any::Any;

use tracing::warn;
use vvb_common::config::BatteryConfig;
use vvb_common::msg::{Message, MsgId, Payload};
use vvb_common::names;
use vvb_sim::{Bus, Node, NodeError, Plant};

/// Open-circuit pack voltage [V].
const NOMINAL_VOLTAGE: f64 = 400.0;

/// Fraction of the temperature delta to ambient shed per second.
const COOLING_RATE: f64 = 0.1;

/// Inverse thermal mass scaling [K per J-ish]; keeps the simple lumped
/// model in a plausible range.
const THERMAL_MASS_SCALE: f64 = 0.01;

/// HV battery pack plant.
pub struct BatteryPlant {
    config: BatteryConfig,
    /// Remaining capacity [kWh].
    capacity_remaining: f64,
    /// True terminal voltage [V].
    voltage: f64,
    /// Traction load current [A], positive = discharge.
    load_current: f64,
    /// Charger supply current [A].
    charge_current: f64,
    /// True cell temperature [°C].
    temperature: f64,
    /// Ambient temperature [°C].
    ambient_temp: f64,
    drift_voltage: f64,
    drift_current: f64,
    drift_temp: f64,
}

impl BatteryPlant {
    /// Create a full pack at ambient temperature.
    pub fn new(config: BatteryConfig) -> Self {
        Self {
            capacity_remaining: config.capacity_kwh,
            voltage: NOMINAL_VOLTAGE,
            load_current: 0.0,
            charge_current: 0.0,
            temperature: config.ambient_temp,
            ambient_temp: config.ambient_temp,
            drift_voltage: 0.0,
            drift_current: 0.0,
            drift_temp: 0.0,
            config,
        }
    }

    /// Net pack current [A], positive = discharge.
    pub fn net_current(&self) -> f64 {
        self.load_current - self.charge_current
    }

    /// True terminal voltage [V].
    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    /// True cell temperature [°C].
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// State of charge [%].
    pub fn soc(&self) -> f64 {
        (self.capacity_remaining / self.config.capacity_kwh) * 100.0
    }

    /// Remaining capacity [kWh].
    pub fn capacity_remaining(&self) -> f64 {
        self.capacity_remaining
    }
}

impl Node for BatteryPlant {
    fn name(&self) -> &str {
        names::BATTERY_PLANT
    }

    fn receive(&mut self, _bus: &mut Bus, msg: &Message) -> Result<(), NodeError> {
        match (msg.id, &msg.payload) {
            (MsgId::LoadCurrent, Payload::Scalar(current)) if current.is_finite() => {
                self.load_current = *current;
            }
            (MsgId::ChargerOutput, Payload::ChargerOutput { current, .. }) => {
                self.charge_current = *current;
            }
            (MsgId::SetEnvThermal, Payload::Thermal { ambient_temp }) => {
                self.ambient_temp = *ambient_temp;
            }
            (
                MsgId::SetSensorDrift,
                Payload::SensorDrift {
                    voltage,
                    current,
                    temp,
                },
            ) => {
                self.drift_voltage = *voltage;
                self.drift_current = *current;
                self.drift_temp = *temp;
            }
            (
                MsgId::LoadCurrent
                | MsgId::ChargerOutput
                | MsgId::SetEnvThermal
                | MsgId::SetSensorDrift,
                payload,
            ) => {
                warn!(id = %msg.id, ?payload, "battery: ignoring malformed input");
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

impl Plant for BatteryPlant {
    fn advance_physics(&mut self, _bus: &mut Bus, dt: f64) -> Result<(), NodeError> {
        let net = self.net_current();

        // Coulomb counting; positive net current discharges the pack.
        let energy_change_kwh = (self.voltage * net * dt) / 3_600_000.0;
        self.capacity_remaining =
            (self.capacity_remaining - energy_change_kwh).clamp(0.0, self.config.capacity_kwh);

        // Lumped thermal model: joule heating vs. ambient coupling.
        let heat_gen = net * net * self.config.internal_resistance;
        let cooling = (self.temperature - self.ambient_temp) * COOLING_RATE;
        self.temperature += (heat_gen - cooling) * dt * THERMAL_MASS_SCALE;

        // Ohmic sag under discharge; rises above nominal while charging.
        self.voltage = NOMINAL_VOLTAGE - net * self.config.internal_resistance;
        Ok(())
    }

    fn publish_sensors(&mut self, bus: &mut Bus) -> Result<(), NodeError> {
        let me = names::BATTERY_PLANT;
        bus.broadcast(
            MsgId::HvVoltage,
            Payload::Scalar(self.voltage + self.drift_voltage),
            me,
        )?;
        bus.broadcast(
            MsgId::HvCurrent,
            Payload::Scalar(self.net_current() + self.drift_current),
            me,
        )?;
        bus.broadcast(
            MsgId::HvTemp,
            Payload::Scalar(self.temperature + self.drift_temp),
            me,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vvb_sim::Engine;

    fn engine_with_battery() -> (Engine, vvb_sim::NodeId) {
        let mut engine = Engine::new(0.1);
        let id = engine
            .add_plant(Box::new(BatteryPlant::new(BatteryConfig::default())))
            .unwrap();
        (engine, id)
    }

    #[test]
    fn idle_pack_stays_nominal() {
        let (mut engine, id) = engine_with_battery();
        for _ in 0..50 {
            engine.step().unwrap();
        }
        let pack = engine.bus().node::<BatteryPlant>(id).unwrap();
        assert_eq!(pack.voltage(), NOMINAL_VOLTAGE);
        assert!((pack.soc() - 100.0).abs() < 1e-9);
        assert!((pack.temperature() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn discharge_sags_voltage_and_heats_pack() {
        let (mut engine, id) = engine_with_battery();
        engine
            .bus_mut()
            .broadcast(
                MsgId::LoadCurrent,
                Payload::Scalar(200.0),
                names::TEST_HARNESS,
            )
            .unwrap();

        for _ in 0..100 {
            engine.step().unwrap();
        }

        let pack = engine.bus().node::<BatteryPlant>(id).unwrap();
        // 200 A across 0.05 Ω sags 10 V.
        assert!((pack.voltage() - 390.0).abs() < 1e-9);
        assert!(pack.temperature() > 25.0);
        assert!(pack.soc() < 100.0);
    }

    #[test]
    fn charger_supply_offsets_load() {
        let (mut engine, id) = engine_with_battery();
        engine
            .bus_mut()
            .broadcast(
                MsgId::ChargerOutput,
                Payload::ChargerOutput {
                    voltage: 400.0,
                    current: 100.0,
                },
                names::TEST_HARNESS,
            )
            .unwrap();

        engine.step().unwrap();

        let pack = engine.bus().node::<BatteryPlant>(id).unwrap();
        assert_eq!(pack.net_current(), -100.0);
        // Charging pushes the terminal above nominal.
        assert!(pack.voltage() > NOMINAL_VOLTAGE);
    }

    #[test]
    fn drift_skews_telemetry_not_state() {
        let (mut engine, id) = engine_with_battery();
        engine
            .bus_mut()
            .broadcast(
                MsgId::SetSensorDrift,
                Payload::SensorDrift {
                    voltage: 25.0,
                    current: 0.0,
                    temp: -3.0,
                },
                names::TEST_HARNESS,
            )
            .unwrap();

        engine.step().unwrap();

        let sensed_v = engine
            .bus()
            .log()
            .last(MsgId::HvVoltage)
            .unwrap()
            .payload
            .as_scalar()
            .unwrap();
        let sensed_t = engine
            .bus()
            .log()
            .last(MsgId::HvTemp)
            .unwrap()
            .payload
            .as_scalar()
            .unwrap();

        let pack = engine.bus().node::<BatteryPlant>(id).unwrap();
        assert!((sensed_v - (pack.voltage() + 25.0)).abs() < 1e-9);
        assert!((sensed_t - (pack.temperature() - 3.0)).abs() < 1e-9);
        assert_eq!(pack.voltage(), NOMINAL_VOLTAGE);
    }

    #[test]
    fn capacity_never_goes_negative() {
        let mut pack = BatteryPlant::new(BatteryConfig {
            capacity_kwh: 0.001,
            ..BatteryConfig::default()
        });
        pack.load_current = 500.0;

        let mut bus = Bus::new();
        for _ in 0..10_000 {
            pack.advance_physics(&mut bus, 0.1).unwrap();
        }
        assert!(pack.capacity_remaining() >= 0.0);
        assert_eq!(pack.soc(), 0.0);
    }
}
