//! DC fast charging station (EVSE) plant.
//!
//! Models the cable connection event, power negotiation against the
//! BMS's charge requests, and the supply output seen by the battery
//! plant. Opening the contactors mid-charge latches an emergency stop.

use std::any::Any;

use tracing::{info, warn};
use vvb_common::msg::{ChargerState, Message, MsgId, Payload};
use vvb_common::names;
use vvb_sim::{Bus, Node, NodeError, Plant};

/// Maximum deliverable power [W].
const MAX_POWER: f64 = 150_000.0;

/// EVSE plant.
pub struct ChargingStation {
    connected: bool,
    state: ChargerState,
    voltage_supply: f64,
    current_supply: f64,
    max_power: f64,
}

impl Default for ChargingStation {
    fn default() -> Self {
        Self::new()
    }
}

impl ChargingStation {
    /// Create a disconnected charger.
    pub fn new() -> Self {
        Self {
            connected: false,
            state: ChargerState::Disconnected,
            voltage_supply: 0.0,
            current_supply: 0.0,
            max_power: MAX_POWER,
        }
    }

    /// Connection / delivery state.
    pub fn state(&self) -> ChargerState {
        self.state
    }

    /// Supply voltage [V].
    pub fn voltage_supply(&self) -> f64 {
        self.voltage_supply
    }

    /// Supply current [A].
    pub fn current_supply(&self) -> f64 {
        self.current_supply
    }

    /// Simulate the plug-in event and announce it to the BMS.
    pub fn connect_cable(&mut self, bus: &mut Bus) -> Result<(), NodeError> {
        self.connected = true;
        self.state = ChargerState::Connected;
        info!("charger: cable connected, waiting for BMS");
        bus.broadcast(
            MsgId::ChargerStatus,
            Payload::ChargerStatus {
                state: ChargerState::Connected,
                max_power: self.max_power,
            },
            names::CHARGING_STATION,
        )?;
        Ok(())
    }

    fn handle_charge_request(
        &mut self,
        bus: &mut Bus,
        voltage_target: f64,
        current_target: f64,
        enabled: bool,
    ) -> Result<(), NodeError> {
        if !self.connected {
            return Ok(());
        }
        if !enabled {
            return self.stop_charging(bus);
        }

        let mut current = current_target;
        // Hardware power ceiling.
        if voltage_target * current > self.max_power && voltage_target > 0.0 {
            current = self.max_power / voltage_target;
            info!(limited_current = current, "charger: limiting power");
        }

        self.voltage_supply = voltage_target;
        self.current_supply = current;
        self.state = ChargerState::Charging;

        bus.broadcast(
            MsgId::ChargerOutput,
            Payload::ChargerOutput {
                voltage: self.voltage_supply,
                current: self.current_supply,
            },
            names::CHARGING_STATION,
        )?;
        Ok(())
    }

    /// Cut the supply. An error latch survives the stop; otherwise the
    /// charger drops back to Connected.
    pub fn stop_charging(&mut self, bus: &mut Bus) -> Result<(), NodeError> {
        self.voltage_supply = 0.0;
        self.current_supply = 0.0;
        if self.state != ChargerState::Error {
            self.state = ChargerState::Connected;
        }
        bus.broadcast(
            MsgId::ChargerOutput,
            Payload::ChargerOutput {
                voltage: 0.0,
                current: 0.0,
            },
            names::CHARGING_STATION,
        )?;
        Ok(())
    }
}

impl Node for ChargingStation {
    fn name(&self) -> &str {
        names::CHARGING_STATION
    }

    fn receive(&mut self, bus: &mut Bus, msg: &Message) -> Result<(), NodeError> {
        match (msg.id, &msg.payload) {
            (
                MsgId::ChargeRequest,
                Payload::ChargeRequest {
                    voltage_target,
                    current_target,
                    charging_enabled,
                },
            ) => {
                self.handle_charge_request(bus, *voltage_target, *current_target, *charging_enabled)?;
            }
            (MsgId::ContactorState, Payload::Flag(closed)) => {
                if !closed && self.state == ChargerState::Charging {
                    // Contactors opened under load: emergency stop.
                    warn!("charger: contactors opened unexpectedly, emergency stop");
                    self.state = ChargerState::Error;
                    self.stop_charging(bus)?;
                }
            }
            (MsgId::ChargeRequest | MsgId::ContactorState, payload) => {
                warn!(id = %msg.id, ?payload, "charger: ignoring malformed input");
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

impl Plant for ChargingStation {
    fn advance_physics(&mut self, _bus: &mut Bus, _dt: f64) -> Result<(), NodeError> {
        Ok(())
    }

    fn publish_sensors(&mut self, _bus: &mut Bus) -> Result<(), NodeError> {
        Ok(())
    }
}
