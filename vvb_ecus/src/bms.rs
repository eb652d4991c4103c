//! Battery management system ECU.
//!
//! Monitors the HV telemetry against hard safety limits and drives the
//! charging session FSM. Any limit violation — including telemetry the
//! unit cannot read, which is treated as an implausible sensor — opens
//! the contactors and aborts an active charging session.
//!
//! Charging FSM: `Idle → Handshake → Charging → Idle`. The handshake
//! starts when the EVSE announces a connected cable; the periodic step
//! issues CC-CV charge requests until the SoC target is reached.

use std::any::Any;

use bitflags::bitflags;
use tracing::{info, warn};
use vvb_common::config::BmsConfig;
use vvb_common::msg::{ChargerState, Message, MsgId, Payload};
use vvb_common::names;
use vvb_sim::{Bus, Node, NodeError};

/// SoC knee of the CC-CV profile [%]: full current below, taper above.
const CCCV_KNEE_SOC: f64 = 80.0;

/// Constant-current phase request [A].
const CC_CURRENT_A: f64 = 100.0;

/// Taper phase request [A].
const CV_CURRENT_A: f64 = 20.0;

/// Charging voltage target [V].
const CHARGE_VOLTAGE_V: f64 = 400.0;

bitflags! {
    /// Latched safety violations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SafetyViolation: u8 {
        /// Pack voltage below the minimum limit.
        const UNDERVOLTAGE = 0x01;
        /// Pack voltage above the maximum limit.
        const OVERVOLTAGE  = 0x02;
        /// Pack temperature above the maximum limit.
        const OVERTEMP     = 0x04;
        /// Telemetry unreadable or non-finite.
        const IMPLAUSIBLE  = 0x08;
    }
}

/// Charging session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargingState {
    /// No session.
    Idle,
    /// Cable connected, negotiation pending.
    Handshake,
    /// Charge requests flowing.
    Charging,
}

/// Battery management ECU.
pub struct BmsEcu {
    config: BmsConfig,
    contactors_closed: bool,
    soc_estimate: f64,
    charging_state: ChargingState,
    violations: SafetyViolation,
}

impl BmsEcu {
    /// Create a BMS with contactors open and no session.
    pub fn new(config: BmsConfig) -> Self {
        Self {
            soc_estimate: config.initial_soc,
            config,
            contactors_closed: false,
            charging_state: ChargingState::Idle,
            violations: SafetyViolation::empty(),
        }
    }

    /// Current SoC estimate [%].
    pub fn soc(&self) -> f64 {
        self.soc_estimate
    }

    /// Override the SoC estimate (harness seam; the estimate is not
    /// coupled to the battery plant's coulomb counter).
    pub fn set_soc(&mut self, soc: f64) {
        self.soc_estimate = soc.clamp(0.0, 100.0);
    }

    /// True while the contactors are closed.
    pub fn contactors_closed(&self) -> bool {
        self.contactors_closed
    }

    /// Charging FSM state.
    pub fn charging_state(&self) -> ChargingState {
        self.charging_state
    }

    /// Latched violations since startup.
    pub fn violations(&self) -> SafetyViolation {
        self.violations
    }

    fn check_voltage(&mut self, bus: &mut Bus, voltage: f64) -> Result<(), NodeError> {
        if voltage < self.config.min_voltage {
            warn!(voltage, "BMS: undervoltage, opening contactors");
            self.enter_safe_state(bus, SafetyViolation::UNDERVOLTAGE)?;
        } else if voltage > self.config.max_voltage {
            warn!(voltage, "BMS: overvoltage, opening contactors");
            self.enter_safe_state(bus, SafetyViolation::OVERVOLTAGE)?;
        }
        Ok(())
    }

    fn check_temperature(&mut self, bus: &mut Bus, temp: f64) -> Result<(), NodeError> {
        if temp > self.config.max_temp {
            warn!(temp, "BMS: overtemperature, opening contactors");
            self.enter_safe_state(bus, SafetyViolation::OVERTEMP)?;
        }
        Ok(())
    }

    /// Open the contactors and abort any active session.
    fn enter_safe_state(
        &mut self,
        bus: &mut Bus,
        violation: SafetyViolation,
    ) -> Result<(), NodeError> {
        self.violations |= violation;
        self.open_contactors(bus)?;
        if self.charging_state != ChargingState::Idle {
            self.stop_charging(bus)?;
        }
        Ok(())
    }

    fn stop_charging(&mut self, bus: &mut Bus) -> Result<(), NodeError> {
        self.charging_state = ChargingState::Idle;
        bus.broadcast(
            MsgId::ChargeRequest,
            Payload::ChargeRequest {
                voltage_target: 0.0,
                current_target: 0.0,
                charging_enabled: false,
            },
            names::BMS_ECU,
        )?;
        Ok(())
    }

    fn open_contactors(&mut self, bus: &mut Bus) -> Result<(), NodeError> {
        self.contactors_closed = false;
        bus.broadcast(MsgId::ContactorState, Payload::Flag(false), names::BMS_ECU)?;
        Ok(())
    }

    fn close_contactors(&mut self, bus: &mut Bus) -> Result<(), NodeError> {
        self.contactors_closed = true;
        bus.broadcast(MsgId::ContactorState, Payload::Flag(true), names::BMS_ECU)?;
        Ok(())
    }

    fn handle_charger_status(
        &mut self,
        bus: &mut Bus,
        state: ChargerState,
    ) -> Result<(), NodeError> {
        if state == ChargerState::Connected && self.charging_state == ChargingState::Idle {
            info!("BMS: charger connected, initiating handshake");
            self.charging_state = ChargingState::Handshake;
            self.close_contactors(bus)?;
        }
        Ok(())
    }
}

impl Node for BmsEcu {
    fn name(&self) -> &str {
        names::BMS_ECU
    }

    fn receive(&mut self, bus: &mut Bus, msg: &Message) -> Result<(), NodeError> {
        match (msg.id, &msg.payload) {
            (MsgId::HvVoltage, Payload::Scalar(v)) if v.is_finite() => {
                self.check_voltage(bus, *v)?;
            }
            (MsgId::HvTemp, Payload::Scalar(t)) if t.is_finite() => {
                self.check_temperature(bus, *t)?;
            }
            (MsgId::HvVoltage | MsgId::HvTemp, payload) => {
                // Unreadable safety telemetry is itself a violation.
                warn!(id = %msg.id, ?payload, "BMS: implausible telemetry");
                self.enter_safe_state(bus, SafetyViolation::IMPLAUSIBLE)?;
            }
            (MsgId::ChargerStatus, Payload::ChargerStatus { state, .. }) => {
                self.handle_charger_status(bus, *state)?;
            }
            (MsgId::ChargerStatus, payload) => {
                warn!(?payload, "BMS: malformed charger status ignored");
            }
            _ => {}
        }
        Ok(())
    }

    fn step(&mut self, bus: &mut Bus, _dt: f64) -> Result<(), NodeError> {
        bus.broadcast(
            MsgId::BmsSoc,
            Payload::Scalar(self.soc_estimate),
            names::BMS_ECU,
        )?;

        if matches!(
            self.charging_state,
            ChargingState::Handshake | ChargingState::Charging
        ) {
            if self.soc_estimate < self.config.target_soc {
                self.charging_state = ChargingState::Charging;
                let current = if self.soc_estimate < CCCV_KNEE_SOC {
                    CC_CURRENT_A
                } else {
                    CV_CURRENT_A
                };
                bus.broadcast(
                    MsgId::ChargeRequest,
                    Payload::ChargeRequest {
                        voltage_target: CHARGE_VOLTAGE_V,
                        current_target: current,
                        charging_enabled: true,
                    },
                    names::BMS_ECU,
                )?;
            } else {
                info!(soc = self.soc_estimate, "BMS: target SoC reached, stopping");
                self.stop_charging(bus)?;
                self.open_contactors(bus)?;
            }
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

    fn scalar(id: MsgId, v: f64) -> Message {
        Message::new(id, Payload::Scalar(v), names::BATTERY_PLANT)
    }

    fn last_contactor(bus: &Bus) -> Option<bool> {
        bus.log().last(MsgId::ContactorState).and_then(|m| match m.payload {
            Payload::Flag(b) => Some(b),
            _ => None,
        })
    }

    #[test]
    fn nominal_telemetry_keeps_contactors_untouched() {
        let mut bms = BmsEcu::new(BmsConfig::default());
        let mut bus = Bus::new();

        bms.receive(&mut bus, &scalar(MsgId::HvVoltage, 395.0)).unwrap();
        bms.receive(&mut bus, &scalar(MsgId::HvTemp, 30.0)).unwrap();

        assert!(bms.violations().is_empty());
        assert!(last_contactor(&bus).is_none());
    }

    #[test]
    fn undervoltage_opens_contactors() {
        let mut bms = BmsEcu::new(BmsConfig::default());
        let mut bus = Bus::new();

        bms.receive(&mut bus, &scalar(MsgId::HvVoltage, 300.0)).unwrap();

        assert!(bms.violations().contains(SafetyViolation::UNDERVOLTAGE));
        assert_eq!(last_contactor(&bus), Some(false));
    }

    #[test]
    fn overvoltage_opens_contactors() {
        let mut bms = BmsEcu::new(BmsConfig::default());
        let mut bus = Bus::new();

        bms.receive(&mut bus, &scalar(MsgId::HvVoltage, 430.0)).unwrap();

        assert!(bms.violations().contains(SafetyViolation::OVERVOLTAGE));
        assert_eq!(last_contactor(&bus), Some(false));
    }

    #[test]
    fn overtemperature_opens_contactors_and_aborts_charge() {
        let mut bms = BmsEcu::new(BmsConfig {
            initial_soc: 50.0,
            ..BmsConfig::default()
        });
        let mut bus = Bus::new();

        bms.receive(
            &mut bus,
            &Message::new(
                MsgId::ChargerStatus,
                Payload::ChargerStatus {
                    state: ChargerState::Connected,
                    max_power: 150_000.0,
                },
                names::CHARGING_STATION,
            ),
        )
        .unwrap();
        assert_eq!(bms.charging_state(), ChargingState::Handshake);
        assert!(bms.contactors_closed());

        bms.receive(&mut bus, &scalar(MsgId::HvTemp, 75.0)).unwrap();

        assert_eq!(bms.charging_state(), ChargingState::Idle);
        assert!(!bms.contactors_closed());
        // The abort also disabled the charge request.
        match &bus.log().last(MsgId::ChargeRequest).unwrap().payload {
            Payload::ChargeRequest { charging_enabled, .. } => assert!(!charging_enabled),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn corrupted_telemetry_is_a_violation() {
        let mut bms = BmsEcu::new(BmsConfig::default());
        let mut bus = Bus::new();

        bms.receive(
            &mut bus,
            &Message::new(MsgId::HvVoltage, Payload::Corrupted, names::BATTERY_PLANT),
        )
        .unwrap();

        assert!(bms.violations().contains(SafetyViolation::IMPLAUSIBLE));
        assert_eq!(last_contactor(&bus), Some(false));
    }

    #[test]
    fn soc_broadcast_every_step() {
        let mut bms = BmsEcu::new(BmsConfig::default());
        let mut bus = Bus::new();

        bms.step(&mut bus, 0.1).unwrap();
        bms.step(&mut bus, 0.1).unwrap();

        assert_eq!(bus.log().messages(MsgId::BmsSoc).count(), 2);
    }

    #[test]
    fn cc_cv_taper_above_knee() {
        let mut bms = BmsEcu::new(BmsConfig {
            initial_soc: 85.0,
            ..BmsConfig::default()
        });
        bms.charging_state = ChargingState::Handshake;
        let mut bus = Bus::new();

        bms.step(&mut bus, 0.1).unwrap();

        match &bus.log().last(MsgId::ChargeRequest).unwrap().payload {
            Payload::ChargeRequest { current_target, charging_enabled, .. } => {
                assert_eq!(*current_target, CV_CURRENT_A);
                assert!(charging_enabled);
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(bms.charging_state(), ChargingState::Charging);
    }

    #[test]
    fn target_soc_ends_session() {
        let mut bms = BmsEcu::new(BmsConfig {
            initial_soc: 95.0,
            target_soc: 90.0,
            ..BmsConfig::default()
        });
        bms.charging_state = ChargingState::Charging;
        bms.contactors_closed = true;
        let mut bus = Bus::new();

        bms.step(&mut bus, 0.1).unwrap();

        assert_eq!(bms.charging_state(), ChargingState::Idle);
        assert!(!bms.contactors_closed());
    }
}
