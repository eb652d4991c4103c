//! DC fast charging integration: BMS against the real charging station
//! and battery plants.

use vvb_common::config::{BatteryConfig, BmsConfig};
use vvb_common::msg::{ChargerState, MsgId, Payload};
use vvb_common::names;
use vvb_ecus::{BmsEcu, ChargingState};
use vvb_plants::{BatteryPlant, ChargingStation};
use vvb_sim::{Engine, NodeId};

struct ChargingRig {
    engine: Engine,
    charger: NodeId,
    bms: NodeId,
}

fn rig(initial_soc: f64) -> ChargingRig {
    let mut engine = Engine::new(0.1);
    engine
        .add_plant(Box::new(BatteryPlant::new(BatteryConfig::default())))
        .unwrap();
    let charger = engine.add_plant(Box::new(ChargingStation::new())).unwrap();
    let bms = engine
        .add_ecu(Box::new(BmsEcu::new(BmsConfig {
            initial_soc,
            ..BmsConfig::default()
        })))
        .unwrap();
    ChargingRig {
        engine,
        charger,
        bms,
    }
}

fn connect_cable(rig: &mut ChargingRig) {
    let charger = rig.charger;
    rig.engine
        .bus_mut()
        .with_node(charger, |node, bus| {
            node.as_any_mut()
                .downcast_mut::<ChargingStation>()
                .unwrap()
                .connect_cable(bus)
        })
        .unwrap()
        .unwrap();
}

fn bms_state(rig: &ChargingRig) -> ChargingState {
    rig.engine
        .bus()
        .node::<BmsEcu>(rig.bms)
        .unwrap()
        .charging_state()
}

fn charger_state(rig: &ChargingRig) -> ChargerState {
    rig.engine
        .bus()
        .node::<ChargingStation>(rig.charger)
        .unwrap()
        .state()
}

#[test]
fn plug_in_starts_handshake_and_closes_contactors() {
    let mut rig = rig(50.0);

    rig.engine.step().unwrap();
    assert_eq!(bms_state(&rig), ChargingState::Idle);

    connect_cable(&mut rig);
    rig.engine.step().unwrap();
    rig.engine.step().unwrap();

    assert!(matches!(
        bms_state(&rig),
        ChargingState::Handshake | ChargingState::Charging
    ));
    assert!(rig
        .engine
        .bus()
        .node::<BmsEcu>(rig.bms)
        .unwrap()
        .contactors_closed());
}

#[test]
fn charging_session_delivers_negotiated_power() {
    let mut rig = rig(50.0);

    connect_cable(&mut rig);
    for _ in 0..5 {
        rig.engine.step().unwrap();
    }

    assert_eq!(bms_state(&rig), ChargingState::Charging);
    assert_eq!(charger_state(&rig), ChargerState::Charging);

    let charger = rig
        .engine
        .bus()
        .node::<ChargingStation>(rig.charger)
        .unwrap();
    assert!(charger.voltage_supply() > 300.0);
    assert!(charger.current_supply() > 0.0);

    // Constant-current phase below the taper knee.
    match &rig
        .engine
        .bus()
        .log()
        .last(MsgId::ChargeRequest)
        .unwrap()
        .payload
    {
        Payload::ChargeRequest { current_target, .. } => assert_eq!(*current_target, 100.0),
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn session_stops_at_target_soc() {
    let mut rig = rig(89.0);

    connect_cable(&mut rig);

    let mut was_charging = false;
    let mut stopped = false;
    for _ in 0..20 {
        rig.engine.step().unwrap();

        if bms_state(&rig) == ChargingState::Charging {
            was_charging = true;
            // Simulated fast charge: nudge the estimate upward.
            let bms = rig.bms;
            rig.engine
                .bus_mut()
                .with_node(bms, |node, _bus| {
                    let bms = node.as_any_mut().downcast_mut::<BmsEcu>().unwrap();
                    bms.set_soc(bms.soc() + 0.2);
                })
                .unwrap();
        } else if was_charging {
            stopped = true;
            break;
        }
    }

    assert!(was_charging, "session never entered Charging");
    assert!(stopped, "session did not stop at target SoC");
    assert!(!rig
        .engine
        .bus()
        .node::<BmsEcu>(rig.bms)
        .unwrap()
        .contactors_closed());
}

#[test]
fn taper_current_above_knee() {
    let mut rig = rig(85.0);

    connect_cable(&mut rig);
    for _ in 0..3 {
        rig.engine.step().unwrap();
    }

    match &rig
        .engine
        .bus()
        .log()
        .last(MsgId::ChargeRequest)
        .unwrap()
        .payload
    {
        Payload::ChargeRequest { current_target, .. } => assert_eq!(*current_target, 20.0),
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn safety_violation_mid_charge_latches_charger_error() {
    let mut rig = rig(50.0);

    connect_cable(&mut rig);
    for _ in 0..3 {
        rig.engine.step().unwrap();
    }
    assert_eq!(charger_state(&rig), ChargerState::Charging);

    // Skewed telemetry below the undervoltage limit: the BMS opens the
    // contactors; the charger sees the opening mid-charge and latches
    // its emergency stop.
    rig.engine
        .bus_mut()
        .broadcast(MsgId::HvVoltage, Payload::Scalar(300.0), names::TEST_HARNESS)
        .unwrap();

    assert!(!rig
        .engine
        .bus()
        .node::<BmsEcu>(rig.bms)
        .unwrap()
        .contactors_closed());
    assert_eq!(charger_state(&rig), ChargerState::Error);
    assert_eq!(bms_state(&rig), ChargingState::Idle);
}
