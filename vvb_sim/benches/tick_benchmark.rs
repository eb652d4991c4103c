//! Engine tick throughput benchmark.

use std::any::Any;

use criterion::{criterion_group, criterion_main, Criterion};
use vvb_common::msg::{Message, MsgId, Payload};
use vvb_sim::{Bus, Engine, Node, NodeError, Plant};

/// Plant publishing a handful of telemetry scalars per tick.
struct TelemetryPlant {
    name: String,
    value: f64,
}

impl Node for TelemetryPlant {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Plant for TelemetryPlant {
    fn advance_physics(&mut self, _bus: &mut Bus, dt: f64) -> Result<(), NodeError> {
        self.value += dt;
        Ok(())
    }

    fn publish_sensors(&mut self, bus: &mut Bus) -> Result<(), NodeError> {
        for id in [MsgId::WheelSpeed, MsgId::YawRate, MsgId::LateralAccel] {
            bus.broadcast(id, Payload::Scalar(self.value), &self.name)?;
        }
        Ok(())
    }
}

/// ECU consuming everything, emitting nothing.
struct Sink {
    name: String,
    received: u64,
}

impl Node for Sink {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&mut self, _bus: &mut Bus, _msg: &Message) -> Result<(), NodeError> {
        self.received += 1;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn build_engine(sinks: usize) -> Engine {
    let mut engine = Engine::new(0.01);
    engine
        .add_plant(Box::new(TelemetryPlant {
            name: "plant".to_string(),
            value: 0.0,
        }))
        .unwrap();
    for i in 0..sinks {
        engine
            .add_ecu(Box::new(Sink {
                name: format!("sink_{i}"),
                received: 0,
            }))
            .unwrap();
    }
    engine
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_tick");

    for sinks in [1usize, 4, 16] {
        group.bench_function(format!("{sinks}_sinks"), |b| {
            let mut engine = build_engine(sinks);
            b.iter(|| engine.step().unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
