//! Cycle benchmark: one coordinator cycle against two simulated gearboxes.
//!
//! Covers the steady polling cycle, the drive cycle and a complete
//! unlock sequence. Node stepping is excluded from the measured cycles.

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};

use desk_common::config::DeskConfig;
use desk_common::input::{ButtonEvent, ButtonId, InputEvent};
use desk_controller::power::SimPowerSwitches;
use desk_controller::{Coordinator, GearboxState};
use desk_gearbox::{GearboxNode, SimulatedBus};

const CYCLE: Duration = Duration::from_millis(10);

fn coordinator() -> Coordinator<SimulatedBus, SimPowerSwitches> {
    let config = DeskConfig::default();
    let mut bus = SimulatedBus::new();
    for (name, address) in [("left", config.bus.left_address), ("right", config.bus.right_address)] {
        bus.attach(Arc::new(GearboxNode::simulated(
            name,
            address,
            &config.gearbox,
            config.deviation,
            20_000,
        )));
    }
    Coordinator::new(config, bus, SimPowerSwitches::new())
}

/// Cycle until the desk is in drive mode. Returns the time reached.
fn unlock(c: &mut Coordinator<SimulatedBus, SimPowerSwitches>) -> Duration {
    c.push_event(InputEvent::new(ButtonId::Main, ButtonEvent::SingleClick));
    let mut now = Duration::ZERO;
    while c.gearbox_state() != GearboxState::DriveMode && now < Duration::from_secs(10) {
        c.cycle(now);
        c.link().bus().advance(100);
        now += CYCLE;
    }
    now
}

fn bench_poll_cycle(c: &mut Criterion) {
    let mut coordinator = coordinator();
    let mut now = Duration::ZERO;

    c.bench_function("cycle_on_brake_poll", |b| {
        b.iter(|| {
            now += CYCLE;
            black_box(coordinator.cycle(black_box(now)))
        });
    });
}

fn bench_drive_cycle(c: &mut Criterion) {
    let mut coordinator = coordinator();
    let mut now = unlock(&mut coordinator);
    coordinator.push_event(InputEvent::new(ButtonId::MoveUp, ButtonEvent::Pressed));

    c.bench_function("cycle_drive_up", |b| {
        b.iter(|| {
            now += CYCLE;
            black_box(coordinator.cycle(black_box(now)))
        });
    });
}

fn bench_unlock_sequence(c: &mut Criterion) {
    c.bench_function("unlock_sequence", |b| {
        b.iter(|| {
            let mut coordinator = coordinator();
            black_box(unlock(&mut coordinator))
        });
    });
}

criterion_group!(benches, bench_poll_cycle, bench_drive_cycle, bench_unlock_sequence);
criterion_main!(benches);
