//! Test desk: coordinator wired to two simulated gearbox nodes.

use std::sync::Arc;
use std::time::Duration;

use desk_common::config::DeskConfig;
use desk_common::input::{ButtonEvent, ButtonId, InputEvent};
use desk_controller::power::SimPowerSwitches;
use desk_controller::{Action, Coordinator, GearboxState, UiState};
use desk_gearbox::{GearboxHardware, GearboxNode, SimGearbox, SimulatedBus};
use parking_lot::Mutex;

pub const LEFT: u8 = 0x33;
pub const RIGHT: u8 = 0x88;

pub struct Desk {
    pub coordinator: Coordinator<SimulatedBus, SimPowerSwitches>,
    now: Duration,
    iterations_per_cycle: u32,
}

impl Desk {
    pub fn new(config: DeskConfig, left: u32, right: u32) -> Self {
        let mut bus = SimulatedBus::new();
        for (name, address, position) in [
            ("left", config.bus.left_address, left),
            ("right", config.bus.right_address, right),
        ] {
            bus.attach(Arc::new(GearboxNode::simulated(
                name,
                address,
                &config.gearbox,
                config.deviation,
                position,
            )));
        }
        let iterations_per_cycle =
            (config.timing.cycle_time().as_micros() / config.gearbox.step_interval().as_micros()) as u32;
        Self {
            coordinator: Coordinator::new(config, bus, SimPowerSwitches::new()),
            now: Duration::ZERO,
            iterations_per_cycle,
        }
    }

    pub fn at(left: u32, right: u32) -> Self {
        Self::new(DeskConfig::default(), left, right)
    }

    pub fn press(&mut self, button: ButtonId, event: ButtonEvent) {
        assert!(self.coordinator.push_event(InputEvent::new(button, event)));
    }

    pub fn click(&mut self, button: ButtonId) {
        self.press(button, ButtonEvent::SingleClick);
    }

    /// One control cycle followed by one cycle of node steps.
    pub fn step(&mut self) -> Action {
        let action = self.coordinator.cycle(self.now);
        self.coordinator.link().bus().advance(self.iterations_per_cycle);
        self.now += self.coordinator.config().timing.cycle_time();
        action
    }

    pub fn run(&mut self, cycles: usize) -> Vec<Action> {
        (0..cycles).map(|_| self.step()).collect()
    }

    /// Step until `done` holds. Returns the cycles taken, `None` on timeout.
    pub fn run_until(&mut self, max_cycles: usize, done: impl Fn(&Self) -> bool) -> Option<usize> {
        for n in 0..max_cycles {
            if done(self) {
                return Some(n);
            }
            self.step();
        }
        done(self).then_some(max_cycles)
    }

    pub fn state(&self) -> GearboxState {
        self.coordinator.gearbox_state()
    }

    pub fn ui(&self) -> UiState {
        self.coordinator.ui_state()
    }

    pub fn hardware(&self, address: u8) -> Arc<Mutex<SimGearbox>> {
        Arc::clone(
            self.coordinator
                .link()
                .bus()
                .node(address)
                .expect("node attached")
                .hardware(),
        )
    }

    pub fn position(&self, address: u8) -> u32 {
        self.hardware(address).lock().position()
    }

    pub fn positions(&self) -> (u32, u32) {
        (self.position(LEFT), self.position(RIGHT))
    }

    pub fn set_offline(&mut self, address: u8, offline: bool) {
        self.coordinator.link_mut().bus_mut().set_offline(address, offline);
    }

    /// Main click and run the unlock sequence into drive mode.
    pub fn unlock(&mut self) {
        self.click(ButtonId::Main);
        let cycles = self.run_until(300, |d| d.state() == GearboxState::DriveMode);
        assert!(cycles.is_some(), "unlock stuck in {:?}", self.state());
    }
}
