//! One control cycle: input → deviation guard → transition check → action.

use std::time::Duration;

use desk_common::bus::BusTransport;
use desk_common::config::DeskConfig;
use desk_common::input::InputEvent;
use desk_common::protocol::GearboxCommand;
use tracing::{debug, info, warn};

use crate::context::CoordinatorContext;
use crate::error::PowerError;
use crate::link::{GearboxLink, Telemetry};
use crate::panel::EventQueue;
use crate::power::PowerSwitches;
use crate::safety::guard::{self, GuardVerdict};
use crate::state::gearbox::{self, Action, GearboxState};
use crate::state::ui::{UiState, UiTransition};

/// General controller: owns the state machines, the gearbox link and the
/// local power rails.
pub struct Coordinator<B: BusTransport, P: PowerSwitches> {
    config: DeskConfig,
    ctx: CoordinatorContext,
    link: GearboxLink<B>,
    power: P,
    cycles: u64,
}

impl<B: BusTransport, P: PowerSwitches> Coordinator<B, P> {
    pub fn new(config: DeskConfig, bus: B, power: P) -> Self {
        let ctx = CoordinatorContext::new(&config);
        let link = GearboxLink::new(bus, &config.bus);
        Self {
            config,
            ctx,
            link,
            power,
            cycles: 0,
        }
    }

    #[inline]
    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    #[inline]
    pub fn context(&self) -> &CoordinatorContext {
        &self.ctx
    }

    #[inline]
    pub fn context_mut(&mut self) -> &mut CoordinatorContext {
        &mut self.ctx
    }

    #[inline]
    pub fn ui_state(&self) -> UiState {
        self.ctx.ui.state()
    }

    #[inline]
    pub fn gearbox_state(&self) -> GearboxState {
        self.ctx.state
    }

    #[inline]
    pub fn telemetry(&self) -> &Telemetry {
        &self.ctx.telemetry
    }

    #[inline]
    pub fn link(&self) -> &GearboxLink<B> {
        &self.link
    }

    #[inline]
    pub fn link_mut(&mut self) -> &mut GearboxLink<B> {
        &mut self.link
    }

    #[inline]
    pub fn power(&self) -> &P {
        &self.power
    }

    #[inline]
    pub fn power_mut(&mut self) -> &mut P {
        &mut self.power
    }

    #[inline]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Queue one input event for the next cycle.
    pub fn push_event(&mut self, event: InputEvent) -> bool {
        self.ctx.events.push(event)
    }

    #[inline]
    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.ctx.events
    }

    /// Run one control cycle at monotonic time `now`. Returns the action
    /// performed.
    pub fn cycle(&mut self, now: Duration) -> Action {
        self.apply_input();
        self.guard(now);

        if let Some(next) = gearbox::check(&mut self.ctx, &self.config, now) {
            self.ctx.enter(next, &self.config, now);
        }

        let action = gearbox::perform(&self.ctx, &self.config);
        let ok = self.execute(action);
        if ok {
            if action == Action::Halt {
                self.ctx.halt_pending = false;
            }
            self.ctx.drives.acknowledge(action);
        }
        self.ctx.last_action_ok = ok;
        self.cycles += 1;
        action
    }

    fn apply_input(&mut self) {
        while let Some(event) = self.ctx.events.pop() {
            let from = self.ctx.ui.state();
            match self.ctx.ui.handle_event(event) {
                UiTransition::Ok(to) => {
                    info!(%event, ?from, ?to, "UI state");
                    if from == UiState::MoveTo
                        && matches!(self.ctx.state, GearboxState::DriveMode | GearboxState::Stop)
                    {
                        self.ctx.halt_pending = true;
                    } else if matches!(to, UiState::MoveUp | UiState::MoveDown | UiState::MoveTo) {
                        self.ctx.halt_pending = false;
                    }
                }
                UiTransition::Ignored => debug!(%event, state = ?from, "Input ignored"),
            }
        }
    }

    fn guard(&mut self, now: Duration) {
        if !self.ctx.telemetry.complete() {
            return;
        }
        let (left, right) = self.ctx.telemetry.positions();
        if let GuardVerdict::Trip { deviation } =
            guard::evaluate(self.ctx.state, left, right, &self.config.deviation)
        {
            warn!(
                left,
                right,
                deviation,
                limit = self.config.deviation.hard,
                state = ?self.ctx.state,
                "Gearbox deviation above hard limit, emergency stop"
            );
            self.ctx.enter(GearboxState::EmergencyStop, &self.config, now);
        }
    }

    fn execute(&mut self, action: Action) -> bool {
        let telemetry = &mut self.ctx.telemetry;
        let command = match action {
            Action::Poll => GearboxCommand::GetPosition { peer: 0 },
            Action::DriveUp => GearboxCommand::MoveUp { peer: 0 },
            Action::DriveDown => GearboxCommand::MoveDown { peer: 0 },
            Action::DriveTo(target) => GearboxCommand::MoveTo { peer: 0, target },
            Action::Halt => GearboxCommand::EmergencyStop,
            Action::LoosenBrakes => GearboxCommand::LoosenBrake { peer: 0 },
            Action::FastenBrakes => GearboxCommand::FastenBrake { peer: 0 },
            Action::MotorControl(enable) => GearboxCommand::ToggleMotorControl { peer: 0, enable },
            Action::MotorControlPower(enable) => {
                GearboxCommand::ToggleMotorControlPower { peer: 0, enable }
            }
            Action::RecoverTo(target) => {
                let command = GearboxCommand::MoveTo { peer: target, target };
                return self.link.send_each(telemetry, command, command);
            }
            Action::GearboxPower(on) => {
                let result = self.power.set_gearbox_power(on);
                return self.switched("gearbox_power", on, result);
            }
            Action::MotorPowerSupply(on) => {
                let result = self.power.set_motor_power_supply(on);
                return self.switched("motor_power_supply", on, result);
            }
        };
        self.link.send(telemetry, command)
    }

    /// Report a local switch result; the gearboxes are still polled so the
    /// guard keeps seeing live positions.
    fn switched(&mut self, switch: &'static str, on: bool, result: Result<(), PowerError>) -> bool {
        self.link
            .send(&mut self.ctx.telemetry, GearboxCommand::GetPosition { peer: 0 });
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(switch, on, error = %e, "Power switch failed");
                false
            }
        }
    }
}
