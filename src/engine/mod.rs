use statig::{blocking::IntoStateMachineExt as _, prelude::*};

use crate::config::{ButtonConfig, TARGET_POLLS};
use crate::types::{Event, EventKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TimerSlot {
    Poll,
    Hold,
    Window,
}

/// Stimuli fed to the state machine by the runner. `PollElapsed` and
/// `HoldElapsed` carry the level sampled at the moment the timer fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EngineInput {
    Reset { pressed: bool },
    Edge,
    PollElapsed { pressed: bool },
    HoldElapsed { pressed: bool },
    WindowElapsed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EngineAction {
    EnableEdges,
    DisableEdges,
    ArmTimer { slot: TimerSlot, micros: u64 },
    CancelTimer { slot: TimerSlot },
    Emit(Event),
}

/// Detection-time inputs sampled by the runner before each step: the shared
/// context index and whether a double-click handler is live for it.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct StepEnv {
    pub(crate) context_index: u8,
    pub(crate) double_click_bound: bool,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ActionBuffer {
    len: usize,
    slots: [Option<EngineAction>; Self::MAX],
}

impl ActionBuffer {
    const MAX: usize = 8;

    pub(crate) const fn new() -> Self {
        Self {
            len: 0,
            slots: [None; Self::MAX],
        }
    }

    fn push(&mut self, action: EngineAction) {
        if self.len >= Self::MAX {
            return;
        }
        self.slots[self.len] = Some(action);
        self.len += 1;
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &EngineAction> {
        self.slots[..self.len].iter().filter_map(Option::as_ref)
    }
}

pub(crate) struct StepContext {
    env: StepEnv,
    actions: ActionBuffer,
}

pub(crate) struct ButtonEngine {
    machine: statig::blocking::StateMachine<DebounceHsm>,
}

impl ButtonEngine {
    pub(crate) fn new(config: ButtonConfig) -> Self {
        Self {
            machine: DebounceHsm::new(config).state_machine(),
        }
    }

    pub(crate) fn step(&mut self, input: EngineInput, env: StepEnv) -> ActionBuffer {
        let mut context = StepContext {
            env,
            actions: ActionBuffer::new(),
        };
        self.machine.handle_with_context(&input, &mut context);
        context.actions
    }
}

struct DebounceHsm {
    config: ButtonConfig,
    valid_polls: u16,
    total_polls: u16,
    suppress_click: bool,
    window_open: bool,
    window_context: u8,
    repeat_active: bool,
}

impl DebounceHsm {
    fn new(config: ButtonConfig) -> Self {
        Self {
            config,
            valid_polls: 0,
            total_polls: 0,
            suppress_click: false,
            window_open: false,
            window_context: 0,
            repeat_active: false,
        }
    }

    fn arm_poll(&self, context: &mut StepContext) {
        context.actions.push(EngineAction::ArmTimer {
            slot: TimerSlot::Poll,
            micros: u64::from(self.config.poll_interval_us()),
        });
    }

    // An edge is the first sample of the level it announces.
    fn begin_confirmation(&mut self, context: &mut StepContext) {
        self.valid_polls = 1;
        self.total_polls = 1;
        context.actions.push(EngineAction::DisableEdges);
        self.arm_poll(context);
    }

    fn emit(&self, context: &mut StepContext, kind: EventKind, at_context: u8) {
        context.actions.push(EngineAction::Emit(Event {
            kind,
            context: at_context,
        }));
    }

    /// Long-press threshold or auto-repeat period elapsed. Checks the live
    /// level so the repeat chain self-terminates once the button is let go.
    fn hold_tick(&mut self, context: &mut StepContext, pressed: bool) -> Outcome<State> {
        if !pressed {
            return Handled;
        }
        if self.repeat_active {
            self.emit(context, EventKind::AutoRepeat, context.env.context_index);
        } else {
            self.repeat_active = true;
            self.suppress_click = true;
            self.emit(context, EventKind::LongPress, context.env.context_index);
        }
        context.actions.push(EngineAction::ArmTimer {
            slot: TimerSlot::Hold,
            micros: self.config.auto_repeat_us(),
        });
        Handled
    }

    /// Click / double-click / suppression decision on an accepted release.
    fn classify_release(&mut self, context: &mut StepContext) {
        self.repeat_active = false;
        if self.suppress_click {
            // A hold that already produced LongPress never also clicks.
            self.suppress_click = false;
            return;
        }
        if self.window_open {
            self.window_open = false;
            context.actions.push(EngineAction::CancelTimer {
                slot: TimerSlot::Window,
            });
            self.emit(context, EventKind::DoubleClick, self.window_context);
            return;
        }
        if context.env.double_click_bound {
            self.window_open = true;
            self.window_context = context.env.context_index;
            context.actions.push(EngineAction::ArmTimer {
                slot: TimerSlot::Window,
                micros: self.config.double_click_us(),
            });
            return;
        }
        self.emit(context, EventKind::Press, context.env.context_index);
    }
}

#[state_machine(initial = "State::released()")]
impl DebounceHsm {
    #[state(superstate = "monitoring")]
    fn released(&mut self, context: &mut StepContext, event: &EngineInput) -> Outcome<State> {
        match event {
            EngineInput::Edge => {
                self.begin_confirmation(context);
                Transition(State::confirming_press())
            }
            _ => Super,
        }
    }

    #[state(superstate = "monitoring")]
    fn confirming_press(
        &mut self,
        context: &mut StepContext,
        event: &EngineInput,
    ) -> Outcome<State> {
        match event {
            EngineInput::PollElapsed { pressed } => {
                self.total_polls = self.total_polls.saturating_add(1);
                if *pressed {
                    self.valid_polls = self.valid_polls.saturating_add(1);
                }
                if self.total_polls < TARGET_POLLS {
                    self.arm_poll(context);
                    return Handled;
                }
                if u32::from(self.valid_polls) * 2 > u32::from(self.total_polls) {
                    self.emit(context, EventKind::Down, context.env.context_index);
                    self.repeat_active = false;
                    context.actions.push(EngineAction::ArmTimer {
                        slot: TimerSlot::Hold,
                        micros: self.config.long_press_us(),
                    });
                    context.actions.push(EngineAction::EnableEdges);
                    Transition(State::pressed())
                } else {
                    // False alarm; resume watching for a genuine edge.
                    context.actions.push(EngineAction::EnableEdges);
                    Transition(State::released())
                }
            }
            _ => Super,
        }
    }

    #[state(superstate = "monitoring")]
    fn pressed(&mut self, context: &mut StepContext, event: &EngineInput) -> Outcome<State> {
        match event {
            EngineInput::Edge => {
                self.begin_confirmation(context);
                Transition(State::confirming_release())
            }
            EngineInput::HoldElapsed { pressed } => self.hold_tick(context, *pressed),
            _ => Super,
        }
    }

    #[state(superstate = "monitoring")]
    fn confirming_release(
        &mut self,
        context: &mut StepContext,
        event: &EngineInput,
    ) -> Outcome<State> {
        match event {
            EngineInput::PollElapsed { pressed } => {
                self.total_polls = self.total_polls.saturating_add(1);
                if *pressed {
                    // Evidence against a genuine release. Never stop polling
                    // here: a missed release would leave the button stuck
                    // pressed. The counter adjustment keeps a held button
                    // from drifting toward acceptance.
                    if self.valid_polls > 0 {
                        self.valid_polls -= 1;
                    } else {
                        self.total_polls = 0;
                    }
                    self.arm_poll(context);
                    return Handled;
                }
                self.valid_polls = self.valid_polls.saturating_add(1);
                if self.total_polls >= TARGET_POLLS
                    && u32::from(self.valid_polls) * 2 > u32::from(self.total_polls)
                {
                    context.actions.push(EngineAction::CancelTimer {
                        slot: TimerSlot::Hold,
                    });
                    self.emit(context, EventKind::Up, context.env.context_index);
                    self.classify_release(context);
                    context.actions.push(EngineAction::EnableEdges);
                    Transition(State::released())
                } else {
                    self.arm_poll(context);
                    Handled
                }
            }
            EngineInput::HoldElapsed { pressed } => self.hold_tick(context, *pressed),
            _ => Super,
        }
    }

    /// Shared by every state: double-click window expiry, reset, and
    /// absorption of stale inputs (a timer callback that outlived the state
    /// that armed it is a no-op, not an error).
    #[superstate]
    fn monitoring(&mut self, context: &mut StepContext, event: &EngineInput) -> Outcome<State> {
        match event {
            EngineInput::WindowElapsed => {
                if self.window_open {
                    // The first click of a would-be pair stands alone. The
                    // context recorded when the window opened wins over any
                    // later context change.
                    self.window_open = false;
                    self.emit(context, EventKind::Press, self.window_context);
                }
                Handled
            }
            EngineInput::Reset { pressed } => {
                self.valid_polls = 0;
                self.total_polls = 0;
                self.suppress_click = false;
                self.window_open = false;
                self.repeat_active = false;
                context.actions.push(EngineAction::CancelTimer {
                    slot: TimerSlot::Poll,
                });
                context.actions.push(EngineAction::CancelTimer {
                    slot: TimerSlot::Hold,
                });
                context.actions.push(EngineAction::CancelTimer {
                    slot: TimerSlot::Window,
                });
                context.actions.push(EngineAction::EnableEdges);
                if *pressed {
                    Transition(State::pressed())
                } else {
                    Transition(State::released())
                }
            }
            _ => Handled,
        }
    }
}
