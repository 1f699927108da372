use core::cell::RefCell;
use core::future::pending;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_futures::select::{select3, Either3};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use log::{debug, trace};

use crate::config::ButtonConfig;
use crate::context::ContextSelector;
use crate::dispatch::{Dispatcher, Invocation};
use crate::engine::{ActionBuffer, ButtonEngine, EngineAction, EngineInput, StepEnv, TimerSlot};
use crate::input::InputSource;
use crate::registry::{EventMask, HandlerTable};
use crate::types::{ConfigError, Event, EventKind, Handler};

/// One monitored pushbutton: configuration, handler bindings, enable mask,
/// and the detection loop.
///
/// The instance is shared by reference between the embedding application
/// (binding handlers, switching contexts) and the `run` future that owns
/// the detection state machine. `shutdown` stops the loop and neutralizes
/// any handler invocation still sitting in a dispatch queue.
pub struct Button {
    config: ButtonConfig,
    dispatcher: &'static Dispatcher,
    contexts: &'static ContextSelector,
    bindings: Mutex<CriticalSectionRawMutex, RefCell<HandlerTable>>,
    mask: EventMask,
    alive: AtomicBool,
    stop: Signal<CriticalSectionRawMutex, ()>,
}

impl Button {
    pub fn new(
        config: ButtonConfig,
        dispatcher: &'static Dispatcher,
        contexts: &'static ContextSelector,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            dispatcher,
            contexts,
            bindings: Mutex::new(RefCell::new(HandlerTable::new())),
            mask: EventMask::new(),
            alive: AtomicBool::new(true),
            stop: Signal::new(),
        })
    }

    /// Binds `handler` for `kind` at `context`, replacing any previous one.
    pub fn bind(&self, kind: EventKind, context: u8, handler: Handler) -> Result<(), ConfigError> {
        if context >= self.contexts.levels() {
            return Err(ConfigError::ContextOutOfRange);
        }
        self.bindings
            .lock(|table| table.borrow_mut().bind(kind, context, handler));
        Ok(())
    }

    pub fn unbind(&self, kind: EventKind, context: u8) -> Result<(), ConfigError> {
        if context >= self.contexts.levels() {
            return Err(ConfigError::ContextOutOfRange);
        }
        self.bindings
            .lock(|table| table.borrow_mut().unbind(kind, context));
        Ok(())
    }

    pub fn enable_event(&self, kind: EventKind) {
        self.mask.enable(kind);
    }

    pub fn disable_event(&self, kind: EventKind) {
        self.mask.disable(kind);
    }

    pub fn event_enabled(&self, kind: EventKind) -> bool {
        self.mask.enabled(kind)
    }

    pub fn enable_all(&self) {
        self.mask.set_all(true);
    }

    pub fn disable_all(&self) {
        self.mask.set_all(false);
    }

    pub fn config(&self) -> &ButtonConfig {
        &self.config
    }

    /// Begins teardown: the runner stops, its timer slots die with it, and
    /// queued invocations for this instance become no-ops.
    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::Release);
        self.stop.signal(());
    }

    /// The detection loop. Owns the debounce state machine; every stimulus
    /// (edge, timer expiry) is serialized through this future, which is
    /// what upholds the single-writer invariant over the FSM fields.
    ///
    /// Returns once `shutdown` is called.
    pub async fn run<I: InputSource>(&'static self, mut input: I) {
        let mut engine = ButtonEngine::new(self.config);
        let mut timers = TimerBank::new();
        let mut edges_enabled = true;

        // Initial state tracks whatever the pin reads right now.
        let pressed = input.is_pressed();
        debug!("button: monitoring starts, pressed={}", pressed);
        let actions = engine.step(EngineInput::Reset { pressed }, self.step_env());
        self.apply(actions, &mut timers, &mut edges_enabled, None);

        while self.alive.load(Ordering::Acquire) {
            let wake = select3(
                self.stop.wait(),
                edge_wait(&mut input, edges_enabled),
                sleep_until(timers.next_deadline()),
            )
            .await;
            match wake {
                Either3::First(()) => break,
                Either3::Second(()) => {
                    let actions = engine.step(EngineInput::Edge, self.step_env());
                    self.apply(actions, &mut timers, &mut edges_enabled, None);
                }
                Either3::Third(()) => {
                    let now = Instant::now();
                    for slot in [TimerSlot::Poll, TimerSlot::Hold, TimerSlot::Window] {
                        let Some(deadline) = timers.deadline(slot) else {
                            continue;
                        };
                        if deadline > now {
                            continue;
                        }
                        timers.cancel(slot);
                        let stimulus = match slot {
                            TimerSlot::Poll => EngineInput::PollElapsed {
                                pressed: input.is_pressed(),
                            },
                            TimerSlot::Hold => EngineInput::HoldElapsed {
                                pressed: input.is_pressed(),
                            },
                            TimerSlot::Window => EngineInput::WindowElapsed,
                        };
                        let actions = engine.step(stimulus, self.step_env());
                        self.apply(
                            actions,
                            &mut timers,
                            &mut edges_enabled,
                            Some((slot, deadline)),
                        );
                    }
                }
            }
            debug_assert!(
                edges_enabled || timers.next_deadline().is_some(),
                "runner has no wake source armed"
            );
        }
        debug!("button: monitoring stopped");
    }

    fn step_env(&self) -> StepEnv {
        let context_index = self.contexts.get();
        let double_click_bound = self.mask.allows(EventKind::DoubleClick)
            && self
                .bindings
                .lock(|table| {
                    table
                        .borrow()
                        .lookup(EventKind::DoubleClick, context_index)
                        .is_some()
                });
        StepEnv {
            context_index,
            double_click_bound,
        }
    }

    fn apply(
        &'static self,
        actions: ActionBuffer,
        timers: &mut TimerBank,
        edges_enabled: &mut bool,
        expired: Option<(TimerSlot, Instant)>,
    ) {
        for action in actions.iter() {
            match *action {
                EngineAction::EnableEdges => *edges_enabled = true,
                EngineAction::DisableEdges => *edges_enabled = false,
                EngineAction::ArmTimer { slot, micros } => {
                    // Re-arming the slot that just fired is measured from
                    // its previous deadline, keeping periodic cadences
                    // (auto-repeat) free of accumulated drift.
                    let base = match expired {
                        Some((fired, at)) if fired == slot => at,
                        _ => Instant::now(),
                    };
                    timers.arm(slot, base + Duration::from_micros(micros));
                }
                EngineAction::CancelTimer { slot } => timers.cancel(slot),
                EngineAction::Emit(event) => self.deliver(event),
            }
        }
    }

    /// Classification: consult the enable mask and the handler table for
    /// the context captured at detection, then hand off to the dispatcher.
    /// A disabled or unbound event is dropped silently.
    fn deliver(&'static self, event: Event) {
        if !self.mask.allows(event.kind) {
            trace!("button: {:?} disabled, dropping", event.kind);
            return;
        }
        let handler = self
            .bindings
            .lock(|table| table.borrow().lookup(event.kind, event.context));
        let Some(handler) = handler else {
            trace!(
                "button: no handler for {:?} at context {}",
                event.kind,
                event.context
            );
            return;
        };
        self.dispatcher
            .enqueue(Invocation::new(handler, event, &self.alive));
    }
}

/// The three single-shot timer slots a button can have armed.
struct TimerBank {
    deadlines: [Option<Instant>; 3],
}

impl TimerBank {
    const fn new() -> Self {
        Self {
            deadlines: [None; 3],
        }
    }

    const fn index(slot: TimerSlot) -> usize {
        match slot {
            TimerSlot::Poll => 0,
            TimerSlot::Hold => 1,
            TimerSlot::Window => 2,
        }
    }

    fn arm(&mut self, slot: TimerSlot, deadline: Instant) {
        self.deadlines[Self::index(slot)] = Some(deadline);
    }

    fn cancel(&mut self, slot: TimerSlot) {
        self.deadlines[Self::index(slot)] = None;
    }

    fn deadline(&self, slot: TimerSlot) -> Option<Instant> {
        self.deadlines[Self::index(slot)]
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.iter().flatten().copied().min()
    }
}

async fn edge_wait<I: InputSource>(input: &mut I, enabled: bool) {
    if enabled {
        input.wait_for_edge().await;
    } else {
        pending::<()>().await;
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => Timer::at(at).await,
        None => pending::<()>().await,
    }
}
