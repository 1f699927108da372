//! End-to-end flows: a scripted pin drives the real detection loop under
//! `block_on` with host timers, and handlers record what fired.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use critical_section as _;
use embassy_futures::select::{select, select3};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};

use clickwork::{
    Button, ButtonConfig, ContextSelector, DispatchMode, Dispatcher, EventKind, Handler,
    InputSource, Polarity,
};

struct ScriptedPin {
    level: &'static AtomicBool,
    edges: &'static Signal<CriticalSectionRawMutex, ()>,
}

impl InputSource for ScriptedPin {
    async fn wait_for_edge(&mut self) {
        self.edges.wait().await;
    }

    fn is_pressed(&mut self) -> bool {
        self.level.load(Ordering::Acquire)
    }
}

struct PinDriver {
    level: &'static AtomicBool,
    edges: &'static Signal<CriticalSectionRawMutex, ()>,
}

impl PinDriver {
    fn set(&self, pressed: bool) {
        self.level.store(pressed, Ordering::Release);
        self.edges.signal(());
    }

    async fn press_for(&self, ms: u64) {
        self.set(true);
        Timer::after(Duration::from_millis(ms)).await;
        self.set(false);
    }
}

fn scripted_pin() -> (ScriptedPin, PinDriver) {
    let level = Box::leak(Box::new(AtomicBool::new(false)));
    let edges = Box::leak(Box::new(Signal::new()));
    (ScriptedPin { level, edges }, PinDriver { level, edges })
}

fn fixture(config: ButtonConfig) -> (&'static Button, &'static Dispatcher, &'static ContextSelector) {
    let dispatcher = Box::leak(Box::new(Dispatcher::new()));
    let contexts = Box::leak(Box::new(ContextSelector::new(4)));
    let button = Box::leak(Box::new(
        Button::new(config, dispatcher, contexts).expect("valid config"),
    ));
    (button, dispatcher, contexts)
}

fn recorder() -> &'static Mutex<Vec<&'static str>> {
    Box::leak(Box::new(Mutex::new(Vec::new())))
}

fn record(seen: &'static Mutex<Vec<&'static str>>, name: &'static str) -> Handler {
    Box::leak(Box::new(move || seen.lock().unwrap().push(name)))
}

fn config(long_press_ms: u16, auto_repeat_ms: u16, double_click_ms: u16) -> ButtonConfig {
    ButtonConfig {
        polarity: Polarity::ActiveHigh,
        debounce_us: 10_000,
        long_press_ms,
        auto_repeat_ms,
        double_click_ms,
    }
}

#[test]
fn brief_press_emits_down_up_press_in_order() {
    let (pin, driver) = scripted_pin();
    let (button, dispatcher, _) = fixture(config(500, 200, 150));
    dispatcher.set_mode(DispatchMode::Synchronous);

    let seen = recorder();
    button.bind(EventKind::Down, 0, record(seen, "down")).unwrap();
    button.bind(EventKind::Up, 0, record(seen, "up")).unwrap();
    button.bind(EventKind::Press, 0, record(seen, "press")).unwrap();

    embassy_futures::block_on(async {
        let script = async {
            Timer::after(Duration::from_millis(10)).await;
            driver.press_for(60).await;
            Timer::after(Duration::from_millis(60)).await;
            button.shutdown();
        };
        select(button.run(pin), script).await;
    });

    dispatcher.process_deferred();
    assert_eq!(seen.lock().unwrap().as_slice(), ["down", "up", "press"]);
}

#[test]
fn long_hold_reports_long_press_and_repeats_without_click() {
    let (pin, driver) = scripted_pin();
    let (button, dispatcher, _) = fixture(config(120, 100, 150));
    dispatcher.set_mode(DispatchMode::Synchronous);

    let seen = recorder();
    button.bind(EventKind::Down, 0, record(seen, "down")).unwrap();
    button.bind(EventKind::Up, 0, record(seen, "up")).unwrap();
    button.bind(EventKind::Press, 0, record(seen, "press")).unwrap();
    button
        .bind(EventKind::LongPress, 0, record(seen, "long"))
        .unwrap();
    button
        .bind(EventKind::AutoRepeat, 0, record(seen, "repeat"))
        .unwrap();
    button
        .bind(EventKind::DoubleClick, 0, record(seen, "double"))
        .unwrap();

    embassy_futures::block_on(async {
        let script = async {
            Timer::after(Duration::from_millis(10)).await;
            driver.press_for(500).await;
            Timer::after(Duration::from_millis(60)).await;
            button.shutdown();
        };
        select(button.run(pin), script).await;
    });

    dispatcher.process_deferred();
    let seen = seen.lock().unwrap();
    assert_eq!(&seen[..2], ["down", "long"]);
    assert_eq!(*seen.last().unwrap(), "up");
    let repeats = seen.iter().filter(|name| **name == "repeat").count();
    assert!((1..=4).contains(&repeats), "repeats: {repeats}");
    assert!(!seen.contains(&"press"));
    assert!(!seen.contains(&"double"));
}

#[test]
fn two_quick_clicks_collapse_into_a_double_click() {
    let (pin, driver) = scripted_pin();
    let (button, dispatcher, _) = fixture(config(600, 200, 250));
    dispatcher.set_mode(DispatchMode::Synchronous);

    let seen = recorder();
    button.bind(EventKind::Down, 0, record(seen, "down")).unwrap();
    button.bind(EventKind::Up, 0, record(seen, "up")).unwrap();
    button.bind(EventKind::Press, 0, record(seen, "press")).unwrap();
    button
        .bind(EventKind::DoubleClick, 0, record(seen, "double"))
        .unwrap();

    embassy_futures::block_on(async {
        let script = async {
            Timer::after(Duration::from_millis(10)).await;
            driver.press_for(40).await;
            Timer::after(Duration::from_millis(60)).await;
            driver.press_for(40).await;
            // Long enough for a forgotten window to have expired.
            Timer::after(Duration::from_millis(400)).await;
            button.shutdown();
        };
        select(button.run(pin), script).await;
    });

    dispatcher.process_deferred();
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        ["down", "up", "down", "up", "double"]
    );
}

#[test]
fn lone_click_fires_press_at_the_context_recorded_at_detection() {
    let (pin, driver) = scripted_pin();
    let (button, dispatcher, contexts) = fixture(config(600, 200, 150));
    dispatcher.set_mode(DispatchMode::Synchronous);

    let seen = recorder();
    button.bind(EventKind::Down, 0, record(seen, "down0")).unwrap();
    button.bind(EventKind::Up, 0, record(seen, "up0")).unwrap();
    button.bind(EventKind::Press, 0, record(seen, "press0")).unwrap();
    button.bind(EventKind::Press, 1, record(seen, "press1")).unwrap();
    button
        .bind(EventKind::DoubleClick, 0, record(seen, "double0"))
        .unwrap();

    embassy_futures::block_on(async {
        let script = async {
            Timer::after(Duration::from_millis(10)).await;
            driver.press_for(40).await;
            // The double-click window is open; move the shared context.
            Timer::after(Duration::from_millis(30)).await;
            contexts.set(1).unwrap();
            Timer::after(Duration::from_millis(400)).await;
            button.shutdown();
        };
        select(button.run(pin), script).await;
    });

    dispatcher.process_deferred();
    assert_eq!(seen.lock().unwrap().as_slice(), ["down0", "up0", "press0"]);
}

#[test]
fn hybrid_mode_splits_fast_and_deferred_delivery() {
    let (pin, driver) = scripted_pin();
    let (button, dispatcher, _) = fixture(config(500, 200, 150));
    dispatcher.set_mode(DispatchMode::Hybrid);

    let seen = recorder();
    button.bind(EventKind::Down, 0, record(seen, "down")).unwrap();
    button.bind(EventKind::Up, 0, record(seen, "up")).unwrap();
    button.bind(EventKind::Press, 0, record(seen, "press")).unwrap();

    embassy_futures::block_on(async {
        let script = async {
            Timer::after(Duration::from_millis(10)).await;
            driver.press_for(60).await;
            // Down and Up flow through the worker on their own; Press stays
            // queued until the host drains.
            for _ in 0..200 {
                if seen.lock().unwrap().len() >= 2 {
                    break;
                }
                Timer::after(Duration::from_millis(5)).await;
            }
            button.shutdown();
        };
        select3(button.run(pin), dispatcher.run_worker(), script).await;
    });

    assert_eq!(seen.lock().unwrap().as_slice(), ["down", "up"]);
    assert_eq!(dispatcher.pending_deferred(), 1);
    dispatcher.process_deferred();
    assert_eq!(seen.lock().unwrap().as_slice(), ["down", "up", "press"]);
}

#[test]
fn shutdown_neutralizes_already_queued_invocations() {
    let (pin, driver) = scripted_pin();
    let (button, dispatcher, _) = fixture(config(500, 200, 150));
    dispatcher.set_mode(DispatchMode::Synchronous);

    let seen = recorder();
    button.bind(EventKind::Down, 0, record(seen, "down")).unwrap();
    button.bind(EventKind::Up, 0, record(seen, "up")).unwrap();
    button.bind(EventKind::Press, 0, record(seen, "press")).unwrap();

    embassy_futures::block_on(async {
        let script = async {
            Timer::after(Duration::from_millis(10)).await;
            driver.press_for(60).await;
            Timer::after(Duration::from_millis(60)).await;
            button.shutdown();
        };
        select(button.run(pin), script).await;
    });

    // Entries were queued before teardown; draining must not run them.
    let processed = dispatcher.process_deferred();
    assert!(processed >= 3, "queued entries: {processed}");
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn disabled_kinds_are_dropped_before_dispatch() {
    let (pin, driver) = scripted_pin();
    let (button, dispatcher, _) = fixture(config(500, 200, 150));
    dispatcher.set_mode(DispatchMode::Synchronous);

    let seen = recorder();
    button.bind(EventKind::Down, 0, record(seen, "down")).unwrap();
    button.bind(EventKind::Up, 0, record(seen, "up")).unwrap();
    button.bind(EventKind::Press, 0, record(seen, "press")).unwrap();
    button.disable_event(EventKind::Press);

    embassy_futures::block_on(async {
        let script = async {
            Timer::after(Duration::from_millis(10)).await;
            driver.press_for(60).await;
            Timer::after(Duration::from_millis(60)).await;
            button.shutdown();
        };
        select(button.run(pin), script).await;
    });

    dispatcher.process_deferred();
    assert_eq!(seen.lock().unwrap().as_slice(), ["down", "up"]);
}
