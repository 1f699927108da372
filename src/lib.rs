//! Debounced pushbutton event engine.
//!
//! Classifies the noisy transitions of a single momentary button into
//! `Down`/`Up`/`Press`/`LongPress`/`AutoRepeat`/`DoubleClick` events by
//! majority-vote polling, resolves the handler bound for the context in
//! effect at detection time, and delivers it through a fast
//! (worker-serviced) or deferred (host-polled) bounded queue.
#![no_std]

#[cfg(test)]
extern crate std;

mod button;
mod config;
mod context;
mod dispatch;
mod engine;
mod input;
mod registry;
mod telemetry;
mod types;

pub use button::Button;
pub use config::{ButtonConfig, Polarity, MAX_CONTEXTS, TARGET_POLLS};
pub use context::ContextSelector;
pub use dispatch::{DispatchMode, Dispatcher, DEFERRED_QUEUE_DEPTH, FAST_QUEUE_DEPTH};
pub use input::{DigitalInput, InputSource};
pub use telemetry::{snapshot, Snapshot};
pub use types::{ConfigError, Event, EventKind, Handler};
