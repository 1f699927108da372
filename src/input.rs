use embassy_time::{Duration, Timer};
use embedded_hal::digital::InputPin;
use embedded_hal_async::digital::Wait;
use log::warn;

use crate::config::Polarity;

/// Hardware seam: anything that can report its level and wake on a level
/// change. Levels are logical: `is_pressed` already accounts for polarity.
#[allow(async_fn_in_trait)]
pub trait InputSource {
    async fn wait_for_edge(&mut self);
    fn is_pressed(&mut self) -> bool;
}

/// Adapter for any `embedded-hal-async` pin.
pub struct DigitalInput<P> {
    pin: P,
    polarity: Polarity,
}

impl<P> DigitalInput<P> {
    pub fn new(pin: P, polarity: Polarity) -> Self {
        Self { pin, polarity }
    }
}

impl<P: Wait + InputPin> InputSource for DigitalInput<P> {
    async fn wait_for_edge(&mut self) {
        if self.pin.wait_for_any_edge().await.is_err() {
            // Back off so a faulted pin cannot spin the runner.
            warn!("input: edge wait failed, backing off");
            Timer::after(Duration::from_millis(1)).await;
        }
    }

    fn is_pressed(&mut self) -> bool {
        let level = match self.polarity {
            Polarity::ActiveHigh => self.pin.is_high(),
            Polarity::ActiveLow => self.pin.is_low(),
        };
        level.unwrap_or(false)
    }
}
