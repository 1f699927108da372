use crate::types::ConfigError;

/// Samples taken per debounce decision; acceptance needs a strict majority.
pub const TARGET_POLLS: u16 = 10;

/// Upper bound on context ("menu level") indices a handler table can hold.
pub const MAX_CONTEXTS: usize = 8;

// Cap keeps one poll sub-interval within a 16-bit microsecond timer range.
const MAX_DEBOUNCE_US: u32 = u16::MAX as u32 * TARGET_POLLS as u32;

/// Electrical level that reads as "pressed".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonConfig {
    pub polarity: Polarity,
    /// Total debounce budget in microseconds; sampled in ten sub-intervals.
    pub debounce_us: u32,
    pub long_press_ms: u16,
    pub auto_repeat_ms: u16,
    pub double_click_ms: u16,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            polarity: Polarity::ActiveLow,
            debounce_us: 8_000,
            long_press_ms: 750,
            auto_repeat_ms: 250,
            double_click_ms: 200,
        }
    }
}

impl ButtonConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_us == 0
            || self.long_press_ms == 0
            || self.auto_repeat_ms == 0
            || self.double_click_ms == 0
        {
            return Err(ConfigError::IntervalOutOfRange);
        }
        Ok(())
    }

    pub(crate) fn poll_interval_us(&self) -> u32 {
        let budget = self.debounce_us.min(MAX_DEBOUNCE_US);
        (budget / TARGET_POLLS as u32).max(1)
    }

    pub(crate) fn long_press_us(&self) -> u64 {
        u64::from(self.long_press_ms) * 1_000
    }

    pub(crate) fn auto_repeat_us(&self) -> u64 {
        u64::from(self.auto_repeat_ms) * 1_000
    }

    pub(crate) fn double_click_us(&self) -> u64 {
        u64::from(self.double_click_ms) * 1_000
    }
}
