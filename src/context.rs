use core::sync::atomic::{AtomicU8, Ordering};

use crate::config::MAX_CONTEXTS;
use crate::types::ConfigError;

/// Shared "menu level" selector. Every button reads it at detection time;
/// changing it affects only events detected afterwards. Construct one per
/// application (or per test) and share it by reference.
pub struct ContextSelector {
    current: AtomicU8,
    levels: u8,
}

impl ContextSelector {
    /// `levels` is clamped into `1..=MAX_CONTEXTS`.
    pub const fn new(levels: u8) -> Self {
        let levels = if levels == 0 {
            1
        } else if levels as usize > MAX_CONTEXTS {
            MAX_CONTEXTS as u8
        } else {
            levels
        };
        Self {
            current: AtomicU8::new(0),
            levels,
        }
    }

    pub fn levels(&self) -> u8 {
        self.levels
    }

    pub fn get(&self) -> u8 {
        self.current.load(Ordering::Acquire)
    }

    pub fn set(&self, level: u8) -> Result<(), ConfigError> {
        if level >= self.levels {
            return Err(ConfigError::ContextOutOfRange);
        }
        self.current.store(level, Ordering::Release);
        Ok(())
    }
}
