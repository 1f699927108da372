use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::config::MAX_CONTEXTS;
use crate::types::{EventKind, Handler};

/// Sparse (event kind, context) handler table. Rows are event kinds,
/// columns the context levels.
pub(crate) struct HandlerTable {
    slots: [[Option<Handler>; MAX_CONTEXTS]; EventKind::COUNT],
}

impl HandlerTable {
    pub(crate) const fn new() -> Self {
        Self {
            slots: [[None; MAX_CONTEXTS]; EventKind::COUNT],
        }
    }

    pub(crate) fn bind(&mut self, kind: EventKind, context: u8, handler: Handler) {
        if let Some(slot) = self.slots[kind.index()].get_mut(context as usize) {
            *slot = Some(handler);
        }
    }

    pub(crate) fn unbind(&mut self, kind: EventKind, context: u8) {
        if let Some(slot) = self.slots[kind.index()].get_mut(context as usize) {
            *slot = None;
        }
    }

    pub(crate) fn lookup(&self, kind: EventKind, context: u8) -> Option<Handler> {
        self.slots[kind.index()]
            .get(context as usize)
            .copied()
            .flatten()
    }
}

/// Per-kind enable bits plus the global all-events switch. Everything is
/// enabled until the application opts out.
pub(crate) struct EventMask {
    kinds: AtomicU8,
    all: AtomicBool,
}

impl EventMask {
    const ALL_KINDS: u8 = (1 << EventKind::COUNT as u8) - 1;

    pub(crate) const fn new() -> Self {
        Self {
            kinds: AtomicU8::new(Self::ALL_KINDS),
            all: AtomicBool::new(true),
        }
    }

    pub(crate) fn enable(&self, kind: EventKind) {
        self.kinds.fetch_or(kind.bit(), Ordering::AcqRel);
    }

    pub(crate) fn disable(&self, kind: EventKind) {
        self.kinds.fetch_and(!kind.bit(), Ordering::AcqRel);
    }

    pub(crate) fn enabled(&self, kind: EventKind) -> bool {
        self.kinds.load(Ordering::Acquire) & kind.bit() != 0
    }

    pub(crate) fn set_all(&self, enabled: bool) {
        self.all.store(enabled, Ordering::Release);
    }

    pub(crate) fn allows(&self, kind: EventKind) -> bool {
        self.all.load(Ordering::Acquire) && self.enabled(kind)
    }
}
