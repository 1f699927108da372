use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{trace, warn};

use crate::telemetry;
use crate::types::{Event, EventKind, Handler};

/// Depth of the low-latency queue serviced by the worker.
pub const FAST_QUEUE_DEPTH: usize = 5;
/// Depth of the queue drained by the host's own loop.
pub const DEFERRED_QUEUE_DEPTH: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DispatchMode {
    /// Every event goes to the fast queue.
    Asynchronous = 0,
    /// `Down`/`Up` go to the fast queue; everything else is deferred.
    Hybrid = 1,
    /// Every event is deferred until the host drains.
    Synchronous = 2,
}

/// A resolved handler call in flight. Carries the owning button's teardown
/// guard; once that clears the invocation degrades to a no-op.
#[derive(Clone, Copy)]
pub(crate) struct Invocation {
    handler: Handler,
    event: Event,
    alive: &'static AtomicBool,
}

impl Invocation {
    pub(crate) fn new(handler: Handler, event: Event, alive: &'static AtomicBool) -> Self {
        Self {
            handler,
            event,
            alive,
        }
    }

    fn invoke(self) {
        if !self.alive.load(Ordering::Acquire) {
            telemetry::record_suppressed_invocation();
            trace!(
                "dispatch: suppressing {:?} for a torn-down button",
                self.event.kind
            );
            return;
        }
        (self.handler)();
    }
}

/// Routes resolved handler calls into two bounded FIFO queues. One
/// dispatcher instance is shared by reference across buttons; its lifetime
/// belongs to the embedding application.
pub struct Dispatcher {
    fast: Channel<CriticalSectionRawMutex, Invocation, FAST_QUEUE_DEPTH>,
    deferred: Channel<CriticalSectionRawMutex, Invocation, DEFERRED_QUEUE_DEPTH>,
    mode: AtomicU8,
}

impl Dispatcher {
    pub const fn new() -> Self {
        Self {
            fast: Channel::new(),
            deferred: Channel::new(),
            mode: AtomicU8::new(DispatchMode::Asynchronous as u8),
        }
    }

    pub fn set_mode(&self, mode: DispatchMode) {
        self.mode.store(mode as u8, Ordering::Release);
    }

    pub fn mode(&self) -> DispatchMode {
        match self.mode.load(Ordering::Acquire) {
            0 => DispatchMode::Asynchronous,
            1 => DispatchMode::Hybrid,
            _ => DispatchMode::Synchronous,
        }
    }

    /// Non-blocking enqueue from detection context. A full queue drops the
    /// new entry; the loss is logged and counted, never signalled back.
    pub(crate) fn enqueue(&self, invocation: Invocation) {
        let fast = match self.mode() {
            DispatchMode::Asynchronous => true,
            DispatchMode::Synchronous => false,
            DispatchMode::Hybrid => {
                matches!(invocation.event.kind, EventKind::Down | EventKind::Up)
            }
        };
        if fast {
            if self.fast.try_send(invocation).is_err() {
                telemetry::record_fast_drop();
                warn!(
                    "dispatch: fast queue full, dropping {:?}",
                    invocation.event.kind
                );
            }
        } else if self.deferred.try_send(invocation).is_err() {
            telemetry::record_deferred_drop();
            warn!(
                "dispatch: deferred queue full, dropping {:?}",
                invocation.event.kind
            );
        }
    }

    /// Services the fast queue forever, invoking entries in order. Spawn
    /// once on the embedding executor.
    pub async fn run_worker(&self) -> ! {
        loop {
            self.fast.receive().await.invoke();
        }
    }

    /// Drains every queued deferred invocation in FIFO order and returns
    /// how many were processed. Call once per iteration of the host loop.
    pub fn process_deferred(&self) -> usize {
        let mut processed = 0;
        while let Ok(invocation) = self.deferred.try_receive() {
            invocation.invoke();
            processed += 1;
        }
        processed
    }

    pub fn pending_deferred(&self) -> usize {
        self.deferred.len()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
