use core::sync::atomic::{AtomicU32, Ordering};

static FAST_QUEUE_DROPS: AtomicU32 = AtomicU32::new(0);
static DEFERRED_QUEUE_DROPS: AtomicU32 = AtomicU32::new(0);
static SUPPRESSED_INVOCATIONS: AtomicU32 = AtomicU32::new(0);

pub(crate) fn record_fast_drop() {
    FAST_QUEUE_DROPS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_deferred_drop() {
    DEFERRED_QUEUE_DROPS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_suppressed_invocation() {
    SUPPRESSED_INVOCATIONS.fetch_add(1, Ordering::Relaxed);
}

/// Point-in-time view of the crate's loss counters: queue overflows and
/// invocations neutralized by teardown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    pub fast_queue_drops: u32,
    pub deferred_queue_drops: u32,
    pub suppressed_invocations: u32,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        fast_queue_drops: FAST_QUEUE_DROPS.load(Ordering::Relaxed),
        deferred_queue_drops: DEFERRED_QUEUE_DROPS.load(Ordering::Relaxed),
        suppressed_invocations: SUPPRESSED_INVOCATIONS.load(Ordering::Relaxed),
    }
}
