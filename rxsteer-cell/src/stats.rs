use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one destination, shared by all of its cells.
#[derive(Debug, Default)]
pub struct RegistryStats {
    /// Buffers freed because a cell was at its backlog limit.
    rx_dropped: AtomicU64,
    /// Buffers queued on a cell.
    enqueued: AtomicU64,
    /// Buffers handed to the slow path.
    bypassed: AtomicU64,
}

impl RegistryStats {
    #[inline]
    pub(crate) fn increment_dropped(&self) {
        self.rx_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_bypassed(&self) {
        self.bypassed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn rx_dropped(&self) -> u64 {
        self.rx_dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn bypassed(&self) -> u64 {
        self.bypassed.load(Ordering::Relaxed)
    }
}

/// Counters for a single receive cell.
#[derive(Debug, Default)]
pub struct CellStats {
    /// Idle -> Scheduled transitions.
    scheduled: AtomicU64,
    delivered: AtomicU64,
    /// Buffers discarded at teardown.
    purged: AtomicU64,
}

impl CellStats {
    #[inline]
    pub(crate) fn increment_scheduled(&self) {
        self.scheduled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_delivered(&self, n: usize) {
        self.delivered.fetch_add(n as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_purged(&self, n: usize) {
        self.purged.fetch_add(n as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn scheduled(&self) -> u64 {
        self.scheduled.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn purged(&self) -> u64 {
        self.purged.load(Ordering::Relaxed)
    }
}
