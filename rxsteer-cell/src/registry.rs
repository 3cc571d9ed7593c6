use std::{mem, sync::Arc};

use parking_lot::RwLock;
use rxsteer_common::{
    constants::{DEFAULT_MAX_BACKLOG, DEFAULT_POLL_BUDGET},
    JoinMap, UnitId,
};
use rxsteer_wire::Classifier;
use tracing::{debug, trace};

use crate::{
    cell::{PollStatus, PushError, ReceiveCell},
    poller::{run_poller, PollerExit},
    stats::RegistryStats,
    Destination, PacketBuffer, RegistryError, RxOutcome, Sink,
};

/// Options for the receive cells of a [`CellRegistry`].
#[derive(Debug, Clone)]
pub struct CellOptions {
    /// Maximum number of buffers queued per cell before new ones are dropped.
    max_backlog: usize,
    /// Maximum number of buffers delivered in one poll turn.
    poll_budget: usize,
}

impl Default for CellOptions {
    fn default() -> Self {
        Self { max_backlog: DEFAULT_MAX_BACKLOG, poll_budget: DEFAULT_POLL_BUDGET }
    }
}

impl CellOptions {
    /// Sets the per-cell backlog limit.
    pub fn max_backlog(mut self, max_backlog: usize) -> Self {
        self.max_backlog = max_backlog;
        self
    }

    /// Sets the poll budget used by spawned pollers.
    pub fn poll_budget(mut self, poll_budget: usize) -> Self {
        self.poll_budget = poll_budget;
        self
    }

    fn validate(&self) -> Result<(), RegistryError> {
        if self.max_backlog == 0 {
            return Err(RegistryError::InvalidOptions("max_backlog must be non-zero"));
        }
        if self.poll_budget == 0 {
            return Err(RegistryError::InvalidOptions("poll_budget must be non-zero"));
        }
        Ok(())
    }
}

/// One [`ReceiveCell`] per processing unit for a single destination, and the entry point
/// buffers arrive through.
///
/// The cell array is created once by [`CellRegistry::init`] and never resized. It sits behind
/// a read-mostly lock: every [`CellRegistry::receive`] holds the read side across its
/// readiness check and enqueue, and [`CellRegistry::destroy`] takes the write side, so
/// teardown cannot interleave with an enqueue.
#[derive(Debug)]
pub struct CellRegistry<D, S> {
    cells: RwLock<Option<Box<[Arc<ReceiveCell>]>>>,
    classifier: Classifier,
    destination: Arc<D>,
    sink: Arc<S>,
    options: CellOptions,
    stats: RegistryStats,
}

impl<D: Destination, S: Sink> CellRegistry<D, S> {
    /// Creates a registry with no cells. Until [`CellRegistry::init`] succeeds every buffer
    /// takes the slow path.
    pub fn new(
        options: CellOptions,
        classifier: Classifier,
        destination: Arc<D>,
        sink: Arc<S>,
    ) -> Self {
        Self {
            cells: RwLock::new(None),
            classifier,
            destination,
            sink,
            options,
            stats: RegistryStats::default(),
        }
    }

    /// Allocates one idle cell per unit `0..units`.
    ///
    /// On failure no cell is reachable. [`RegistryError::OutOfMemory`] covers the cell array
    /// and a total queue size that cannot be addressed. A queue allocation that fails beyond
    /// that aborts like any other allocation failure.
    pub fn init(&self, units: usize) -> Result<(), RegistryError> {
        if units == 0 {
            return Err(RegistryError::NoUnits);
        }
        self.options.validate()?;

        let queue_bytes = units
            .checked_mul(self.options.max_backlog)
            .and_then(|slots| slots.checked_mul(mem::size_of::<PacketBuffer>()))
            .filter(|bytes| *bytes <= isize::MAX as usize);
        if queue_bytes.is_none() {
            return Err(RegistryError::OutOfMemory { units });
        }

        let mut cells = Vec::new();
        cells.try_reserve_exact(units).map_err(|_| RegistryError::OutOfMemory { units })?;
        for i in 0..units {
            let id = u32::try_from(i).map_err(|_| RegistryError::OutOfMemory { units })?;
            let unit = UnitId::new(id);
            cells.push(Arc::new(ReceiveCell::new(unit, self.options.max_backlog)));
        }

        let mut slot = self.cells.write();
        if slot.is_some() {
            return Err(RegistryError::AlreadyInitialized);
        }
        *slot = Some(cells.into_boxed_slice());

        debug!(units, max_backlog = self.options.max_backlog, "Receive cells initialized");
        Ok(())
    }

    /// Hands a buffer to the receive cell of `unit`.
    ///
    /// Buffers bypass the cells for the slow path when the destination is not accepting
    /// traffic, when the buffer is shared, when aggregation is disabled, or when there is no
    /// cell for `unit`. A cell at its backlog limit drops the buffer and bumps `rx_dropped`.
    pub fn receive(&self, unit: UnitId, mut buf: PacketBuffer) -> RxOutcome {
        let guard = self.cells.read();

        let ready = self.destination.is_accepting() &&
            !buf.is_cloned() &&
            !self.destination.aggregation_disabled();
        let Some(cell) =
            guard.as_deref().and_then(|cells| cells.get(unit.index())).filter(|_| ready)
        else {
            drop(guard);
            return self.bypass(unit, buf);
        };

        if cell.len() >= cell.max_backlog() {
            return self.drop_buffer(unit, buf);
        }

        let high_priority = self.classifier.classify_frame(buf.data(), buf.mac_header());
        buf.tag(high_priority);

        match cell.push(buf) {
            Ok(scheduled) => {
                self.stats.increment_enqueued();
                trace!(%unit, high_priority, scheduled, "Buffer enqueued");
                RxOutcome::Enqueued
            }
            Err(PushError::Full(buf)) => self.drop_buffer(unit, buf),
            Err(PushError::Disabled(buf)) => {
                drop(guard);
                self.bypass(unit, buf)
            }
        }
    }

    fn bypass(&self, unit: UnitId, buf: PacketBuffer) -> RxOutcome {
        trace!(%unit, cloned = buf.is_cloned(), "Buffer bypasses receive cells");
        self.stats.increment_bypassed();
        self.sink.deliver_slow(buf);
        RxOutcome::Sunk
    }

    fn drop_buffer(&self, unit: UnitId, buf: PacketBuffer) -> RxOutcome {
        self.stats.increment_dropped();
        trace!(%unit, len = buf.len(), "Receive cell full, dropping buffer");
        drop(buf);
        RxOutcome::Dropped
    }

    /// Runs one poll turn on the cell of `unit` with the given budget. Returns
    /// [`PollStatus::Disabled`] if there is no such cell.
    pub fn poll(&self, unit: UnitId, budget: usize) -> PollStatus {
        match self.cell(unit) {
            Some(cell) => cell.poll(budget, &*self.sink),
            None => PollStatus::Disabled,
        }
    }

    /// Spawns one poller task per cell on the current Tokio runtime, keyed by unit.
    ///
    /// Each poller sleeps until its cell is scheduled, runs poll turns with the configured
    /// budget (yielding after each full-budget turn) and exits once the cell is disabled.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn spawn_pollers(&self) -> JoinMap<UnitId, PollerExit> {
        let mut pollers = JoinMap::new();
        if let Some(cells) = self.cells.read().as_deref() {
            for cell in cells {
                let unit = cell.unit();
                pollers.spawn(
                    unit,
                    run_poller(cell.clone(), self.sink.clone(), self.options.poll_budget),
                );
            }
        }

        debug!(pollers = pollers.len(), "Spawned cell pollers");
        pollers
    }

    /// Disables every cell, discarding queued buffers, and releases the cell array.
    /// Idempotent; a no-op if never initialized.
    pub fn destroy(&self) {
        let Some(cells) = self.cells.write().take() else {
            return;
        };

        let purged: usize = cells.iter().map(|cell| cell.disable()).sum();
        debug!(units = cells.len(), purged, "Receive cells destroyed");
    }

    /// Returns the cell for `unit`, if initialized.
    pub fn cell(&self, unit: UnitId) -> Option<Arc<ReceiveCell>> {
        self.cells.read().as_deref().and_then(|cells| cells.get(unit.index())).cloned()
    }

    /// Whether the cells are initialized and not destroyed.
    pub fn is_active(&self) -> bool {
        self.cells.read().is_some()
    }

    /// Number of cells, 0 if not initialized.
    pub fn units(&self) -> usize {
        self.cells.read().as_deref().map_or(0, <[_]>::len)
    }

    /// The classifier tagging received buffers.
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// The options the cells were created with.
    pub fn options(&self) -> &CellOptions {
        &self.options
    }

    /// Registry-wide counters.
    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }
}

impl<D, S> Drop for CellRegistry<D, S> {
    fn drop(&mut self) {
        if let Some(cells) = self.cells.get_mut().take() {
            for cell in cells.iter() {
                cell.disable();
            }
        }
    }
}
