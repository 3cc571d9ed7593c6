#![doc(issue_tracker_base_url = "https://github.com/chainbound/rxsteer/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

use std::sync::atomic::{AtomicBool, Ordering};

use rxsteer_common::UnitId;
use thiserror::Error;

mod buffer;
pub use buffer::PacketBuffer;

mod cell;
pub use cell::{CellState, PollStatus, PushError, ReceiveCell};

mod poller;
pub use poller::PollerExit;

mod registry;
pub use registry::{CellOptions, CellRegistry};

mod stats;
pub use stats::{CellStats, RegistryStats};

/// Errors returned while setting up a [`CellRegistry`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Zero units were requested.
    #[error("Cannot initialize a registry with zero units")]
    NoUnits,
    /// The cells for `units` could not be allocated.
    #[error("Out of memory allocating {units} receive cells")]
    OutOfMemory { units: usize },
    /// [`CellRegistry::init`] was already called.
    #[error("Registry already initialized")]
    AlreadyInitialized,
    /// A [`CellOptions`] value is out of range.
    #[error("Invalid cell options: {0}")]
    InvalidOptions(&'static str),
}

/// The outcome of handing a buffer to [`CellRegistry::receive`]. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum RxOutcome {
    /// Queued on the unit's receive cell.
    Enqueued,
    /// The cell was at its backlog limit; the buffer was freed and counted.
    Dropped,
    /// Bypassed the cells and handed to the slow path.
    Sunk,
}

/// The downstream receive path.
pub trait Sink: Send + Sync + 'static {
    /// Aggregated path, called from a cell's poll turn in arrival order.
    fn deliver(&self, unit: UnitId, buf: PacketBuffer);

    /// Non-aggregated path for buffers that bypass the cells.
    fn deliver_slow(&self, buf: PacketBuffer);
}

/// The device the cells receive for. Consulted under the registry's read guard on every
/// receive.
pub trait Destination: Send + Sync + 'static {
    /// Whether the destination is still accepting traffic.
    fn is_accepting(&self) -> bool;

    /// Whether aggregation is turned off for this destination, forcing the slow path.
    fn aggregation_disabled(&self) -> bool {
        false
    }
}

/// A [`Destination`] backed by two flags that can be flipped at runtime.
#[derive(Debug)]
pub struct DestinationFlags {
    up: AtomicBool,
    aggregation_disabled: AtomicBool,
}

impl Default for DestinationFlags {
    fn default() -> Self {
        Self { up: AtomicBool::new(true), aggregation_disabled: AtomicBool::new(false) }
    }
}

impl DestinationFlags {
    /// Marks the destination as accepting traffic or not.
    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::Release);
    }

    /// Turns aggregation off, sending every buffer down the slow path.
    pub fn set_aggregation_disabled(&self, disabled: bool) {
        self.aggregation_disabled.store(disabled, Ordering::Release);
    }
}

impl Destination for DestinationFlags {
    fn is_accepting(&self) -> bool {
        self.up.load(Ordering::Acquire)
    }

    fn aggregation_disabled(&self) -> bool {
        self.aggregation_disabled.load(Ordering::Acquire)
    }
}
