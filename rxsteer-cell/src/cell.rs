use std::sync::atomic::{AtomicU8, Ordering};

use crossbeam_queue::ArrayQueue;
use parking_lot::Mutex;
use rxsteer_common::UnitId;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::{stats::CellStats, PacketBuffer, Sink};

const IDLE: u8 = 0;
const SCHEDULED: u8 = 1;
const POLLING: u8 = 2;
const DISABLED: u8 = 3;

/// Scheduling state of a [`ReceiveCell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// Nothing to do; the next push schedules the cell.
    Idle,
    /// Waiting for a poll turn.
    Scheduled,
    /// A poll turn is draining the queue.
    Polling,
    /// Torn down. Never leaves this state.
    Disabled,
}

impl CellState {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            IDLE => Self::Idle,
            SCHEDULED => Self::Scheduled,
            POLLING => Self::Polling,
            _ => Self::Disabled,
        }
    }
}

/// Result of a single poll turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// Drained fewer buffers than the budget; the cell went back to idle.
    Complete(usize),
    /// Used the whole budget. The cell stays scheduled and must be polled again.
    Exhausted(usize),
    /// The cell was not scheduled.
    Idle,
    /// Another poll turn is in progress on this cell.
    Busy,
    /// The cell is disabled; its poller should exit.
    Disabled,
}

impl PollStatus {
    /// Buffers delivered during this turn.
    pub const fn work_done(&self) -> usize {
        match self {
            Self::Complete(n) | Self::Exhausted(n) => *n,
            Self::Idle | Self::Busy | Self::Disabled => 0,
        }
    }
}

/// A buffer [`ReceiveCell::push`] handed back.
#[derive(Debug)]
pub enum PushError {
    /// The queue is at its backlog limit.
    Full(PacketBuffer),
    /// The cell has been disabled.
    Disabled(PacketBuffer),
}

impl PushError {
    /// Returns the rejected buffer.
    pub fn into_inner(self) -> PacketBuffer {
        match self {
            Self::Full(buf) | Self::Disabled(buf) => buf,
        }
    }
}

/// A per-unit receive queue and the state of its cooperative poll task.
///
/// Producers never block: [`ReceiveCell::push`] is a lock-free bounded push followed by an
/// `Idle -> Scheduled` compare-exchange. Only the producer that wins that exchange wakes the
/// poller, so a cell is scheduled once per idle period no matter how many buffers arrive.
/// Poll turns are serialized by `poll_lock`, which [`ReceiveCell::disable`] also takes to wait
/// out an in-flight turn before purging the queue.
#[derive(Debug)]
pub struct ReceiveCell {
    unit: UnitId,
    queue: ArrayQueue<PacketBuffer>,
    state: AtomicU8,
    poll_lock: Mutex<()>,
    wakeup: Notify,
    stats: CellStats,
}

impl ReceiveCell {
    /// Creates an idle cell holding at most `max_backlog` buffers.
    ///
    /// # Panics
    /// Panics if `max_backlog` is zero.
    pub fn new(unit: UnitId, max_backlog: usize) -> Self {
        Self {
            unit,
            queue: ArrayQueue::new(max_backlog),
            state: AtomicU8::new(IDLE),
            poll_lock: Mutex::new(()),
            wakeup: Notify::new(),
            stats: CellStats::default(),
        }
    }

    #[inline]
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    #[inline]
    pub fn state(&self) -> CellState {
        CellState::from_raw(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub fn max_backlog(&self) -> usize {
        self.queue.capacity()
    }

    #[inline]
    pub fn stats(&self) -> &CellStats {
        &self.stats
    }

    /// Notified whenever the cell is scheduled or disabled.
    pub(crate) fn wakeup(&self) -> &Notify {
        &self.wakeup
    }

    /// Appends a buffer. Returns whether this push scheduled the cell.
    pub fn push(&self, buf: PacketBuffer) -> Result<bool, PushError> {
        if self.state.load(Ordering::Acquire) == DISABLED {
            return Err(PushError::Disabled(buf));
        }

        self.queue.push(buf).map_err(PushError::Full)?;

        Ok(self.schedule())
    }

    /// Moves an idle cell to scheduled and wakes its poller. No-op in any other state.
    fn schedule(&self) -> bool {
        if self
            .state
            .compare_exchange(IDLE, SCHEDULED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.stats.increment_scheduled();
            self.wakeup.notify_one();
            trace!(unit = %self.unit, "Cell scheduled");
            true
        } else {
            false
        }
    }

    /// Runs one poll turn: delivers up to `budget` buffers to `sink` in arrival order.
    pub fn poll<S: Sink + ?Sized>(&self, budget: usize, sink: &S) -> PollStatus {
        let Some(_turn) = self.poll_lock.try_lock() else {
            return PollStatus::Busy;
        };

        match self.state.compare_exchange(SCHEDULED, POLLING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {}
            Err(DISABLED) => return PollStatus::Disabled,
            Err(_) => return PollStatus::Idle,
        }

        let mut work_done = 0;
        while work_done < budget {
            if self.state.load(Ordering::Acquire) == DISABLED {
                self.stats.add_delivered(work_done);
                return PollStatus::Disabled;
            }

            let Some(buf) = self.queue.pop() else {
                break;
            };

            sink.deliver(self.unit, buf);
            work_done += 1;
        }

        self.stats.add_delivered(work_done);

        if work_done < budget {
            if self
                .state
                .compare_exchange(POLLING, IDLE, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return PollStatus::Disabled;
            }

            // A producer that pushed after our last pop saw `Polling` and did not schedule.
            if !self.queue.is_empty() {
                self.schedule();
            }

            PollStatus::Complete(work_done)
        } else {
            if self
                .state
                .compare_exchange(POLLING, SCHEDULED, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return PollStatus::Disabled;
            }

            PollStatus::Exhausted(work_done)
        }
    }

    /// Tears the cell down: stops accepting buffers, waits for an in-flight poll turn and
    /// discards everything still queued. Returns the number of buffers discarded.
    ///
    /// Must not be called from inside [`Sink::deliver`] for this cell.
    pub fn disable(&self) -> usize {
        if self.state.swap(DISABLED, Ordering::AcqRel) == DISABLED {
            return 0;
        }

        // Every parked poller must observe the new state and exit. The stored permit covers a
        // poller that has not registered yet.
        self.wakeup.notify_waiters();
        self.wakeup.notify_one();

        let _turn = self.poll_lock.lock();
        let mut purged = 0;
        while self.queue.pop().is_some() {
            purged += 1;
        }

        self.stats.add_purged(purged);
        debug!(unit = %self.unit, purged, "Cell disabled");

        purged
    }
}
