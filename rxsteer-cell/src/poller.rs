use std::sync::Arc;

use rxsteer_common::UnitId;
use tracing::debug;

use crate::{
    cell::{CellState, PollStatus},
    ReceiveCell, Sink,
};

/// Why a poller task returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerExit {
    /// Its cell was disabled.
    Disabled,
}

/// Drives one cell: parks until the cell is scheduled or disabled, then runs poll turns until it goes
/// idle, yielding to the runtime after every turn that used the whole budget.
pub(crate) async fn run_poller<S: Sink>(
    cell: Arc<ReceiveCell>,
    sink: Arc<S>,
    budget: usize,
) -> (UnitId, PollerExit) {
    let unit = cell.unit();
    debug!(%unit, budget, "Poller started");

    loop {
        let notified = cell.wakeup().notified();
        tokio::pin!(notified);
        // Registered before the state check so a teardown in between still wakes us.
        notified.as_mut().enable();
        if cell.state() == CellState::Disabled {
            debug!(%unit, "Cell disabled, poller exiting");
            return (unit, PollerExit::Disabled);
        }
        notified.await;

        loop {
            match cell.poll(budget, &*sink) {
                PollStatus::Complete(_) | PollStatus::Idle => break,
                PollStatus::Exhausted(_) | PollStatus::Busy => tokio::task::yield_now().await,
                PollStatus::Disabled => {
                    debug!(%unit, "Cell disabled, poller exiting");
                    return (unit, PollerExit::Disabled);
                }
            }
        }
    }
}
