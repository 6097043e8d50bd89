//! FIFO lane that gives a worker its ordering guarantee.
//!
//! Producers push cells; the producer that moves the work-in-progress counter
//! off zero owns the drain and runs queued cells one at a time until the
//! counter returns to zero. Every unit of the counter corresponds to a cell
//! pushed before the increment, so the drain always finds one to pop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::task::TaskCell;

#[derive(Default)]
pub(crate) struct SerialLane {
    queue: Mutex<VecDeque<Arc<TaskCell>>>,
    wip: AtomicUsize,
}

impl SerialLane {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue `cell`. Returns `true` when the caller must start a drain.
    pub(crate) fn push(&self, cell: Arc<TaskCell>) -> bool {
        self.queue.lock().push_back(cell);
        self.wip.fetch_add(1, Ordering::AcqRel) == 0
    }

    /// Run queued cells in order until the lane is empty.
    pub(crate) fn drain(&self) {
        loop {
            let next = self.queue.lock().pop_front();
            if let Some(cell) = next {
                cell.run();
            }
            if self.wip.fetch_sub(1, Ordering::AcqRel) == 1 {
                break;
            }
        }
    }
}
