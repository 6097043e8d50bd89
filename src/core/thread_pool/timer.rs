//! Deadline queue driven by the pool's timer thread.
//!
//! The timer thread blocks on a parking_lot `Condvar` until the earliest
//! deadline passes or an earlier entry is inserted. It never runs jobs itself;
//! due entries are handed back to the pool and go through the job channel.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::mem;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::executor::{Job, RepeatingJob};

/// Roughly thirty years. Used when a requested deadline overflows `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Compute `from + delay`, saturating at a far-future deadline.
pub(super) fn deadline_after(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

pub(super) enum TimerAction {
    Once(Job),
    FixedRate { job: RepeatingJob, period: Duration },
}

pub(super) struct TimerEntry {
    pub(super) deadline: Instant,
    seq: u64,
    pub(super) action: TimerAction,
}

// Ordered by deadline; `seq` keeps entries with equal deadlines FIFO.
impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.seq.cmp(&other.seq))
    }
}

#[derive(Default)]
struct TimerState {
    heap: BinaryHeap<Reverse<TimerEntry>>,
    next_seq: u64,
    shutdown: bool,
}

#[derive(Default)]
pub(super) struct TimerQueue {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

impl TimerQueue {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Queue `action` for `deadline`. Returns `false` after shutdown.
    pub(super) fn insert(&self, deadline: Instant, action: TimerAction) -> bool {
        let mut state = self.state.lock();
        if state.shutdown {
            return false;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        let earliest = state
            .heap
            .peek()
            .is_none_or(|Reverse(head)| deadline < head.deadline);
        state.heap.push(Reverse(TimerEntry {
            deadline,
            seq,
            action,
        }));
        drop(state);
        if earliest {
            self.wakeup.notify_one();
        }
        true
    }

    /// Block until the earliest entry is due and remove it.
    ///
    /// Returns `None` once the queue has been shut down.
    pub(super) fn next_due(&self) -> Option<TimerEntry> {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return None;
            }
            let head = state.heap.peek().map(|Reverse(entry)| entry.deadline);
            match head {
                None => self.wakeup.wait(&mut state),
                Some(deadline) if deadline <= Instant::now() => {
                    return state.heap.pop().map(|Reverse(entry)| entry);
                }
                Some(deadline) => {
                    let _ = self.wakeup.wait_until(&mut state, deadline);
                }
            }
        }
    }

    /// Stop the timer thread and drop every pending entry.
    pub(super) fn shutdown(&self) {
        let dropped = {
            let mut state = self.state.lock();
            state.shutdown = true;
            mem::take(&mut state.heap)
        };
        self.wakeup.notify_all();
        // Pending jobs are dropped outside the lock; their captures may do work.
        drop(dropped);
    }

    pub(super) fn len(&self) -> usize {
        self.state.lock().heap.len()
    }
}
