//! Scheduler and worker contracts plus the capability model.

use std::fmt;
use std::ops::BitOr;
use std::time::Duration;

use super::disposable::{Disposable, TaskHandle};
use super::task::Runnable;

/// What kinds of submission a scheduler or facility can honor.
///
/// Negotiated once when a scheduler is constructed, then consulted on every
/// call instead of probing the facility.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    /// Immediate submission only.
    pub const IMMEDIATE: Self = Self(0);
    /// Run once after a delay.
    pub const DELAY: Self = Self(0b01);
    /// Run repeatedly at a fixed rate.
    pub const PERIODIC: Self = Self(0b10);
    /// Both delayed and periodic submission.
    pub const TIMED: Self = Self(0b11);

    /// Whether every flag in `other` is also set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether delayed submission is supported.
    #[must_use]
    pub const fn supports_delay(self) -> bool {
        self.contains(Self::DELAY)
    }

    /// Whether periodic submission is supported.
    #[must_use]
    pub const fn supports_periodic(self) -> bool {
        self.contains(Self::PERIODIC)
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("delay", &self.supports_delay())
            .field("periodic", &self.supports_periodic())
            .finish()
    }
}

/// A sequential execution lane created by a [`Scheduler`].
///
/// Tasks accepted by one worker run in submission order and never overlap
/// each other. Timed tasks join that order when their delay elapses. Once
/// disposed, a worker rejects every call without touching its facility.
/// Dropping a worker disposes it.
pub trait Worker: Disposable + Send + Sync {
    /// Run `task` once, as soon as possible.
    fn schedule(&self, task: Runnable) -> TaskHandle;

    /// Run `task` once, no earlier than `delay` from now.
    ///
    /// Returns [`TaskHandle::NOT_TIMED`] if the scheduler cannot delay.
    fn schedule_delayed(&self, task: Runnable, delay: Duration) -> TaskHandle;

    /// Run `task` after `initial_delay`, then every `period`, until disposed.
    ///
    /// Returns [`TaskHandle::NOT_TIMED`] if the scheduler cannot repeat.
    fn schedule_periodically(
        &self,
        task: Runnable,
        initial_delay: Duration,
        period: Duration,
    ) -> TaskHandle;
}

/// A strategy for running tasks on some execution facility.
///
/// Scheduling calls never block and never panic for expected conditions: an
/// unsupported capability, a refused submission, or use after disposal all
/// come back as an already-disposed [`TaskHandle`].
pub trait Scheduler: Disposable + Send + Sync {
    /// Capabilities negotiated when the scheduler was built.
    fn capabilities(&self) -> Capabilities;

    /// Allocate a new sequential lane.
    ///
    /// A disposed scheduler hands out a worker that is already disposed.
    fn create_worker(&self) -> Box<dyn Worker>;

    /// Run `task` once, as soon as possible, with no ordering guarantee.
    fn schedule(&self, task: Runnable) -> TaskHandle;

    /// Run `task` once, no earlier than `delay` from now.
    fn schedule_delayed(&self, task: Runnable, delay: Duration) -> TaskHandle;

    /// Run `task` after `initial_delay`, then at a fixed rate of `period`.
    ///
    /// A tick is never started while the previous one is still running, and a
    /// dispose requested during a tick takes effect at the tick boundary.
    fn schedule_periodically(
        &self,
        task: Runnable,
        initial_delay: Duration,
        period: Duration,
    ) -> TaskHandle;
}
