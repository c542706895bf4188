//! Debounced update scheduling.
//!
//! [`UpdateScheduler`] is a single-slot deferred task: each request replaces
//! the pending one and restarts the delay, so a burst of requests fires once
//! after the burst goes quiet. The host drives it by calling
//! [`UpdateScheduler::poll`] from its own loop; nothing runs in the
//! background.
use std::cell::Cell;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::config::MAX_UPDATE_DELAY_MS;

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Virtual time that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Cancel-and-replace debounce timer.
#[derive(Debug)]
pub struct UpdateScheduler<C: Clock = SystemClock> {
    clock: C,
    delay: Duration,
    live: bool,
    deadline: Option<Instant>,
}

impl<C: Clock> UpdateScheduler<C> {
    /// Idle scheduler; requests are ignored until live mode is enabled.
    pub fn new(clock: C, delay: Duration) -> Self {
        Self {
            clock,
            delay: clamp_delay(delay),
            live: false,
            deadline: None,
        }
    }

    /// Schedule a run `delay` from now, replacing any pending one.
    ///
    /// Returns `false` (and schedules nothing) outside live mode.
    pub fn request_update(&mut self) -> bool {
        if !self.live {
            return false;
        }
        let replaced = self.deadline.is_some();
        self.deadline = Some(self.clock.now() + self.delay);
        trace!(replaced, delay_ms = self.delay.as_millis() as u64, "Update requested");
        true
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// `true` exactly once when the pending run is due; clears it.
    pub fn poll(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if self.clock.now() >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Time left until the pending run is due, if any.
    pub fn time_until_due(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(self.clock.now()))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Applies to requests made from now on.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = clamp_delay(delay);
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Leaving live mode drops any pending run.
    pub fn set_live(&mut self, live: bool) {
        self.live = live;
        if !live {
            self.cancel();
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

fn clamp_delay(delay: Duration) -> Duration {
    delay.min(Duration::from_millis(MAX_UPDATE_DELAY_MS))
}
