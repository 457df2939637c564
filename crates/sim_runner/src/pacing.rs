//! Wall-clock pacing with drift compensation.
//!
//! After each tick the [`Pacer`] sleeps for whatever is left of the update
//! period. Sleeps rarely last exactly as long as requested, so the pacer
//! keeps a running estimate of the sleep error and subtracts it from the
//! next request:
//!
//! ```text
//! sleep  = max(0, period - elapsed - offset)
//! offset = 0.01 * (actual - sleep) + 0.99 * offset
//! ```
//!
//! `elapsed` is measured from the end of the previous pacing step, so the
//! time spent running the tick counts against the period.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

const OFFSET_GAIN: f64 = 0.01;

/// Source of time for the runner.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A clock that only moves when told to.
///
/// `sleep` advances it by the requested duration plus a fixed oversleep,
/// which models a scheduler that always wakes late.
#[derive(Debug)]
pub struct SimulatedClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    oversleep: Duration,
}

impl SimulatedClock {
    #[must_use]
    pub fn new(oversleep: Duration) -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            oversleep,
        })
    }

    /// Move time forward, as if work had been done.
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Time elapsed since the clock was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration + self.oversleep);
    }
}

/// Keeps ticks on a fixed wall-clock period.
#[derive(Debug, Clone)]
pub struct Pacer {
    period: Duration,
    /// Smoothed sleep error in seconds. Positive means sleeps overshoot.
    offset: f64,
    last_update: Option<Instant>,
    overrun_warn_ratio: f64,
}

impl Pacer {
    #[must_use]
    pub fn new(period: Duration, overrun_warn_ratio: f64) -> Self {
        Self {
            period,
            offset: 0.0,
            last_update: None,
            overrun_warn_ratio,
        }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Takes effect from the next pacing step.
    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }

    /// Current sleep error estimate.
    #[must_use]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Mark the start of a run. Time before this is not counted.
    pub fn start(&mut self, now: Instant) {
        self.last_update = Some(now);
    }

    /// Sleep out the rest of the current period. Returns how long the sleep
    /// actually took (zero on overrun).
    ///
    /// A zero period means ticks run back to back: nothing is slept and no
    /// overrun is reported.
    pub fn pace(&mut self, clock: &dyn Clock) -> Duration {
        let now = clock.now();
        if self.period.is_zero() {
            self.last_update = Some(now);
            return Duration::ZERO;
        }
        let elapsed = self
            .last_update
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));

        if self.is_overrun(elapsed) {
            warn!(
                elapsed_us = elapsed.as_micros() as u64,
                period_us = self.period.as_micros() as u64,
                "tick exceeded update period"
            );
        }

        let requested = (self.period.as_secs_f64() - elapsed.as_secs_f64() - self.offset).max(0.0);
        let (slept, woke) = if requested > 0.0 {
            clock.sleep(Duration::from_secs_f64(requested));
            let woke = clock.now();
            (woke.saturating_duration_since(now), woke)
        } else {
            (Duration::ZERO, now)
        };
        self.offset =
            OFFSET_GAIN * (slept.as_secs_f64() - requested) + (1.0 - OFFSET_GAIN) * self.offset;
        self.last_update = Some(woke);
        slept
    }

    /// Whether a tick that took `elapsed` overran the period by more than
    /// the warning ratio.
    fn is_overrun(&self, elapsed: Duration) -> bool {
        if self.period.is_zero() || elapsed <= self.period {
            return false;
        }
        let period = self.period.as_secs_f64();
        elapsed.as_secs_f64() - period > self.overrun_warn_ratio * period
    }
}
