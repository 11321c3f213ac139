//! # Tick Pacing
//!
//! Fixed-timestep pacing for the server binary.
//!
//! The game logic itself never reads wall time from here: each tick is
//! handed a fixed Δt, and the [`TickLoop`] only decides *when* to run it.

use std::time::{Duration, Instant};

/// Fixed-timestep tick loop controller.
pub struct TickLoop {
    tick_duration: Duration,
    last_poll: Instant,
    accumulator: Duration,
    tick_count: u64,
    stats: TickStats,
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug)]
pub struct TickStats {
    /// Fastest tick observed.
    pub min: Duration,
    /// Slowest tick observed.
    pub max: Duration,
    /// Exponential moving average of tick durations.
    pub average: Duration,
    /// Ticks that took longer than their budget.
    pub late_ticks: u64,
    /// Ticks measured.
    pub total_ticks: u64,
}

impl TickStats {
    fn new(budget: Duration) -> Self {
        Self {
            min: Duration::MAX,
            max: Duration::ZERO,
            average: budget,
            late_ticks: 0,
            total_ticks: 0,
        }
    }
}

impl TickLoop {
    /// Creates a loop running `tick_rate` ticks per second.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let tick_duration = Duration::from_secs(1) / tick_rate.max(1);
        Self {
            tick_duration,
            last_poll: Instant::now(),
            accumulator: Duration::ZERO,
            tick_count: 0,
            stats: TickStats::new(tick_duration),
        }
    }

    /// Fixed Δt handed to each tick, in seconds.
    #[must_use]
    pub fn delta_seconds(&self) -> f64 {
        self.tick_duration.as_secs_f64()
    }

    /// Returns true if a tick is due.
    ///
    /// Call in a loop until it returns false to catch up after a stall.
    #[must_use]
    pub fn should_tick(&mut self) -> bool {
        let now = Instant::now();
        self.accumulator += now.duration_since(self.last_poll);
        self.last_poll = now;
        self.accumulator >= self.tick_duration
    }

    /// Consumes one tick from the accumulator and starts timing it.
    #[must_use]
    pub fn begin_tick(&mut self) -> Instant {
        self.accumulator = self.accumulator.saturating_sub(self.tick_duration);
        self.tick_count += 1;
        Instant::now()
    }

    /// Stops timing the tick started at `start`.
    pub fn end_tick(&mut self, start: Instant) {
        let elapsed = start.elapsed();
        let stats = &mut self.stats;

        stats.total_ticks += 1;
        stats.min = stats.min.min(elapsed);
        stats.max = stats.max.max(elapsed);
        stats.average = (stats.average * 15 + elapsed) / 16;

        if elapsed > self.tick_duration {
            stats.late_ticks += 1;
            tracing::debug!(
                "Tick {} over budget: {:?} > {:?}",
                self.tick_count,
                elapsed,
                self.tick_duration
            );
        }
    }

    /// Sleeps until the next tick is due.
    pub fn wait_for_next_tick(&self) {
        let owed = self.tick_duration.saturating_sub(self.accumulator);
        let since_poll = self.last_poll.elapsed();
        if let Some(remaining) = owed.checked_sub(since_poll) {
            std::thread::sleep(remaining);
        }
    }

    /// Ticks started so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Timing statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Target tick duration.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Clears statistics.
    pub fn reset_stats(&mut self) {
        self.stats = TickStats::new(self.tick_duration);
    }
}

impl Default for TickLoop {
    fn default() -> Self {
        Self::new(crate::SERVER_TICK_RATE)
    }
}
