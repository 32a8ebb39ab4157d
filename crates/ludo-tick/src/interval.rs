//! Fixed-period scheduler for recurring maintenance work.

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the loop wakes up later than scheduled (for example
/// because the previous pass took longer than a period).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickPolicy {
    /// Skip the missed tick(s) and schedule the next one a full period
    /// from now.
    #[default]
    Skip,
    /// Keep the original cadence; the next tick fires at its originally
    /// scheduled time even if that is immediately.
    Drop,
}

/// Configuration for an [`IntervalScheduler`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalConfig {
    /// Time between ticks. `Duration::ZERO` disables the scheduler: it
    /// never fires.
    pub period: Duration,
    /// Overrun handling policy.
    pub policy: TickPolicy,
    /// Random delay (0..max) added to the first tick so several schedulers
    /// started together don't fire in lockstep.
    pub initial_jitter: Duration,
    /// A pass that runs longer than this fraction of the period is logged.
    pub budget_warn_threshold: f64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(5),
            policy: TickPolicy::default(),
            initial_jitter: Duration::from_millis(250),
            budget_warn_threshold: 0.80,
        }
    }
}

impl IntervalConfig {
    /// Shortest accepted period. Anything smaller (but non-zero) is raised.
    pub const MIN_PERIOD: Duration = Duration::from_millis(10);

    /// A config with the given period and otherwise default settings.
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values. Called by [`IntervalScheduler::new`].
    pub fn validated(mut self) -> Self {
        if !self.period.is_zero() && self.period < Self::MIN_PERIOD {
            warn!(
                period_ms = self.period.as_millis() as u64,
                min_ms = Self::MIN_PERIOD.as_millis() as u64,
                "interval period below minimum, raising"
            );
            self.period = Self::MIN_PERIOD;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    fn is_disabled(&self) -> bool {
        self.period.is_zero()
    }
}

// ---------------------------------------------------------------------------
// Tick info & metrics
// ---------------------------------------------------------------------------

/// Information about a fired tick.
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number, starting at 1.
    pub tick: u64,
    /// `true` if this tick fired noticeably late.
    pub overrun: bool,
    /// Whole periods missed because of the overrun.
    pub ticks_skipped: u64,
}

/// Running counters for a scheduler.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Longest pass reported through [`IntervalScheduler::record_tick_end`].
    pub max_pass_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fires at a fixed period until dropped.
pub struct IntervalScheduler {
    config: IntervalConfig,
    tick_count: u64,
    next_tick: Option<TokioInstant>,
    pass_start: Option<Instant>,
    metrics: TickMetrics,
}

impl IntervalScheduler {
    pub fn new(config: IntervalConfig) -> Self {
        let config = config.validated();

        let next_tick = (!config.is_disabled()).then(|| {
            let jitter = if config.initial_jitter.is_zero() {
                Duration::ZERO
            } else {
                let max_us = config.initial_jitter.as_micros() as u64;
                Duration::from_micros(rand::rng().random_range(0..max_us.max(1)))
            };
            TokioInstant::now() + config.period + jitter
        });

        debug!(
            period_ms = config.period.as_millis() as u64,
            policy = ?config.policy,
            disabled = config.is_disabled(),
            "interval scheduler created"
        );

        Self {
            config,
            tick_count: 0,
            next_tick,
            pass_start: None,
            metrics: TickMetrics::default(),
        }
    }

    /// Shorthand for `IntervalScheduler::new(IntervalConfig::every(period))`.
    pub fn every(period: Duration) -> Self {
        Self::new(IntervalConfig::every(period))
    }

    /// Waits for the next tick.
    ///
    /// Pends forever when disabled, which is harmless inside
    /// `tokio::select!`: the other branches keep running.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let next = match self.next_tick {
            Some(next) => next,
            None => std::future::pending().await,
        };
        let period = self.config.period;

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.pass_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > period / 10;
        let mut ticks_skipped = 0;

        self.next_tick = Some(match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped = (late_by.as_nanos() / period.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            late_ms = late_by.as_millis() as u64,
                            "interval overrun, skipping ahead"
                        );
                    }
                }
                now + period
            }
            TickPolicy::Drop => next + period,
        });

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(tick = self.tick_count, overrun, "interval tick");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Records that the work for the current tick is done.
    ///
    /// Warns when the pass used more than the configured share of the
    /// period. A no-op if no tick is in progress.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.pass_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        if elapsed > self.metrics.max_pass_time {
            self.metrics.max_pass_time = elapsed;
        }

        let period = self.config.period.as_secs_f64();
        if period > 0.0 {
            let utilization = elapsed.as_secs_f64() / period;
            if utilization >= self.config.budget_warn_threshold {
                warn!(
                    tick = self.tick_count,
                    elapsed_ms = elapsed.as_millis() as u64,
                    period_ms = self.config.period.as_millis() as u64,
                    "interval pass approaching its period"
                );
            }
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.config.is_disabled()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn period(&self) -> Duration {
        self.config.period
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }
}
