//! The driver (§4.4): the thin glue a CLI, UI, or test harness calls. Each
//! tick selects a batch of pairs, dispatches it to the execution pool,
//! mutates the selected regions, advances the epoch, and maintains EMA
//! counters for human-readable progress reporting.

use crate::config::{DriverConfig, SoupConfig};
use crate::error::DriverError;
use crate::pool::{AggCounters, ExecutionPool};
use crate::soup::Soup;

/// Exponential moving averages of the per-batch category sums. Smoothing
/// is an observability concern only (§9): it never feeds back into
/// simulation behavior.
#[derive(Debug, Clone, Copy)]
pub struct EmaCounters {
    pub head0: f64,
    pub head1: f64,
    pub math: f64,
    pub copy: f64,
    pub loop_: f64,
    alpha: f64,
}

impl EmaCounters {
    const fn new(alpha: f64) -> Self {
        Self {
            head0: 0.0,
            head1: 0.0,
            math: 0.0,
            copy: 0.0,
            loop_: 0.0,
            alpha,
        }
    }

    fn update(&mut self, agg: AggCounters) {
        let a = self.alpha;
        self.head0 = a * agg.head0 as f64 + (1.0 - a) * self.head0;
        self.head1 = a * agg.head1 as f64 + (1.0 - a) * self.head1;
        self.math = a * agg.math as f64 + (1.0 - a) * self.math;
        self.copy = a * agg.copy as f64 + (1.0 - a) * self.copy;
        self.loop_ = a * agg.loop_ as f64 + (1.0 - a) * self.loop_;
    }
}

/// Ties the soup and execution pool together into a tick loop.
pub struct Driver {
    soup: Soup,
    pool: ExecutionPool,
    driver_config: DriverConfig,
    running: bool,
    outstanding: u32,
    ema: EmaCounters,
    last_batch: AggCounters,
    seed: u64,
    pairs_since_report: u64,
}

impl Driver {
    /// Validates `soup_config`, allocates the soup, and builds the
    /// execution pool.
    ///
    /// # Errors
    /// Returns [`DriverError`] if the configuration is invalid or the
    /// worker pool fails to start (§7: both are startup-only failures).
    pub fn new(
        soup_config: SoupConfig,
        driver_config: DriverConfig,
        seed: u64,
    ) -> Result<Self, DriverError> {
        soup_config.validate()?;

        let pool = ExecutionPool::new()
            .map_err(|e| DriverError::WorkerInitFailed(e.to_string()))?;

        Ok(Self {
            soup: Soup::new(soup_config, seed),
            pool,
            driver_config,
            running: true,
            outstanding: 0,
            ema: EmaCounters::new(0.1),
            last_batch: AggCounters::default(),
            seed,
            pairs_since_report: 0,
        })
    }

    #[must_use]
    pub fn soup(&self) -> &Soup {
        &self.soup
    }

    #[must_use]
    pub const fn running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    #[must_use]
    pub const fn ema(&self) -> EmaCounters {
        self.ema
    }

    #[must_use]
    pub const fn last_batch(&self) -> AggCounters {
        self.last_batch
    }

    #[must_use]
    pub fn epoch(&self) -> f64 {
        self.soup.epoch()
    }

    /// Runs one tick: selects `pairsPerStep` pairs, dispatches them,
    /// mutates the regions they touched, and advances the epoch.
    ///
    /// Returns `None` (skipping the tick) if `outstanding >= maxPending`
    /// (§4.3's back-pressure policy). In this synchronous driver a
    /// dispatch always completes before `tick` returns, so `outstanding`
    /// only ever transiently reaches 1; the check is kept so a caller
    /// driving this struct from an async/event-loop context can reuse the
    /// same policy without re-deriving it.
    pub fn tick(&mut self) -> Option<AggCounters> {
        if !self.running || self.outstanding >= self.driver_config.max_pending {
            return None;
        }

        self.outstanding += 1;

        let pairs = self.soup.select_batch(self.driver_config.pairs_per_step);
        let agg = self.pool.dispatch(&self.soup, &pairs);

        let mut touched = Vec::with_capacity(pairs.len() * 2);
        for &(a, b) in &pairs {
            touched.push(a);
            touched.push(b);
        }
        self.soup.mutate_regions(&touched);

        self.soup.advance_epoch(pairs.len() as u32);
        self.ema.update(agg);
        self.last_batch = agg;
        self.pairs_since_report += u64::from(self.driver_config.pairs_per_step);

        self.outstanding -= 1;
        Some(agg)
    }

    /// Runs `n` ticks in sequence, returning the aggregated counters of
    /// each tick that actually ran (back-pressure-skipped ticks are
    /// omitted).
    pub fn run_ticks(&mut self, n: u32) -> Vec<AggCounters> {
        (0..n).filter_map(|_| self.tick()).collect()
    }

    /// True once at least `threshold` pairs have been processed since the
    /// last report; resets the counter. The driver invokes the optional
    /// complexity callback through this gate (default threshold: 1000
    /// pairs, §4.2 "Epoch update").
    pub fn should_report(&mut self, threshold: u64) -> bool {
        if self.pairs_since_report >= threshold {
            self.pairs_since_report = 0;
            true
        } else {
            false
        }
    }

    /// Reinitializes the soup with a fresh random fill under the same
    /// seed, and resets epoch/EMA bookkeeping.
    pub fn reset(&mut self) {
        self.soup.reset(self.seed);
        self.ema = EmaCounters::new(self.ema.alpha);
        self.last_batch = AggCounters::default();
        self.pairs_since_report = 0;
        self.running = true;
    }

    pub fn set_pairs_per_step(&mut self, pairs_per_step: u32) {
        self.driver_config.pairs_per_step = pairs_per_step;
    }

    pub fn set_max_pending(&mut self, max_pending: u32) {
        self.driver_config.max_pending = max_pending;
    }

    pub fn set_mutation_rate(&mut self, rate: f64) {
        self.soup.set_mutation_rate(rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> Driver {
        let soup_config = SoupConfig {
            width: 64,
            height: 64,
            region_size: 16,
            alignment: 16,
            locality_limit: None,
            head1_offset: 16,
            max_steps: 256,
            mutation_rate: 0.01,
        };
        let driver_config = DriverConfig {
            pairs_per_step: 8,
            max_pending: 50,
        };
        Driver::new(soup_config, driver_config, 1).unwrap()
    }

    #[test]
    fn rejects_invalid_config_at_construction() {
        let bad = SoupConfig {
            region_size: 17,
            ..SoupConfig::default()
        };
        let err = Driver::new(bad, DriverConfig::default(), 1).unwrap_err();
        assert!(matches!(err, DriverError::RegionSizeNotPowerOfTwo(17)));
    }

    #[test]
    fn tick_advances_epoch() {
        let mut d = driver();
        assert_eq!(d.epoch(), 0.0);
        d.tick();
        assert!(d.epoch() > 0.0);
    }

    #[test]
    fn stopped_driver_skips_ticks() {
        let mut d = driver();
        d.set_running(false);
        assert!(d.tick().is_none());
        assert_eq!(d.epoch(), 0.0);
    }

    #[test]
    fn reset_zeroes_epoch_and_counters() {
        let mut d = driver();
        d.run_ticks(5);
        assert!(d.epoch() > 0.0);
        d.reset();
        assert_eq!(d.epoch(), 0.0);
        assert_eq!(d.last_batch(), AggCounters::default());
    }

    #[test]
    fn should_report_fires_after_threshold_and_resets() {
        let mut d = driver();
        d.tick(); // 8 pairs processed
        assert!(!d.should_report(1000));
        for _ in 0..200 {
            d.tick();
        }
        assert!(d.should_report(1000));
        assert!(!d.should_report(1000));
    }

    #[test]
    fn set_param_changes_apply_to_next_tick() {
        let mut d = driver();
        d.set_pairs_per_step(1);
        d.tick();
        assert!((d.epoch() - 1.0 / d.soup().config().num_tapes() as f64).abs() < 1e-9);
    }
}
