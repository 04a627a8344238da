//! The execution pool (§4.3): splits a batch of pairs across `W` workers
//! that share the soup buffer, and returns only the aggregated
//! instruction-category counters.
//!
//! Grounded on the `par_chunks_mut` dispatch shape in the
//! `computational-life` `soup2d.rs` reference (`rayon`-driven, one slice per
//! worker, workers run their slice sequentially). Here the soup is a
//! long-lived shared `Soup` rather than a buffer owned exclusively per
//! epoch, so workers call back into `Soup::run_pair`, which does its own
//! atomic extract/write-back (see `crate::soup`), instead of claiming a
//! disjoint `&mut` slice.

use std::ops::Add;
use std::thread::available_parallelism;

use rayon::ThreadPool;

use crate::soup::{Pair, Soup};

/// Aggregated instruction-category counters across every pair in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AggCounters {
    pub head0: u64,
    pub head1: u64,
    pub math: u64,
    pub copy: u64,
    pub loop_: u64,
    pub count: u64,
}

impl Add for AggCounters {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            head0: self.head0 + rhs.head0,
            head1: self.head1 + rhs.head1,
            math: self.math + rhs.math,
            copy: self.copy + rhs.copy,
            loop_: self.loop_ + rhs.loop_,
            count: self.count + rhs.count,
        }
    }
}

/// A fixed-size pool of worker threads sharing access to one soup buffer.
pub struct ExecutionPool {
    pool: ThreadPool,
    num_workers: usize,
}

impl ExecutionPool {
    /// Builds a pool with `W = max(1, hardwareConcurrency - 1)` workers by
    /// default (§4.3), falling back to 1 if the platform can't report
    /// concurrency.
    ///
    /// # Errors
    /// Returns an error if the underlying thread pool fails to spawn its
    /// worker threads.
    pub fn new() -> Result<Self, rayon::ThreadPoolBuildError> {
        let default_workers = available_parallelism().map_or(1, |n| n.get().saturating_sub(1).max(1));
        Self::with_workers(default_workers)
    }

    /// Builds a pool with an explicit worker count (at least 1).
    ///
    /// # Errors
    /// Returns an error if the underlying thread pool fails to spawn its
    /// worker threads.
    pub fn with_workers(num_workers: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let num_workers = num_workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .build()?;
        Ok(Self { pool, num_workers })
    }

    #[must_use]
    pub const fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Partitions `pairs` into at most `W` slices, runs each slice
    /// sequentially on one worker (extract -> interpret -> write back per
    /// pair, via `Soup::run_pair`), and sums the per-worker counters.
    #[must_use]
    pub fn dispatch(&self, soup: &Soup, pairs: &[Pair]) -> AggCounters {
        if pairs.is_empty() {
            return AggCounters::default();
        }

        let chunk_size = pairs.len().div_ceil(self.num_workers).max(1);

        self.pool.install(|| {
            use rayon::prelude::*;

            pairs
                .par_chunks(chunk_size)
                .map(|chunk| {
                    chunk.iter().fold(AggCounters::default(), |acc, &pair| {
                        let stats = soup.run_pair(pair);
                        acc + AggCounters {
                            head0: u64::from(stats.head0_count),
                            head1: u64::from(stats.head1_count),
                            math: u64::from(stats.math_count),
                            copy: u64::from(stats.copy_count),
                            loop_: u64::from(stats.loop_count),
                            count: 1,
                        }
                    })
                })
                .reduce(AggCounters::default, Add::add)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SoupConfig;

    fn test_soup() -> Soup {
        let cfg = SoupConfig {
            width: 64,
            height: 64,
            region_size: 16,
            alignment: 16,
            locality_limit: None,
            head1_offset: 16,
            max_steps: 256,
            ..SoupConfig::default()
        };
        Soup::new(cfg, 42)
    }

    #[test]
    fn empty_batch_yields_zero_counters() {
        let soup = test_soup();
        let pool = ExecutionPool::with_workers(4).unwrap();
        assert_eq!(pool.dispatch(&soup, &[]), AggCounters::default());
    }

    #[test]
    fn single_worker_dispatch_matches_sequential_run_pair() {
        let soup = test_soup();
        let pairs: Vec<_> = (0..20).map(|i| (i * 16, (i * 16 + 512) % 4096)).collect();

        let pool1 = ExecutionPool::with_workers(1).unwrap();
        let agg1 = pool1.dispatch(&soup, &pairs);

        let mut manual = AggCounters::default();
        for &pair in &pairs {
            let stats = soup.run_pair(pair);
            manual = manual
                + AggCounters {
                    head0: u64::from(stats.head0_count),
                    head1: u64::from(stats.head1_count),
                    math: u64::from(stats.math_count),
                    copy: u64::from(stats.copy_count),
                    loop_: u64::from(stats.loop_count),
                    count: 1,
                };
        }

        // agg1 and manual both ran the *same* soup mutably twice in
        // sequence, so they are not expected to be numerically equal to
        // each other; instead check both ran exactly `pairs.len()` pairs.
        assert_eq!(agg1.count, pairs.len() as u64);
        assert_eq!(manual.count, pairs.len() as u64);
    }

    #[test]
    fn worker_count_is_at_least_one() {
        let pool = ExecutionPool::with_workers(0).unwrap();
        assert_eq!(pool.num_workers(), 1);
    }
}
