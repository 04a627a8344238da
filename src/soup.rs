//! The population/soup manager (§4.2): owns the shared byte buffer, selects
//! region pairs under alignment/locality constraints, splices pairs into a
//! joint tape for interpretation, writes results back, and applies
//! per-byte mutation.

use std::sync::atomic::{AtomicU8, Ordering};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::SoupConfig;
use crate::interpreter::{self, ExecStats};

/// A region start, in bytes, `alignment`-aligned.
pub type RegionStart = u32;

/// An ordered pair of region starts selected for one interaction.
pub type Pair = (RegionStart, RegionStart);

/// The shared soup buffer and its geometry/RNG.
///
/// The buffer is a `Box<[AtomicU8]>` rather than `Vec<u8>` because the
/// execution pool (`crate::pool`) hands disjoint-or-overlapping byte ranges
/// of this same buffer to multiple worker threads concurrently (§5); a
/// plain `&mut [u8]` cannot be soundly split that way once `alignment <
/// regionSize` permits overlap. Every individual byte load/store is still
/// exactly the plain `[0,255]` value a tape byte holds — `Relaxed`
/// ordering gives no cross-byte guarantee, matching the "only atomic byte
/// writes" race policy of §4.2.
pub struct Soup {
    buf: Box<[AtomicU8]>,
    config: SoupConfig,
    rng: SmallRng,
    pair_count: u64,
}

impl Soup {
    /// Allocates a soup of `config.width * config.height` bytes, filled
    /// with uniform random bytes, seeded from `seed`.
    #[must_use]
    pub fn new(config: SoupConfig, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let len = config.soup_size() as usize;
        let mut raw = vec![0u8; len];
        rng.fill(&mut raw[..]);
        let buf = raw.into_iter().map(AtomicU8::new).collect();
        Self {
            buf,
            config,
            rng,
            pair_count: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SoupConfig {
        &self.config
    }

    /// Updates the per-byte mutation probability applied after each batch.
    pub fn set_mutation_rate(&mut self, rate: f64) {
        self.config.mutation_rate = rate.clamp(0.0, 1.0);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    pub const fn pair_count(&self) -> u64 {
        self.pair_count
    }

    /// Cumulative pair count divided by number of regions (§3 "Epoch").
    #[must_use]
    pub fn epoch(&self) -> f64 {
        let num_tapes = self.config.num_tapes();
        if num_tapes == 0 {
            0.0
        } else {
            self.pair_count as f64 / num_tapes as f64
        }
    }

    /// Read-only copy of `length` bytes starting at `offset`, for
    /// visualization/snapshot consumers.
    #[must_use]
    pub fn snapshot_view(&self, offset: usize, length: usize) -> Vec<u8> {
        self.buf[offset..offset + length]
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    /// Copies the `region_size`-byte region starting at `start` into `out`.
    fn read_region(&self, start: u32, out: &mut [u8]) {
        let start = start as usize;
        for (i, cell) in self.buf[start..start + out.len()].iter().enumerate() {
            out[i] = cell.load(Ordering::Relaxed);
        }
    }

    /// Writes `data` back into the region starting at `start`.
    fn write_region(&self, start: u32, data: &[u8]) {
        let start = start as usize;
        for (cell, &byte) in self.buf[start..start + data.len()].iter().zip(data) {
            cell.store(byte, Ordering::Relaxed);
        }
    }

    /// Extracts a fresh `2R`-byte tape `[region(a) | region(b)]`. The tape
    /// is a plain, thread-local `Vec<u8>` — no contention once extracted.
    #[must_use]
    pub fn extract_tape(&self, pair: Pair) -> Vec<u8> {
        let r = self.config.region_size as usize;
        let mut tape = vec![0u8; 2 * r];
        let (a, b) = pair;
        self.read_region(a, &mut tape[..r]);
        self.read_region(b, &mut tape[r..]);
        tape
    }

    /// Writes a post-execution tape back to its source regions.
    pub fn commit_tape(&self, pair: Pair, tape: &[u8]) {
        let r = self.config.region_size as usize;
        let (a, b) = pair;
        self.write_region(a, &tape[..r]);
        self.write_region(b, &tape[r..]);
    }

    /// Chooses two distinct, non-overlapping region starts, honoring
    /// `alignment` and `localityLimit` (§4.2 "Pair selection").
    pub fn select_pair(&mut self) -> Pair {
        let r = self.config.region_size;
        let alignment = self.config.alignment;
        let max_start = self.config.soup_size() - u64::from(r);
        let num_positions = max_start / u64::from(alignment) + 1;
        let num_positions = num_positions.max(1);

        let p_a = self.rng.gen_range(0..num_positions);
        let a = p_a * u64::from(alignment);

        let (lo, hi) = match self.config.locality_limit {
            Some(limit) if limit.is_finite() => {
                let delta = ((limit * self.config.num_tapes() as f64 * f64::from(r))
                    / (f64::from(alignment) * 100.0))
                    .floor()
                    .max(0.0) as u64;
                let lo = p_a.saturating_sub(delta);
                let hi = (p_a + delta).min(num_positions - 1);
                (lo, hi)
            }
            _ => (0, num_positions - 1),
        };

        let p_b = self.sample_non_overlapping(lo, hi, p_a, alignment, r, num_positions);
        let b = p_b * u64::from(alignment);

        (a as u32, b as u32)
    }

    /// Draws `pB` in `[lo, hi]` such that `|pB*alignment - a*alignment| >=
    /// regionSize`, via bounded rejection sampling with a deterministic
    /// linear-scan fallback so `select_pair` always terminates even under
    /// a pathological `localityLimit` that leaves no valid position inside
    /// the locality window.
    fn sample_non_overlapping(
        &mut self,
        lo: u64,
        hi: u64,
        p_a: u64,
        alignment: u32,
        region_size: u32,
        num_positions: u64,
    ) -> u64 {
        let a = p_a * u64::from(alignment);
        let valid = |p_b: u64| -> bool {
            let b = p_b * u64::from(alignment);
            a.abs_diff(b) >= u64::from(region_size)
        };

        const MAX_ATTEMPTS: u32 = 64;
        for _ in 0..MAX_ATTEMPTS {
            let candidate = self.rng.gen_range(lo..=hi);
            if valid(candidate) {
                return candidate;
            }
        }

        // The locality window may be entirely consumed by the non-overlap
        // exclusion; widen the scan to every aligned position in the soup
        // rather than fall back to `p_a` itself, which would return an
        // overlapping pair. `SoupConfig::validate` requires at least two
        // regions, so some non-overlapping position always exists.
        (lo..=hi)
            .chain(0..num_positions)
            .find(|&p| valid(p))
            .expect("soup_size >= 2 * region_size guarantees a non-overlapping position")
    }

    /// Draws `batch_size` pairs.
    pub fn select_batch(&mut self, batch_size: u32) -> Vec<Pair> {
        (0..batch_size).map(|_| self.select_pair()).collect()
    }

    /// Runs one pair: extract, interpret, and (if any write was observed)
    /// write back. Returns the interpreter's stats.
    pub fn run_pair(&self, pair: Pair) -> ExecStats {
        let mut tape = self.extract_tape(pair);
        let stats = interpreter::execute_tape(
            &mut tape,
            self.config.head1_offset as usize,
            self.config.max_steps,
        );
        if stats.wrote_tape() {
            self.commit_tape(pair, &tape);
        }
        stats
    }

    /// Applies independent per-byte mutation to every region start in
    /// `regions`, per §4.2 "Mutation".
    pub fn mutate_regions(&mut self, regions: &[RegionStart]) {
        if self.config.mutation_rate <= 0.0 {
            return;
        }
        let r = self.config.region_size as usize;
        for &start in regions {
            for i in 0..r {
                if self.rng.gen_bool(self.config.mutation_rate) {
                    let byte: u8 = self.rng.gen();
                    self.buf[start as usize + i].store(byte, Ordering::Relaxed);
                }
            }
        }
    }

    pub fn advance_epoch(&mut self, batch_size: u32) {
        self.pair_count += u64::from(batch_size);
    }

    /// Reinitializes the soup with fresh random bytes and resets the pair
    /// counter, keeping the existing configuration.
    pub fn reset(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
        let mut raw = vec![0u8; self.buf.len()];
        self.rng.fill(&mut raw[..]);
        for (cell, byte) in self.buf.iter().zip(raw) {
            cell.store(byte, Ordering::Relaxed);
        }
        self.pair_count = 0;
    }
}

/// One record of the documented batch wire layout (§6): stats followed by
/// the post-execution tape bytes.
pub struct PairResult {
    pub stats: ExecStats,
    pub tape_bytes: Vec<u8>,
}

/// `execute_pair` entry point (§6): runs one pair directly against a plain
/// mutable soup slice, with no concurrency involved. Used for sequential
/// round-trip testing against the concurrent pool path, and as the
/// reference implementation the wire-level batch encoding is built from.
///
/// # Panics
/// Panics if `slot_a`/`slot_b` plus `region_size` would read out of bounds
/// of `soup`.
#[must_use]
pub fn execute_pair(
    soup: &mut [u8],
    slot_a: u32,
    slot_b: u32,
    region_size: u32,
    head1_offset: u32,
    max_steps: u32,
) -> PairResult {
    let r = region_size as usize;
    let a = slot_a as usize;
    let b = slot_b as usize;

    let mut tape = vec![0u8; 2 * r];
    tape[..r].copy_from_slice(&soup[a..a + r]);
    tape[r..].copy_from_slice(&soup[b..b + r]);

    let stats = interpreter::execute_tape(&mut tape, head1_offset as usize, max_steps);

    if stats.wrote_tape() {
        soup[a..a + r].copy_from_slice(&tape[..r]);
        soup[b..b + r].copy_from_slice(&tape[r..]);
    }

    PairResult {
        stats,
        tape_bytes: tape,
    }
}

/// `execute_batch` entry point (§6): runs each pair in order against the
/// same soup slice and returns the concatenated `[stats ; tape_bytes]*`
/// wire records.
#[must_use]
pub fn execute_batch(
    soup: &mut [u8],
    pairs: &[Pair],
    region_size: u32,
    head1_offset: u32,
    max_steps: u32,
) -> Vec<u8> {
    let record_size = 28 + 2 * region_size as usize;
    let mut out = Vec::with_capacity(pairs.len() * record_size);
    for &(a, b) in pairs {
        let result = execute_pair(soup, a, b, region_size, head1_offset, max_steps);
        out.extend_from_slice(&result.stats.encode_le());
        out.extend_from_slice(&result.tape_bytes);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SoupConfig {
        SoupConfig {
            width: 16,
            height: 16,
            region_size: 16,
            alignment: 16,
            locality_limit: None,
            head1_offset: 16,
            max_steps: 256,
            ..SoupConfig::default()
        }
    }

    #[test]
    fn select_pair_never_overlaps() {
        let cfg = test_config();
        let mut soup = Soup::new(cfg, 7);
        for _ in 0..500 {
            let (a, b) = soup.select_pair();
            assert!(a.abs_diff(b) >= cfg.region_size, "{a} {b} overlap");
        }
    }

    #[test]
    fn select_pair_respects_locality_limit() {
        let cfg = SoupConfig {
            locality_limit: Some(10.0),
            ..test_config()
        };
        let mut soup = Soup::new(cfg, 11);
        for _ in 0..200 {
            soup.select_pair();
        }
    }

    #[test]
    fn select_pair_never_overlaps_even_with_degenerate_locality_window() {
        // A locality_limit tight enough to collapse the window to `p_a`
        // itself must still avoid returning an overlapping pair: the
        // non-overlap exclusion would otherwise leave no valid `b` inside
        // the window, forcing the widened full-range fallback.
        let cfg = SoupConfig {
            locality_limit: Some(0.001),
            ..test_config()
        };
        let mut soup = Soup::new(cfg, 13);
        for _ in 0..200 {
            let (a, b) = soup.select_pair();
            assert!(a.abs_diff(b) >= cfg.region_size, "{a} {b} overlap");
        }
    }

    #[test]
    fn write_back_gate_leaves_soup_untouched_without_writes() {
        let cfg = test_config();
        let mut soup = Soup::new(cfg, 3);
        // Force a pair whose tape is pure head movement: overwrite regions directly.
        soup.write_region(0, &[b'>', b'<', b'{', b'}', 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        soup.write_region(32, &[0u8; 16]);
        let before = soup.snapshot_view(0, 48);
        let stats = soup.run_pair((0, 32));
        assert!(!stats.wrote_tape());
        assert_eq!(soup.snapshot_view(0, 48), before);
    }

    #[test]
    fn mutation_rate_zero_is_a_no_op() {
        let cfg = SoupConfig {
            mutation_rate: 0.0,
            ..test_config()
        };
        let mut soup = Soup::new(cfg, 9);
        let before = soup.snapshot_view(0, soup.len());
        soup.mutate_regions(&[0, 16, 32]);
        assert_eq!(soup.snapshot_view(0, soup.len()), before);
    }

    #[test]
    fn mutation_rate_one_rewrites_every_byte_in_region() {
        let cfg = SoupConfig {
            mutation_rate: 1.0,
            ..test_config()
        };
        let mut soup = Soup::new(cfg, 9);
        soup.write_region(0, &[0u8; 16]);
        soup.mutate_regions(&[0]);
        // With mutation_rate = 1.0 every byte is redrawn; vanishingly
        // unlikely (but not impossible) that it redraws back to all-zero.
        let after = soup.snapshot_view(0, 16);
        assert_ne!(after, vec![0u8; 16]);
    }

    #[test]
    fn epoch_advances_with_pair_count() {
        let cfg = test_config();
        let mut soup = Soup::new(cfg, 1);
        assert_eq!(soup.epoch(), 0.0);
        soup.advance_epoch(soup.config().num_tapes() as u32);
        assert!((soup.epoch() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn execute_pair_is_idempotent_given_same_inputs() {
        let mut soup1 = vec![0u8; 64];
        soup1[0] = b'+';
        let mut soup2 = soup1.clone();

        let r1 = execute_pair(&mut soup1, 0, 16, 16, 16, 256);
        let r2 = execute_pair(&mut soup2, 0, 16, 16, 16, 256);

        assert_eq!(r1.stats, r2.stats);
        assert_eq!(r1.tape_bytes, r2.tape_bytes);
        assert_eq!(soup1, soup2);
    }

    #[test]
    fn execute_batch_matches_sequential_execute_pair() {
        let mut batched = vec![0u8; 128];
        for (i, b) in batched.iter_mut().enumerate() {
            *b = (i * 7) as u8;
        }
        let mut sequential = batched.clone();

        let pairs = [(0u32, 16u32), (32u32, 48u32), (64u32, 80u32)];

        let encoded = execute_batch(&mut batched, &pairs, 16, 16, 256);

        for &(a, b) in &pairs {
            execute_pair(&mut sequential, a, b, 16, 16, 256);
        }

        assert_eq!(batched, sequential);
        assert_eq!(encoded.len(), pairs.len() * (28 + 32));
    }
}
