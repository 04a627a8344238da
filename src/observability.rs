//! Utility entry points consumed by the (out-of-scope) visualization layer:
//! Shannon entropy and a DEFLATE-based Kolmogorov complexity estimate (§6).
//!
//! Both are implemented straight from their textbook formulas, using
//! `flate2` (the standard DEFLATE binding in the Rust ecosystem) for
//! compression.

use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::Write;

/// Shannon entropy of `data` in bits/byte, i.e. `-sum(p_i * log2(p_i))`
/// over the observed byte-value distribution. Returns `0.0` for empty
/// input.
#[must_use]
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }

    let len = data.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// `8 * compressed_size / data.len()` bits/byte, where `compressed_size` is
/// the length of `data` after DEFLATE compression — a cheap proxy for
/// Kolmogorov complexity (§6). Returns `0.0` for empty input.
#[must_use]
pub fn kolmogorov_estimate(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .expect("writing to an in-memory encoder cannot fail");
    let compressed = encoder.finish().expect("finishing an in-memory encoder cannot fail");

    8.0 * compressed.len() as f64 / data.len() as f64
}
