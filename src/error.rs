//! Startup-only failure modes (§7). Anything that goes wrong after a
//! simulation has successfully started is an internal invariant violation,
//! not a recoverable error, and panics instead of being wrapped here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("soup dimensions must be non-zero (got {width} x {height})")]
    ZeroDimensions { width: u32, height: u32 },

    #[error("region size must be a power of two (got {0})")]
    RegionSizeNotPowerOfTwo(u32),

    #[error("alignment must be a power of two (got {0})")]
    AlignmentNotPowerOfTwo(u32),

    #[error("max steps must be a power of two (got {0})")]
    MaxStepsNotPowerOfTwo(u32),

    #[error("alignment ({alignment}) must not exceed region size ({region_size})")]
    AlignmentExceedsRegionSize { alignment: u32, region_size: u32 },

    #[error("soup size ({soup_size}) must be at least one region ({region_size} bytes)")]
    SoupSmallerThanRegion { soup_size: u64, region_size: u32 },

    #[error(
        "soup size ({soup_size}) must hold at least two regions ({region_size} bytes each) \
         so a non-overlapping pair can always be selected"
    )]
    SoupTooSmallForPair { soup_size: u64, region_size: u32 },

    #[error("mutation rate must be in [0.0, 1.0] (got {0})")]
    InvalidMutationRate(f64),

    #[error("failed to allocate the soup buffer: {0}")]
    AllocationFailed(String),

    #[error("failed to initialize the execution pool: {0}")]
    WorkerInitFailed(String),
}
