//! The configuration surface documented in §6, plus construction-time
//! validation (§4.6). `head1_offset` defaults to `region_size` rather
//! than a fixed literal.

use crate::error::DriverError;

/// Geometry and per-pair parameters of the soup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoupConfig {
    pub width: u32,
    pub height: u32,
    pub region_size: u32,
    pub alignment: u32,
    /// `None` means unconstrained (the documented `∞`).
    pub locality_limit: Option<f64>,
    pub head1_offset: u32,
    pub max_steps: u32,
    pub mutation_rate: f64,
}

impl Default for SoupConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 32_768,
            region_size: 64,
            alignment: 64,
            locality_limit: None,
            head1_offset: 64,
            max_steps: 8192,
            mutation_rate: 0.000_24,
        }
    }
}

impl SoupConfig {
    #[must_use]
    pub const fn soup_size(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    #[must_use]
    pub const fn num_tapes(&self) -> u64 {
        self.soup_size() / self.region_size as u64
    }

    /// Validates invariants a malformed configuration would otherwise
    /// silently violate (power-of-two sizes, alignment within region,
    /// non-zero dimensions, a mutation rate that is a probability).
    ///
    /// # Errors
    /// Returns the first violated invariant as a [`DriverError`].
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.width == 0 || self.height == 0 {
            return Err(DriverError::ZeroDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if !self.region_size.is_power_of_two() {
            return Err(DriverError::RegionSizeNotPowerOfTwo(self.region_size));
        }
        if !self.alignment.is_power_of_two() {
            return Err(DriverError::AlignmentNotPowerOfTwo(self.alignment));
        }
        if !self.max_steps.is_power_of_two() {
            return Err(DriverError::MaxStepsNotPowerOfTwo(self.max_steps));
        }
        if self.alignment > self.region_size {
            return Err(DriverError::AlignmentExceedsRegionSize {
                alignment: self.alignment,
                region_size: self.region_size,
            });
        }
        if self.soup_size() < u64::from(self.region_size) {
            return Err(DriverError::SoupSmallerThanRegion {
                soup_size: self.soup_size(),
                region_size: self.region_size,
            });
        }
        if self.soup_size() < 2 * u64::from(self.region_size) {
            return Err(DriverError::SoupTooSmallForPair {
                soup_size: self.soup_size(),
                region_size: self.region_size,
            });
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(DriverError::InvalidMutationRate(self.mutation_rate));
        }
        Ok(())
    }
}

/// Driver-level batching and back-pressure parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverConfig {
    pub pairs_per_step: u32,
    pub max_pending: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            pairs_per_step: 1000,
            max_pending: 50,
        }
    }
}
