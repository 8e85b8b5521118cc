//! Byte budget for the memory cache.

use crate::config::format_size;
use crate::system::detect_total_memory;
use std::fmt;

/// Default share of the reference ceiling given to the memory cache.
pub const DEFAULT_MEMORY_FRACTION: f64 = 0.125;

/// How many bytes the memory cache may hold.
///
/// The budget is a fraction of a reference memory ceiling (one eighth of
/// total system memory unless configured otherwise). An explicit byte
/// size, when set, overrides the fraction entirely.
///
/// # Example
///
/// ```
/// use imagepipe::cache::CacheBudget;
///
/// let budget = CacheBudget::fraction_of(1024 * 1024 * 1024, 0.125);
/// assert_eq!(budget.max_bytes(), 128 * 1024 * 1024);
///
/// let fixed = budget.with_max_bytes(Some(4096));
/// assert_eq!(fixed.max_bytes(), 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheBudget {
    fraction: f64,
    reference_ceiling: usize,
    explicit_bytes: Option<usize>,
}

impl CacheBudget {
    /// Budget of `fraction` of `reference_ceiling` bytes.
    ///
    /// The fraction is clamped to `0.0..=1.0`; a non-finite value falls
    /// back to [`DEFAULT_MEMORY_FRACTION`].
    pub fn fraction_of(reference_ceiling: usize, fraction: f64) -> Self {
        Self {
            fraction: sanitize_fraction(fraction),
            reference_ceiling,
            explicit_bytes: None,
        }
    }

    /// Budget of exactly `bytes`.
    pub fn fixed(bytes: usize) -> Self {
        Self::fraction_of(0, DEFAULT_MEMORY_FRACTION).with_max_bytes(Some(bytes))
    }

    pub fn with_fraction(mut self, fraction: f64) -> Self {
        self.fraction = sanitize_fraction(fraction);
        self
    }

    pub fn with_reference_ceiling(mut self, bytes: usize) -> Self {
        self.reference_ceiling = bytes;
        self
    }

    /// Set or clear the explicit byte size override.
    pub fn with_max_bytes(mut self, bytes: Option<usize>) -> Self {
        self.explicit_bytes = bytes;
        self
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub fn reference_ceiling(&self) -> usize {
        self.reference_ceiling
    }

    pub fn explicit_bytes(&self) -> Option<usize> {
        self.explicit_bytes
    }

    /// The effective budget in bytes.
    pub fn max_bytes(&self) -> usize {
        self.explicit_bytes
            .unwrap_or_else(|| (self.reference_ceiling as f64 * self.fraction) as usize)
    }
}

impl Default for CacheBudget {
    fn default() -> Self {
        Self::fraction_of(detect_total_memory(), DEFAULT_MEMORY_FRACTION)
    }
}

impl fmt::Display for CacheBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.explicit_bytes {
            Some(bytes) => write!(f, "{}", format_size(bytes)),
            None => write!(
                f,
                "{} ({:.1}% of {})",
                format_size(self.max_bytes()),
                self.fraction * 100.0,
                format_size(self.reference_ceiling)
            ),
        }
    }
}

fn sanitize_fraction(fraction: f64) -> f64 {
    if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        DEFAULT_MEMORY_FRACTION
    }
}
