//! Validation configuration.
//!
//! A [`GuardConfig`] is an explicit value threaded through suite and check
//! construction. There is no global configuration state: tests and callers
//! instantiate their own.

use chrono::NaiveDate;

/// Far-future year used for the open-ended sentinel date. Chosen so it never
/// plausibly collides with real data.
pub const SENTINEL_YEAR: i32 = 9995;

/// Configuration values shared by the checks of a validation session.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardConfig {
    /// Dataset scale factor. Row-count budgets are expressed as
    /// `base_factor * scale`, so the same suite can validate datasets of
    /// different sizes.
    pub scale: f64,
    /// Sentinel date substituted for the upper bound of an open-ended
    /// entity that was never closed.
    pub sentinel_date: NaiveDate,
    /// Maximum number of violation examples quoted in a failure message.
    pub max_examples: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            // Unwrap is safe: the sentinel is a fixed valid calendar date.
            sentinel_date: NaiveDate::from_ymd_opt(SENTINEL_YEAR, 1, 1).unwrap(),
            max_examples: 10,
        }
    }
}

impl GuardConfig {
    /// Creates a configuration with the default sentinel and example cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the dataset scale factor.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the sentinel date for never-closed open-ended entities.
    pub fn with_sentinel_date(mut self, date: NaiveDate) -> Self {
        self.sentinel_date = date;
        self
    }

    /// Sets the maximum number of violation examples per failure message.
    pub fn with_max_examples(mut self, max_examples: usize) -> Self {
        self.max_examples = max_examples;
        self
    }

    /// The sentinel rendered as a SQL date literal.
    ///
    /// Validity windows are date-valued, and a far-future date stays
    /// representable where a far-future nanosecond timestamp would not.
    pub fn sentinel_literal(&self) -> String {
        format!("DATE '{}'", self.sentinel_date)
    }
}
