//! Inclusive numeric bounds with independently configurable ends.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An inclusive `[min, max]` bound where each end is optional.
///
/// Used by cardinality and proportion checks, which commonly pin only one
/// end of the range.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    /// Inclusive lower bound
    pub min: Option<f64>,
    /// Inclusive upper bound
    pub max: Option<f64>,
}

impl Bounds {
    /// No bounds; every value passes.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Only a lower bound.
    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// Only an upper bound.
    pub fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// Both bounds.
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Returns true if the value satisfies both configured ends.
    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    /// Renders the violation of these bounds as a SQL condition over the
    /// given expression. `None` when unbounded (nothing can violate).
    pub fn sql_violation(&self, expr: &str) -> Option<String> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some(format!("{expr} < {min} OR {expr} > {max}")),
            (Some(min), None) => Some(format!("{expr} < {min}")),
            (None, Some(max)) => Some(format!("{expr} > {max}")),
            (None, None) => None,
        }
    }

    /// Describes which end the value violates, if any.
    pub fn violation(&self, value: f64) -> Option<String> {
        if let Some(min) = self.min {
            if value < min {
                return Some(format!("{value} is below the minimum {min}"));
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Some(format!("{value} is above the maximum {max}"));
            }
        }
        None
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, "[{min}, {max}]"),
            (Some(min), None) => write!(f, ">= {min}"),
            (None, Some(max)) => write!(f, "<= {max}"),
            (None, None) => write!(f, "unbounded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let bounds = Bounds::between(2.0, 5.0);
        assert!(bounds.contains(2.0));
        assert!(bounds.contains(5.0));
        assert!(!bounds.contains(1.9));
        assert!(!bounds.contains(5.1));
        assert!(Bounds::unbounded().contains(f64::MAX));
    }

    #[test]
    fn test_violation_messages() {
        assert!(Bounds::at_least(3.0).violation(2.0).unwrap().contains("below"));
        assert!(Bounds::at_most(3.0).violation(4.0).unwrap().contains("above"));
        assert!(Bounds::between(1.0, 2.0).violation(1.5).is_none());
    }

    #[test]
    fn test_sql_violation() {
        assert_eq!(
            Bounds::between(0.1, 0.5).sql_violation("share").unwrap(),
            "share < 0.1 OR share > 0.5"
        );
        assert_eq!(
            Bounds::at_most(0.5).sql_violation("share").unwrap(),
            "share > 0.5"
        );
        assert!(Bounds::unbounded().sql_violation("share").is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(Bounds::between(1.0, 2.0).to_string(), "[1, 2]");
        assert_eq!(Bounds::at_least(1.0).to_string(), ">= 1");
        assert_eq!(Bounds::unbounded().to_string(), "unbounded");
    }
}
