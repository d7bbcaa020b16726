//! Calendar-unit tolerance for temporal window comparison.

use std::fmt;

/// Calendar unit of a tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarUnit {
    /// Calendar years
    Year,
    /// Calendar months
    Month,
    /// Calendar days
    Day,
}

impl CalendarUnit {
    fn as_sql(&self) -> &'static str {
        match self {
            CalendarUnit::Year => "year",
            CalendarUnit::Month => "month",
            CalendarUnit::Day => "day",
        }
    }
}

/// Permitted slack when comparing two tables' validity windows for the same
/// key. Defaults to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tolerance {
    /// Number of units
    pub amount: u32,
    /// Calendar unit
    pub unit: CalendarUnit,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::none()
    }
}

impl Tolerance {
    /// Zero tolerance.
    pub fn none() -> Self {
        Self {
            amount: 0,
            unit: CalendarUnit::Day,
        }
    }

    /// A tolerance of `amount` calendar years.
    pub fn years(amount: u32) -> Self {
        Self {
            amount,
            unit: CalendarUnit::Year,
        }
    }

    /// A tolerance of `amount` calendar months.
    pub fn months(amount: u32) -> Self {
        Self {
            amount,
            unit: CalendarUnit::Month,
        }
    }

    /// A tolerance of `amount` calendar days.
    pub fn days(amount: u32) -> Self {
        Self {
            amount,
            unit: CalendarUnit::Day,
        }
    }

    /// Returns true when no slack is allowed.
    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Renders the tolerance as a SQL interval literal.
    pub fn interval_literal(&self) -> String {
        format!("INTERVAL '{} {}'", self.amount, self.unit.as_sql())
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(s)", self.amount, self.unit.as_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_literals() {
        assert_eq!(Tolerance::years(1).interval_literal(), "INTERVAL '1 year'");
        assert_eq!(Tolerance::months(6).interval_literal(), "INTERVAL '6 month'");
        assert_eq!(Tolerance::days(30).interval_literal(), "INTERVAL '30 day'");
    }

    #[test]
    fn test_default_is_zero() {
        let tolerance = Tolerance::default();
        assert!(tolerance.is_zero());
        assert_eq!(tolerance.to_string(), "0 day(s)");
    }
}
