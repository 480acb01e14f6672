//! Good/normal/bad classification of the report's headline figures.

use serde::Serialize;

/// Memory usage below this percentage of the ceiling is good.
pub const MEMORY_NORMAL_PERCENT: f64 = 30.0;
/// Memory usage at or above this percentage of the ceiling is bad.
pub const MEMORY_BAD_PERCENT: f64 = 75.0;
/// Request time below this many milliseconds is good.
pub const TIME_NORMAL_MS: f64 = 200.0;
/// Request time at or above this many milliseconds is bad.
pub const TIME_BAD_MS: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Good,
    Normal,
    Bad,
}

impl Severity {
    /// CSS class used by the toolbar item.
    pub fn css_class(self) -> &'static str {
        match self {
            Severity::Good => "item-good",
            Severity::Normal => "item-normal",
            Severity::Bad => "item-bad",
        }
    }

    fn tiered(value: f64, normal_from: f64, bad_from: f64) -> Self {
        if value < normal_from {
            Severity::Good
        } else if value < bad_from {
            Severity::Normal
        } else {
            Severity::Bad
        }
    }

    /// Classifies a memory percentage: `< 30` good, `< 75` normal, else bad.
    ///
    /// A NaN percentage (zero ceiling and zero usage) classifies as bad.
    pub fn from_memory_percent(percent: f64) -> Self {
        Self::tiered(percent, MEMORY_NORMAL_PERCENT, MEMORY_BAD_PERCENT)
    }

    /// Classifies elapsed milliseconds: `< 200` good, `< 500` normal, else bad.
    pub fn from_elapsed_ms(ms: f64) -> Self {
        Self::tiered(ms, TIME_NORMAL_MS, TIME_BAD_MS)
    }

    pub fn from_error_count(count: usize) -> Self {
        if count == 0 {
            Severity::Good
        } else {
            Severity::Bad
        }
    }
}

/// Percentage of `limit` taken by `used`, rounded to an integer.
///
/// A zero or negative ceiling produces a degenerate (infinite, negative or
/// NaN) percentage rather than an error.
pub fn memory_percent(used: u64, limit: i64) -> f64 {
    (used as f64 / (limit as f64 / 100.0)).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: i64 = 1024 * 1024;

    #[test]
    fn test_memory_tiers() {
        assert_eq!(Severity::from_memory_percent(0.0), Severity::Good);
        assert_eq!(Severity::from_memory_percent(29.0), Severity::Good);
        assert_eq!(Severity::from_memory_percent(30.0), Severity::Normal);
        assert_eq!(Severity::from_memory_percent(74.0), Severity::Normal);
        assert_eq!(Severity::from_memory_percent(75.0), Severity::Bad);
        assert_eq!(Severity::from_memory_percent(120.0), Severity::Bad);
    }

    #[test]
    fn test_memory_percent_exact_boundaries() {
        let limit = 100 * MB;
        let p30 = memory_percent(30 * MB as u64, limit);
        assert_eq!(p30, 30.0);
        assert_eq!(Severity::from_memory_percent(p30), Severity::Normal);
        let p75 = memory_percent(75 * MB as u64, limit);
        assert_eq!(p75, 75.0);
        assert_eq!(Severity::from_memory_percent(p75), Severity::Bad);
    }

    #[test]
    fn test_memory_percent_degenerate_limits() {
        assert!(memory_percent(10, 0).is_infinite());
        assert!(memory_percent(0, 0).is_nan());
        assert!(memory_percent(10 * MB as u64, -MB) < 0.0);
        assert_eq!(
            Severity::from_memory_percent(memory_percent(10, 0)),
            Severity::Bad
        );
    }

    #[test]
    fn test_time_tiers() {
        assert_eq!(Severity::from_elapsed_ms(199.99), Severity::Good);
        assert_eq!(Severity::from_elapsed_ms(200.0), Severity::Normal);
        assert_eq!(Severity::from_elapsed_ms(499.99), Severity::Normal);
        assert_eq!(Severity::from_elapsed_ms(500.0), Severity::Bad);
    }

    #[test]
    fn test_error_count() {
        assert_eq!(Severity::from_error_count(0), Severity::Good);
        assert_eq!(Severity::from_error_count(3), Severity::Bad);
    }

    #[test]
    fn test_css_class() {
        assert_eq!(Severity::Good.css_class(), "item-good");
        assert_eq!(Severity::Normal.css_class(), "item-normal");
        assert_eq!(Severity::Bad.css_class(), "item-bad");
    }
}
