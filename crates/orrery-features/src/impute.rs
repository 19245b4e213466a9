//! Missing-value imputation for numeric and categorical columns.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Fills missing numeric cells with the training median.
///
/// A column with no present training value is filled with 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    median: f64,
}

impl MedianImputer {
    /// Fit on the training cells of one column.
    #[must_use]
    pub fn fit(column: &str, values: &[Option<f64>]) -> Self {
        let mut present: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
        if present.is_empty() {
            warn!(column, "no observed values, imputing 0.0");
            return Self { median: 0.0 };
        }
        present.sort_by(f64::total_cmp);
        let mid = present.len() / 2;
        let median = if present.len() % 2 == 0 {
            (present[mid - 1] + present[mid]) / 2.0
        } else {
            present[mid]
        };
        Self { median }
    }

    /// The fill value.
    #[must_use]
    pub fn median(&self) -> f64 {
        self.median
    }

    /// Replace missing cells with the median.
    #[must_use]
    pub fn transform(&self, values: &[Option<f64>]) -> Vec<f64> {
        values
            .iter()
            .map(|v| v.filter(|x| !x.is_nan()).unwrap_or(self.median))
            .collect()
    }
}

/// Fills missing categorical cells with a constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantImputer {
    fill_value: String,
}

impl ConstantImputer {
    /// Create an imputer with the given fill value.
    pub fn new(fill_value: impl Into<String>) -> Self {
        Self {
            fill_value: fill_value.into(),
        }
    }

    /// The fill value.
    #[must_use]
    pub fn fill_value(&self) -> &str {
        &self.fill_value
    }

    /// Replace missing cells with the fill value.
    #[must_use]
    pub fn transform(&self, values: &[Option<String>]) -> Vec<String> {
        values
            .iter()
            .map(|v| v.clone().unwrap_or_else(|| self.fill_value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_odd_and_even() {
        assert_eq!(MedianImputer::fit("a", &[Some(3.0), Some(1.0), Some(2.0)]).median(), 2.0);
        assert_eq!(
            MedianImputer::fit("a", &[Some(4.0), None, Some(1.0), Some(2.0), Some(3.0)]).median(),
            2.5
        );
    }

    #[test]
    fn median_fills_missing() {
        let imputer = MedianImputer::fit("a", &[Some(1.0), Some(5.0), None]);
        assert_eq!(imputer.transform(&[None, Some(2.0)]), vec![3.0, 2.0]);
    }

    #[test]
    fn all_missing_imputes_zero() {
        let imputer = MedianImputer::fit("a", &[None, None]);
        assert_eq!(imputer.transform(&[None]), vec![0.0]);
    }

    #[test]
    fn constant_fill() {
        let imputer = ConstantImputer::new("Unknown");
        assert_eq!(
            imputer.transform(&[Some("Space".into()), None]),
            vec!["Space".to_string(), "Unknown".to_string()]
        );
    }
}
