use serde::{Deserialize, Serialize};

/// Standardizes a column to zero mean and unit variance.
///
/// Uses the population standard deviation. A constant column has std 0 and
/// is only centred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: f64,
    scale: f64,
}

impl StandardScaler {
    /// Fit on imputed training values.
    #[must_use]
    pub fn fit(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                scale: 1.0,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        let scale = if std > 0.0 && std.is_finite() { std } else { 1.0 };
        Self { mean, scale }
    }

    /// Training mean.
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Divisor applied after centring.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Standardize one value.
    #[inline]
    #[must_use]
    pub fn apply(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardizes_to_unit_variance() {
        let scaler = StandardScaler::fit(&[1.0, 2.0, 3.0, 4.0]);
        assert!((scaler.mean() - 2.5).abs() < 1e-12);
        let out: Vec<f64> = [1.0, 2.0, 3.0, 4.0].iter().map(|&v| scaler.apply(v)).collect();
        let var = out.iter().map(|v| v * v).sum::<f64>() / 4.0;
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn constant_column_only_centred() {
        let scaler = StandardScaler::fit(&[7.0, 7.0]);
        assert_eq!(scaler.scale(), 1.0);
        assert_eq!(scaler.apply(7.0), 0.0);
    }
}
