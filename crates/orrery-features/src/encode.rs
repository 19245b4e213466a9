use serde::{Deserialize, Serialize};

/// One-hot encoder for a single categorical column.
///
/// Categories are the sorted distinct training values. A value not seen
/// during fitting encodes to an all-zero block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    categories: Vec<String>,
}

impl OneHotEncoder {
    /// Fit on imputed training values.
    #[must_use]
    pub fn fit(values: &[String]) -> Self {
        let mut categories: Vec<String> = values.to_vec();
        categories.sort();
        categories.dedup();
        Self { categories }
    }

    /// Learned categories in output order.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Width of the encoded block.
    #[must_use]
    pub fn width(&self) -> usize {
        self.categories.len()
    }

    /// Write the encoding of `value` into `out`, which must be `width()` long
    /// and zeroed.
    pub fn encode_into(&self, value: &str, out: &mut [f64]) {
        if let Ok(pos) = self
            .categories
            .binary_search_by(|c| c.as_str().cmp(value))
        {
            out[pos] = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> OneHotEncoder {
        OneHotEncoder::fit(&["Space".into(), "Ground".into(), "Space".into(), "Unknown".into()])
    }

    #[test]
    fn categories_sorted_and_unique() {
        assert_eq!(encoder().categories(), ["Ground", "Space", "Unknown"]);
    }

    #[test]
    fn known_value_sets_one_slot() {
        let mut out = vec![0.0; 3];
        encoder().encode_into("Space", &mut out);
        assert_eq!(out, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn unseen_value_is_all_zero() {
        let mut out = vec![0.0; 3];
        encoder().encode_into("Airborne", &mut out);
        assert_eq!(out, vec![0.0; 3]);
    }
}
