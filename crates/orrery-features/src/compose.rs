//! Column-wise preprocessing composed into one feature matrix.
//!
//! Numeric-role columns pass through [`MedianImputer`] then
//! [`StandardScaler`]; categorical-role columns pass through
//! [`ConstantImputer`] then [`OneHotEncoder`]. Output columns are ordered
//! numeric first, then each categorical block, in role order.

use orrery_io::Table;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::FeatureError;
use crate::encode::OneHotEncoder;
use crate::impute::{ConstantImputer, MedianImputer};
use crate::router::ColumnRoles;
use crate::scale::StandardScaler;

/// Default fill value for missing categorical cells.
pub const DEFAULT_FILL_VALUE: &str = "Unknown";

/// Unfitted preprocessing plan.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    roles: ColumnRoles,
    fill_value: String,
}

impl Preprocessor {
    /// Create a plan for the given column roles.
    #[must_use]
    pub fn new(roles: ColumnRoles) -> Self {
        Self {
            roles,
            fill_value: DEFAULT_FILL_VALUE.to_string(),
        }
    }

    /// Set the categorical fill value.
    #[must_use]
    pub fn with_fill_value(mut self, fill_value: impl Into<String>) -> Self {
        self.fill_value = fill_value.into();
        self
    }

    /// Return the column roles.
    #[must_use]
    pub fn roles(&self) -> &ColumnRoles {
        &self.roles
    }

    /// Fit every step on the training table.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`FeatureError::EmptyTable`] | `table` has zero rows |
    /// | [`FeatureError::MissingColumn`] | A routed column is absent |
    #[instrument(skip_all, fields(n_rows = table.n_rows(), n_columns = self.roles.len()))]
    pub fn fit(&self, table: &Table) -> Result<FittedPreprocessor, FeatureError> {
        if table.n_rows() == 0 {
            return Err(FeatureError::EmptyTable);
        }

        let mut numeric = Vec::with_capacity(self.roles.numeric().len());
        for name in self.roles.numeric() {
            let values = numeric_cells(table, name)?;
            let imputer = MedianImputer::fit(name, &values);
            let scaler = StandardScaler::fit(&imputer.transform(&values));
            numeric.push(NumericStep { imputer, scaler });
        }

        let mut categorical = Vec::with_capacity(self.roles.categorical().len());
        for name in self.roles.categorical() {
            let imputer = ConstantImputer::new(self.fill_value.clone());
            let encoder = OneHotEncoder::fit(&imputer.transform(&text_cells(table, name)?));
            debug!(column = %name, n_categories = encoder.width(), "encoder fitted");
            categorical.push(CategoricalStep { imputer, encoder });
        }

        let fitted = FittedPreprocessor {
            roles: self.roles.clone(),
            numeric,
            categorical,
        };
        info!(n_features_out = fitted.n_features_out(), "preprocessor fitted");
        Ok(fitted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NumericStep {
    imputer: MedianImputer,
    scaler: StandardScaler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CategoricalStep {
    imputer: ConstantImputer,
    encoder: OneHotEncoder,
}

/// Preprocessor with every step fitted. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    roles: ColumnRoles,
    numeric: Vec<NumericStep>,
    categorical: Vec<CategoricalStep>,
}

impl FittedPreprocessor {
    /// Return the frozen column roles.
    #[must_use]
    pub fn roles(&self) -> &ColumnRoles {
        &self.roles
    }

    /// Width of the transformed matrix.
    #[must_use]
    pub fn n_features_out(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(|c| c.encoder.width()).sum::<usize>()
    }

    /// Output column names: `num__{column}` and `cat__{column}_{category}`.
    #[must_use]
    pub fn feature_names_out(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .roles
            .numeric()
            .iter()
            .map(|n| format!("num__{n}"))
            .collect();
        for (name, step) in self.roles.categorical().iter().zip(&self.categorical) {
            names.extend(
                step.encoder
                    .categories()
                    .iter()
                    .map(|c| format!("cat__{name}_{c}")),
            );
        }
        names
    }

    /// Transform a table into a row-major feature matrix.
    ///
    /// Columns are looked up by name; extra columns are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::MissingColumn`] if a routed column is absent.
    pub fn transform(&self, table: &Table) -> Result<Vec<Vec<f64>>, FeatureError> {
        let n_rows = table.n_rows();
        let width = self.n_features_out();
        let mut out = vec![vec![0.0; width]; n_rows];

        for (j, (name, step)) in self.roles.numeric().iter().zip(&self.numeric).enumerate() {
            let imputed = step.imputer.transform(&numeric_cells(table, name)?);
            for (row, value) in out.iter_mut().zip(imputed) {
                row[j] = step.scaler.apply(value);
            }
        }

        let mut offset = self.numeric.len();
        for (name, step) in self.roles.categorical().iter().zip(&self.categorical) {
            let imputed = step.imputer.transform(&text_cells(table, name)?);
            let block = offset..offset + step.encoder.width();
            for (row, value) in out.iter_mut().zip(&imputed) {
                step.encoder.encode_into(value, &mut row[block.clone()]);
            }
            offset = block.end;
        }

        debug!(n_rows, width, "table transformed");
        Ok(out)
    }
}

fn numeric_cells(table: &Table, name: &str) -> Result<Vec<Option<f64>>, FeatureError> {
    table
        .column(name)
        .map(|c| c.data().to_numbers())
        .ok_or_else(|| FeatureError::MissingColumn {
            column: name.to_string(),
        })
}

fn text_cells(table: &Table, name: &str) -> Result<Vec<Option<String>>, FeatureError> {
    table
        .column(name)
        .map(|c| c.data().to_text())
        .ok_or_else(|| FeatureError::MissingColumn {
            column: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_io::Column;

    fn training() -> Table {
        Table::new(vec![
            Column::numeric("pl_orbper", vec![Some(1.0), Some(3.0), None, Some(5.0)]),
            Column::text(
                "disc_locale",
                vec![Some("Space".into()), Some("Ground".into()), None, Some("Space".into())],
            ),
        ])
        .unwrap()
    }

    fn fitted() -> FittedPreprocessor {
        let table = training();
        Preprocessor::new(ColumnRoles::infer(&table)).fit(&table).unwrap()
    }

    #[test]
    fn output_width_and_names() {
        let pre = fitted();
        assert_eq!(pre.n_features_out(), 4);
        assert_eq!(
            pre.feature_names_out(),
            vec![
                "num__pl_orbper",
                "cat__disc_locale_Ground",
                "cat__disc_locale_Space",
                "cat__disc_locale_Unknown",
            ]
        );
    }

    #[test]
    fn transform_imputes_scales_and_encodes() {
        let pre = fitted();
        let x = pre.transform(&training()).unwrap();
        assert_eq!(x.len(), 4);
        // Missing orbper imputed with the median (3.0), which is the mean.
        assert!(x[2][0].abs() < 1e-12);
        assert_eq!(&x[2][1..], &[0.0, 0.0, 1.0]);
        assert_eq!(&x[0][1..], &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn unseen_category_encodes_to_zero() {
        let pre = fitted();
        let table = Table::new(vec![
            Column::numeric("pl_orbper", vec![Some(3.0)]),
            Column::text("disc_locale", vec![Some("Airborne".into())]),
            Column::numeric("extra", vec![Some(1.0)]),
        ])
        .unwrap();
        let x = pre.transform(&table).unwrap();
        assert_eq!(&x[0][1..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn roles_survive_storage_change() {
        let pre = fitted();
        let table = Table::new(vec![
            Column::text("pl_orbper", vec![Some("5".into())]),
            Column::text("disc_locale", vec![Some("Space".into())]),
        ])
        .unwrap();
        let x = pre.transform(&table).unwrap();
        assert_eq!(x[0].len(), 4);
        assert!(x[0][0] > 0.0);
    }

    #[test]
    fn missing_column_is_error() {
        let pre = fitted();
        let table = Table::new(vec![Column::numeric("pl_orbper", vec![Some(1.0)])]).unwrap();
        assert!(matches!(
            pre.transform(&table),
            Err(FeatureError::MissingColumn { .. })
        ));
    }
}
