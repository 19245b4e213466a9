//! Column dropping, target extraction and feature derivation.

use orrery_io::Table;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::FeatureError;
use crate::derive::DerivedFeature;

/// Identifier and reference columns that carry no signal.
pub const DEFAULT_DROP_COLUMNS: &[&str] = &[
    "rowid",
    "pl_name",
    "hostname",
    "epic_hostname",
    "epic_candname",
    "tic_id",
    "gaia_id",
    "disp_refname",
    "disc_refname",
    "pl_refname",
    "st_refname",
    "sy_refname",
    "k2_name",
    "hd_name",
    "hip_name",
];

/// Column-name prefixes of the observation count columns.
pub const DEFAULT_OBSERVATION_PREFIXES: &[&str] = &["st_nphot", "st_nrvc", "pl_ntranspec"];

/// Why a column was removed before modelling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DropReason {
    /// Listed as an identifier column.
    Identifier,
    /// Missing fraction exceeded the threshold.
    Sparse {
        /// Fraction of missing cells in the column.
        missing_ratio: f64,
    },
}

/// A column removed by the engineer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedColumn {
    /// Column name.
    pub name: String,
    /// Why it was dropped.
    pub reason: DropReason,
}

/// Output of [`FeatureEngineer::engineer`].
#[derive(Debug, Clone)]
pub struct EngineeredData {
    /// Feature matrix before preprocessing.
    pub features: Table,
    /// Target labels, aligned 1:1 with the rows of `features`.
    pub target: Vec<String>,
    /// Names of the derived columns that were created.
    pub engineered: Vec<String>,
    /// Columns removed, in removal order.
    pub dropped: Vec<DroppedColumn>,
    /// Derivations applied, for replay at prediction time.
    pub derivations: Vec<DerivedFeature>,
}

/// Turns a raw table into a feature matrix and target vector.
///
/// # Defaults
///
/// | Parameter              | Default                            |
/// |------------------------|------------------------------------|
/// | `drop_columns`         | [`DEFAULT_DROP_COLUMNS`]           |
/// | `missing_threshold`    | 0.95                               |
/// | `reference_year`       | 2025                               |
/// | `observation_prefixes` | [`DEFAULT_OBSERVATION_PREFIXES`]   |
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    drop_columns: Vec<String>,
    missing_threshold: f64,
    reference_year: i32,
    observation_prefixes: Vec<String>,
}

impl Default for FeatureEngineer {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureEngineer {
    /// Create an engineer with the default rules.
    #[must_use]
    pub fn new() -> Self {
        Self {
            drop_columns: DEFAULT_DROP_COLUMNS.iter().map(|s| (*s).to_string()).collect(),
            missing_threshold: 0.95,
            reference_year: 2025,
            observation_prefixes: DEFAULT_OBSERVATION_PREFIXES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// Replace the list of identifier columns to drop.
    #[must_use]
    pub fn with_drop_columns(mut self, columns: Vec<String>) -> Self {
        self.drop_columns = columns;
        self
    }

    /// Set the missing fraction above which a column is dropped.
    #[must_use]
    pub fn with_missing_threshold(mut self, threshold: f64) -> Self {
        self.missing_threshold = threshold;
        self
    }

    /// Set the year `discovery_age` is measured from.
    #[must_use]
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    /// Replace the observation count column prefixes.
    #[must_use]
    pub fn with_observation_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.observation_prefixes = prefixes;
        self
    }

    /// Return the identifier columns to drop.
    #[must_use]
    pub fn drop_columns(&self) -> &[String] {
        &self.drop_columns
    }

    /// Return the missing-fraction threshold.
    #[must_use]
    pub fn missing_threshold(&self) -> f64 {
        self.missing_threshold
    }

    /// Return the reference year.
    #[must_use]
    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    /// Return the observation count column prefixes.
    #[must_use]
    pub fn observation_prefixes(&self) -> &[String] {
        &self.observation_prefixes
    }

    /// Every derivation this engineer attempts on `table`, in application
    /// order. Observation count columns are resolved against `table`.
    #[must_use]
    pub fn derivations(&self, table: &Table) -> Vec<DerivedFeature> {
        vec![
            DerivedFeature::PlanetsPerStar,
            DerivedFeature::MoonsPerPlanet,
            DerivedFeature::DiscoveryAge {
                reference_year: self.reference_year,
            },
            DerivedFeature::well_observed(table, &self.observation_prefixes),
            DerivedFeature::SpaceBased,
        ]
    }

    /// Drop identifier and sparse columns, split off the target, and derive
    /// features.
    ///
    /// Rows whose target cell is missing are removed.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`FeatureError::InvalidThreshold`] | Threshold outside [0.0, 1.0] |
    /// | [`FeatureError::MissingTarget`] | Target absent, dropped as sparse, or never labelled |
    /// | [`FeatureError::NoFeatures`] | No feature column remains |
    #[instrument(skip_all, fields(target_column = %target, n_rows = table.n_rows(), n_columns = table.n_columns()))]
    pub fn engineer(&self, mut table: Table, target: &str) -> Result<EngineeredData, FeatureError> {
        if !(0.0..=1.0).contains(&self.missing_threshold) {
            return Err(FeatureError::InvalidThreshold {
                threshold: self.missing_threshold,
            });
        }

        let mut dropped = Vec::new();
        for name in &self.drop_columns {
            if name != target && table.remove_column(name).is_some() {
                debug!(column = %name, "dropped identifier column");
                dropped.push(DroppedColumn {
                    name: name.clone(),
                    reason: DropReason::Identifier,
                });
            }
        }

        let sparse: Vec<(String, f64)> = table
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.data().missing_ratio()))
            .filter(|(_, ratio)| *ratio > self.missing_threshold)
            .collect();
        for (name, missing_ratio) in sparse {
            table.remove_column(&name);
            if name == target {
                warn!(column = %name, missing_ratio, "target column dropped as sparse");
            } else {
                debug!(column = %name, missing_ratio, "dropped sparse column");
            }
            dropped.push(DroppedColumn {
                name,
                reason: DropReason::Sparse { missing_ratio },
            });
        }

        let target_column = table
            .remove_column(target)
            .ok_or_else(|| FeatureError::MissingTarget {
                target: target.to_string(),
            })?;
        let cells = target_column.data().to_text();
        let labelled: Vec<usize> = cells
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|_| i))
            .collect();
        if labelled.is_empty() {
            return Err(FeatureError::MissingTarget {
                target: target.to_string(),
            });
        }
        let mut features = if labelled.len() < cells.len() {
            warn!(
                n_unlabelled = cells.len() - labelled.len(),
                "removing rows with a missing target"
            );
            table.take_rows(&labelled)
        } else {
            table
        };
        let labels: Vec<String> = cells.into_iter().flatten().collect();

        let attempted = self.derivations(&features);
        let derivations = derive_features(&mut features, &attempted)?;
        let engineered: Vec<String> = derivations.iter().map(|d| d.name().to_string()).collect();

        if features.n_columns() == 0 {
            return Err(FeatureError::NoFeatures);
        }

        info!(
            n_rows = features.n_rows(),
            n_features = features.n_columns(),
            n_dropped = dropped.len(),
            engineered = ?engineered,
            "features engineered"
        );

        Ok(EngineeredData {
            features,
            target: labels,
            engineered,
            dropped,
            derivations,
        })
    }
}

/// Apply each derivation whose prerequisites are present.
///
/// Returns the derivations that were applied.
///
/// # Errors
///
/// Returns [`FeatureError::Table`] if a derived column cannot be inserted.
pub fn derive_features(
    table: &mut Table,
    derivations: &[DerivedFeature],
) -> Result<Vec<DerivedFeature>, FeatureError> {
    let mut applied = Vec::new();
    for derivation in derivations {
        if derivation.apply(table)? {
            applied.push(derivation.clone());
        } else {
            debug!(feature = derivation.name(), "prerequisites absent, skipped");
        }
    }
    Ok(applied)
}
