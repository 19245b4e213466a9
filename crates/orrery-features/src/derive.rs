//! Derived feature formulas.
//!
//! Each derivation reads prerequisite columns by name and writes one numeric
//! column. A derivation whose prerequisites are absent is skipped, never an
//! error. Prerequisite cells stored as text are coerced to numbers where they
//! parse and treated as missing otherwise.

use orrery_io::{Column, ColumnData, Table};
use serde::{Deserialize, Serialize};

use crate::FeatureError;

/// Planet count column.
pub const SY_PNUM: &str = "sy_pnum";
/// Star count column.
pub const SY_SNUM: &str = "sy_snum";
/// Moon count column.
pub const SY_MNUM: &str = "sy_mnum";
/// Discovery year column.
pub const DISC_YEAR: &str = "disc_year";
/// Discovery facility locale column.
pub const DISC_LOCALE: &str = "disc_locale";

/// A feature computed from other columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DerivedFeature {
    /// `sy_pnum / sy_snum`.
    PlanetsPerStar,
    /// `sy_mnum / sy_pnum`.
    MoonsPerPlanet,
    /// `reference_year - disc_year`.
    DiscoveryAge {
        /// Year the age is measured from.
        reference_year: i32,
    },
    /// 1 when the observation counts in the named columns sum to a positive
    /// number, else 0.
    WellObserved {
        /// Observation count columns, resolved once against the training
        /// table and replayed verbatim.
        columns: Vec<String>,
    },
    /// 1 when `disc_locale` is text containing "space" (any case), else 0.
    SpaceBased,
}

impl DerivedFeature {
    /// Build [`DerivedFeature::WellObserved`] over the columns of `table`
    /// whose names start with any of `prefixes`, in table order.
    #[must_use]
    pub fn well_observed(table: &Table, prefixes: &[String]) -> Self {
        let columns = table
            .column_names()
            .into_iter()
            .filter(|name| prefixes.iter().any(|p| name.starts_with(p.as_str())))
            .map(str::to_string)
            .collect();
        DerivedFeature::WellObserved { columns }
    }

    /// Name of the column this derivation writes.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DerivedFeature::PlanetsPerStar => "planets_per_star",
            DerivedFeature::MoonsPerPlanet => "moons_per_planet",
            DerivedFeature::DiscoveryAge { .. } => "discovery_age",
            DerivedFeature::WellObserved { .. } => "well_observed",
            DerivedFeature::SpaceBased => "space_based",
        }
    }

    /// Return `true` when every prerequisite column is present.
    #[must_use]
    pub fn is_applicable(&self, table: &Table) -> bool {
        match self {
            DerivedFeature::PlanetsPerStar => table.contains(SY_PNUM) && table.contains(SY_SNUM),
            DerivedFeature::MoonsPerPlanet => table.contains(SY_MNUM) && table.contains(SY_PNUM),
            DerivedFeature::DiscoveryAge { .. } => table.contains(DISC_YEAR),
            DerivedFeature::WellObserved { columns } => {
                columns.iter().any(|name| table.contains(name))
            }
            DerivedFeature::SpaceBased => table.contains(DISC_LOCALE),
        }
    }

    /// Compute the derived column, or `None` when prerequisites are absent.
    #[must_use]
    pub fn compute(&self, table: &Table) -> Option<Column> {
        if !self.is_applicable(table) {
            return None;
        }
        let values = match self {
            DerivedFeature::PlanetsPerStar => ratio(&numbers(table, SY_PNUM)?, &numbers(table, SY_SNUM)?),
            DerivedFeature::MoonsPerPlanet => ratio(&numbers(table, SY_MNUM)?, &numbers(table, SY_PNUM)?),
            DerivedFeature::DiscoveryAge { reference_year } => {
                let reference = f64::from(*reference_year);
                numbers(table, DISC_YEAR)?
                    .into_iter()
                    .map(|year| year.map(|y| reference - y))
                    .collect()
            }
            DerivedFeature::WellObserved { columns } => well_observed(table, columns),
            DerivedFeature::SpaceBased => space_based(table.column(DISC_LOCALE)?.data()),
        };
        Some(Column::numeric(self.name(), values))
    }

    /// Compute the derived column and write it into `table`, overwriting a
    /// same-named column.
    ///
    /// Returns `Ok(false)` when prerequisites are absent.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Table`] if the computed column cannot be
    /// inserted.
    pub fn apply(&self, table: &mut Table) -> Result<bool, FeatureError> {
        match self.compute(table) {
            Some(column) => {
                table.set_column(column)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn numbers(table: &Table, name: &str) -> Option<Vec<Option<f64>>> {
    table.column(name).map(|c| c.data().to_numbers())
}

/// Element-wise division; a zero or missing divisor yields missing.
fn ratio(numerator: &[Option<f64>], divisor: &[Option<f64>]) -> Vec<Option<f64>> {
    numerator
        .iter()
        .zip(divisor)
        .map(|(n, d)| match (n, d) {
            (Some(n), Some(d)) if *d != 0.0 => Some(n / d),
            _ => None,
        })
        .collect()
}

/// Listed columns absent from `table` contribute nothing, like missing cells.
fn well_observed(table: &Table, columns: &[String]) -> Vec<Option<f64>> {
    let mut totals = vec![0.0; table.n_rows()];
    for column in columns.iter().filter_map(|name| table.column(name)) {
        for (total, value) in totals.iter_mut().zip(column.data().to_numbers()) {
            *total += value.unwrap_or(0.0);
        }
    }
    totals
        .into_iter()
        .map(|t| Some(if t > 0.0 { 1.0 } else { 0.0 }))
        .collect()
}

fn space_based(data: &ColumnData) -> Vec<Option<f64>> {
    match data {
        ColumnData::Text(cells) => cells
            .iter()
            .map(|cell| {
                let hit = cell
                    .as_deref()
                    .is_some_and(|s| s.to_lowercase().contains("space"));
                Some(if hit { 1.0 } else { 0.0 })
            })
            .collect(),
        ColumnData::Numeric(cells) => vec![Some(0.0); cells.len()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: Vec<Column>) -> Table {
        Table::new(columns).unwrap()
    }

    fn values(column: Column) -> Vec<Option<f64>> {
        match column.into_data() {
            ColumnData::Numeric(v) => v,
            ColumnData::Text(_) => panic!("derived columns are numeric"),
        }
    }

    #[test]
    fn planets_per_star_divides() {
        let t = table(vec![
            Column::numeric(SY_PNUM, vec![Some(4.0), Some(3.0), None]),
            Column::numeric(SY_SNUM, vec![Some(2.0), Some(0.0), Some(1.0)]),
        ]);
        let col = DerivedFeature::PlanetsPerStar.compute(&t).unwrap();
        assert_eq!(col.name(), "planets_per_star");
        assert_eq!(values(col), vec![Some(2.0), None, None]);
    }

    #[test]
    fn moons_per_planet_requires_both() {
        let t = table(vec![Column::numeric(SY_MNUM, vec![Some(1.0)])]);
        assert!(DerivedFeature::MoonsPerPlanet.compute(&t).is_none());
    }

    #[test]
    fn text_prerequisites_are_coerced() {
        let t = table(vec![
            Column::text(SY_PNUM, vec![Some("6".into()), Some("many".into())]),
            Column::numeric(SY_SNUM, vec![Some(2.0), Some(1.0)]),
        ]);
        let col = DerivedFeature::PlanetsPerStar.compute(&t).unwrap();
        assert_eq!(values(col), vec![Some(3.0), None]);
    }

    #[test]
    fn discovery_age_from_reference_year() {
        let t = table(vec![Column::numeric(DISC_YEAR, vec![Some(2015.0), None])]);
        let col = DerivedFeature::DiscoveryAge {
            reference_year: 2025,
        }
        .compute(&t)
        .unwrap();
        assert_eq!(values(col), vec![Some(10.0), None]);
    }

    #[test]
    fn well_observed_sums_prefixed_columns() {
        let t = table(vec![
            Column::numeric("st_nphot", vec![Some(0.0), None, Some(2.0)]),
            Column::numeric("st_nrvc", vec![Some(0.0), Some(3.0), None]),
        ]);
        let prefixes = vec!["st_nphot".into(), "st_nrvc".into(), "pl_ntranspec".into()];
        let feature = DerivedFeature::well_observed(&t, &prefixes);
        assert_eq!(
            feature,
            DerivedFeature::WellObserved {
                columns: vec!["st_nphot".into(), "st_nrvc".into()],
            }
        );
        let col = feature.compute(&t).unwrap();
        assert_eq!(values(col), vec![Some(0.0), Some(1.0), Some(1.0)]);
    }

    #[test]
    fn well_observed_absent_without_prefix_columns() {
        let t = table(vec![Column::numeric("pl_orbper", vec![Some(1.0)])]);
        let feature = DerivedFeature::well_observed(&t, &["st_nphot".to_string()]);
        assert!(!feature.is_applicable(&t));
    }

    #[test]
    fn well_observed_ignores_unlisted_prefixed_columns() {
        let t = table(vec![
            Column::numeric("st_nphot", vec![Some(0.0), Some(0.0)]),
            Column::numeric("pl_ntranspec", vec![Some(3.0), None]),
        ]);
        let feature = DerivedFeature::WellObserved {
            columns: vec!["st_nphot".into()],
        };
        let col = feature.compute(&t).unwrap();
        assert_eq!(values(col), vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn space_based_is_case_insensitive() {
        let t = table(vec![Column::text(
            DISC_LOCALE,
            vec![Some("Space".into()), Some("Ground".into()), None, Some("SPACE-borne".into())],
        )]);
        let col = DerivedFeature::SpaceBased.compute(&t).unwrap();
        assert_eq!(values(col), vec![Some(1.0), Some(0.0), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn apply_overwrites_existing_column() {
        let mut t = table(vec![
            Column::numeric(SY_PNUM, vec![Some(4.0)]),
            Column::numeric(SY_SNUM, vec![Some(2.0)]),
            Column::text("planets_per_star", vec![Some("stale".into())]),
        ]);
        assert!(DerivedFeature::PlanetsPerStar.apply(&mut t).unwrap());
        assert_eq!(t.n_columns(), 3);
        assert_eq!(
            t.column("planets_per_star").unwrap().data(),
            &ColumnData::Numeric(vec![Some(2.0)])
        );
    }
}
