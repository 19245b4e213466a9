use orrery_io::Table;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Partition of feature columns into numeric and categorical roles.
///
/// Roles follow the storage type decided at load time: numeric storage is
/// numeric, text storage is categorical. Each column gets exactly one role,
/// and the partition is frozen once a preprocessor is fitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRoles {
    numeric: Vec<String>,
    categorical: Vec<String>,
}

impl ColumnRoles {
    /// Assign roles to every column of `table`, preserving table order.
    #[must_use]
    pub fn infer(table: &Table) -> Self {
        let (numeric, categorical): (Vec<_>, Vec<_>) = table
            .columns()
            .iter()
            .partition(|c| c.data().is_numeric());
        let roles = Self {
            numeric: numeric.iter().map(|c| c.name().to_string()).collect(),
            categorical: categorical.iter().map(|c| c.name().to_string()).collect(),
        };
        debug!(
            n_numeric = roles.numeric.len(),
            n_categorical = roles.categorical.len(),
            "column roles assigned"
        );
        roles
    }

    /// Build roles from explicit column lists.
    #[must_use]
    pub fn from_parts(numeric: Vec<String>, categorical: Vec<String>) -> Self {
        Self {
            numeric,
            categorical,
        }
    }

    /// Numeric-role column names.
    #[must_use]
    pub fn numeric(&self) -> &[String] {
        &self.numeric
    }

    /// Categorical-role column names.
    #[must_use]
    pub fn categorical(&self) -> &[String] {
        &self.categorical
    }

    /// Every routed column: numeric first, then categorical.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.numeric
            .iter()
            .chain(&self.categorical)
            .map(String::as_str)
    }

    /// Number of routed columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }

    /// Return `true` when no column is routed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_io::Column;

    #[test]
    fn roles_follow_storage_type() {
        let table = Table::new(vec![
            Column::numeric("pl_orbper", vec![Some(1.0)]),
            Column::text("disc_locale", vec![Some("Space".into())]),
            Column::numeric("sy_pnum", vec![None]),
        ])
        .unwrap();
        let roles = ColumnRoles::infer(&table);
        assert_eq!(roles.numeric(), ["pl_orbper", "sy_pnum"]);
        assert_eq!(roles.categorical(), ["disc_locale"]);
        assert_eq!(
            roles.columns().collect::<Vec<_>>(),
            vec!["pl_orbper", "sy_pnum", "disc_locale"]
        );
    }
}
