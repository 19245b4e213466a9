//! Domain types for orrery-io.

use std::collections::HashSet;

use crate::IoError;

/// Cell contents treated as a missing value when a table is loaded.
pub const MISSING_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "#N/A",
];

/// Return `true` when a raw cell should be read as missing.
#[must_use]
pub fn is_missing(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw.trim())
}

/// Render a number the way a categorical value is spelled.
///
/// Integral values lose their fractional part (`3.0` → `"3"`), so a label
/// column read as numbers yields the same strings as one read as text.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Storage for the cells of one column.
///
/// The variant is the column's storage type: it is decided once, at load
/// time, and downstream role assignment reads it without re-inspecting cells.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Every present cell parsed as a float.
    Numeric(Vec<Option<f64>>),
    /// Free text (at least one present cell did not parse as a float).
    Text(Vec<Option<String>>),
}

impl ColumnData {
    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    /// Return `true` when the column has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return `true` for numeric storage.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnData::Numeric(_))
    }

    /// Number of missing cells. NaN counts as missing.
    #[must_use]
    pub fn n_missing(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.iter().filter(|c| c.is_none_or(f64::is_nan)).count(),
            ColumnData::Text(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }

    /// Fraction of missing cells; 0.0 for an empty column.
    #[must_use]
    pub fn missing_ratio(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.n_missing() as f64 / self.len() as f64
        }
    }

    /// Cells as numbers. Text cells that do not parse become `None`.
    #[must_use]
    pub fn to_numbers(&self) -> Vec<Option<f64>> {
        match self {
            ColumnData::Numeric(v) => v
                .iter()
                .map(|c| c.filter(|x| !x.is_nan()))
                .collect(),
            ColumnData::Text(v) => v
                .iter()
                .map(|c| {
                    c.as_deref()
                        .and_then(|s| s.trim().parse::<f64>().ok())
                        .filter(|x| !x.is_nan())
                })
                .collect(),
        }
    }

    /// Cells as strings. Numbers are rendered with [`format_number`].
    #[must_use]
    pub fn to_text(&self) -> Vec<Option<String>> {
        match self {
            ColumnData::Numeric(v) => v
                .iter()
                .map(|c| c.filter(|x| !x.is_nan()).map(format_number))
                .collect(),
            ColumnData::Text(v) => v.clone(),
        }
    }

    /// Gather the cells at `indices`, in that order.
    fn take(&self, indices: &[usize]) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Text(v) => {
                ColumnData::Text(indices.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }
}

/// A named column of a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    /// Create a numeric column.
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    /// Create a text column.
    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Text(values),
        }
    }

    /// Return the column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the column cells.
    #[must_use]
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Consume the column and return its cells.
    #[must_use]
    pub fn into_data(self) -> ColumnData {
        self.data
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Return `true` when the column has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// An in-memory table: ordered rows × uniquely named, typed columns.
///
/// The row count is tracked independently of the columns so a table keeps
/// its height after every column has been removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Build a table from columns.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::DuplicateColumn`] | Two columns share a name |
    /// | [`IoError::ColumnLengthMismatch`] | Columns have different lengths |
    pub fn new(columns: Vec<Column>) -> Result<Self, IoError> {
        let n_rows = columns.first().map_or(0, Column::len);
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(IoError::DuplicateColumn {
                    name: column.name.clone(),
                });
            }
            if column.len() != n_rows {
                return Err(IoError::ColumnLengthMismatch {
                    column: column.name.clone(),
                    expected: n_rows,
                    got: column.len(),
                });
            }
        }
        Ok(Self { columns, n_rows })
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Column names in table order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// All columns in table order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Return `true` when a column with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Remove a column by name, returning it if present.
    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let pos = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(pos))
    }

    /// Insert a column, replacing any existing column with the same name
    /// in place.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::ColumnLengthMismatch`] if the column's length
    /// differs from the table's row count.
    pub fn set_column(&mut self, column: Column) -> Result<(), IoError> {
        let got = column.len();
        if got != self.n_rows {
            return Err(IoError::ColumnLengthMismatch {
                column: column.name,
                expected: self.n_rows,
                got,
            });
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Return a new table holding the rows at `indices`, in that order.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    #[must_use]
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                data: c.data.take(indices),
            })
            .collect();
        Table {
            columns,
            n_rows: indices.len(),
        }
    }
}

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    /// Return the experiment name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(vec![
            Column::numeric("a", vec![Some(1.0), None, Some(3.0)]),
            Column::text("b", vec![Some("x".into()), Some("y".into()), None]),
        ])
        .unwrap()
    }

    #[test]
    fn missing_markers() {
        assert!(is_missing(""));
        assert!(is_missing("  NaN "));
        assert!(is_missing("null"));
        assert!(!is_missing("0"));
        assert!(!is_missing("Kepler"));
    }

    #[test]
    fn format_number_integral() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(-7.0), "-7");
        assert_eq!(format_number(0.5), "0.5");
    }

    #[test]
    fn duplicate_column_rejected() {
        let err = Table::new(vec![
            Column::numeric("a", vec![Some(1.0)]),
            Column::numeric("a", vec![Some(2.0)]),
        ])
        .unwrap_err();
        assert!(matches!(err, IoError::DuplicateColumn { .. }));
    }

    #[test]
    fn length_mismatch_rejected() {
        let err = Table::new(vec![
            Column::numeric("a", vec![Some(1.0)]),
            Column::numeric("b", vec![Some(2.0), Some(3.0)]),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            IoError::ColumnLengthMismatch {
                expected: 1,
                got: 2,
                ..
            }
        ));
    }

    #[test]
    fn missing_ratio_counts_none_and_nan() {
        let data = ColumnData::Numeric(vec![Some(1.0), None, Some(f64::NAN), Some(2.0)]);
        assert!((data.missing_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn text_coerces_to_numbers() {
        let data = ColumnData::Text(vec![Some("4".into()), Some("abc".into()), None]);
        assert_eq!(data.to_numbers(), vec![Some(4.0), None, None]);
    }

    #[test]
    fn set_column_replaces_in_place() {
        let mut table = sample();
        table
            .set_column(Column::numeric("a", vec![Some(9.0), Some(9.0), Some(9.0)]))
            .unwrap();
        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(
            table.column("a").unwrap().data(),
            &ColumnData::Numeric(vec![Some(9.0); 3])
        );
    }

    #[test]
    fn set_column_rejects_wrong_length() {
        let mut table = sample();
        let err = table
            .set_column(Column::numeric("c", vec![Some(1.0)]))
            .unwrap_err();
        assert!(matches!(
            err,
            IoError::ColumnLengthMismatch { ref column, expected: 3, got: 1 } if column == "c"
        ));
        assert_eq!(table.n_columns(), 2);
    }

    #[test]
    fn take_rows_reorders() {
        let table = sample();
        let sub = table.take_rows(&[2, 0]);
        assert_eq!(sub.n_rows(), 2);
        assert_eq!(
            sub.column("a").unwrap().data(),
            &ColumnData::Numeric(vec![Some(3.0), Some(1.0)])
        );
    }

    #[test]
    fn row_count_survives_column_removal() {
        let mut table = sample();
        table.remove_column("a");
        table.remove_column("b");
        assert_eq!(table.n_columns(), 0);
        assert_eq!(table.n_rows(), 3);
    }

    #[test]
    fn experiment_name_validation() {
        assert!(ExperimentName::new("k2_run-1".into()).is_ok());
        assert!(ExperimentName::new("bad name".into()).is_err());
        assert!(ExperimentName::new(String::new()).is_err());
    }
}
