//! Delimited table reader with column type inference.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{Column, Table, is_missing};

/// Label used in errors when reading from an in-memory source.
const MEMORY_SOURCE: &str = "<memory>";

/// Reads a delimited text file into a [`Table`].
///
/// Expected format:
/// - Header row required; every header names one column
/// - Lines starting with the comment byte (default `#`) are skipped
/// - All data rows have the same number of fields as the header
///
/// Each column is stored as numeric when every present cell parses as a
/// float, and as text otherwise. Cells matching
/// [`MISSING_MARKERS`](crate::MISSING_MARKERS) are missing. Columns with an
/// empty header or a header starting with `Unnamed` are spurious index
/// columns and are dropped.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed record |
/// | [`IoError::NoColumns`] | No header, or only index columns |
/// | [`IoError::DuplicateColumn`] | Two headers share a name |
/// | [`IoError::InconsistentRowLength`] | Row has different field count than header |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
pub struct TableReader {
    path: PathBuf,
    delimiter: u8,
    comment: Option<u8>,
}

impl TableReader {
    /// Create a reader for the file at `path`.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            delimiter: b',',
            comment: Some(b'#'),
        }
    }

    /// Create a reader for an in-memory byte source (see [`TableReader::parse`]).
    pub fn in_memory() -> Self {
        Self::new(Path::new(MEMORY_SOURCE))
    }

    /// Set the field delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the comment byte. `None` disables comment skipping.
    #[must_use]
    pub fn with_comment(mut self, comment: Option<u8>) -> Self {
        self.comment = comment;
        self
    }

    /// Open the file and read it into a [`Table`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Table, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;
        self.parse(file)
    }

    /// Parse delimited text from any byte source into a [`Table`].
    pub fn parse<R: Read>(&self, source: R) -> Result<Table, IoError> {
        // flexible(true) so our own InconsistentRowLength check fires instead
        // of a low-level CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .comment(self.comment)
            .from_reader(source);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?.clone();
        let expected_cols = header.len();
        if expected_cols == 0 {
            return Err(IoError::NoColumns {
                path: self.path.clone(),
            });
        }

        let mut seen = HashSet::new();
        for name in &header {
            if !is_index_column(name) && !seen.insert(name) {
                return Err(IoError::DuplicateColumn {
                    name: name.to_string(),
                });
            }
        }
        debug!(expected_cols, "read header");

        // Column-major raw cells; None marks a missing value.
        let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); expected_cols];
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: expected_cols,
                    got: record.len(),
                });
            }
            for (col, cell) in raw.iter_mut().zip(record.iter()) {
                col.push(if is_missing(cell) {
                    None
                } else {
                    Some(cell.to_string())
                });
            }
        }

        let n_rows = raw.first().map_or(0, Vec::len);
        if n_rows == 0 {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        let mut columns = Vec::with_capacity(expected_cols);
        for (name, cells) in header.iter().zip(raw) {
            if is_index_column(name) {
                debug!(column = name, "dropping unnamed index column");
                continue;
            }
            columns.push(infer_column(name, cells));
        }
        if columns.is_empty() {
            return Err(IoError::NoColumns {
                path: self.path.clone(),
            });
        }

        let table = Table::new(columns)?;
        info!(
            n_rows = table.n_rows(),
            n_columns = table.n_columns(),
            n_numeric = table.columns().iter().filter(|c| c.data().is_numeric()).count(),
            "table loaded"
        );
        Ok(table)
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}

/// Headers written by dataframe libraries for an anonymous index column.
fn is_index_column(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || name.starts_with("Unnamed")
}

/// Store a column as numeric if every present cell parses as a float.
fn infer_column(name: &str, cells: Vec<Option<String>>) -> Column {
    let parsed: Option<Vec<Option<f64>>> = cells
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(s) => s.trim().parse::<f64>().ok().map(Some),
        })
        .collect();
    match parsed {
        Some(values) => Column::numeric(name, values),
        None => Column::text(name, cells),
    }
}
