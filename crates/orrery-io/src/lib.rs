//! Table loading, typed columns, and result writing for the orrery pipeline.

mod domain;
mod error;
mod reader;
mod writer;

pub use domain::{Column, ColumnData, ExperimentName, MISSING_MARKERS, Table, format_number, is_missing};
pub use error::IoError;
pub use reader::TableReader;
pub use writer::{LabelProbability, PredictionRecord, ResultWriter};
