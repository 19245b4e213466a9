//! Feature engineering and preprocessing for exoplanet candidate tables.
//!
//! [`FeatureEngineer`] turns a raw [`orrery_io::Table`] into a feature table
//! and target labels; [`ColumnRoles`] and [`Preprocessor`] turn the feature
//! table into a dense matrix with imputation, scaling and one-hot encoding.

mod compose;
mod derive;
mod encode;
mod engineer;
mod error;
mod impute;
mod router;
mod scale;

pub use compose::{DEFAULT_FILL_VALUE, FittedPreprocessor, Preprocessor};
pub use derive::DerivedFeature;
pub use encode::OneHotEncoder;
pub use engineer::{
    DEFAULT_DROP_COLUMNS, DEFAULT_OBSERVATION_PREFIXES, DropReason, DroppedColumn, EngineeredData,
    FeatureEngineer, derive_features,
};
pub use error::FeatureError;
pub use impute::{ConstantImputer, MedianImputer};
pub use router::ColumnRoles;
pub use scale::StandardScaler;
