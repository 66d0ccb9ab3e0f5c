//! Dataset loading and feature schema.

pub mod dataset;
pub mod feature_column;

pub use dataset::{load_csv_with_header, Dataset};
pub use feature_column::{check_dataset, input_dimension, real_valued_column, FeatureColumn};
