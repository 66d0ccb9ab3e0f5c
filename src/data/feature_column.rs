//! Feature schema: which columns feed the network and how wide they are.

use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::error::{Error, Result};

/// A dense, real-valued (f32) input column of fixed width.
///
/// An empty name means "the whole feature matrix", which is how the iris
/// schema is declared: one unnamed column of dimension 4.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub dimension: usize,
}

/// Declare a real-valued column of `dimension` values.
pub fn real_valued_column(name: &str, dimension: usize) -> FeatureColumn {
    FeatureColumn {
        name: name.to_string(),
        dimension,
    }
}

/// Total input width of a set of columns.
pub fn input_dimension(columns: &[FeatureColumn]) -> usize {
    columns.iter().map(|c| c.dimension).sum()
}

/// Fail unless the dataset rows are exactly as wide as the declared columns.
pub fn check_dataset(columns: &[FeatureColumn], dataset: &Dataset) -> Result<()> {
    let expected = input_dimension(columns);
    if dataset.n_features() != expected {
        return Err(Error::ShapeMismatch {
            expected,
            found: dataset.n_features(),
        });
    }
    Ok(())
}
