//! In-memory labeled datasets and the header-prefixed CSV loader.

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use log::info;

use crate::error::{Error, Result};

/// Upper bounds on what is reserved up front; header counts are not trusted for allocation.
const PREALLOC_ROWS: usize = 4096;
const PREALLOC_VALUES: usize = 1 << 16;

/// Labeled samples stored row-major: `features[i * n_features..(i + 1) * n_features]`
/// belongs to `labels[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Vec<f32>,
    labels: Vec<usize>,
    n_features: usize,
    class_names: Vec<String>,
}

impl Dataset {
    /// Build a dataset from a flat feature buffer and one label per row.
    pub fn new(features: Vec<f32>, labels: Vec<usize>, n_features: usize) -> Result<Self> {
        if n_features == 0 {
            return Err(Error::ShapeMismatch {
                expected: 1,
                found: 0,
            });
        }
        if features.len() != labels.len() * n_features {
            return Err(Error::ShapeMismatch {
                expected: labels.len() * n_features,
                found: features.len(),
            });
        }
        Ok(Self {
            features,
            labels,
            n_features,
            class_names: Vec::new(),
        })
    }

    pub fn with_class_names(mut self, class_names: Vec<String>) -> Self {
        self.class_names = class_names;
        self
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn features(&self) -> &[f32] {
        &self.features
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Class names listed after the row and column counts in the file header.
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.features[index * self.n_features..(index + 1) * self.n_features]
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[f32], usize)> + '_ {
        self.features
            .chunks_exact(self.n_features)
            .zip(self.labels.iter().copied())
    }

    /// Fail if any label is not a valid class id.
    pub fn check_labels(&self, n_classes: usize) -> Result<()> {
        match self.labels.iter().find(|&&label| label >= n_classes) {
            Some(&label) => Err(Error::LabelOutOfRange { label, n_classes }),
            None => Ok(()),
        }
    }
}

/// Resolve a Python-style column index (negative counts from the end).
fn resolve_column(target_column: i64, width: usize) -> Option<usize> {
    let index = if target_column < 0 {
        width as i64 + target_column
    } else {
        target_column
    };
    (0..width as i64).contains(&index).then_some(index as usize)
}

fn parse_header(path: &Path, record: &StringRecord) -> Result<(usize, usize, Vec<String>)> {
    let header_err = |reason: String| Error::Header {
        path: path.to_path_buf(),
        reason,
    };

    if record.len() < 2 {
        return Err(header_err(format!(
            "expected at least 2 fields (rows, columns), found {}",
            record.len()
        )));
    }
    let n_samples = record[0]
        .trim()
        .parse::<usize>()
        .map_err(|_| header_err(format!("row count {:?} is not an integer", &record[0])))?;
    let n_features = record[1]
        .trim()
        .parse::<usize>()
        .map_err(|_| header_err(format!("column count {:?} is not an integer", &record[1])))?;
    if n_features == 0 {
        return Err(header_err("column count must be positive".to_string()));
    }
    if n_features
        .checked_add(1)
        .and_then(|width| width.checked_mul(n_samples))
        .is_none()
    {
        return Err(header_err(format!(
            "{} rows of {} columns do not fit in memory",
            n_samples, n_features
        )));
    }

    let class_names = record
        .iter()
        .skip(2)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    Ok((n_samples, n_features, class_names))
}

/// Load a CSV file whose first row is `<rows>,<columns>[,<class names>...]`.
///
/// Every following row holds `columns` features plus one integer label at
/// `target_column` (negative values count from the end, so `-1` is the last field).
///
/// ```no_run
/// use iris_dnn::data::load_csv_with_header;
///
/// let training = load_csv_with_header("data/iris_training.csv", -1).unwrap();
/// assert_eq!(training.n_features(), 4);
/// ```
pub fn load_csv_with_header(path: impl AsRef<Path>, target_column: i64) -> Result<Dataset> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record?,
        None => {
            return Err(Error::Header {
                path: path.to_path_buf(),
                reason: "file is empty".to_string(),
            })
        }
    };
    let (n_samples, n_features, class_names) = parse_header(path, &header)?;

    let width = n_features + 1;
    let label_index = resolve_column(target_column, width).ok_or_else(|| {
        Error::Config(format!(
            "target_column {} is outside rows of {} fields",
            target_column, width
        ))
    })?;

    let reserved_rows = n_samples.min(PREALLOC_ROWS);
    let mut features =
        Vec::with_capacity(reserved_rows.saturating_mul(n_features).min(PREALLOC_VALUES));
    let mut labels = Vec::with_capacity(reserved_rows);

    for record in records {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        if record.len() != width {
            return Err(Error::RowWidth {
                path: path.to_path_buf(),
                line,
                expected: width,
                found: record.len(),
            });
        }

        for (column, field) in record.iter().enumerate() {
            let parse_err = || Error::Parse {
                path: path.to_path_buf(),
                line,
                column,
                value: field.to_string(),
            };
            if column == label_index {
                labels.push(field.parse::<usize>().map_err(|_| parse_err())?);
            } else {
                features.push(field.parse::<f32>().map_err(|_| parse_err())?);
            }
        }
    }

    if labels.len() != n_samples {
        return Err(Error::RowCount {
            path: path.to_path_buf(),
            expected: n_samples,
            found: labels.len(),
        });
    }

    info!(
        "Loaded {} samples with {} features from {}",
        labels.len(),
        n_features,
        path.display()
    );

    Ok(Dataset::new(features, labels, n_features)?.with_class_names(class_names))
}
