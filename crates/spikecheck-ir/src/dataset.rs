//! Dataset provider: a normalized feature matrix with integer labels.

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed dataset: {0}")]
    Json(#[from] serde_json::Error),
    #[error("dataset has {features} feature rows but {labels} labels")]
    LengthMismatch { features: usize, labels: usize },
    #[error("row {row} has {actual} features, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("dataset is empty")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
}

impl Dataset {
    pub fn new(features: Vec<Vec<f64>>, labels: Vec<usize>) -> Result<Self, DatasetError> {
        let data = Self { features, labels };
        data.validate()?;
        Ok(data)
    }

    pub fn from_json_str(source: &str) -> Result<Self, DatasetError> {
        let data: Dataset = serde_json::from_str(source)?;
        data.validate()?;
        Ok(data)
    }

    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let source = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&source)
    }

    fn validate(&self) -> Result<(), DatasetError> {
        if self.features.is_empty() {
            return Err(DatasetError::Empty);
        }
        if self.features.len() != self.labels.len() {
            return Err(DatasetError::LengthMismatch {
                features: self.features.len(),
                labels: self.labels.len(),
            });
        }
        let expected = self.features[0].len();
        for (row, values) in self.features.iter().enumerate() {
            if values.len() != expected {
                return Err(DatasetError::Ragged {
                    row,
                    expected,
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    pub fn sample(&self, index: usize) -> Option<(&[f64], usize)> {
        Some((self.features.get(index)?.as_slice(), *self.labels.get(index)?))
    }

    /// Divide every column by its maximum so rate-coding probabilities
    /// land in `[0, 1]`. Columns whose maximum is not positive are left as-is.
    pub fn normalize_by_column_max(&mut self) {
        let mut maxima = vec![f64::NEG_INFINITY; self.num_features()];
        for row in &self.features {
            for (col, value) in row.iter().enumerate() {
                maxima[col] = maxima[col].max(*value);
            }
        }
        for row in &mut self.features {
            for (col, value) in row.iter_mut().enumerate() {
                if maxima[col] > 0.0 {
                    *value /= maxima[col];
                }
            }
        }
    }

    /// Draw `count` indices uniformly at random, with replacement.
    pub fn sample_indices<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<usize> {
        (0..count).map(|_| rng.gen_range(0..self.len())).collect()
    }
}
