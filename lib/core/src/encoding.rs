//! Categorical encodings
//!
//! Each categorical column gets an ordered label list; a label's position is
//! its integer code. Codes are assigned in first-seen order during a single
//! training pass and are frozen afterwards: at serving time an unseen label is
//! an error, never a new code.

use crate::schema::is_missing;
use crate::{Error, Result};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Labels of one categorical column, indexed by code
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryEncoding {
    /// Original column index
    pub index: usize,
    pub labels: Vec<String>,
}

impl CategoryEncoding {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Frozen encodings of every categorical column, ordered by original index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Encodings {
    columns: Vec<CategoryEncoding>,
}

impl Encodings {
    pub fn columns(&self) -> &[CategoryEncoding] {
        &self.columns
    }

    pub fn get(&self, original_index: usize) -> Option<&CategoryEncoding> {
        self.columns.iter().find(|c| c.index == original_index)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Build hash lookups for the serving path
    pub fn freeze(&self) -> FrozenEncodings {
        let lookups = self
            .columns
            .iter()
            .map(|column| {
                let codes = column
                    .labels
                    .iter()
                    .enumerate()
                    .map(|(code, label)| (label.clone(), code as u32))
                    .collect();
                (column.index, codes)
            })
            .collect();
        FrozenEncodings {
            lookups,
            encodings: self.clone(),
        }
    }
}

/// Accumulates first-seen labels per categorical column.
///
/// Must be driven by one sequential pass over the whole dataset; feeding
/// partitions to separate builders would produce diverging codes.
#[derive(Debug, Default)]
pub struct EncodingsBuilder {
    columns: Vec<(usize, Vec<String>, AHashMap<String, u32>)>,
}

impl EncodingsBuilder {
    /// Create a builder for the given categorical original indices
    pub fn new(categorical_indices: impl IntoIterator<Item = usize>) -> Self {
        let mut indices: Vec<usize> = categorical_indices.into_iter().collect();
        indices.sort_unstable();
        indices.dedup();
        Self {
            columns: indices
                .into_iter()
                .map(|i| (i, Vec::new(), AHashMap::new()))
                .collect(),
        }
    }

    /// Record the categorical values of one raw row
    pub fn observe<S: AsRef<str>>(&mut self, row: &[S]) {
        for (index, labels, seen) in &mut self.columns {
            let Some(value) = row.get(*index) else {
                continue;
            };
            let value = value.as_ref().trim();
            if is_missing(value) || seen.contains_key(value) {
                continue;
            }
            seen.insert(value.to_string(), labels.len() as u32);
            labels.push(value.to_string());
        }
    }

    pub fn build(self) -> Encodings {
        Encodings {
            columns: self
                .columns
                .into_iter()
                .map(|(index, labels, _)| CategoryEncoding { index, labels })
                .collect(),
        }
    }
}

/// Read-only hash view of [`Encodings`], built once per loaded model
#[derive(Debug, Clone)]
pub struct FrozenEncodings {
    lookups: AHashMap<usize, AHashMap<String, u32>>,
    encodings: Encodings,
}

impl FrozenEncodings {
    pub fn is_categorical(&self, original_index: usize) -> bool {
        self.lookups.contains_key(&original_index)
    }

    /// Code of `value` in column `original_index`.
    ///
    /// Fails with [`Error::UnseenCategory`] when the column is categorical and
    /// the label was not seen during training.
    pub fn encode(&self, original_index: usize, feature: &str, value: &str) -> Result<u32> {
        let column = self.lookups.get(&original_index).ok_or_else(|| {
            Error::config(format!("feature '{}' has no categorical encoding", feature))
        })?;
        column
            .get(value.trim())
            .copied()
            .ok_or_else(|| Error::UnseenCategory {
                feature: feature.to_string(),
                value: value.to_string(),
                row: None,
            })
    }

    /// Label of a code, used to decode predicted classes
    pub fn decode(&self, original_index: usize, code: u32) -> Option<&str> {
        self.encodings
            .get(original_index)
            .and_then(|c| c.labels.get(code as usize))
            .map(String::as_str)
    }
}
