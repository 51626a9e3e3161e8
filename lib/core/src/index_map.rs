//! Mapping between original column indices and the trained input space
//!
//! `new_to_old[new_index] = original_index`. The map is computed from the
//! schema alone (never from row content), so the same configuration always
//! yields the same map.

use crate::schema::FeatureSchema;
use crate::{Error, Result};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexMap {
    new_to_old: Vec<usize>,
}

impl IndexMap {
    /// Walk the schema in original-index order and keep every included
    /// feature that is not the response column.
    pub fn from_schema(schema: &FeatureSchema, response_index: Option<usize>) -> Result<Self> {
        let new_to_old: Vec<usize> = schema
            .in_original_order()
            .into_iter()
            .filter(|f| f.include && Some(f.index) != response_index)
            .map(|f| f.index)
            .collect();

        if new_to_old.is_empty() {
            return Err(Error::config(
                "no features left for training after removing discarded and response columns",
            ));
        }

        Ok(Self { new_to_old })
    }

    /// Build a map from an explicit list, checking the invariants
    pub fn from_vec(new_to_old: Vec<usize>) -> Result<Self> {
        let map = Self { new_to_old };
        map.validate(None)?;
        Ok(map)
    }

    /// Check non-emptiness, uniqueness and, when given, that every value is a
    /// valid original index of a raw row of `raw_width` columns.
    pub fn validate(&self, raw_width: Option<usize>) -> Result<()> {
        if self.new_to_old.is_empty() {
            return Err(Error::config("index map cannot be empty"));
        }
        let mut seen = AHashSet::with_capacity(self.new_to_old.len());
        for &old in &self.new_to_old {
            if !seen.insert(old) {
                return Err(Error::config(format!(
                    "index map contains original index {} more than once",
                    old
                )));
            }
            if let Some(width) = raw_width {
                if old >= width {
                    return Err(Error::config(format!(
                        "index map refers to column {} but rows have {} columns",
                        old, width
                    )));
                }
            }
        }
        Ok(())
    }

    /// Trained input width
    #[inline]
    pub fn width(&self) -> usize {
        self.new_to_old.len()
    }

    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.new_to_old
    }

    /// Original index of a trained slot
    #[inline]
    pub fn original_of(&self, new_index: usize) -> Option<usize> {
        self.new_to_old.get(new_index).copied()
    }

    /// Where an original column landed in the trained space
    pub fn position_of(&self, original_index: usize) -> Option<usize> {
        self.new_to_old.iter().position(|&old| old == original_index)
    }

    /// Project a raw row into trained order
    pub fn select<'a, T>(&self, row: &'a [T]) -> Vec<&'a T> {
        self.new_to_old.iter().map(|&old| &row[old]).collect()
    }
}
