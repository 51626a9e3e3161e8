//! Feature selection
//!
//! Reorders raw rows into the trained input space: the included feature
//! values in new-index order, with the response split off.

use modelbridge_core::{FeatureSchema, IndexMap, Result};
use rayon::prelude::*;

/// One row in trained-slot order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedRow {
    pub features: Vec<String>,
    pub response: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FeatureSelector {
    index_map: IndexMap,
    response_index: Option<usize>,
}

impl FeatureSelector {
    /// The index map comes from the schema alone
    pub fn new(schema: &FeatureSchema, response_index: Option<usize>) -> Result<Self> {
        Ok(Self {
            index_map: IndexMap::from_schema(schema, response_index)?,
            response_index,
        })
    }

    pub fn index_map(&self) -> &IndexMap {
        &self.index_map
    }

    pub fn response_index(&self) -> Option<usize> {
        self.response_index
    }

    pub fn select(&self, row: &[String]) -> SelectedRow {
        SelectedRow {
            features: self.index_map.select(row).into_iter().cloned().collect(),
            response: self.response_index.and_then(|i| row.get(i).cloned()),
        }
    }

    pub fn select_all(&self, rows: &[Vec<String>]) -> Vec<SelectedRow> {
        rows.par_iter().map(|row| self.select(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelbridge_core::Feature;

    #[test]
    fn test_select_drops_discarded_and_response() {
        let schema = FeatureSchema::new(vec![
            Feature::numerical("age", 0),
            Feature::numerical("income", 1),
            Feature::categorical("zipcode", 2).excluded(),
            Feature::numerical("target", 3),
        ]);
        let selector = FeatureSelector::new(&schema, Some(3)).unwrap();
        assert_eq!(selector.index_map().as_slice(), &[0, 1]);

        let row: Vec<String> = ["30", "5000", "90210", "1.5"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let selected = selector.select(&row);
        assert_eq!(selected.features, vec!["30", "5000"]);
        assert_eq!(selected.response.as_deref(), Some("1.5"));
    }

    #[test]
    fn test_reorders_by_original_index() {
        // Declared out of order; slots follow the original column order
        let schema = FeatureSchema::new(vec![
            Feature::numerical("b", 1),
            Feature::numerical("a", 0),
        ]);
        let selector = FeatureSelector::new(&schema, None).unwrap();
        let row = vec!["x".to_string(), "y".to_string()];
        assert_eq!(selector.select(&row).features, vec!["x", "y"]);
        assert_eq!(selector.select(&row).response, None);
    }
}
