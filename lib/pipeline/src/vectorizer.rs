//! Conversion of encoded rows into numeric training data

use crate::selector::SelectedRow;
use modelbridge_core::{is_missing, Dataset, Error, FeatureSchema, IndexMap, Result};
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct Vectorizer {
    feature_names: Vec<String>,
}

impl Vectorizer {
    pub fn new(schema: &FeatureSchema, index_map: &IndexMap) -> Self {
        let feature_names = index_map
            .as_slice()
            .iter()
            .map(|&original| {
                schema
                    .by_index(original)
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| format!("column {}", original))
            })
            .collect();
        Self { feature_names }
    }

    /// Parse one row. A value still missing at this point (impute option
    /// `leave_as_is`) cannot be trained on and is reported as an error.
    pub fn vectorize(&self, row: &SelectedRow, row_number: usize) -> Result<Vec<f64>> {
        row.features
            .iter()
            .zip(&self.feature_names)
            .map(|(value, name)| parse(value, name, row_number))
            .collect()
    }

    pub fn vectorize_all(&self, rows: &[SelectedRow], supervised: bool) -> Result<Dataset> {
        let features = rows
            .par_iter()
            .enumerate()
            .map(|(i, row)| self.vectorize(row, i))
            .collect::<Result<Vec<_>>>()?;
        if !supervised {
            return Ok(Dataset::unsupervised(features));
        }
        let labels = rows
            .par_iter()
            .enumerate()
            .map(|(i, row)| match &row.response {
                Some(value) => parse(value, "response", i),
                None => Err(Error::Training(format!("row {} has no response value", i))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Dataset::supervised(features, labels))
    }
}

fn parse(value: &str, feature: &str, row: usize) -> Result<f64> {
    if is_missing(value) {
        return Err(Error::Training(format!(
            "missing value for feature '{}' in row {}",
            feature, row
        )));
    }
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(Error::Training(format!(
            "invalid value '{}' for feature '{}' in row {}",
            value, feature, row
        ))),
    }
}

/// Per-slot min-max bounds
#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxScaler {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl MinMaxScaler {
    pub fn fit(dataset: &Dataset) -> Self {
        let width = dataset.width();
        let mut min = vec![f64::INFINITY; width];
        let mut max = vec![f64::NEG_INFINITY; width];
        for row in &dataset.features {
            for (slot, &v) in row.iter().enumerate() {
                min[slot] = min[slot].min(v);
                max[slot] = max[slot].max(v);
            }
        }
        if dataset.is_empty() {
            min.fill(0.0);
            max.fill(0.0);
        }
        Self { min, max }
    }

    /// Scale into `[0, 1]`. A constant slot maps to 0.
    pub fn apply(&self, dataset: &mut Dataset) {
        dataset.features.par_iter_mut().for_each(|row| {
            for (slot, v) in row.iter_mut().enumerate() {
                let range = self.max[slot] - self.min[slot];
                *v = if range > 0.0 {
                    (*v - self.min[slot]) / range
                } else {
                    0.0
                };
            }
        });
    }
}
