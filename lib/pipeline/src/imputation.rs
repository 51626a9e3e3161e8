//! Mean imputation
//!
//! Slot means are computed over the encoded rows in one coordinated pass and
//! stored in the artifact; serving fills absent values with the same means.

use crate::selector::SelectedRow;
use modelbridge_core::{is_missing, FeatureSchema, ImputeOption, IndexMap};
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub struct MeanImputer {
    means: Vec<f64>,
    options: Vec<ImputeOption>,
}

impl MeanImputer {
    /// Mean of every slot over its parseable, non-missing values. A slot with
    /// no usable value gets a mean of 0.
    pub fn fit(schema: &FeatureSchema, index_map: &IndexMap, rows: &[SelectedRow]) -> Self {
        let width = index_map.width();
        let mut sums = vec![0.0; width];
        let mut counts = vec![0usize; width];
        for row in rows {
            for (slot, value) in row.features.iter().enumerate() {
                if is_missing(value) {
                    continue;
                }
                if let Ok(v) = value.trim().parse::<f64>() {
                    sums[slot] += v;
                    counts[slot] += 1;
                }
            }
        }

        let means = sums
            .iter()
            .zip(&counts)
            .map(|(s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
            .collect();
        let options = index_map
            .as_slice()
            .iter()
            .map(|&original| {
                schema
                    .by_index(original)
                    .map(|f| f.impute_option)
                    .unwrap_or_default()
            })
            .collect();

        Self { means, options }
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Fill missing values of slots whose option is [`ImputeOption::ReplaceWithMean`]
    pub fn impute(&self, row: &mut SelectedRow) {
        for (slot, value) in row.features.iter_mut().enumerate() {
            if self.options[slot] == ImputeOption::ReplaceWithMean && is_missing(value) {
                *value = self.means[slot].to_string();
            }
        }
    }

    pub fn impute_all(&self, rows: &mut [SelectedRow]) {
        rows.par_iter_mut().for_each(|row| self.impute(row));
    }
}
