//! Categorical encoding of selected rows
//!
//! Codes are learned from one sequential pass over the full filtered dataset,
//! before any parallel stage runs, so every partition sees the same codes.

use crate::selector::SelectedRow;
use modelbridge_core::{
    is_missing, Encodings, EncodingsBuilder, FeatureSchema, FrozenEncodings, IndexMap, Result,
};
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct Encoder {
    encodings: Encodings,
    frozen: FrozenEncodings,
    /// (slot, original index, feature name) of every categorical slot
    categorical_slots: Vec<(usize, usize, String)>,
    response: Option<(usize, String)>,
}

impl Encoder {
    /// Learn first-seen codes for every included categorical column and for a
    /// categorical response.
    pub fn fit(
        schema: &FeatureSchema,
        index_map: &IndexMap,
        response_index: Option<usize>,
        rows: &[Vec<String>],
    ) -> Self {
        let categorical_slots: Vec<(usize, usize, String)> = index_map
            .as_slice()
            .iter()
            .enumerate()
            .filter_map(|(slot, &original)| {
                schema
                    .by_index(original)
                    .filter(|f| f.is_categorical())
                    .map(|f| (slot, original, f.name.clone()))
            })
            .collect();
        let response = response_index
            .and_then(|i| schema.by_index(i))
            .filter(|f| f.is_categorical())
            .map(|f| (f.index, f.name.clone()));

        let mut builder = EncodingsBuilder::new(
            categorical_slots
                .iter()
                .map(|(_, original, _)| *original)
                .chain(response.as_ref().map(|(i, _)| *i)),
        );
        for row in rows {
            builder.observe(row);
        }
        let encodings = builder.build();
        let frozen = encodings.freeze();

        Self {
            encodings,
            frozen,
            categorical_slots,
            response,
        }
    }

    pub fn encodings(&self) -> &Encodings {
        &self.encodings
    }

    /// Replace categorical values by their codes. Missing values stay missing.
    pub fn encode(&self, row: &SelectedRow) -> Result<SelectedRow> {
        let mut encoded = row.clone();
        for (slot, original, name) in &self.categorical_slots {
            let value = &row.features[*slot];
            if !is_missing(value) {
                encoded.features[*slot] = self.frozen.encode(*original, name, value)?.to_string();
            }
        }
        if let (Some((original, name)), Some(value)) = (&self.response, &row.response) {
            if !is_missing(value) {
                encoded.response = Some(self.frozen.encode(*original, name, value)?.to_string());
            }
        }
        Ok(encoded)
    }

    pub fn encode_all(&self, rows: &[SelectedRow]) -> Result<Vec<SelectedRow>> {
        rows.par_iter()
            .enumerate()
            .map(|(i, row)| self.encode(row).map_err(|e| e.at_row(i)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::FeatureSelector;
    use modelbridge_core::Feature;

    fn rows(data: &[[&str; 3]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_first_seen_codes() {
        let schema = FeatureSchema::new(vec![
            Feature::numerical("x", 0),
            Feature::categorical("color", 1),
            Feature::categorical("label", 2),
        ]);
        let raw = rows(&[
            ["1", "red", "yes"],
            ["2", "", "no"],
            ["3", "blue", "yes"],
            ["4", "red", "no"],
        ]);
        let selector = FeatureSelector::new(&schema, Some(2)).unwrap();
        let encoder = Encoder::fit(&schema, selector.index_map(), Some(2), &raw);

        let color = encoder.encodings().get(1).unwrap();
        assert_eq!(color.labels, vec!["red", "blue"]);
        assert_eq!(encoder.encodings().get(2).unwrap().labels, vec!["yes", "no"]);

        let encoded = encoder.encode_all(&selector.select_all(&raw)).unwrap();
        assert_eq!(encoded[0].features, vec!["1", "0"]);
        assert_eq!(encoded[1].features, vec!["2", ""]);
        assert_eq!(encoded[2].features, vec!["3", "1"]);
        assert_eq!(encoded[3].response.as_deref(), Some("1"));
    }

    #[test]
    fn test_codes_do_not_depend_on_partitioning() {
        let schema = FeatureSchema::new(vec![Feature::categorical("c", 0)]);
        let raw: Vec<Vec<String>> = ["d", "a", "c", "a", "b", "d"]
            .iter()
            .map(|s| vec![s.to_string()])
            .collect();
        let map = IndexMap::from_schema(&schema, None).unwrap();
        let first = Encoder::fit(&schema, &map, None, &raw);
        let second = Encoder::fit(&schema, &map, None, &raw);
        assert_eq!(first.encodings(), second.encodings());
        assert_eq!(first.encodings().get(0).unwrap().labels, vec!["d", "a", "c", "b"]);
    }
}
