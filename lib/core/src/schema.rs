//! Feature schema definitions
//!
//! The schema lists every column of a dataset version with its original
//! column index, its type and how missing values are treated. The original
//! index is assigned at ingestion and never changes; everything downstream
//! (index mapping, encodings, alignment) is keyed by it.

use crate::{Error, Result};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// Ordered list of the columns a dataset (and a model trained on it) knows about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureSchema {
    /// Schema version for future compatibility
    #[serde(default = "default_version")]
    pub version: u32,

    /// Features in declaration order
    pub features: Vec<Feature>,
}

fn default_version() -> u32 {
    1
}

impl FeatureSchema {
    /// Create a new schema with the given features
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            version: 1,
            features,
        }
    }

    /// Check that the schema is non-empty and that names and original indices are unique
    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(Error::config("feature schema cannot be empty"));
        }

        let mut names = AHashSet::with_capacity(self.features.len());
        let mut indices = AHashSet::with_capacity(self.features.len());
        for feature in &self.features {
            if feature.name.trim().is_empty() {
                return Err(Error::config(format!(
                    "feature at index {} has an empty name",
                    feature.index
                )));
            }
            if !names.insert(feature.name.as_str()) {
                return Err(Error::config(format!(
                    "duplicate feature name '{}'",
                    feature.name
                )));
            }
            if !indices.insert(feature.index) {
                return Err(Error::config(format!(
                    "duplicate original index {} (feature '{}')",
                    feature.index, feature.name
                )));
            }
        }
        Ok(())
    }

    /// Number of columns in a raw row of this dataset
    pub fn width(&self) -> usize {
        self.features
            .iter()
            .map(|f| f.index + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Get a feature by name
    pub fn get(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Get a feature by its original column index
    pub fn by_index(&self, index: usize) -> Option<&Feature> {
        self.features.iter().find(|f| f.index == index)
    }

    /// Features sorted by original column index
    pub fn in_original_order(&self) -> Vec<&Feature> {
        let mut features: Vec<_> = self.features.iter().collect();
        features.sort_by_key(|f| f.index);
        features
    }
}

/// A single column of the dataset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    pub name: String,

    /// Original column index, assigned at ingestion
    pub index: usize,

    #[serde(rename = "type", default)]
    pub feature_type: FeatureType,

    #[serde(default)]
    pub impute_option: ImputeOption,

    /// Whether the column takes part in training
    #[serde(default = "default_include")]
    pub include: bool,
}

fn default_include() -> bool {
    true
}

impl Feature {
    /// Create a numerical feature that is included and mean-imputed
    pub fn numerical(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            feature_type: FeatureType::Numerical,
            impute_option: ImputeOption::ReplaceWithMean,
            include: true,
        }
    }

    /// Create a categorical feature that is included and mean-imputed on its codes
    pub fn categorical(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            feature_type: FeatureType::Categorical,
            impute_option: ImputeOption::ReplaceWithMean,
            include: true,
        }
    }

    pub fn with_impute(mut self, option: ImputeOption) -> Self {
        self.impute_option = option;
        self
    }

    /// Mark the feature as discarded
    pub fn excluded(mut self) -> Self {
        self.include = false;
        self
    }

    pub fn is_categorical(&self) -> bool {
        self.feature_type == FeatureType::Categorical
    }
}

/// Feature type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    /// Parsed as a floating point number
    #[default]
    Numerical,
    /// Encoded to an integer code learned at training time
    Categorical,
}

/// How a missing value in a column is treated during training
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImputeOption {
    /// Drop the whole row
    Discard,
    /// Replace with the column mean computed over the training data
    #[default]
    ReplaceWithMean,
    /// Keep the value as missing
    LeaveAsIs,
}

/// Tokens treated as a missing value
pub fn is_missing(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || value.eq_ignore_ascii_case("na")
        || value.eq_ignore_ascii_case("null")
        || value == "?"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> FeatureSchema {
        FeatureSchema::new(vec![
            Feature::numerical("age", 0),
            Feature::numerical("income", 1),
            Feature::categorical("zipcode", 2).excluded(),
            Feature::categorical("label", 3),
        ])
    }

    #[test]
    fn test_schema_creation() {
        let schema = sample_schema();
        assert_eq!(schema.version, 1);
        assert_eq!(schema.len(), 4);
        assert_eq!(schema.width(), 4);
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_empty_schema_error() {
        let schema = FeatureSchema::new(Vec::new());
        assert!(matches!(schema.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let schema = FeatureSchema::new(vec![
            Feature::numerical("a", 0),
            Feature::numerical("b", 0),
        ]);
        assert!(matches!(schema.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let schema = FeatureSchema::new(vec![
            Feature::numerical("a", 0),
            Feature::numerical("a", 1),
        ]);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_original_order() {
        let schema = FeatureSchema::new(vec![
            Feature::numerical("c", 2),
            Feature::numerical("a", 0),
            Feature::numerical("b", 1),
        ]);
        let names: Vec<_> = schema.in_original_order().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_tokens() {
        assert!(is_missing(""));
        assert!(is_missing(" NA "));
        assert!(is_missing("?"));
        assert!(is_missing("null"));
        assert!(!is_missing("0"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let schema = sample_schema();
        let json = serde_json::to_string(&schema).unwrap();
        let parsed: FeatureSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, parsed);
    }

    #[test]
    fn test_serde_defaults() {
        let parsed: FeatureSchema = serde_json::from_str(
            r#"{"features": [{"name": "x", "index": 0}]}"#,
        )
        .unwrap();
        let feature = &parsed.features[0];
        assert_eq!(feature.feature_type, FeatureType::Numerical);
        assert_eq!(feature.impute_option, ImputeOption::ReplaceWithMean);
        assert!(feature.include);
    }
}
