//! Training configuration

use crate::tokenizer::DataFormat;
use modelbridge_core::{Algorithm, Error, FeatureSchema, HyperParameters, NormalLabels, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Everything needed to turn a dataset into a model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingConfig {
    pub schema: FeatureSchema,

    /// Name of the column to predict; required by supervised algorithms
    #[serde(default)]
    pub response_variable: Option<String>,

    /// Algorithm name, e.g. `K_MEANS` or `LINEAR_REGRESSION`
    pub algorithm: String,

    /// Trainer settings. Numbers and booleans are accepted as well as strings.
    #[serde(default, deserialize_with = "scalar_map")]
    pub hyper_parameters: HyperParameters,

    /// Share of the rows used for training; the rest are held out for evaluation
    #[serde(default = "default_train_fraction")]
    pub train_fraction: f64,

    /// Seed for the train/test split and randomized trainers
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Min-max scale every input slot
    #[serde(default)]
    pub normalization: bool,

    #[serde(default)]
    pub format: DataFormat,

    /// The first line of the dataset is a header
    #[serde(default = "default_header")]
    pub header: bool,

    /// Labels emitted by anomaly models; the response column, if any, is
    /// compared against them to pick the best percentile
    #[serde(default)]
    pub normal_labels: Option<NormalLabels>,
}

fn default_train_fraction() -> f64 {
    1.0
}

fn default_seed() -> u64 {
    42
}

fn default_header() -> bool {
    true
}

fn scalar_map<'de, D>(deserializer: D) -> std::result::Result<HyperParameters, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    let mut map = BTreeMap::new();
    for (key, value) in raw {
        let value = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "hyper-parameter '{}' must be a scalar, got {}",
                    key, other
                )))
            }
        };
        map.insert(key, value);
    }
    Ok(HyperParameters(map))
}

impl TrainingConfig {
    pub fn new(schema: FeatureSchema, algorithm: Algorithm) -> Self {
        Self {
            schema,
            response_variable: None,
            algorithm: algorithm.name().to_string(),
            hyper_parameters: HyperParameters::new(),
            train_fraction: default_train_fraction(),
            seed: default_seed(),
            normalization: false,
            format: DataFormat::default(),
            header: default_header(),
            normal_labels: None,
        }
    }

    pub fn with_response(mut self, name: impl Into<String>) -> Self {
        self.response_variable = Some(name.into());
        self
    }

    pub fn with_hyper(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.hyper_parameters = self.hyper_parameters.with(key, value);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("invalid training config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    pub fn algorithm(&self) -> Result<Algorithm> {
        self.algorithm.parse()
    }

    /// Original index of the response column
    pub fn response_index(&self) -> Result<Option<usize>> {
        match &self.response_variable {
            None => Ok(None),
            Some(name) => self
                .schema
                .get(name)
                .map(|f| Some(f.index))
                .ok_or_else(|| {
                    Error::config(format!("response variable '{}' is not in the schema", name))
                }),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.schema.validate()?;
        let algorithm = self.algorithm()?;
        if !(self.train_fraction > 0.0 && self.train_fraction <= 1.0) {
            return Err(Error::config(format!(
                "train_fraction must be in (0, 1], got {}",
                self.train_fraction
            )));
        }
        self.response_index()?;
        if algorithm.is_supervised() && self.response_variable.is_none() {
            return Err(Error::config(format!(
                "{} requires a response variable",
                algorithm
            )));
        }
        Ok(())
    }
}
