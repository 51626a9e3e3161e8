//! Endpoint configuration
//!
//! ```json
//! {
//!   "model": "registry:ml/churn",
//!   "features": [
//!     {"name": "age", "expression": "customer.age"},
//!     {"name": "plan", "expression": "/subscription/plan"}
//!   ],
//!   "percentile": 97.5,
//!   "output": "churn_score"
//! }
//! ```

use modelbridge_core::artifact::validate_percentile;
use modelbridge_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Percentile used when anomaly detection is switched on without one
pub const DEFAULT_PERCENTILE: f64 = 95.0;

/// One `(feature name, extractor expression)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureBinding {
    pub name: String,
    pub expression: String,
}

impl FeatureBinding {
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Location key of the model, e.g. `file:models/churn.mbm`
    #[serde(default)]
    pub model: String,
    /// Bindings, in declaration order
    #[serde(default)]
    pub features: Vec<FeatureBinding>,
    #[serde(default)]
    pub percentile: Option<f64>,
    /// Field the prediction is written to in responses
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default)]
    pub anomaly_detection: Option<bool>,
}

fn default_output() -> String {
    "prediction".to_string()
}

impl EndpointConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            features: Vec::new(),
            percentile: None,
            output: default_output(),
            anomaly_detection: None,
        }
    }

    pub fn with_feature(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.features.push(FeatureBinding::new(name, expression));
        self
    }

    pub fn with_percentile(mut self, percentile: f64) -> Self {
        self.percentile = Some(percentile);
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("invalid endpoint configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read endpoint configuration {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Percentile the endpoint scores anomalies at, if it runs in anomaly mode
    pub fn effective_percentile(&self) -> Option<f64> {
        match (self.percentile, self.anomaly_detection) {
            (_, Some(false)) => None,
            (Some(p), _) => Some(p),
            (None, Some(true)) => Some(DEFAULT_PERCENTILE),
            (None, None) => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::config("endpoint configuration names no model"));
        }
        if self.features.is_empty() {
            return Err(Error::config("endpoint configuration binds no features"));
        }
        if self.output.trim().is_empty() {
            return Err(Error::config("endpoint output name is blank"));
        }

        let mut seen = HashSet::new();
        for binding in &self.features {
            if binding.name.trim().is_empty() {
                return Err(Error::config("feature binding with a blank name"));
            }
            if !seen.insert(binding.name.as_str()) {
                return Err(Error::config(format!(
                    "feature '{}' is bound more than once",
                    binding.name
                )));
            }
        }

        if let Some(percentile) = self.effective_percentile() {
            validate_percentile(percentile)?;
        }
        Ok(())
    }
}
