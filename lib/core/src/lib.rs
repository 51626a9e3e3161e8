//! # ModelBridge Core
//!
//! Core types shared by training and serving.
//!
//! - [`FeatureSchema`] - Named, typed input columns with their original indices
//! - [`IndexMap`] - Trained slot to original column mapping
//! - [`Encodings`] - Frozen categorical codes
//! - [`ModelArtifact`] - The immutable bundle a trained model is shipped as
//! - [`AlignmentTable`] - Resolves caller bindings to trained slots
//! - [`Predictor`] / [`AnomalyScorer`] - Serving-time scoring
//!
//! ## Example
//!
//! ```rust
//! use modelbridge_core::{AlignmentTable, BindingSet, Feature, FeatureSchema, IndexMap};
//! use std::collections::HashMap;
//!
//! let schema = FeatureSchema::new(vec![
//!     Feature::numerical("age", 0),
//!     Feature::numerical("income", 1),
//!     Feature::numerical("target", 2),
//! ]);
//! let index_map = IndexMap::from_schema(&schema, Some(2)).unwrap();
//!
//! let bindings = BindingSet::<HashMap<&str, &str>>::new()
//!     .bind("income", |req: &HashMap<&str, &str>| req.get("income").map(|v| v.to_string()));
//! let table = AlignmentTable::bind(&schema, &index_map, &bindings);
//!
//! let request = HashMap::from([("income", "5000")]);
//! let aligned = table.fill(&request);
//! assert_eq!(aligned.get(0), None);
//! assert_eq!(aligned.get(1), Some("5000"));
//! ```

pub mod aligner;
pub mod algorithms;
pub mod artifact;
pub mod encoding;
pub mod error;
pub mod extract;
pub mod index_map;
pub mod predictor;
pub mod schema;

pub use aligner::{AlignedVector, AlignmentTable, Binding, BindingSet, ValueExtractor};
pub use algorithms::{Algorithm, AlgorithmClass, Dataset, HyperParameters, ModelParams};
pub use artifact::{ArtifactSummary, ModelArtifact, NormalLabels, FORMAT_VERSION};
pub use encoding::{CategoryEncoding, Encodings, EncodingsBuilder, FrozenEncodings};
pub use error::{Error, Result};
pub use extract::{ConstantExtractor, JsonPointerExtractor};
pub use index_map::IndexMap;
pub use predictor::{AnomalyDecision, AnomalyScorer, BatchPolicy, Predictor, Score};
pub use schema::{is_missing, Feature, FeatureSchema, FeatureType, ImputeOption};
