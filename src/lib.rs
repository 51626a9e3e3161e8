//! # ModelBridge
//!
//! Train tabular models and serve them with a strict positional contract
//! between the features a model was trained on and the values a caller
//! supplies at prediction time.
//!
//! Training turns delimited text into an immutable [`ModelArtifact`] that
//! carries the feature schema, the slot order ([`IndexMap`]), frozen
//! categorical codes and the trained parameters. Serving loads the artifact
//! through a [`ModelRepository`], resolves caller bindings to slots once
//! ([`AlignmentTable`]) and scores each request with a [`Predictor`].
//!
//! ## Quick Start
//!
//! ### From the command line
//!
//! ```bash
//! modelbridge train --data churn.csv --config training.json --out file:models/churn.mbm
//! modelbridge predict --endpoint endpoint.json --input requests.jsonl
//! modelbridge inspect --model file:models/churn.mbm
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use modelbridge::prelude::*;
//! use std::sync::Arc;
//!
//! let config = TrainingConfig::from_json_file("training.json").unwrap();
//! let trained = ModelBuilder::new(config).unwrap().build_from_path("churn.csv").unwrap();
//!
//! let repository = Arc::new(ModelRepository::with_defaults());
//! repository.store("file:models/churn.mbm", &trained.artifact).unwrap();
//!
//! let endpoint = EndpointConfig::new("file:models/churn.mbm")
//!     .with_feature("age", "customer.age")
//!     .with_feature("income", "customer.income");
//! let endpoint = PredictionEndpoint::open_json(endpoint, repository).unwrap();
//!
//! let request = serde_json::json!({"customer": {"age": 42, "income": 5100}});
//! println!("{:?}", endpoint.predict(&request).unwrap());
//! ```
//!
//! ## Crate Structure
//!
//! - [`modelbridge-core`](https://docs.rs/modelbridge-core) - Schema, index map, encodings, artifact, aligner, predictor and algorithms
//! - [`modelbridge-pipeline`](https://docs.rs/modelbridge-pipeline) - Tokenizing, filtering, encoding, imputation and model building
//! - [`modelbridge-storage`](https://docs.rs/modelbridge-storage) - Artifact codec, storage adapters and the model repository
//! - [`modelbridge-serving`](https://docs.rs/modelbridge-serving) - Endpoint configuration and prediction endpoints

// Re-export core types
pub use modelbridge_core::{
    AlignedVector, AlignmentTable, Algorithm, AlgorithmClass, AnomalyDecision, AnomalyScorer,
    BatchPolicy, BindingSet, Encodings, Error, Feature, FeatureSchema, FeatureType, ImputeOption,
    IndexMap, ModelArtifact, Predictor, Result, Score, ValueExtractor,
};

// Re-export training
pub use modelbridge_pipeline::{ModelBuilder, ModelSummary, TrainedModel, TrainingConfig};

// Re-export storage
pub use modelbridge_storage::{
    codec, FileStorage, Location, MemoryStorage, ModelRepository, RegistryStorage,
    StorageAdapter, StorageKind,
};

// Re-export serving
pub use modelbridge_serving::{EndpointConfig, Prediction, PredictionEndpoint};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AlignedVector, AlignmentTable, Algorithm, AnomalyScorer, BatchPolicy, BindingSet,
        EndpointConfig, Error, Feature, FeatureSchema, ModelArtifact, ModelBuilder,
        ModelRepository, Prediction, PredictionEndpoint, Predictor, Result, TrainingConfig,
    };
}
