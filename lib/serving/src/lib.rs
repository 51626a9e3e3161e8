//! # ModelBridge Serving
//!
//! Prediction endpoints built from a declarative binding configuration.
//!
//! - [`EndpointConfig`] - model location, feature bindings, anomaly percentile
//! - [`ExtractorResolver`] - turns binding expressions into value extractors
//! - [`PredictionEndpoint`] - aligns and scores requests, rebinding atomically
//!   when the model is refreshed

pub mod config;
pub mod endpoint;
pub mod resolver;

pub use config::{EndpointConfig, FeatureBinding, DEFAULT_PERCENTILE};
pub use endpoint::{Prediction, PredictionEndpoint};
pub use resolver::{ExtractorResolver, JsonResolver, CONSTANT_PREFIX};
