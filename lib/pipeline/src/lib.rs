//! # ModelBridge Pipeline
//!
//! Training-time preprocessing and model building.
//!
//! A dataset flows through the stages in this order:
//!
//! 1. [`Tokenizer`] - read delimited text into records, dropping the header
//! 2. [`RowFilter`] - drop malformed rows and rows missing a required value
//! 3. [`FeatureSelector`] - project rows into the trained slot order
//! 4. [`Encoder`] - replace categories with frozen first-seen codes
//! 5. [`MeanImputer`] - fill missing values with slot means
//! 6. [`Vectorizer`] - parse into numeric rows, optionally min-max scaled
//! 7. [`ModelBuilder`] - split, train and assemble the model artifact

pub mod builder;
pub mod config;
pub mod encoder;
pub mod imputation;
pub mod selector;
pub mod tokenizer;
pub mod vectorizer;

pub use builder::{Metric, ModelBuilder, ModelSummary, TrainedModel};
pub use config::TrainingConfig;
pub use encoder::Encoder;
pub use imputation::MeanImputer;
pub use selector::{FeatureSelector, SelectedRow};
pub use tokenizer::{DataFormat, RowFilter, Tokenizer};
pub use vectorizer::{MinMaxScaler, Vectorizer};
