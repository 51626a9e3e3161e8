use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid percentile, empty feature set, malformed binding. Raised before any data is touched.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Failed to load model from '{location}': {reason}")]
    ModelLoad { location: String, reason: String },

    /// The aligned vector does not match the loaded model. The alignment table must be rebuilt.
    #[error("Schema skew: model expects {expected} input slots, got {actual} (rebuild the alignment table)")]
    SchemaSkew { expected: usize, actual: usize },

    #[error("Unseen category '{value}' for feature '{feature}'{}", row_suffix(.row))]
    UnseenCategory {
        feature: String,
        value: String,
        row: Option<usize>,
    },

    #[error("Invalid value '{value}' for numerical feature '{feature}'")]
    InvalidValue { feature: String, value: String },

    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn row_suffix(row: &Option<usize>) -> String {
    match row {
        Some(row) => format!(" in row {}", row),
        None => String::new(),
    }
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn model_load(location: impl Into<String>, reason: impl ToString) -> Self {
        Error::ModelLoad {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Attach a batch row number to a per-row error.
    pub fn at_row(self, row: usize) -> Self {
        match self {
            Error::UnseenCategory { feature, value, .. } => Error::UnseenCategory {
                feature,
                value,
                row: Some(row),
            },
            other => other,
        }
    }
}
