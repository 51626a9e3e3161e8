//! Prediction endpoint
//!
//! Wires a configuration to a model: the repository supplies the artifact,
//! the bindings are resolved once, and every request is aligned and scored
//! against the same immutable snapshot. A refresh builds the next snapshot
//! completely before publishing it, so requests never see an alignment table
//! from one model paired with the predictor of another.

use crate::config::EndpointConfig;
use crate::resolver::{ExtractorResolver, JsonResolver};
use modelbridge_core::{
    AlignedVector, AlignmentTable, AnomalyDecision, AnomalyScorer, BatchPolicy, BindingSet, Error,
    ModelArtifact, Predictor, Result, Score,
};
use modelbridge_storage::ModelRepository;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Result for one request row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Prediction {
    Score(Score),
    Anomaly(AnomalyDecision),
}

impl Prediction {
    /// Raw model output
    pub fn value(&self) -> f64 {
        match self {
            Prediction::Score(score) => score.value,
            Prediction::Anomaly(decision) => decision.score,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Prediction::Score(score) => score.label.as_deref(),
            Prediction::Anomaly(decision) => decision.label.as_deref(),
        }
    }
}

/// Everything bound to one loaded artifact
struct Snapshot<C: ?Sized> {
    table: AlignmentTable<C>,
    predictor: Predictor,
    scorer: Option<AnomalyScorer>,
}

impl<C: ?Sized> Snapshot<C> {
    fn bind(
        artifact: Arc<ModelArtifact>,
        bindings: &BindingSet<C>,
        percentile: Option<f64>,
    ) -> Result<Self> {
        let table = AlignmentTable::bind(&artifact.features, &artifact.index_map, bindings);
        let predictor = Predictor::new(artifact);
        let scorer = match percentile {
            Some(p) => Some(AnomalyScorer::new(predictor.clone(), p)?),
            None => None,
        };
        Ok(Self {
            table,
            predictor,
            scorer,
        })
    }

    fn score(&self, aligned: &AlignedVector) -> Result<Prediction> {
        match &self.scorer {
            Some(scorer) => scorer.score(aligned).map(Prediction::Anomaly),
            None => self.predictor.predict(aligned).map(Prediction::Score),
        }
    }
}

pub struct PredictionEndpoint<C: ?Sized = Value> {
    config: EndpointConfig,
    repository: Arc<ModelRepository>,
    bindings: BindingSet<C>,
    current: RwLock<Arc<Snapshot<C>>>,
}

impl PredictionEndpoint<Value> {
    /// Open an endpoint for JSON requests, resolving expressions with
    /// [`JsonResolver`]
    pub fn open_json(config: EndpointConfig, repository: Arc<ModelRepository>) -> Result<Self> {
        Self::open(config, repository, &JsonResolver)
    }
}

impl<C: ?Sized> PredictionEndpoint<C> {
    /// Validate `config`, resolve its bindings and load the model
    pub fn open(
        config: EndpointConfig,
        repository: Arc<ModelRepository>,
        resolver: &dyn ExtractorResolver<C>,
    ) -> Result<Self> {
        config.validate()?;

        let mut bindings = BindingSet::new();
        for binding in &config.features {
            let extractor = resolver.resolve(&binding.name, &binding.expression)?;
            bindings.insert_shared(binding.name.clone(), extractor);
        }

        let artifact = repository.load(&config.model, false)?;
        let snapshot = Snapshot::bind(artifact, &bindings, config.effective_percentile())?;
        info!(
            "Endpoint bound {} features to model {} at {} (width {})",
            bindings.len(),
            snapshot.predictor.artifact().model_id,
            config.model,
            snapshot.table.width()
        );

        Ok(Self {
            config,
            repository,
            bindings,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    fn snapshot(&self) -> Arc<Snapshot<C>> {
        self.current.read().clone()
    }

    /// Artifact currently served
    pub fn artifact(&self) -> Arc<ModelArtifact> {
        Arc::clone(self.snapshot().predictor.artifact())
    }

    /// Bound feature name per slot of the current model
    pub fn layout(&self) -> Vec<Option<String>> {
        self.snapshot()
            .table
            .layout()
            .into_iter()
            .map(|name| name.map(str::to_string))
            .collect()
    }

    /// Anomaly threshold in effect, when the endpoint runs in anomaly mode
    pub fn threshold(&self) -> Option<f64> {
        self.snapshot().scorer.as_ref().map(AnomalyScorer::threshold)
    }

    /// Reload the model and rebind if it changed.
    ///
    /// Returns whether a new model was published. On error the endpoint keeps
    /// serving the previous model.
    pub fn refresh(&self, force: bool) -> Result<bool> {
        let artifact = self.repository.load(&self.config.model, force)?;
        if Arc::ptr_eq(&artifact, self.snapshot().predictor.artifact()) {
            debug!("Model at {} unchanged", self.config.model);
            return Ok(false);
        }

        let model_id = artifact.model_id;
        let snapshot = Snapshot::bind(artifact, &self.bindings, self.config.effective_percentile())?;
        *self.current.write() = Arc::new(snapshot);
        info!("Endpoint rebound to model {} at {}", model_id, self.config.model);
        Ok(true)
    }

    pub fn predict(&self, request: &C) -> Result<Prediction> {
        let snapshot = self.snapshot();
        snapshot.score(&snapshot.table.fill(request))
    }

    /// Score a row that is already in trained-slot order
    pub fn predict_aligned(&self, aligned: &AlignedVector) -> Result<Prediction> {
        self.snapshot().score(aligned)
    }

    /// Score every request against one model snapshot, in input order
    pub fn predict_batch<'a, I>(&self, requests: I, policy: BatchPolicy) -> Result<Vec<Result<Prediction>>>
    where
        I: IntoIterator<Item = &'a C>,
        C: 'a,
    {
        let snapshot = self.snapshot();
        let mut results = Vec::new();
        for (row, request) in requests.into_iter().enumerate() {
            let result = snapshot
                .score(&snapshot.table.fill(request))
                .map_err(|e| e.at_row(row));
            match (policy, result) {
                (BatchPolicy::FailBatch, Err(e)) => return Err(e),
                (_, result) => results.push(result),
            }
        }
        Ok(results)
    }

    /// Prediction wrapped in a JSON object under the configured output name
    pub fn respond(&self, request: &C) -> Result<Value> {
        let prediction = self.predict(request)?;
        let value =
            serde_json::to_value(&prediction).map_err(|e| Error::Serialization(e.to_string()))?;
        let mut response = Map::new();
        response.insert(self.config.output.clone(), value);
        Ok(Value::Object(response))
    }
}
