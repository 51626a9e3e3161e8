// Integration tests for ModelBridge
use modelbridge_core::{
    AlignedVector, AlignmentTable, Algorithm, BatchPolicy, BindingSet, Error, Feature,
    FeatureSchema, ImputeOption, IndexMap, ModelArtifact, Predictor,
};
use modelbridge_pipeline::{ModelBuilder, TrainingConfig};
use modelbridge_serving::{EndpointConfig, Prediction, PredictionEndpoint};
use modelbridge_storage::{
    codec, FileStorage, MemoryStorage, ModelRepository, RegistryStorage, StorageKind,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

type Request = HashMap<String, String>;

fn field(name: &'static str) -> impl Fn(&Request) -> Option<String> + Send + Sync {
    move |req| req.get(name).cloned()
}

fn four_column_schema() -> FeatureSchema {
    FeatureSchema::new(vec![
        Feature::numerical("age", 0),
        Feature::numerical("income", 1),
        Feature::categorical("zipcode", 2).excluded(),
        Feature::numerical("target", 3),
    ])
}

fn four_column_data() -> String {
    let mut text = String::from("age,income,zipcode,target\n");
    for i in 0..60 {
        let age = 18 + i % 45;
        let income = 900 + 40 * (i % 11);
        let target = 0.5 * age as f64 + 0.01 * income as f64;
        text.push_str(&format!("{},{},9{:04},{}\n", age, income, i, target));
    }
    text
}

fn train_linear() -> ModelArtifact {
    let config = TrainingConfig::new(four_column_schema(), Algorithm::LinearRegression)
        .with_response("target");
    ModelBuilder::new(config)
        .unwrap()
        .build(&four_column_data())
        .unwrap()
        .artifact
}

fn train_anomaly() -> ModelArtifact {
    let schema = FeatureSchema::new(vec![Feature::numerical("x", 0), Feature::numerical("y", 1)]);
    let mut text = String::from("x,y\n");
    for i in 0..50 {
        let x = (i % 5) as f64 * 0.1;
        let y = (i % 7) as f64 * 0.1;
        text.push_str(&format!("{},{}\n", x, y));
    }
    let config = TrainingConfig::new(schema, Algorithm::AnomalyDetection).with_hyper("num_clusters", 1);
    ModelBuilder::new(config).unwrap().build(&text).unwrap().artifact
}

fn train_colors() -> ModelArtifact {
    let schema = FeatureSchema::new(vec![
        Feature::categorical("color", 0),
        Feature::numerical("size", 1),
    ]);
    let mut text = String::from("color,size\n");
    for (i, color) in ["red", "green", "blue"].iter().cycle().take(30).enumerate() {
        text.push_str(&format!("{},{}\n", color, i % 4));
    }
    let config = TrainingConfig::new(schema, Algorithm::KMeans).with_hyper("num_clusters", 2);
    ModelBuilder::new(config).unwrap().build(&text).unwrap().artifact
}

fn memory_repository() -> Arc<ModelRepository> {
    Arc::new(ModelRepository::new().with_adapter(StorageKind::Memory, Arc::new(MemoryStorage::new())))
}

#[test]
fn test_index_map_is_sorted_and_unique() {
    let schema = FeatureSchema::new(vec![
        Feature::numerical("a", 0),
        Feature::categorical("b", 1).excluded(),
        Feature::numerical("c", 2).with_impute(ImputeOption::Discard),
        Feature::numerical("d", 3),
        Feature::categorical("e", 4),
        Feature::numerical("f", 5),
    ]);
    let map = IndexMap::from_schema(&schema, Some(3)).unwrap();

    let included = schema
        .features
        .iter()
        .filter(|f| f.include && f.index != 3)
        .count();
    assert_eq!(map.width(), included);
    assert_eq!(map.as_slice(), &[0, 2, 4, 5]);
    assert!(map.as_slice().windows(2).all(|w| w[0] < w[1]));
    for (slot, &original) in map.as_slice().iter().enumerate() {
        assert_eq!(map.position_of(original), Some(slot));
    }
    assert_eq!(map.position_of(3), None);
}

#[test]
fn test_artifact_roundtrip_through_every_adapter() {
    let artifact = train_linear();
    let dir = TempDir::new().unwrap();

    let repository = ModelRepository::new()
        .with_adapter(StorageKind::File, Arc::new(FileStorage::with_root(dir.path().join("files"))))
        .with_adapter(
            StorageKind::Registry,
            Arc::new(RegistryStorage::open(dir.path().join("registry")).unwrap()),
        )
        .with_adapter(StorageKind::Memory, Arc::new(MemoryStorage::new()));

    for key in ["file:models/linear.mbm", "registry:ml/linear", "memory:linear"] {
        let stored = repository.store(key, &artifact).unwrap();
        let loaded = repository.load(&stored, false).unwrap();
        assert_eq!(*loaded, artifact, "round trip through {}", key);
    }

    let bytes = codec::encode(&artifact).unwrap();
    assert_eq!(codec::encode(&codec::decode(&bytes).unwrap()).unwrap(), bytes);
}

#[test]
fn test_alignment_is_deterministic() {
    let artifact = train_linear();
    let forward = BindingSet::<Request>::new()
        .bind("age", field("age"))
        .bind("income", field("income"));
    let backward = BindingSet::<Request>::new()
        .bind("income", field("income"))
        .bind("age", field("age"));

    let a = AlignmentTable::bind(&artifact.features, &artifact.index_map, &forward);
    let b = AlignmentTable::bind(&artifact.features, &artifact.index_map, &backward);
    assert_eq!(a.layout(), b.layout());
    assert_eq!(a.layout(), vec![Some("age"), Some("income")]);

    let request = Request::from([
        ("age".to_string(), "33".to_string()),
        ("income".to_string(), "1200".to_string()),
    ]);
    assert_eq!(a.fill(&request), b.fill(&request));
}

#[test]
fn test_extra_and_missing_bindings_are_tolerated() {
    let artifact = Arc::new(train_linear());
    let bindings = BindingSet::<Request>::new()
        .bind("age", |req: &Request| req.get("age").cloned())
        .bind("nickname", |req: &Request| req.get("nickname").cloned())
        .bind("target", |_: &Request| Some("999".to_string()));
    let table = AlignmentTable::bind(&artifact.features, &artifact.index_map, &bindings);
    assert_eq!(table.layout(), vec![Some("age"), None]);
    assert_eq!(table.unbound_slots(), vec![1]);

    let request = Request::from([
        ("age".to_string(), "40".to_string()),
        ("nickname".to_string(), "bob".to_string()),
    ]);
    let predictor = Predictor::new(Arc::clone(&artifact));
    let partial = predictor.predict(&table.fill(&request)).unwrap();

    let mean_income = artifact.summary.slot_means[1];
    let full = predictor
        .predict(&AlignedVector::from_values(["40".to_string(), mean_income.to_string()]))
        .unwrap();
    assert!((partial.value - full.value).abs() < 1e-9);
}

#[test]
fn test_percentile_bounds() {
    let predictor = Predictor::new(Arc::new(train_anomaly()));

    for bad in [0.0, -5.0, 100.5, 101.0, f64::NAN] {
        assert!(
            matches!(predictor.classify(1.0, bad), Err(Error::Configuration(_))),
            "percentile {} accepted",
            bad
        );
    }
    let decision = predictor.classify(1.0, 100.0).unwrap();
    let max = *predictor.artifact().summary.training_scores.last().unwrap();
    assert_eq!(decision.threshold, max);
    assert!(decision.is_anomaly);
    assert!(!predictor.classify(max, 100.0).unwrap().is_anomaly);
}

#[test]
fn test_four_column_scenario_end_to_end() {
    let dir = TempDir::new().unwrap();
    let artifact = train_linear();
    assert_eq!(artifact.index_map.as_slice(), &[0, 1]);

    let repository = Arc::new(
        ModelRepository::new()
            .with_adapter(StorageKind::File, Arc::new(FileStorage::with_root(dir.path()))),
    );
    let location = repository.store("file:churn.mbm", &artifact).unwrap();

    let config = EndpointConfig::from_json_str(&format!(
        r#"{{
            "model": "{}",
            "features": [
                {{"name": "zipcode", "expression": "/zip"}},
                {{"name": "age", "expression": "customer.age"}}
            ],
            "output": "target"
        }}"#,
        location
    ))
    .unwrap();
    let endpoint = PredictionEndpoint::open_json(config, Arc::clone(&repository)).unwrap();
    assert_eq!(endpoint.layout(), vec![Some("age".to_string()), None]);

    let request = json!({"customer": {"age": 30}, "zip": "90001"});
    let prediction = endpoint.predict(&request).unwrap();

    let mean_income = artifact.summary.slot_means[1];
    let expected = 0.5 * 30.0 + 0.01 * mean_income;
    assert!(
        (prediction.value() - expected).abs() < 0.1,
        "predicted {} expected {}",
        prediction.value(),
        expected
    );

    let response = endpoint.respond(&request).unwrap();
    assert!(response["target"]["value"].is_f64());
}

#[test]
fn test_unseen_category_is_rejected() {
    let artifact = Arc::new(train_colors());
    let frozen = artifact.encodings.freeze();
    assert_eq!(frozen.encode(0, "color", "red").unwrap(), 0);
    assert_eq!(frozen.encode(0, "color", "green").unwrap(), 1);
    assert_eq!(frozen.encode(0, "color", "blue").unwrap(), 2);

    let predictor = Predictor::new(artifact);
    assert!(predictor
        .predict(&AlignedVector::from_values(["blue", "2"]))
        .is_ok());

    let err = predictor
        .predict(&AlignedVector::from_values(["purple", "2"]))
        .unwrap_err();
    match err {
        Error::UnseenCategory { feature, value, .. } => {
            assert_eq!(feature, "color");
            assert_eq!(value, "purple");
        }
        other => panic!("unexpected error {:?}", other),
    }

    let rows = vec![
        AlignedVector::from_values(["red", "1"]),
        AlignedVector::from_values(["purple", "1"]),
    ];
    let err = predictor
        .predict_batch(&rows, BatchPolicy::FailBatch)
        .unwrap_err();
    assert!(err.to_string().ends_with("in row 1"));
}

#[test]
fn test_concurrent_refresh_is_atomic() {
    let repository = memory_repository();
    let first = train_linear();
    let second = train_anomaly();
    repository.store("memory:model", &first).unwrap();
    repository.load("memory:model", false).unwrap();

    std::thread::scope(|scope| {
        for reader in 0..4 {
            let repository = Arc::clone(&repository);
            let (first, second) = (&first, &second);
            scope.spawn(move || {
                for i in 0..200 {
                    let force = (i + reader) % 17 == 0;
                    let loaded = repository.load("memory:model", force).unwrap();
                    assert!(*loaded == *first || *loaded == *second);
                    loaded.validate().unwrap();
                }
            });
        }

        let repository = Arc::clone(&repository);
        let (first, second) = (&first, &second);
        scope.spawn(move || {
            for i in 0..50 {
                let next = if i % 2 == 0 { second } else { first };
                repository.store("memory:model", next).unwrap();
            }
        });
    });
}

#[test]
fn test_endpoint_refresh_under_load() {
    let repository = memory_repository();
    let first = train_linear();
    let mut second = first.clone();
    if let modelbridge_core::ModelParams::LinearRegression(model) = &mut second.params {
        model.intercept += 100.0;
    }
    repository.store("memory:churn", &first).unwrap();

    let config = EndpointConfig::new("memory:churn")
        .with_feature("age", "age")
        .with_feature("income", "income");
    let endpoint = PredictionEndpoint::open_json(config, Arc::clone(&repository)).unwrap();
    let request = json!({"age": 40, "income": 1000});
    let low = endpoint.predict(&request).unwrap().value();
    let high = low + 100.0;

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..200 {
                    let value = endpoint.predict(&request).unwrap().value();
                    assert!((value - low).abs() < 1e-9 || (value - high).abs() < 1e-9);
                }
            });
        }
        scope.spawn(|| {
            for i in 0..20 {
                let next = if i % 2 == 0 { &second } else { &first };
                repository.store("memory:churn", next).unwrap();
                endpoint.refresh(false).unwrap();
            }
        });
    });
}

#[test]
fn test_registry_versions_and_pinning() {
    let dir = TempDir::new().unwrap();
    let repository = ModelRepository::new().with_adapter(
        StorageKind::Registry,
        Arc::new(RegistryStorage::open(dir.path()).unwrap()),
    );
    let first = train_linear();
    let second = train_anomaly();

    assert_eq!(
        repository.store("registry:ml/model", &first).unwrap(),
        "registry:ml/model@1"
    );
    assert_eq!(
        repository
            .store("registry:/_system/governance/ml/model", &second)
            .unwrap(),
        "registry:ml/model@2"
    );

    assert_eq!(*repository.load("registry:ml/model", false).unwrap(), second);
    assert_eq!(*repository.load("registry:ml/model@1", false).unwrap(), first);
    assert!(matches!(
        repository.load("registry:ml/model@3", false),
        Err(Error::ModelLoad { .. })
    ));
}

#[test]
fn test_training_config_from_json() {
    let config = TrainingConfig::from_json_str(
        r#"{
            "schema": {"features": [
                {"name": "x", "index": 0, "type": "numerical"},
                {"name": "y", "index": 1, "type": "numerical"}
            ]},
            "algorithm": "ANOMALY_DETECTION",
            "hyper_parameters": {"num_clusters": 1, "min_percentile": 50},
            "train_fraction": 0.8,
            "seed": 7
        }"#,
    )
    .unwrap();
    let mut text = String::from("x,y\n");
    for i in 0..20 {
        text.push_str(&format!("{},{}\n", i % 4, i % 3));
    }
    let trained = ModelBuilder::new(config).unwrap().build(&text).unwrap();
    assert_eq!(trained.summary.train_rows, 16);
    assert_eq!(trained.summary.test_rows, 4);
    assert_eq!(trained.artifact.summary.min_percentile, Some(50));
    assert_eq!(trained.artifact.summary.training_scores.len(), 16);

    let endpoint_repo = memory_repository();
    endpoint_repo.store("memory:a", &trained.artifact).unwrap();
    let mut endpoint = EndpointConfig::new("memory:a").with_feature("x", "x");
    endpoint.anomaly_detection = Some(true);
    let endpoint = PredictionEndpoint::open_json(endpoint, endpoint_repo).unwrap();
    match endpoint.predict(&json!({"x": 100, "y": 100})).unwrap() {
        Prediction::Anomaly(decision) => assert!(decision.is_anomaly),
        other => panic!("expected an anomaly decision, got {:?}", other),
    }
}
