use anyhow::Context;
use clap::{Parser, Subcommand};
use modelbridge_core::ModelArtifact;
use modelbridge_pipeline::{ModelBuilder, TrainingConfig};
use modelbridge_serving::{EndpointConfig, PredictionEndpoint};
use modelbridge_storage::{ModelRepository, RegistryStorage, StorageKind};
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Train tabular models and serve predictions against them
#[derive(Parser, Debug)]
#[command(name = "modelbridge")]
#[command(about = "Train models and serve predictions with aligned features", long_about = None)]
struct Args {
    /// Directory of the versioned model registry (enables `registry:` locations)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model from a delimited dataset and store the artifact
    Train {
        /// Dataset file
        #[arg(short, long)]
        data: PathBuf,

        /// Training configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Location to store the model at, e.g. `file:models/churn.mbm`
        #[arg(short, long)]
        out: String,
    },

    /// Score newline-delimited JSON requests, one response line per request
    Predict {
        /// Endpoint configuration (JSON)
        #[arg(short, long)]
        endpoint: PathBuf,

        /// Request file, `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Stop at the first failing request instead of reporting it inline
        #[arg(long)]
        fail_fast: bool,
    },

    /// Print the schema, slot order and training summary of a stored model
    Inspect {
        /// Model location
        #[arg(short, long)]
        model: String,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries command output
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut repository = ModelRepository::with_defaults();
    if let Some(dir) = &args.registry {
        let registry = RegistryStorage::open(dir)
            .with_context(|| format!("opening model registry at {}", dir.display()))?;
        repository.register(StorageKind::Registry, Arc::new(registry));
        info!("Model registry: {:?}", dir);
    }
    let repository = Arc::new(repository);

    match args.command {
        Command::Train { data, config, out } => train(&repository, &data, &config, &out),
        Command::Predict {
            endpoint,
            input,
            fail_fast,
        } => predict(repository, &endpoint, &input, fail_fast),
        Command::Inspect { model } => inspect(&repository, &model),
    }
}

fn train(
    repository: &ModelRepository,
    data: &Path,
    config: &Path,
    out: &str,
) -> anyhow::Result<()> {
    let config = TrainingConfig::from_json_file(config)?;
    let trained = ModelBuilder::new(config)?
        .build_from_path(data)
        .with_context(|| format!("training on {}", data.display()))?;
    let stored = repository.store(out, &trained.artifact)?;

    let report = json!({
        "location": stored,
        "model_id": trained.artifact.model_id,
        "summary": trained.summary,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn predict(
    repository: Arc<ModelRepository>,
    endpoint: &Path,
    input: &str,
    fail_fast: bool,
) -> anyhow::Result<()> {
    let config = EndpointConfig::from_json_file(endpoint)?;
    let endpoint = PredictionEndpoint::open_json(config, repository)?;

    let reader: Box<dyn BufRead> = if input == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let file = std::fs::File::open(input).with_context(|| format!("opening {}", input))?;
        Box::new(BufReader::new(file))
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut failed = 0usize;
    for (row, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = serde_json::from_str::<Value>(&line)
            .map_err(anyhow::Error::from)
            .and_then(|request| endpoint.respond(&request).map_err(anyhow::Error::from));
        match response {
            Ok(response) => writeln!(out, "{}", response)?,
            Err(e) if fail_fast => return Err(e.context(format!("request {}", row))),
            Err(e) => {
                failed += 1;
                writeln!(out, "{}", json!({ "row": row, "error": format!("{:#}", e) }))?;
            }
        }
    }
    if failed > 0 {
        warn!("{} requests failed", failed);
    }
    Ok(())
}

fn inspect(repository: &ModelRepository, model: &str) -> anyhow::Result<()> {
    let artifact = repository.load(model, false)?;
    println!("{}", serde_json::to_string_pretty(&describe(&artifact))?);
    Ok(())
}

fn describe(artifact: &ModelArtifact) -> Value {
    let slots: Vec<Value> = artifact
        .slot_features()
        .iter()
        .enumerate()
        .map(|(slot, feature)| {
            json!({
                "slot": slot,
                "feature": feature.name,
                "original_index": feature.index,
                "type": feature.feature_type,
            })
        })
        .collect();

    json!({
        "model_id": artifact.model_id,
        "created_at": artifact.created_at,
        "format_version": artifact.format_version,
        "algorithm": artifact.algorithm_name,
        "class": artifact.algorithm_class,
        "response_variable": artifact.response_variable,
        "normalization": artifact.normalization,
        "normal_labels": artifact.normal_labels,
        "schema": artifact.features,
        "slots": slots,
        "encodings": artifact.encodings,
        "statistics": artifact.summary.statistics,
        "percentiles": {
            "min": artifact.summary.min_percentile,
            "max": artifact.summary.max_percentile,
            "best": artifact.summary.best_percentile,
        },
    })
}
