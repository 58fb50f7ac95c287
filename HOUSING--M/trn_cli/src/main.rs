use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local, Utc};
use clap::{Args, Parser, Subcommand};
use housing_learning::{
    HousingDataset, HousingInputs, LearningTelemetry, ModelArtifact, ModelKind, Predictor,
    TrainingConfig, TrainingRuntime, INPUT_FIELDS,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_logging::{JsonLogger, LogLevel, LogRecord};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "trn", version, about = "Housing value estimator training CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Trains every candidate, selects the best and writes the artifact.
    Train(TrainArgs),
    /// Scores a persisted artifact on a labeled CSV.
    Evaluate {
        #[arg(long)]
        artifact: PathBuf,
        #[arg(long)]
        dataset: PathBuf,
    },
    /// One-shot prediction; omitted fields take the form defaults.
    Predict(PredictArgs),
    /// Prints artifact metadata and the candidate report.
    Inspect {
        #[arg(long)]
        artifact: PathBuf,
    },
    /// Lists most recent training runs.
    Runs {
        /// Number of entries to display.
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Training config whose `manifest` is listed.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Manifest path; overrides the config.
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
struct TrainArgs {
    /// TOML config; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    dataset: Option<PathBuf>,
    #[arg(long)]
    artifact: Option<PathBuf>,
    #[arg(long)]
    test_ratio: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,
    /// Comma separated candidate list, e.g. `linear_regression,random_forest`.
    #[arg(long, value_delimiter = ',')]
    models: Option<Vec<ModelKind>>,
    #[arg(long)]
    n_estimators: Option<usize>,
    /// Depth limit applied to the tree and every forest tree.
    #[arg(long)]
    max_depth: Option<usize>,
    #[arg(long)]
    log_dir: Option<PathBuf>,
    #[arg(long)]
    log_level: Option<String>,
    #[arg(long)]
    manifest: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PredictArgs {
    #[arg(long)]
    artifact: PathBuf,
    #[arg(long)]
    med_inc: Option<f64>,
    #[arg(long)]
    house_age: Option<f64>,
    #[arg(long)]
    ave_rooms: Option<f64>,
    #[arg(long)]
    ave_bedrms: Option<f64>,
    #[arg(long)]
    population: Option<f64>,
    #[arg(long)]
    ave_occup: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    latitude: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    longitude: Option<f64>,
    /// Print the full prediction as JSON.
    #[arg(long)]
    json: bool,
}

impl PredictArgs {
    fn inputs(&self) -> HousingInputs {
        let overrides = [
            self.med_inc,
            self.house_age,
            self.ave_rooms,
            self.ave_bedrms,
            self.population,
            self.ave_occup,
            self.latitude,
            self.longitude,
        ];
        let mut values = HousingInputs::default().values();
        for (value, given) in values.iter_mut().zip(overrides) {
            if let Some(given) = given {
                *value = given;
            }
        }
        HousingInputs::from_values(values)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct RunManifestEntry {
    run_id: Uuid,
    submitted_at: DateTime<Utc>,
    config: Option<PathBuf>,
    dataset: PathBuf,
    artifact: PathBuf,
    log_path: Option<PathBuf>,
    status: String,
    #[serde(default)]
    selected: Option<ModelKind>,
    #[serde(default)]
    rmse: Option<f64>,
    #[serde(default)]
    mae: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

impl RunManifestEntry {
    fn new(
        run_id: Uuid,
        config_path: Option<PathBuf>,
        config: &TrainingConfig,
        log_path: Option<PathBuf>,
    ) -> Self {
        Self {
            run_id,
            submitted_at: Utc::now(),
            config: config_path,
            dataset: config.dataset.clone(),
            artifact: config.artifact.clone(),
            log_path,
            status: "running".into(),
            selected: None,
            rmse: None,
            mae: None,
            error: None,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Train(args) => handle_train(args),
        Commands::Evaluate { artifact, dataset } => handle_evaluate(&artifact, &dataset),
        Commands::Predict(args) => handle_predict(&args),
        Commands::Inspect { artifact } => handle_inspect(&artifact),
        Commands::Runs {
            limit,
            config,
            manifest,
        } => {
            let manifest = resolve_manifest(config.as_deref(), manifest)?;
            let entries = read_manifest(&manifest)?;
            for entry in entries.into_iter().rev().take(limit) {
                println!(
                    "{} | {} | {} | {} | rmse={}",
                    entry.run_id,
                    entry.submitted_at,
                    entry.status,
                    entry.selected.map_or_else(|| "-".to_string(), |kind| kind.to_string()),
                    entry.rmse.map_or_else(|| "-".to_string(), |rmse| format!("{rmse:.4}")),
                );
            }
            Ok(())
        }
    }
}

fn resolve_config(args: &TrainArgs) -> Result<TrainingConfig> {
    let mut config = match &args.config {
        Some(path) => TrainingConfig::load(path)?,
        None => TrainingConfig::default(),
    };
    if let Some(dataset) = &args.dataset {
        config.dataset.clone_from(dataset);
    }
    if let Some(artifact) = &args.artifact {
        config.artifact.clone_from(artifact);
    }
    if let Some(ratio) = args.test_ratio {
        config.test_ratio = ratio;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(models) = &args.models {
        config.candidates.clone_from(models);
    }
    if let Some(n_estimators) = args.n_estimators {
        config.forest.n_estimators = n_estimators;
    }
    if let Some(depth) = args.max_depth {
        config.tree.max_depth = Some(depth);
        config.forest.max_depth = Some(depth);
    }
    if let Some(log_dir) = &args.log_dir {
        config.log_dir = Some(log_dir.clone());
    }
    if let Some(level) = &args.log_level {
        config.log_level.clone_from(level);
    }
    if let Some(manifest) = &args.manifest {
        config.manifest.clone_from(manifest);
    }
    config.validate()?;
    Ok(config)
}

/// Same manifest `train` writes for the given config.
fn resolve_manifest(config: Option<&Path>, manifest: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(manifest) = manifest {
        return Ok(manifest);
    }
    let config = match config {
        Some(path) => TrainingConfig::load(path)?,
        None => TrainingConfig::default(),
    };
    Ok(config.manifest)
}

fn handle_train(args: TrainArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let run_id = Uuid::new_v4();
    let log_path = config
        .log_dir
        .as_deref()
        .map(|dir| compute_log_path(dir, run_id))
        .transpose()?;

    let mut telemetry = LearningTelemetry::builder("trn")
        .run_id(run_id)
        .min_level(config.min_log_level()?);
    if let Some(path) = &log_path {
        telemetry = telemetry.log_path(path);
    }
    let telemetry = telemetry.build()?;

    let mut entry = RunManifestEntry::new(run_id, args.config.clone(), &config, log_path.clone());
    append_manifest(&config.manifest, &entry)?;
    if let Some(path) = &log_path {
        log_run_event(path, LogLevel::Info, "run started", json!({ "run_id": run_id }))?;
    }

    let runtime = TrainingRuntime::new(config.clone())?.with_telemetry(telemetry);
    match runtime.run() {
        Ok(artifact) => {
            let report = artifact.report();
            let metrics = report.selected_metrics();
            entry.status = "completed".into();
            entry.selected = Some(report.selected);
            entry.rmse = metrics.map(|m| m.rmse);
            entry.mae = metrics.map(|m| m.mae);
            update_entry(&config.manifest, &entry)?;
            println!("{}", report.summary());
            println!("artifact written to {}", config.artifact.display());
            Ok(())
        }
        Err(err) => {
            entry.status = "failed".into();
            entry.error = Some(err.to_string());
            update_entry(&config.manifest, &entry)?;
            if let Some(path) = &log_path {
                log_run_event(
                    path,
                    LogLevel::Error,
                    "run failed",
                    json!({ "run_id": run_id, "error": err.to_string() }),
                )?;
            }
            Err(err).context("training run failed")
        }
    }
}

fn handle_evaluate(artifact: &Path, dataset: &Path) -> Result<()> {
    let predictor = Predictor::load(artifact)?;
    let dataset = HousingDataset::load_csv(dataset)?;
    let (metrics, skipped) = predictor.evaluate(&dataset);
    let summary = json!({
        "run_id": predictor.artifact().run_id(),
        "model": predictor.artifact().model().kind(),
        "records": dataset.len(),
        "skipped": skipped,
        "dropped_rows": dataset.dropped_rows,
        "rmse": metrics.rmse,
        "mae": metrics.mae,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn handle_predict(args: &PredictArgs) -> Result<()> {
    let predictor = Predictor::load(&args.artifact)?;
    let prediction = predictor
        .predict_inputs(&args.inputs())
        .context("rejecting input")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        println!("Predicted median house value: {}", prediction.formatted);
    }
    Ok(())
}

fn handle_inspect(path: &Path) -> Result<()> {
    let artifact = ModelArtifact::load(path)?;
    println!("{}", serde_json::to_string_pretty(&inspect_summary(&artifact))?);
    println!("{}", artifact.report().summary());
    Ok(())
}

fn inspect_summary(artifact: &ModelArtifact) -> Value {
    let preprocessor = artifact.preprocessor();
    let features: Vec<Value> = artifact
        .feature_names()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            json!({
                "name": name,
                "median": preprocessor.imputer().medians()[idx],
                "mean": preprocessor.scaler().means()[idx],
                "scale": preprocessor.scaler().scales()[idx],
            })
        })
        .collect();
    json!({
        "schema_version": artifact.schema_version(),
        "run_id": artifact.run_id(),
        "created_at": artifact.created_at(),
        "model": artifact.model().kind(),
        "target_unit": artifact.target_unit(),
        "inputs": INPUT_FIELDS.iter().map(|field| field.key).collect::<Vec<_>>(),
        "features": features,
    })
}

fn append_manifest(path: &Path, entry: &RunManifestEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening manifest {}", path.display()))?;
    serde_json::to_writer(&mut file, entry)?;
    file.write_all(b"\n")?;
    Ok(())
}

fn read_manifest(path: &Path) -> Result<Vec<RunManifestEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: RunManifestEntry = serde_json::from_str(&line)
            .with_context(|| format!("parsing manifest {}", path.display()))?;
        entries.push(entry);
    }
    Ok(entries)
}

fn update_entry(path: &Path, updated: &RunManifestEntry) -> Result<()> {
    let mut entries = read_manifest(path)?;
    let Some(slot) = entries.iter_mut().find(|entry| entry.run_id == updated.run_id) else {
        return append_manifest(path, updated);
    };
    *slot = updated.clone();
    let mut file = File::create(path)?;
    for entry in entries {
        serde_json::to_writer(&mut file, &entry)?;
        file.write_all(b"\n")?;
    }
    Ok(())
}

fn compute_log_path(base: &Path, run_id: Uuid) -> Result<PathBuf> {
    let now = Local::now();
    let dir = base
        .join(format!("{:04}", now.year()))
        .join(format!("{:02}", now.month()))
        .join(format!("{:02}", now.day()));
    fs::create_dir_all(&dir)?;
    Ok(dir.join(format!(
        "run-{}-{}.log.jsonl",
        Utc::now().format("%Y%m%d-%H%M%S"),
        run_id.simple()
    )))
}

fn log_run_event(path: &Path, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
    let logger = JsonLogger::new(path)?;
    logger.log(&LogRecord::new("trn", level, message).with_metadata(metadata))
}
