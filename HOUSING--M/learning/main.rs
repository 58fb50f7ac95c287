//! Training runtime: load the configured dataset, run the pipeline and
//! persist the selected artifact.

use serde_json::{json, Value};
use shared_logging::LogLevel;

use crate::{
    artifact::ModelArtifact,
    classical_ml::ClassicalMlPipeline,
    config::TrainingConfig,
    dataloader::HousingDataset,
    error::LearningError,
    telemetry::LearningTelemetry,
};

/// One configured training run.
pub struct TrainingRuntime {
    config: TrainingConfig,
    pipeline: ClassicalMlPipeline,
    telemetry: Option<LearningTelemetry>,
}

impl TrainingRuntime {
    /// Creates a runtime; the config is validated here.
    pub fn new(config: TrainingConfig) -> Result<Self, LearningError> {
        config.validate()?;
        Ok(Self {
            config,
            pipeline: ClassicalMlPipeline::default(),
            telemetry: None,
        })
    }

    /// Attaches telemetry sinks for structured logging.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: LearningTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Loads the dataset from `config.dataset`, trains, and writes the
    /// artifact to `config.artifact`.
    pub fn run(&self) -> Result<ModelArtifact, LearningError> {
        self.log(
            LogLevel::Info,
            "training_start",
            json!({
                "dataset": self.config.dataset.display().to_string(),
                "candidates": self.config.candidates,
                "test_ratio": self.config.test_ratio,
                "seed": self.config.seed,
            }),
        );
        let dataset = match HousingDataset::load_csv(&self.config.dataset) {
            Ok(dataset) => dataset,
            Err(err) => {
                self.log(
                    LogLevel::Error,
                    "training_dataset_failed",
                    json!({ "error": err.to_string() }),
                );
                return Err(err.into());
            }
        };
        self.run_on(&dataset)
    }

    /// Trains on an already loaded dataset and writes the artifact.
    pub fn run_on(&self, dataset: &HousingDataset) -> Result<ModelArtifact, LearningError> {
        let artifact = self
            .pipeline
            .run_with_telemetry(dataset, &self.config, self.telemetry.as_ref())?;
        artifact.save(&self.config.artifact)?;
        self.log(
            LogLevel::Info,
            "training_artifact_saved",
            json!({
                "artifact": self.config.artifact.display().to_string(),
                "run_id": artifact.run_id().to_string(),
                "selected": artifact.report().selected,
            }),
        );
        Ok(artifact)
    }

    fn log(&self, level: LogLevel, message: &str, metadata: Value) {
        if let Some(telemetry) = self.telemetry.as_ref() {
            let _ = telemetry.log(level, message, metadata);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{classical_ml::estimator::ModelKind, config::ConfigError};
    use std::fs;
    use tempfile::tempdir;

    fn write_csv(path: &std::path::Path, dataset: &HousingDataset) {
        let mut writer = csv::Writer::from_path(path).unwrap();
        writer
            .write_record([
                "MedInc", "HouseAge", "AveRooms", "AveBedrms", "Population", "AveOccup",
                "Latitude", "Longitude", "MedHouseVal",
            ])
            .unwrap();
        for record in &dataset.records {
            let mut row: Vec<String> = record
                .raw
                .values()
                .iter()
                .map(|value| value.map(|v| v.to_string()).unwrap_or_default())
                .collect();
            row.push(record.target.to_string());
            writer.write_record(&row).unwrap();
        }
        writer.flush().unwrap();
    }

    #[test]
    fn trains_from_csv_and_persists_artifact() {
        let tmp = tempdir().unwrap();
        let csv_path = tmp.path().join("housing.csv");
        write_csv(&csv_path, &HousingDataset::synthetic(120, 8));
        let config = TrainingConfig {
            dataset: csv_path,
            artifact: tmp.path().join("out/best_model.json"),
            candidates: vec![ModelKind::LinearRegression, ModelKind::DecisionTree],
            ..TrainingConfig::fast()
        };
        let telemetry = LearningTelemetry::builder("learning")
            .log_path(tmp.path().join("train.log"))
            .build()
            .unwrap();
        let runtime = TrainingRuntime::new(config).unwrap().with_telemetry(telemetry);
        let artifact = runtime.run().unwrap();

        let reloaded = ModelArtifact::load(&runtime.config().artifact).unwrap();
        assert_eq!(reloaded.run_id(), artifact.run_id());
        let log = fs::read_to_string(tmp.path().join("train.log")).unwrap();
        assert!(log.contains("training_artifact_saved"));
    }

    #[test]
    fn missing_dataset_is_reported() {
        let tmp = tempdir().unwrap();
        let config = TrainingConfig {
            dataset: tmp.path().join("absent.csv"),
            ..TrainingConfig::fast()
        };
        let err = TrainingRuntime::new(config).unwrap().run().unwrap_err();
        assert!(matches!(err, LearningError::Dataset(_)));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = TrainingConfig {
            test_ratio: 0.0,
            ..TrainingConfig::default()
        };
        assert!(matches!(
            TrainingRuntime::new(config),
            Err(LearningError::Config(ConfigError::Invalid(_)))
        ));
    }
}
