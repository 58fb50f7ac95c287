//! Persisted model artifact: estimator, preprocessing parameters and the
//! evaluation that selected them.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    classical_ml::{estimator::Estimator, reporter::TrainingReport},
    features::{FEATURE_NAMES, TARGET_UNIT},
    preprocess::Preprocessor,
};

/// Layout version written by this build.
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

/// Errors raised while persisting or loading an artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// No file at the requested path.
    #[error("model artifact not found at {0}")]
    Missing(PathBuf),
    /// Filesystem failure.
    #[error("artifact I/O on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying failure.
        source: std::io::Error,
    },
    /// Malformed JSON.
    #[error("artifact {path} is not valid: {source}")]
    Json {
        /// File involved.
        path: PathBuf,
        /// Decoder failure.
        source: serde_json::Error,
    },
    /// Written by an incompatible build.
    #[error("artifact schema version {found} is not supported (expected {expected})")]
    SchemaVersion {
        /// Version in the file.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },
    /// Stored feature order differs from the compiled one.
    #[error("artifact feature order {found:?} does not match {expected:?}")]
    FeatureMismatch {
        /// Names in the file.
        found: Vec<String>,
        /// Names this build derives.
        expected: Vec<String>,
    },
}

/// Fitted estimator plus everything needed to reproduce its inputs.
///
/// Built once by training, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    schema_version: u32,
    run_id: Uuid,
    created_at: DateTime<Utc>,
    feature_names: Vec<String>,
    target_unit: f64,
    preprocessor: Preprocessor,
    model: Estimator,
    report: TrainingReport,
}

impl ModelArtifact {
    /// Bundles a freshly fitted pipeline.
    #[must_use]
    pub fn new(
        run_id: Uuid,
        preprocessor: Preprocessor,
        model: Estimator,
        report: TrainingReport,
    ) -> Self {
        Self {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            run_id,
            created_at: Utc::now(),
            feature_names: FEATURE_NAMES.iter().map(|name| (*name).to_string()).collect(),
            target_unit: TARGET_UNIT,
            preprocessor,
            model,
            report,
        }
    }

    /// Writes the artifact as JSON via a sibling temp file and a rename, so a
    /// reader never observes a partial file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ArtifactError> {
        let path = path.as_ref();
        let io_err = |source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = path.with_extension("json.tmp");
        let written = self
            .write_json(&tmp)
            .and_then(|()| fs::rename(&tmp, path).map_err(io_err));
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written
    }

    fn write_json(&self, tmp: &Path) -> Result<(), ArtifactError> {
        let io_err = |source| ArtifactError::Io {
            path: tmp.to_path_buf(),
            source,
        };
        let mut writer = BufWriter::new(File::create(tmp).map_err(io_err)?);
        serde_json::to_writer(&mut writer, self).map_err(|source| ArtifactError::Json {
            path: tmp.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(io_err)
    }

    /// Reads and validates an artifact.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ArtifactError::Missing(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: Self =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| ArtifactError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        artifact.validate()?;
        Ok(artifact)
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.schema_version != ARTIFACT_SCHEMA_VERSION {
            return Err(ArtifactError::SchemaVersion {
                found: self.schema_version,
                expected: ARTIFACT_SCHEMA_VERSION,
            });
        }
        if !self.feature_names.iter().map(String::as_str).eq(FEATURE_NAMES) {
            return Err(ArtifactError::FeatureMismatch {
                found: self.feature_names.clone(),
                expected: FEATURE_NAMES.iter().map(|name| (*name).to_string()).collect(),
            });
        }
        Ok(())
    }

    /// Layout version.
    #[must_use]
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Training run that produced the artifact.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Feature order the estimator was fit on.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Multiplier turning a raw prediction into dollars.
    #[must_use]
    pub const fn target_unit(&self) -> f64 {
        self.target_unit
    }

    /// Persisted imputer and scaler.
    #[must_use]
    pub const fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// Selected estimator.
    #[must_use]
    pub const fn model(&self) -> &Estimator {
        &self.model
    }

    /// Evaluation of every candidate.
    #[must_use]
    pub const fn report(&self) -> &TrainingReport {
        &self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classical_ml::{estimator::ModelKind, ClassicalMlPipeline},
        config::TrainingConfig,
        dataloader::HousingDataset,
    };
    use serde_json::Value;
    use tempfile::tempdir;

    fn linear_artifact() -> ModelArtifact {
        let config = TrainingConfig {
            candidates: vec![ModelKind::LinearRegression],
            ..TrainingConfig::fast()
        };
        ClassicalMlPipeline::default()
            .run(&HousingDataset::synthetic(60, 4), &config)
            .unwrap()
    }

    fn rewrite(path: &Path, edit: impl FnOnce(&mut Value)) {
        let mut doc: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        edit(&mut doc);
        fs::write(path, serde_json::to_string(&doc).unwrap()).unwrap();
    }

    #[test]
    fn save_is_atomic_and_loadable() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("best_model.json");
        let artifact = linear_artifact();
        artifact.save(&path).unwrap();

        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("best_model.json")]);

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.run_id(), artifact.run_id());
        assert_eq!(loaded.preprocessor(), artifact.preprocessor());
        assert_eq!(loaded.report(), artifact.report());
        assert_eq!(loaded.target_unit(), TARGET_UNIT);
        assert_eq!(loaded.schema_version(), ARTIFACT_SCHEMA_VERSION);
        assert_eq!(loaded.feature_names().len(), FEATURE_NAMES.len());
    }

    #[test]
    fn failed_save_leaves_no_temp_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("best_model.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), "x").unwrap();

        let err = linear_artifact().save(&path).unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));
        assert!(!tmp.path().join("best_model.json.tmp").exists());
        assert!(path.join("occupied").exists());
    }

    #[test]
    fn missing_file_is_reported() {
        let tmp = tempdir().unwrap();
        assert!(matches!(
            ModelArtifact::load(tmp.path().join("absent.json")),
            Err(ArtifactError::Missing(_))
        ));
    }

    #[test]
    fn rejects_foreign_schema_and_feature_order() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("model.json");
        linear_artifact().save(&path).unwrap();

        rewrite(&path, |doc| doc["schema_version"] = Value::from(99));
        assert!(matches!(
            ModelArtifact::load(&path),
            Err(ArtifactError::SchemaVersion { found: 99, .. })
        ));

        rewrite(&path, |doc| {
            doc["schema_version"] = Value::from(ARTIFACT_SCHEMA_VERSION);
            let names = doc["feature_names"].as_array_mut().unwrap();
            names.swap(8, 9);
        });
        assert!(matches!(
            ModelArtifact::load(&path),
            Err(ArtifactError::FeatureMismatch { .. })
        ));
    }

    #[test]
    fn garbage_is_a_json_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("model.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ModelArtifact::load(&path), Err(ArtifactError::Json { .. })));
    }
}
