#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]
#![allow(clippy::cast_precision_loss, clippy::module_name_repetitions)]

//! Housing value estimator: shared feature pipeline, candidate estimators,
//! model selection, persisted artifacts and inference.

/// Raw inputs and the derived eleven-field feature vector.
#[path = "../features.rs"]
pub mod features;

/// CSV dataset loading and synthetic data.
#[path = "../dataloader.rs"]
pub mod dataloader;

/// Median imputation and standard scaling.
#[path = "../preprocess.rs"]
pub mod preprocess;

/// Classical ML pipeline.
#[path = "../ML/main.rs"]
pub mod classical_ml;

/// Training configuration.
#[path = "../config.rs"]
pub mod config;

/// Persisted model artifact.
#[path = "../artifact.rs"]
pub mod artifact;

/// Input surface ranges and validation.
#[path = "../input.rs"]
pub mod input;

/// Serving-side prediction.
#[path = "../inference.rs"]
pub mod inference;

/// Telemetry helpers for structured logging.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// Library error type for training runs.
#[path = "../error.rs"]
pub mod error;

/// High-level training entry point.
#[path = "../main.rs"]
pub mod orchestration_entry;

pub use artifact::{ArtifactError, ModelArtifact, ARTIFACT_SCHEMA_VERSION};
pub use classical_ml::{
    estimator::{Estimator, FitError, ModelKind, Regressor},
    reporter::{CandidateReport, EvaluationMetrics, TrainingReport},
    ClassicalMlPipeline,
};
pub use config::{ConfigError, ForestConfig, TrainingConfig, TreeConfig};
pub use dataloader::{DatasetError, HousingDataset, LabeledRecord};
pub use error::LearningError;
pub use features::{derive, FeatureError, FeatureVector, RawRecord, FEATURE_NAMES};
pub use inference::{format_currency, InferenceError, Prediction, Predictor};
pub use input::{HousingInputs, InputError, InputField, INPUT_FIELDS};
pub use orchestration_entry::TrainingRuntime;
pub use preprocess::{PreprocessError, Preprocessor};
pub use telemetry::{LearningTelemetry, LearningTelemetryBuilder};
