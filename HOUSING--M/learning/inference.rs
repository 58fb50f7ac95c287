//! Serving-side pipeline: derive, apply the persisted transform, predict,
//! and render as currency.

use std::{path::Path, sync::Arc};

use ndarray::Array1;
use serde::Serialize;
use thiserror::Error;

use crate::{
    artifact::{ArtifactError, ModelArtifact},
    classical_ml::{
        func::{mae, rmse},
        reporter::EvaluationMetrics,
    },
    dataloader::HousingDataset,
    features::{derive, FeatureError, RawRecord},
    input::{HousingInputs, InputError},
};

/// Failures of a single prediction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    /// Rejected by input validation.
    #[error(transparent)]
    Input(#[from] InputError),
    /// Rejected by feature derivation.
    #[error(transparent)]
    Feature(#[from] FeatureError),
    /// The estimator returned NaN or infinity.
    #[error("model produced a non-finite prediction")]
    NonFinite,
}

/// One rendered prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Model output in units of $100,000.
    pub raw: f64,
    /// Dollar value.
    pub value: f64,
    /// Dollar value rendered like `$206,855.82`.
    pub formatted: String,
}

/// Read-only handle around a loaded artifact; cheap to clone.
#[derive(Debug, Clone)]
pub struct Predictor {
    artifact: Arc<ModelArtifact>,
}

impl Predictor {
    /// Loads and validates the artifact at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        Ok(Self::from_artifact(ModelArtifact::load(path)?))
    }

    /// Wraps an in-memory artifact.
    #[must_use]
    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        Self {
            artifact: Arc::new(artifact),
        }
    }

    /// Underlying artifact.
    #[must_use]
    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Predicts from a raw record; missing fields are imputed with the
    /// persisted medians.
    pub fn predict(&self, raw: &RawRecord) -> Result<Prediction, InferenceError> {
        let raw_value = self.predict_raw(raw)?;
        let value = raw_value * self.artifact.target_unit();
        Ok(Prediction {
            raw: raw_value,
            value,
            formatted: format_currency(value),
        })
    }

    /// Validates form or CLI inputs, then predicts.
    pub fn predict_inputs(&self, inputs: &HousingInputs) -> Result<Prediction, InferenceError> {
        inputs.validate()?;
        self.predict(&inputs.to_raw_record())
    }

    fn predict_raw(&self, raw: &RawRecord) -> Result<f64, InferenceError> {
        let features = derive(raw)?;
        let row = self.artifact.preprocessor().transform(&features);
        let value = self.artifact.model().regressor().predict_row(row.view());
        if value.is_finite() {
            Ok(value)
        } else {
            Err(InferenceError::NonFinite)
        }
    }

    /// Scores the artifact on a labeled dataset. Records rejected by
    /// derivation are skipped; the second value counts them.
    #[must_use]
    pub fn evaluate(&self, dataset: &HousingDataset) -> (EvaluationMetrics, usize) {
        let mut predictions = Vec::with_capacity(dataset.len());
        let mut targets = Vec::with_capacity(dataset.len());
        let mut skipped = 0;
        for record in &dataset.records {
            match self.predict_raw(&record.raw) {
                Ok(value) => {
                    predictions.push(value);
                    targets.push(record.target);
                }
                Err(_) => skipped += 1,
            }
        }
        let predictions = Array1::from(predictions);
        let targets = Array1::from(targets);
        let metrics = EvaluationMetrics {
            rmse: rmse(predictions.view(), targets.view()),
            mae: mae(predictions.view(), targets.view()),
        };
        (metrics, skipped)
    }
}

/// Renders dollars with two decimals and thousands separators.
#[must_use]
pub fn format_currency(value: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, digit) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}
