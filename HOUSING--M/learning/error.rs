use thiserror::Error;

use crate::{
    artifact::ArtifactError,
    config::ConfigError,
    dataloader::DatasetError,
    preprocess::PreprocessError,
};

/// Failures of a training run.
#[derive(Debug, Error)]
pub enum LearningError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Dataset could not be loaded.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    /// Every record was rejected by feature derivation.
    #[error("no usable records: {skipped} of {total} rejected by feature derivation")]
    NoUsableRecords {
        /// Records rejected.
        skipped: usize,
        /// Records loaded.
        total: usize,
    },
    /// Too few records to hold out a test partition and still train.
    #[error("need at least 2 usable records to split, found {0}")]
    TooFewRecords(usize),
    /// Imputer or scaler could not be fit.
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    /// No candidate families were requested.
    #[error("no candidate models configured")]
    NoCandidates,
    /// Every candidate failed to fit or produced unusable predictions.
    #[error("every candidate was rejected: {0}")]
    AllCandidatesRejected(String),
    /// Artifact could not be written.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}
