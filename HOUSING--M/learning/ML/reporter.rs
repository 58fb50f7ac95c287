use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::estimator::ModelKind;

/// Held-out error of one estimator, in units of the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Root mean squared error.
    pub rmse: f64,
    /// Mean absolute error.
    pub mae: f64,
}

impl EvaluationMetrics {
    /// True when both metrics are finite numbers.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.rmse.is_finite() && self.mae.is_finite()
    }
}

/// Outcome of fitting and scoring one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    /// Estimator family.
    pub model: ModelKind,
    /// Held-out metrics; absent when fitting failed.
    pub metrics: Option<EvaluationMetrics>,
    /// Why the candidate was excluded from selection, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
    /// Wall-clock fit time.
    pub fit_millis: u64,
}

impl CandidateReport {
    /// True when the candidate may be selected.
    #[must_use]
    pub fn qualified(&self) -> bool {
        self.rejection.is_none() && self.metrics.is_some_and(|metrics| metrics.is_finite())
    }
}

/// Evaluation of every candidate plus the selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Candidates in evaluation order.
    pub candidates: Vec<CandidateReport>,
    /// Family of the persisted estimator.
    pub selected: ModelKind,
    /// Rows the estimators were fit on.
    pub train_rows: usize,
    /// Rows held out for evaluation.
    pub test_rows: usize,
    /// Records rejected by feature derivation.
    pub skipped_records: usize,
    /// Dataset rows dropped at load time for a missing target.
    pub dropped_rows: usize,
    /// Seed used for the split and the randomized estimators.
    pub seed: u64,
}

impl TrainingReport {
    /// Metrics of the selected candidate.
    #[must_use]
    pub fn selected_metrics(&self) -> Option<EvaluationMetrics> {
        self.candidates
            .iter()
            .find(|candidate| candidate.model == self.selected)
            .and_then(|candidate| candidate.metrics)
    }

    /// Renders a concise multi-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = format!(
            "[ML] selected={} train_rows={} test_rows={} skipped={} seed={}",
            self.selected, self.train_rows, self.test_rows, self.skipped_records, self.seed
        );
        for candidate in &self.candidates {
            let marker = if candidate.model == self.selected { '*' } else { ' ' };
            let _ = match (&candidate.metrics, &candidate.rejection) {
                (_, Some(reason)) => write!(out, "\n {marker} {:<18} rejected: {reason}", candidate.model.as_str()),
                (Some(metrics), None) => write!(
                    out,
                    "\n {marker} {:<18} rmse={:.4} mae={:.4} fit_ms={}",
                    candidate.model.as_str(),
                    metrics.rmse,
                    metrics.mae,
                    candidate.fit_millis
                ),
                (None, None) => write!(out, "\n {marker} {:<18} not evaluated", candidate.model.as_str()),
            };
        }
        out
    }
}

/// Picks the qualified candidate with the lowest RMSE, breaking ties by MAE
/// and then by position.
#[must_use]
pub fn select_best(candidates: &[CandidateReport]) -> Option<usize> {
    let mut best: Option<(usize, EvaluationMetrics)> = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        let Some(metrics) = candidate.metrics.filter(|_| candidate.qualified()) else {
            continue;
        };
        let better = best.map_or(true, |(_, current)| {
            metrics.rmse < current.rmse || (metrics.rmse == current.rmse && metrics.mae < current.mae)
        });
        if better {
            best = Some((idx, metrics));
        }
    }
    best.map(|(idx, _)| idx)
}
