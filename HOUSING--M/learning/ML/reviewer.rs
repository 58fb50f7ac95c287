use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Sanity checks applied to a candidate's held-out predictions before it is
/// scored.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct PredictionReviewer;

impl PredictionReviewer {
    /// Returns a rejection reason, or `None` when the predictions are usable.
    #[must_use]
    pub fn review(&self, predictions: ArrayView1<'_, f64>) -> Option<String> {
        if predictions.is_empty() {
            return Some("produced no predictions".into());
        }
        let bad = predictions.iter().filter(|value| !value.is_finite()).count();
        if bad > 0 {
            return Some(format!("{bad} non-finite predictions"));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn flags_non_finite_and_empty_output() {
        let reviewer = PredictionReviewer;
        assert_eq!(reviewer.review(array![1.0, 2.0].view()), None);
        assert_eq!(
            reviewer.review(array![1.0, f64::NAN, f64::INFINITY].view()).as_deref(),
            Some("2 non-finite predictions")
        );
        assert!(reviewer.review(Array1::<f64>::zeros(0).view()).is_some());
    }
}
