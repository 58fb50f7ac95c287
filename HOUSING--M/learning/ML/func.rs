use ndarray::ArrayView1;
use rand::{rngs::SmallRng, seq::SliceRandom, SeedableRng};

/// Row indices of a train/test split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    /// Training rows.
    pub train: Vec<usize>,
    /// Held-out rows.
    pub test: Vec<usize>,
}

/// Shuffles `0..rows` with `seed` and holds out `ceil(test_ratio * rows)`
/// of them.
#[must_use]
pub fn train_test_split(rows: usize, test_ratio: f64, seed: u64) -> SplitIndices {
    let mut order: Vec<usize> = (0..rows).collect();
    let mut rng = SmallRng::seed_from_u64(seed);
    order.shuffle(&mut rng);
    let test_len = test_size(rows, test_ratio);
    let train = order.split_off(test_len);
    SplitIndices { train, test: order }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn test_size(rows: usize, test_ratio: f64) -> usize {
    let wanted = (test_ratio.clamp(0.0, 1.0) * rows as f64).ceil() as usize;
    wanted.min(rows)
}

/// Root mean squared error. `NaN` for empty or mismatched inputs.
#[must_use]
pub fn rmse(predictions: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>) -> f64 {
    mean_of(predictions, targets, |diff| diff * diff).sqrt()
}

/// Mean absolute error. `NaN` for empty or mismatched inputs.
#[must_use]
pub fn mae(predictions: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>) -> f64 {
    mean_of(predictions, targets, f64::abs)
}

fn mean_of(
    predictions: ArrayView1<'_, f64>,
    targets: ArrayView1<'_, f64>,
    loss: impl Fn(f64) -> f64,
) -> f64 {
    if predictions.is_empty() || predictions.len() != targets.len() {
        return f64::NAN;
    }
    let total: f64 = predictions
        .iter()
        .zip(targets.iter())
        .map(|(prediction, target)| loss(prediction - target))
        .sum();
    total / predictions.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn split_holds_out_ceiling_of_ratio() {
        let split = train_test_split(10, 0.2, 42);
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 8);

        let split = train_test_split(11, 0.2, 42);
        assert_eq!(split.test.len(), 3);

        let mut all: Vec<_> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..11).collect::<Vec<_>>());
    }

    #[test]
    fn split_is_reproducible_per_seed() {
        assert_eq!(train_test_split(50, 0.2, 42), train_test_split(50, 0.2, 42));
        assert_ne!(train_test_split(50, 0.2, 42), train_test_split(50, 0.2, 43));
    }

    #[test]
    fn metrics_match_hand_computation() {
        let predictions = array![1.0, 2.0, 4.0];
        let targets = array![1.0, 3.0, 2.0];
        assert!((mae(predictions.view(), targets.view()) - 1.0).abs() < 1e-12);
        assert!((rmse(predictions.view(), targets.view()) - (5.0_f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn metrics_are_nan_for_bad_input() {
        let empty = ndarray::Array1::<f64>::zeros(0);
        assert!(rmse(empty.view(), empty.view()).is_nan());
        assert!(mae(array![1.0].view(), array![1.0, 2.0].view()).is_nan());
    }
}
