use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::estimator::{check_shapes, FitError, ModelKind, Regressor};

/// Ordinary least squares with an intercept, solved through the normal
/// equations on centered data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressionModel {
    weights: Vec<f64>,
    intercept: f64,
}

impl LinearRegressionModel {
    /// Creates an unfitted model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fitted coefficients, one per feature.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Fitted intercept.
    #[must_use]
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Regressor for LinearRegressionModel {
    fn kind(&self) -> ModelKind {
        ModelKind::LinearRegression
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<(), FitError> {
        check_shapes(&x, &y)?;
        let x_mean = x.mean_axis(Axis(0)).ok_or(FitError::Empty)?;
        let y_mean = y.mean().ok_or(FitError::Empty)?;
        let centered_x = &x - &x_mean;
        let centered_y = &y - y_mean;

        let gram = centered_x.t().dot(&centered_x);
        let moment = centered_x.t().dot(&centered_y);

        // Retry with a vanishing ridge when columns are collinear.
        let weights = solve(gram.clone(), moment.clone()).or_else(|| {
            let trace = gram.diag().sum().max(1.0);
            let ridge = trace * 1e-10;
            let mut regularized = gram;
            regularized.diag_mut().mapv_inplace(|value| value + ridge);
            solve(regularized, moment)
        });
        let weights = weights.ok_or(FitError::Singular)?;

        self.intercept = y_mean - x_mean.dot(&weights);
        self.weights = weights.to_vec();
        Ok(())
    }

    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        row.iter()
            .zip(&self.weights)
            .map(|(feature, weight)| feature * weight)
            .sum::<f64>()
            + self.intercept
    }
}

/// Gaussian elimination with partial pivoting. Returns `None` for a
/// numerically singular system.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let scale = a.iter().fold(0.0_f64, |acc, value| acc.max(value.abs())).max(1.0);
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() <= scale * 1e-12 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([pivot, k], [col, k]);
            }
            b.swap(pivot, col);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut solution = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * solution[k]).sum();
        solution[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn recovers_exact_linear_relationship() {
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 5.0], [4.0, 2.0], [5.0, 3.0]];
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| 3.0 * row[0] - 2.0 * row[1] + 0.5)
            .collect();
        let mut model = LinearRegressionModel::new();
        model.fit(x.view(), y.view()).unwrap();
        assert!((model.weights()[0] - 3.0).abs() < 1e-9);
        assert!((model.weights()[1] + 2.0).abs() < 1e-9);
        assert!((model.intercept() - 0.5).abs() < 1e-9);
        assert!((model.predict_row(array![10.0, 1.0].view()) - 28.5).abs() < 1e-9);
    }

    #[test]
    fn collinear_columns_fall_back_to_ridge() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let mut model = LinearRegressionModel::new();
        model.fit(x.view(), y.view()).unwrap();
        let predictions = model.predict(x.view());
        for (prediction, target) in predictions.iter().zip(y.iter()) {
            assert!((prediction - target).abs() < 1e-4);
        }
    }

    #[test]
    fn constant_features_keep_intercept_at_target_mean() {
        let x = array![[1.0], [1.0], [1.0]];
        let y = array![1.0, 2.0, 3.0];
        let mut model = LinearRegressionModel::new();
        model.fit(x.view(), y.view()).unwrap();
        assert!((model.predict_row(array![1.0].view()) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn solver_rejects_singular_matrix() {
        let a = array![[0.0, 0.0], [0.0, 0.0]];
        assert!(solve(a, array![1.0, 1.0]).is_none());
    }
}
