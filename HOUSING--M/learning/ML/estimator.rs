use std::fmt;

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{forest::RandomForestRegressor, ml::LinearRegressionModel, tree::DecisionTreeRegressor};
use crate::config::{ForestConfig, TreeConfig};

/// Errors raised while fitting an estimator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FitError {
    /// No training rows.
    #[error("cannot fit on zero rows")]
    Empty,
    /// Feature and target row counts differ.
    #[error("feature rows ({rows}) and targets ({targets}) differ")]
    ShapeMismatch {
        /// Feature rows.
        rows: usize,
        /// Target values.
        targets: usize,
    },
    /// Normal equations could not be solved.
    #[error("normal equations are singular")]
    Singular,
}

/// Black-box regression contract every candidate satisfies.
pub trait Regressor {
    /// Stable identifier of the estimator family.
    fn kind(&self) -> ModelKind;

    /// Fits the estimator to preprocessed features `x` and targets `y`.
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<(), FitError>;

    /// Predicts a single preprocessed row.
    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64;

    /// Predicts every row of `x`.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }
}

pub(crate) fn check_shapes(x: &ArrayView2<'_, f64>, y: &ArrayView1<'_, f64>) -> Result<(), FitError> {
    if x.nrows() == 0 {
        return Err(FitError::Empty);
    }
    if x.nrows() != y.len() {
        return Err(FitError::ShapeMismatch {
            rows: x.nrows(),
            targets: y.len(),
        });
    }
    Ok(())
}

/// Estimator families available to model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Ordinary least squares baseline.
    LinearRegression,
    /// Single CART regression tree.
    DecisionTree,
    /// Bagged ensemble of regression trees.
    RandomForest,
}

impl ModelKind {
    /// Every family, in default candidate order.
    pub const ALL: [Self; 3] = [Self::LinearRegression, Self::DecisionTree, Self::RandomForest];

    /// Identifier used in configs, logs and artifacts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LinearRegression => "linear_regression",
            Self::DecisionTree => "decision_tree",
            Self::RandomForest => "random_forest",
        }
    }

    /// Creates an unfitted estimator of this family.
    #[must_use]
    pub fn build(self, tree: &TreeConfig, forest: &ForestConfig, seed: u64) -> Estimator {
        match self {
            Self::LinearRegression => Estimator::LinearRegression(LinearRegressionModel::new()),
            Self::DecisionTree => {
                Estimator::DecisionTree(DecisionTreeRegressor::new(tree.params(seed)))
            }
            Self::RandomForest => {
                Estimator::RandomForest(RandomForestRegressor::new(forest.params(seed)))
            }
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == raw.trim())
            .ok_or_else(|| format!("unknown model kind `{raw}`"))
    }
}

/// Serializable estimator state stored in the artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub enum Estimator {
    /// Linear baseline.
    LinearRegression(LinearRegressionModel),
    /// Single tree.
    DecisionTree(DecisionTreeRegressor),
    /// Forest.
    RandomForest(RandomForestRegressor),
}

impl Estimator {
    /// Borrows the estimator through the common contract.
    #[must_use]
    pub fn regressor(&self) -> &dyn Regressor {
        match self {
            Self::LinearRegression(model) => model,
            Self::DecisionTree(model) => model,
            Self::RandomForest(model) => model,
        }
    }

    /// Mutable variant of [`Self::regressor`].
    pub fn regressor_mut(&mut self) -> &mut dyn Regressor {
        match self {
            Self::LinearRegression(model) => model,
            Self::DecisionTree(model) => model,
            Self::RandomForest(model) => model,
        }
    }

    /// Family of the wrapped estimator.
    #[must_use]
    pub fn kind(&self) -> ModelKind {
        self.regressor().kind()
    }
}
