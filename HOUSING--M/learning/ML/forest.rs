use ndarray::{ArrayView1, ArrayView2};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{
    estimator::{check_shapes, FitError, ModelKind, Regressor},
    tree::{DecisionTreeRegressor, TreeParams},
};

/// Ensemble hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of bootstrapped trees.
    pub n_estimators: usize,
    /// Per-tree depth limit.
    pub max_depth: Option<usize>,
    /// Per-tree minimum samples to split.
    pub min_samples_split: usize,
    /// Per-tree minimum samples per leaf.
    pub min_samples_leaf: usize,
    /// Features examined per split.
    pub max_features: Option<usize>,
    /// Base seed; tree `i` uses `seed + i`.
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 0,
        }
    }
}

/// Bagged regression trees whose predictions are averaged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    trees: Vec<DecisionTreeRegressor>,
}

impl RandomForestRegressor {
    /// Creates an unfitted forest.
    #[must_use]
    pub const fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
        }
    }

    /// Ensemble parameters.
    #[must_use]
    pub const fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Fitted trees.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTreeRegressor] {
        &self.trees
    }

    fn tree_params(&self, seed: u64) -> TreeParams {
        TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: self.params.max_features,
            seed,
        }
    }
}

impl Regressor for RandomForestRegressor {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<(), FitError> {
        check_shapes(&x, &y)?;
        let rows = x.nrows();
        let count = self.params.n_estimators.max(1);
        let mut trees = Vec::with_capacity(count);
        for i in 0..count {
            let seed = self.params.seed.wrapping_add(i as u64);
            let mut rng = SmallRng::seed_from_u64(seed);
            let sample: Vec<usize> = (0..rows).map(|_| rng.gen_range(0..rows)).collect();
            let mut tree = DecisionTreeRegressor::new(self.tree_params(seed));
            tree.grow(x, y, sample, &mut rng);
            trees.push(tree);
        }
        self.trees = trees;
        Ok(())
    }

    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        if self.trees.is_empty() {
            return f64::NAN;
        }
        let total: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
        total / self.trees.len() as f64
    }
}
