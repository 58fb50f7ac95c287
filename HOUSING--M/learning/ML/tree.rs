use ndarray::{ArrayView1, ArrayView2};
use rand::{rngs::SmallRng, seq::index, SeedableRng};
use serde::{Deserialize, Serialize};

use super::estimator::{check_shapes, FitError, ModelKind, Regressor};

/// Growth limits for a regression tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth; `None` grows until leaves are pure or too small.
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs before it may split.
    pub min_samples_split: usize,
    /// Minimum samples on each side of a split.
    pub min_samples_leaf: usize,
    /// Features examined per split; `None` examines all of them.
    pub max_features: Option<usize>,
    /// Seed for feature subsampling.
    pub seed: u64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 0,
        }
    }
}

/// Node of a flattened tree. Children are indices into the node list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    /// Terminal node predicting the mean target of its samples.
    Leaf {
        /// Predicted value.
        value: f64,
        /// Training samples that reached the leaf.
        samples: usize,
    },
    /// Internal node routing `feature <= threshold` to `left`.
    Split {
        /// Feature column.
        feature: usize,
        /// Split point.
        threshold: f64,
        /// Left child index.
        left: usize,
        /// Right child index.
        right: usize,
    },
}

/// CART regression tree minimizing squared error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    params: TreeParams,
    nodes: Vec<TreeNode>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl DecisionTreeRegressor {
    /// Creates an unfitted tree.
    #[must_use]
    pub const fn new(params: TreeParams) -> Self {
        Self {
            params,
            nodes: Vec::new(),
        }
    }

    /// Growth parameters.
    #[must_use]
    pub const fn params(&self) -> &TreeParams {
        &self.params
    }

    /// Flattened nodes; index 0 is the root.
    #[must_use]
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Depth of the fitted tree (a lone leaf has depth 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = if self.nodes.is_empty() { vec![] } else { vec![(0, 0)] };
        while let Some((idx, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let TreeNode::Split { left, right, .. } = self.nodes[idx] {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
        deepest
    }

    /// Grows the tree on the rows listed in `sample` (duplicates allowed, as
    /// in a bootstrap draw).
    pub(crate) fn grow(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        sample: Vec<usize>,
        rng: &mut SmallRng,
    ) {
        let n_features = x.ncols();
        let max_features = self
            .params
            .max_features
            .map_or(n_features, |limit| limit.clamp(1, n_features.max(1)));
        let min_leaf = self.params.min_samples_leaf.max(1);
        let min_split = self.params.min_samples_split.max(2).max(2 * min_leaf);

        self.nodes.clear();
        self.nodes.push(TreeNode::Leaf { value: 0.0, samples: 0 });
        let mut pending = vec![(0usize, sample, 0usize)];

        while let Some((slot, rows, depth)) = pending.pop() {
            let count = rows.len();
            let sum: f64 = rows.iter().map(|&row| y[row]).sum();
            let mean = if count == 0 { 0.0 } else { sum / count as f64 };
            let sum_sq: f64 = rows.iter().map(|&row| (y[row] - mean).powi(2)).sum();
            let leaf = TreeNode::Leaf { value: mean, samples: count };

            let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
            if count < min_split || depth_reached || sum_sq <= 1e-12 {
                self.nodes[slot] = leaf;
                continue;
            }

            let features: Vec<usize> = if max_features < n_features {
                let mut picked = index::sample(rng, n_features, max_features).into_vec();
                picked.sort_unstable();
                picked
            } else {
                (0..n_features).collect()
            };

            let Some(split) = best_split(x, y, &rows, &features, min_leaf, sum) else {
                self.nodes[slot] = leaf;
                continue;
            };

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .into_iter()
                .partition(|&row| x[[row, split.feature]] <= split.threshold);
            let left = self.nodes.len();
            let right = left + 1;
            self.nodes.push(TreeNode::Leaf { value: 0.0, samples: 0 });
            self.nodes.push(TreeNode::Leaf { value: 0.0, samples: 0 });
            self.nodes[slot] = TreeNode::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
            pending.push((right, right_rows, depth + 1));
            pending.push((left, left_rows, depth + 1));
        }
    }
}

/// Scans every candidate feature for the threshold maximizing
/// `sum_l^2 / n_l + sum_r^2 / n_r`, which is equivalent to minimizing the
/// children's squared error.
fn best_split(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    rows: &[usize],
    features: &[usize],
    min_leaf: usize,
    total: f64,
) -> Option<BestSplit> {
    let count = rows.len();
    let parent_score = total * total / count as f64;
    let mut best: Option<BestSplit> = None;
    let mut ordered: Vec<(f64, f64)> = Vec::with_capacity(count);

    for &feature in features {
        ordered.clear();
        ordered.extend(rows.iter().map(|&row| (x[[row, feature]], y[row])));
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        for split_at in 1..count {
            left_sum += ordered[split_at - 1].1;
            let (lower, upper) = (ordered[split_at - 1].0, ordered[split_at].0);
            if split_at < min_leaf || count - split_at < min_leaf || lower == upper {
                continue;
            }
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / split_at as f64
                + right_sum * right_sum / (count - split_at) as f64;
            if score <= parent_score + 1e-12 {
                continue;
            }
            if best.as_ref().map_or(true, |current| score > current.score) {
                let midpoint = lower + (upper - lower) / 2.0;
                let threshold = if midpoint < upper { midpoint } else { lower };
                best = Some(BestSplit {
                    feature,
                    threshold,
                    score,
                });
            }
        }
    }
    best
}

impl Regressor for DecisionTreeRegressor {
    fn kind(&self) -> ModelKind {
        ModelKind::DecisionTree
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<(), FitError> {
        check_shapes(&x, &y)?;
        let mut rng = SmallRng::seed_from_u64(self.params.seed);
        self.grow(x, y, (0..x.nrows()).collect(), &mut rng);
        Ok(())
    }

    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value, .. }) => return *value,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => return f64::NAN,
            }
        }
    }
}
