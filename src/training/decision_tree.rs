//! Decision tree implementation
//!
//! Binary classification trees (Gini) store the positive-class fraction in
//! each leaf; regression trees (MSE) store the leaf mean. Every node keeps
//! its training sample count, which the attribution code uses as cover.

use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node; samples with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    /// Training samples that reached this node
    pub fn n_samples(&self) -> usize {
        match self {
            TreeNode::Leaf { n_samples, .. } | TreeNode::Split { n_samples, .. } => *n_samples,
        }
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity over 0/1 labels
    Gini,
    /// Binary entropy over 0/1 labels
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

/// Best split found for one feature
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split; all when `None`
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    pub random_state: Option<u64>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    is_classification: bool,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            feature_importances: None,
            is_classification: true,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(ChurnError::InsufficientData(format!(
                "cannot fit a tree on {} rows x {} features",
                n_samples, n_features
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(ChurnError::InvalidInput(
                "non-finite value in tree training data".to_string(),
            ));
        }

        self.n_features = n_features;
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));
        let mut importances = vec![0.0; n_features];

        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances, &mut rng));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let sq_sum: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let leaf = TreeNode::Leaf {
            value: sum / n_samples as f64,
            n_samples,
        };

        let first = y[indices[0]];
        let is_pure = indices.iter().all(|&i| (y[i] - first).abs() < 1e-12);
        if n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure
        {
            return leaf;
        }

        let parent_impurity = self.impurity(n_samples as f64, sum, sq_sum);
        let candidates = self.candidate_features(rng);

        let best = match self.find_best_split(x, y, indices, &candidates, parent_impurity) {
            Some(best) => best,
            None => return leaf,
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return leaf;
        }

        importances[best.feature_idx] += n_samples as f64 * best.gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity: parent_impurity,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        match self.max_features {
            Some(k) if k < self.n_features => {
                features.shuffle(rng);
                features.truncate(k.max(1));
                features.sort_unstable();
                features
            }
            _ => features,
        }
    }

    /// Sort-and-sweep search over the candidate features
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        candidates: &[usize],
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let n = indices.len() as f64;
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();

        let per_feature: Vec<Option<SplitCandidate>> = candidates
            .par_iter()
            .map(|&feature_idx| {
                let mut pairs: Vec<(f64, f64)> =
                    indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut best: Option<SplitCandidate> = None;
                let mut left_sum = 0.0;
                let mut left_sq = 0.0;

                for k in 0..pairs.len() - 1 {
                    left_sum += pairs[k].1;
                    left_sq += pairs[k].1 * pairs[k].1;

                    let (lo, hi) = (pairs[k].0, pairs[k + 1].0);
                    if lo >= hi {
                        continue;
                    }
                    let left_count = k + 1;
                    let right_count = pairs.len() - left_count;
                    if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                        continue;
                    }

                    let left_imp = self.impurity(left_count as f64, left_sum, left_sq);
                    let right_imp = self.impurity(
                        right_count as f64,
                        total_sum - left_sum,
                        total_sq - left_sq,
                    );
                    let weighted =
                        (left_count as f64 * left_imp + right_count as f64 * right_imp) / n;
                    let gain = parent_impurity - weighted;

                    if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                        let mid = lo + (hi - lo) / 2.0;
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold: if mid < hi { mid } else { lo },
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        per_feature.into_iter().flatten().fold(None, |acc, c| match acc {
            Some(a) if a.gain >= c.gain => Some(a),
            _ => Some(c),
        })
    }

    /// Impurity from count, sum and sum of squares of the targets
    fn impurity(&self, count: f64, sum: f64, sq_sum: f64) -> f64 {
        if count <= 0.0 {
            return 0.0;
        }
        match self.criterion {
            Criterion::Gini => {
                let p = sum / count;
                2.0 * p * (1.0 - p)
            }
            Criterion::Entropy => {
                let p = sum / count;
                [p, 1.0 - p]
                    .iter()
                    .filter(|&&q| q > 0.0)
                    .map(|&q| -q * q.ln())
                    .sum()
            }
            Criterion::MSE => (sq_sum / count - (sum / count).powi(2)).max(0.0),
        }
    }

    /// Leaf values: positive-class fraction for classifiers, mean for regressors
    pub fn predict_raw(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(ChurnError::ModelNotFitted)?;
        self.check_width(x.ncols())?;
        Ok(x.outer_iter().map(|row| Self::descend(root, row)).collect())
    }

    /// Class labels for classifiers, leaf means for regressors
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let raw = self.predict_raw(x)?;
        if self.is_classification {
            Ok(raw.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
        } else {
            Ok(raw)
        }
    }

    /// Leaf value for one row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let root = self.root.as_ref().ok_or(ChurnError::ModelNotFitted)?;
        self.check_width(row.len())?;
        Ok(Self::descend(root, row))
    }

    fn descend(mut node: &TreeNode, row: ArrayView1<f64>) -> f64 {
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.n_features {
            return Err(ChurnError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", width),
            });
        }
        Ok(())
    }

    /// Root node, `None` before fit
    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Normalised impurity-decrease importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separable() {
        let x = array![[0.0, 5.0], [1.0, 3.0], [2.0, 4.0], [3.0, 1.0], [4.0, 2.0], [5.0, 0.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_leaf_holds_positive_fraction() {
        let x = array![[0.0], [0.0], [0.0], [1.0]];
        let y = array![0.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let raw = tree.predict_raw(&array![[0.0], [1.0]]).unwrap();
        assert!((raw[0] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(raw[1], 1.0);
    }

    #[test]
    fn test_regressor_fits_steps() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let mse: f64 = tree
            .predict(&x)
            .unwrap()
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / 5.0;
        assert!(mse < 1e-12, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth_and_cover() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0], [5.0, 1.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(2);
        tree.fit(&x, &y).unwrap();
        assert!(tree.get_depth() <= 3);

        fn check(node: &TreeNode) {
            if let TreeNode::Split { left, right, n_samples, .. } = node {
                assert_eq!(left.n_samples() + right.n_samples(), *n_samples);
                check(left);
                check(right);
            }
        }
        check(tree.root().unwrap());
        assert_eq!(tree.root().unwrap().n_samples(), 5);
    }

    #[test]
    fn test_feature_subsampling_is_seeded() {
        let x = Array2::from_shape_fn((40, 4), |(i, j)| ((i * (j + 3)) % 7) as f64);
        let y = Array1::from_iter((0..40).map(|i| (i % 3 == 0) as u8 as f64));

        let mut a = DecisionTree::new_classifier().with_max_features(2).with_random_state(9);
        let mut b = DecisionTree::new_classifier().with_max_features(2).with_random_state(9);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict_raw(&x).unwrap(), b.predict_raw(&x).unwrap());
    }

    #[test]
    fn test_errors() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(ChurnError::ModelNotFitted)));

        let mut tree = DecisionTree::new_classifier();
        assert!(tree.fit(&array![[1.0], [2.0]], &array![1.0]).is_err());

        tree.fit(&array![[1.0], [2.0]], &array![0.0, 1.0]).unwrap();
        assert!(matches!(
            tree.predict(&array![[1.0, 2.0]]),
            Err(ChurnError::ShapeError { .. })
        ));
    }
}
