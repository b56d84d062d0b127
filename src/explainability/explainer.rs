//! TreeSHAP explainer for the tree-ensemble variants

use ndarray::{s, Array1, Array2, ArrayView1};
use rayon::prelude::*;
use tracing::info;

use super::attribution::{AttributionSet, OutputSpace};
use super::tree_shap::{expected_value, tree_shap};
use crate::error::{ChurnError, Result};
use crate::training::{ModelKind, TrainedModel, TreeNode};

/// Upper bound on explained rows per call
pub const MAX_ATTRIBUTION_ROWS: usize = 50;

/// One tree of an ensemble with its output weight
struct WeightedTree<'a> {
    root: &'a TreeNode,
    feature_map: Option<&'a [usize]>,
    scale: f64,
}

/// Exact Shapley attributions for random forests and gradient boosting.
///
/// Forests are explained in probability space (mean of leaf positive-class
/// fractions), boosting in log-odds space.
pub struct TreeExplainer<'a> {
    kind: ModelKind,
    trees: Vec<WeightedTree<'a>>,
    offset: f64,
    n_features: usize,
    output_space: OutputSpace,
}

impl<'a> TreeExplainer<'a> {
    /// Fails with `UnsupportedModel` for variants without tree structure
    pub fn new(model: &'a TrainedModel) -> Result<Self> {
        match model {
            TrainedModel::RandomForest(forest) => {
                if forest.n_trees() == 0 {
                    return Err(ChurnError::ModelNotFitted);
                }
                let scale = 1.0 / forest.n_trees() as f64;
                let trees = forest
                    .trees()
                    .iter()
                    .map(|tree| {
                        Ok(WeightedTree {
                            root: tree.root().ok_or(ChurnError::ModelNotFitted)?,
                            feature_map: None,
                            scale,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self {
                    kind: ModelKind::RandomForest,
                    trees,
                    offset: 0.0,
                    n_features: forest.n_features(),
                    output_space: OutputSpace::Probability,
                })
            }
            TrainedModel::GradientBoosting(boosting) => {
                if boosting.trees().is_empty() {
                    return Err(ChurnError::ModelNotFitted);
                }
                let scale = boosting.learning_rate();
                let trees = boosting
                    .trees()
                    .iter()
                    .zip(boosting.col_indices())
                    .map(|(tree, cols)| {
                        Ok(WeightedTree {
                            root: tree.root().ok_or(ChurnError::ModelNotFitted)?,
                            feature_map: Some(cols.as_slice()),
                            scale,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self {
                    kind: ModelKind::GradientBoosting,
                    trees,
                    offset: boosting.initial_log_odds(),
                    n_features: boosting.n_features(),
                    output_space: OutputSpace::LogOdds,
                })
            }
            other => Err(ChurnError::UnsupportedModel(other.name().to_string())),
        }
    }

    pub fn output_space(&self) -> OutputSpace {
        self.output_space
    }

    /// Expected output over the training covers
    pub fn base_value(&self) -> f64 {
        self.offset
            + self
                .trees
                .iter()
                .map(|t| t.scale * expected_value(t.root))
                .sum::<f64>()
    }

    fn output_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut out = self.offset;
        for tree in &self.trees {
            let mut node = tree.root;
            let value = loop {
                match node {
                    TreeNode::Leaf { value, .. } => break *value,
                    TreeNode::Split {
                        feature_idx,
                        threshold,
                        left,
                        right,
                        ..
                    } => {
                        let f = tree.feature_map.map_or(*feature_idx, |m| m[*feature_idx]);
                        node = if row[f] <= *threshold { &**left } else { &**right };
                    }
                }
            };
            out += tree.scale * value;
        }
        out
    }

    /// Explain the first `min(max_rows, MAX_ATTRIBUTION_ROWS, x.nrows())` rows
    pub fn explain(
        &self,
        x: &Array2<f64>,
        feature_names: &[String],
        max_rows: usize,
    ) -> Result<AttributionSet> {
        if x.ncols() != self.n_features || feature_names.len() != self.n_features {
            return Err(ChurnError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} columns, {} names", x.ncols(), feature_names.len()),
            });
        }
        let n_rows = max_rows.min(MAX_ATTRIBUTION_ROWS).min(x.nrows());
        if n_rows == 0 {
            return Err(ChurnError::InsufficientData("no rows to explain".to_string()));
        }
        let sample = x.slice(s![..n_rows, ..]).to_owned();

        let rows: Vec<(Vec<f64>, f64)> = (0..n_rows)
            .into_par_iter()
            .map(|i| {
                let row = sample.row(i);
                let mut phi = vec![0.0; self.n_features];
                for tree in &self.trees {
                    tree_shap(tree.root, row, tree.feature_map, tree.scale, &mut phi);
                }
                (phi, self.output_row(row))
            })
            .collect();

        let mut values = Array2::zeros((n_rows, self.n_features));
        let mut outputs = Array1::zeros(n_rows);
        for (i, (phi, out)) in rows.into_iter().enumerate() {
            values.row_mut(i).assign(&Array1::from_vec(phi));
            outputs[i] = out;
        }

        let set = AttributionSet::new(
            self.kind,
            self.output_space,
            feature_names.to_vec(),
            self.base_value(),
            values,
            outputs,
            sample,
        );
        info!(
            model = %self.kind,
            rows = n_rows,
            trees = self.trees.len(),
            max_completeness_error = set.max_completeness_error(),
            "Computed TreeSHAP attributions"
        );
        Ok(set)
    }
}
