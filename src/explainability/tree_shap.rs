//! Exact path-dependent TreeSHAP for a single decision tree
//!
//! Polynomial-time Shapley values for trees (Lundberg et al., "Consistent
//! Individualized Feature Attribution for Tree Ensembles", Algorithm 2).
//! Node sample counts act as cover: the expectation over a missing feature
//! follows both children weighted by the share of training samples that went
//! each way. For every row the attributions sum to
//! `tree(x) - expected_value(tree)`.

use ndarray::ArrayView1;

use crate::training::TreeNode;

#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// Global feature index; `None` for the root sentinel
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

/// Cover-weighted mean leaf value
pub(crate) fn expected_value(node: &TreeNode) -> f64 {
    match node {
        TreeNode::Leaf { value, .. } => *value,
        TreeNode::Split {
            left,
            right,
            n_samples,
            ..
        } => {
            let total = *n_samples as f64;
            if total <= 0.0 {
                return 0.5 * (expected_value(left) + expected_value(right));
            }
            (left.n_samples() as f64 * expected_value(left)
                + right.n_samples() as f64 * expected_value(right))
                / total
        }
    }
}

/// Add `scale * phi_j` for one tree into `phi`.
///
/// `feature_map` translates tree-local feature indices to positions in `x`
/// and `phi`; `None` means the tree was fit on all columns.
pub(crate) fn tree_shap(
    root: &TreeNode,
    x: ArrayView1<f64>,
    feature_map: Option<&[usize]>,
    scale: f64,
    phi: &mut [f64],
) {
    let mut walker = Walker {
        x,
        feature_map,
        scale,
        phi,
    };
    walker.recurse(root, &[], 1.0, 1.0, None);
}

struct Walker<'a, 'm, 'b> {
    x: ArrayView1<'a, f64>,
    feature_map: Option<&'m [usize]>,
    scale: f64,
    phi: &'b mut [f64],
}

impl Walker<'_, '_, '_> {
    fn recurse(
        &mut self,
        node: &TreeNode,
        parent_path: &[PathElement],
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        let mut path = parent_path.to_vec();
        extend_path(&mut path, zero_fraction, one_fraction, feature);

        match node {
            TreeNode::Leaf { value, .. } => {
                for i in 1..path.len() {
                    let weight = unwound_path_sum(&path, i);
                    let el = path[i];
                    if let Some(f) = el.feature {
                        self.phi[f] +=
                            weight * (el.one_fraction - el.zero_fraction) * value * self.scale;
                    }
                }
            }
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                n_samples,
                ..
            } => {
                let split_feature = self.feature_map.map_or(*feature_idx, |m| m[*feature_idx]);
                let (hot, cold) = if self.x[split_feature] <= *threshold {
                    (left.as_ref(), right.as_ref())
                } else {
                    (right.as_ref(), left.as_ref())
                };
                let cover = *n_samples as f64;
                let hot_zero = cover_share(hot.n_samples(), cover);
                let cold_zero = cover_share(cold.n_samples(), cover);

                // a feature seen higher up the path is undone and re-entered
                let mut incoming_zero = 1.0;
                let mut incoming_one = 1.0;
                if let Some(k) = path
                    .iter()
                    .skip(1)
                    .position(|el| el.feature == Some(split_feature))
                    .map(|p| p + 1)
                {
                    incoming_zero = path[k].zero_fraction;
                    incoming_one = path[k].one_fraction;
                    unwind_path(&mut path, k);
                }

                self.recurse(
                    hot,
                    &path,
                    hot_zero * incoming_zero,
                    incoming_one,
                    Some(split_feature),
                );
                self.recurse(cold, &path, cold_zero * incoming_zero, 0.0, Some(split_feature));
            }
        }
    }
}

fn cover_share(child: usize, parent: f64) -> f64 {
    if parent > 0.0 {
        child as f64 / parent
    } else {
        0.0
    }
}

fn extend_path(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / (depth + 1) as f64;
        path[i].pweight = zero_fraction * path[i].pweight * (depth - i) as f64 / (depth + 1) as f64;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight =
                next_one_portion * (depth + 1) as f64 / ((i + 1) as f64 * one_fraction);
            next_one_portion =
                tmp - path[i].pweight * zero_fraction * (depth - i) as f64 / (depth + 1) as f64;
        } else {
            path[i].pweight =
                path[i].pweight * (depth + 1) as f64 / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of the path with element `index` removed
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * (depth + 1) as f64 / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion =
                path[i].pweight - tmp * zero_fraction * (depth - i) as f64 / (depth + 1) as f64;
        } else if zero_fraction != 0.0 {
            total += path[i].pweight / zero_fraction / ((depth - i) as f64 / (depth + 1) as f64);
        }
    }
    total
}
