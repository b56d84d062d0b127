//! Model explainability module
//!
//! Exact TreeSHAP attributions for the tree-ensemble variants:
//! - per-row signed feature contributions that add up to the model output
//! - global importance as mean absolute attribution over the sample
//! - ranked top-k features for a single row
//!
//! Models without tree structure are rejected with `UnsupportedModel`.

mod attribution;
mod explainer;
mod tree_shap;

pub use attribution::{AttributionSet, FeatureContribution, OutputSpace, RowExplanation};
pub use explainer::{TreeExplainer, MAX_ATTRIBUTION_ROWS};
