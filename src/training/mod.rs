//! Model training module
//!
//! Provides the classifier variants of the model bank:
//! - Decision trees and Random Forests
//! - Gradient boosting (binary log-loss)
//! - Logistic regression
//! - Support Vector Machines
//! - K-Nearest Neighbors
//!
//! [`ModelBank`] fits every enabled variant on the same training partition,
//! recording failures per model instead of aborting the run.

mod bank;
mod config;
mod models;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod random_forest;
pub mod svm;

pub use bank::{FittedModel, ModelBank, ModelFailure, TrainedBank};
pub use config::{ModelBankConfig, ModelKind};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use knn::{DistanceMetric, KNNClassifier, KNNConfig, WeightScheme};
pub use linear_models::{LogisticParams, LogisticRegression};
pub use models::{BinaryClassifier, TrainedModel};
pub use random_forest::{MaxFeatures, RandomForest, RandomForestParams};
pub use svm::{KernelType, SVMClassifier, SVMConfig};
