//! Data preparation for modelling
//!
//! Provides:
//! - Identifier removal and first-observation label encoding of categoricals
//! - Seeded train/test partitioning, optionally stratified by label
//! - Z-score scaling fitted on the training partition only

mod encoder;
mod preparer;
mod scaler;
mod split;

pub use encoder::{CategoryEncoder, CategoryMapping};
pub use preparer::{EncodedDataset, FeaturePreparer};
pub use scaler::StandardScaler;
pub use split::{DataSplit, SplitIndices, TrainTestSplitter};
