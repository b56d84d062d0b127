//! Pipeline orchestration
//!
//! [`ChurnPipeline`] runs the stages in order, each to completion:
//! prepare, split, scale, train, evaluate, explain. The fitted encoder,
//! scaler and models come back as a [`ChurnSession`] for scoring later
//! input with the same encoding and scaling.

mod runner;
mod session;
mod stage;

pub use runner::{ChurnPipeline, PipelineOutcome, PreparedData, ScaledSplit};
pub use session::ChurnSession;
pub use stage::{PipelineStage, StageTimings};
