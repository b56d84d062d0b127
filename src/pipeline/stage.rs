//! Pipeline stages and their wall-clock timings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Step of a churn pipeline run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PipelineStage {
    /// Identifier removal, categorical encoding, label extraction
    Prepare,
    Split,
    Scale,
    Train,
    Evaluate,
    Explain,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 6] = [
        PipelineStage::Prepare,
        PipelineStage::Split,
        PipelineStage::Scale,
        PipelineStage::Train,
        PipelineStage::Evaluate,
        PipelineStage::Explain,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Prepare => "prepare",
            PipelineStage::Split => "split",
            PipelineStage::Scale => "scale",
            PipelineStage::Train => "train",
            PipelineStage::Evaluate => "evaluate",
            PipelineStage::Explain => "explain",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Elapsed time of every completed stage, in completion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    entries: Vec<(PipelineStage, Duration)>,
}

impl StageTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: PipelineStage, elapsed: Duration) {
        self.entries.push((stage, elapsed));
    }

    /// Run `f`, recording its elapsed time only when it succeeds
    pub(crate) fn time<T, E>(
        &mut self,
        stage: PipelineStage,
        f: impl FnOnce() -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let start = Instant::now();
        let value = f()?;
        self.record(stage, start.elapsed());
        Ok(value)
    }

    pub fn get(&self, stage: PipelineStage) -> Option<Duration> {
        self.entries
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, elapsed)| *elapsed)
    }

    pub fn entries(&self) -> &[(PipelineStage, Duration)] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &(PipelineStage, Duration)> {
        self.entries.iter()
    }

    pub fn total(&self) -> Duration {
        self.entries.iter().map(|(_, elapsed)| *elapsed).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for StageTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (stage, elapsed) in &self.entries {
            writeln!(f, "{:<10}{:>10.3}s", stage.name(), elapsed.as_secs_f64())?;
        }
        write!(f, "{:<10}{:>10.3}s", "total", self.total().as_secs_f64())
    }
}
