//! The training/evaluation surface a model exposes to the pipeline.

use crate::data::Dataset;
use crate::error::Result;
use crate::metrics::EvalMetrics;
use crate::monitors::Monitor;

/// Outcome of one call to [`Estimator::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct FitSummary {
    /// Global step before the first update of this call.
    pub start_step: u64,
    /// Global step after the last update.
    pub global_step: u64,
    /// Loss of the last batch, `None` if no step ran.
    pub final_loss: Option<f32>,
    /// True if a monitor ended training before `steps` were run.
    pub stopped_early: bool,
}

impl FitSummary {
    pub fn steps_run(&self) -> u64 {
        self.global_step - self.start_step
    }
}

/// A trainable classifier.
pub trait Estimator {
    /// Run `steps` optimizer steps on `dataset`, offering every step to `monitors`.
    fn fit(
        &mut self,
        dataset: &Dataset,
        steps: u64,
        monitors: &mut [&mut dyn Monitor],
    ) -> Result<FitSummary>;

    /// Metrics over `dataset`. Always contains `"accuracy"`.
    fn evaluate(&self, dataset: &Dataset) -> Result<EvalMetrics>;

    /// Predicted class id for each row of the flat `features` buffer.
    fn predict(&self, features: &[f32]) -> Result<Vec<usize>>;

    fn global_step(&self) -> u64;
}
