//! Training monitors: observers invoked after every optimization step.
//!
//! A monitor sees the global step, the batch loss and a read-only view of the
//! network. It cannot change gradients; the only influence it has on training
//! is returning [`MonitorAction::Stop`].

use log::info;

use crate::config::ValidationConfig;
use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::metrics::{evaluate_network, EvalMetrics, MetricSpecs};
use crate::network::Dnn;

/// What the training loop should do after a monitor has observed a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    Continue,
    Stop,
}

/// State handed to monitors after each step.
pub struct StepContext<'a> {
    /// Global step after the update, starting at 1.
    pub step: u64,
    /// Mean training loss of the batch, measured before the update.
    pub loss: f32,
    pub network: &'a Dnn,
}

/// Observer hooked into `fit`.
pub trait Monitor {
    /// Called once before the first step. `last_step` is the global step fit will stop at.
    fn begin(&mut self, _first_step: u64, _last_step: u64) {}

    fn step_end(&mut self, ctx: &StepContext<'_>) -> Result<MonitorAction>;

    /// Called once after the last step, including after an early stop.
    fn end(&mut self, _step: u64) {}
}

/// One validation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRecord {
    pub step: u64,
    pub metrics: EvalMetrics,
}

#[derive(Debug, Clone)]
struct EarlyStopping {
    rounds: u64,
    metric: String,
    minimize: bool,
}

/// Evaluates the network on a held-out dataset every `every_n_steps` global steps.
pub struct ValidationMonitor<'a> {
    dataset: &'a Dataset,
    every_n_steps: u64,
    metrics: MetricSpecs,
    early_stopping: Option<EarlyStopping>,
    history: Vec<ValidationRecord>,
    best: Option<(u64, f32)>,
    stopped_at: Option<u64>,
}

impl<'a> ValidationMonitor<'a> {
    pub fn new(dataset: &'a Dataset, every_n_steps: u64, metrics: MetricSpecs) -> Self {
        Self {
            dataset,
            every_n_steps: every_n_steps.max(1),
            metrics,
            early_stopping: None,
            history: Vec::new(),
            best: None,
            stopped_at: None,
        }
    }

    pub fn from_config(dataset: &'a Dataset, config: &ValidationConfig) -> Self {
        let monitor = Self::new(dataset, config.every_n_steps, config.metrics.clone());
        match config.early_stopping_rounds {
            Some(rounds) => monitor.with_early_stopping(
                rounds,
                &config.early_stopping_metric,
                config.early_stopping_metric_minimize,
            ),
            None => monitor,
        }
    }

    /// Stop training once `metric` has not improved for `rounds` global steps.
    pub fn with_early_stopping(mut self, rounds: u64, metric: &str, minimize: bool) -> Self {
        self.early_stopping = Some(EarlyStopping {
            rounds,
            metric: metric.to_string(),
            minimize,
        });
        self
    }

    pub fn history(&self) -> &[ValidationRecord] {
        &self.history
    }

    /// Number of validation passes run so far.
    pub fn invocations(&self) -> usize {
        self.history.len()
    }

    pub fn latest(&self) -> Option<&ValidationRecord> {
        self.history.last()
    }

    /// Step and value of the best early-stopping metric seen so far.
    pub fn best(&self) -> Option<(u64, f32)> {
        self.best
    }

    /// Global step at which this monitor requested a stop.
    pub fn stopped_at(&self) -> Option<u64> {
        self.stopped_at
    }

    fn check_early_stop(&mut self, step: u64, metrics: &EvalMetrics) -> Result<MonitorAction> {
        let Some(es) = &self.early_stopping else {
            return Ok(MonitorAction::Continue);
        };
        let value = *metrics.get(&es.metric).ok_or_else(|| {
            Error::Config(format!(
                "early stopping metric {:?} is not computed by the validation monitor",
                es.metric
            ))
        })?;

        let improved = match self.best {
            None => true,
            Some((_, best)) if es.minimize => value < best,
            Some((_, best)) => value > best,
        };
        if improved {
            self.best = Some((step, value));
            return Ok(MonitorAction::Continue);
        }

        let (best_step, best_value) = self.best.unwrap_or((step, value));
        if step - best_step >= es.rounds {
            info!(
                "Stopping. Best step: {} with {} = {}.",
                best_step, es.metric, best_value
            );
            self.stopped_at = Some(step);
            return Ok(MonitorAction::Stop);
        }
        Ok(MonitorAction::Continue)
    }
}

impl Monitor for ValidationMonitor<'_> {
    fn step_end(&mut self, ctx: &StepContext<'_>) -> Result<MonitorAction> {
        if ctx.step % self.every_n_steps != 0 {
            return Ok(MonitorAction::Continue);
        }

        let metrics = evaluate_network(ctx.network, self.dataset, &self.metrics)?;
        let summary = metrics
            .iter()
            .map(|(name, value)| format!("{} = {:.6}", name, value))
            .collect::<Vec<_>>()
            .join(", ");
        info!("Validation (step {}): {}", ctx.step, summary);

        let action = self.check_early_stop(ctx.step, &metrics)?;
        self.history.push(ValidationRecord {
            step: ctx.step,
            metrics,
        });
        Ok(action)
    }
}
