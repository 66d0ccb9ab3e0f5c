//! Streaming classification metrics and batched evaluation of a network.
//!
//! Metrics are fed one batch of predictions at a time, so evaluation never
//! needs the whole prediction matrix in memory.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::network::Dnn;
use crate::utils::argmax;

/// Rows per forward pass during evaluation.
pub const EVAL_BATCH_SIZE: usize = 32;

/// Metric name -> value, as returned by evaluation.
pub type EvalMetrics = BTreeMap<String, f32>;

/// Metric name -> how to compute it.
pub type MetricSpecs = BTreeMap<String, MetricSpec>;

/// A metric accumulated incrementally over batches.
pub trait StreamingMetric {
    fn update(&mut self, predictions: &[usize], labels: &[usize]);

    /// Current value; 0.0 before any relevant sample has been seen.
    fn result(&self) -> f32;

    fn reset(&mut self);
}

fn ratio(numerator: u64, denominator: u64) -> f32 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f32 / denominator as f32
    }
}

/// Fraction of predictions equal to the label.
#[derive(Debug, Default, Clone)]
pub struct StreamingAccuracy {
    correct: u64,
    total: u64,
}

impl StreamingMetric for StreamingAccuracy {
    fn update(&mut self, predictions: &[usize], labels: &[usize]) {
        for (p, l) in predictions.iter().zip(labels) {
            self.total += 1;
            if p == l {
                self.correct += 1;
            }
        }
    }

    fn result(&self) -> f32 {
        ratio(self.correct, self.total)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Binary precision with class ids read as booleans: class 0 is negative,
/// every other class is positive.
#[derive(Debug, Default, Clone)]
pub struct StreamingPrecision {
    true_positives: u64,
    false_positives: u64,
}

impl StreamingMetric for StreamingPrecision {
    fn update(&mut self, predictions: &[usize], labels: &[usize]) {
        for (&p, &l) in predictions.iter().zip(labels) {
            match (p != 0, l != 0) {
                (true, true) => self.true_positives += 1,
                (true, false) => self.false_positives += 1,
                _ => {}
            }
        }
    }

    fn result(&self) -> f32 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Binary recall with the same boolean reading of class ids as [`StreamingPrecision`].
#[derive(Debug, Default, Clone)]
pub struct StreamingRecall {
    true_positives: u64,
    false_negatives: u64,
}

impl StreamingMetric for StreamingRecall {
    fn update(&mut self, predictions: &[usize], labels: &[usize]) {
        for (&p, &l) in predictions.iter().zip(labels) {
            match (p != 0, l != 0) {
                (true, true) => self.true_positives += 1,
                (false, true) => self.false_negatives += 1,
                _ => {}
            }
        }
    }

    fn result(&self) -> f32 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Which metric function to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFn {
    StreamingAccuracy,
    StreamingPrecision,
    StreamingRecall,
}

/// Which model output a metric consumes. Only predicted class ids are exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionKey {
    #[default]
    Classes,
}

/// A metric function bound to the prediction it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub metric_fn: MetricFn,
    #[serde(default)]
    pub prediction_key: PredictionKey,
}

impl MetricSpec {
    pub fn new(metric_fn: MetricFn, prediction_key: PredictionKey) -> Self {
        Self {
            metric_fn,
            prediction_key,
        }
    }

    /// Fresh accumulator for this metric.
    pub fn build(&self) -> Box<dyn StreamingMetric> {
        match self.metric_fn {
            MetricFn::StreamingAccuracy => Box::<StreamingAccuracy>::default(),
            MetricFn::StreamingPrecision => Box::<StreamingPrecision>::default(),
            MetricFn::StreamingRecall => Box::<StreamingRecall>::default(),
        }
    }
}

/// accuracy / precision / recall over predicted classes.
pub fn default_validation_metrics() -> MetricSpecs {
    [
        ("accuracy", MetricFn::StreamingAccuracy),
        ("precision", MetricFn::StreamingPrecision),
        ("recall", MetricFn::StreamingRecall),
    ]
    .into_iter()
    .map(|(name, metric_fn)| {
        (
            name.to_string(),
            MetricSpec::new(metric_fn, PredictionKey::Classes),
        )
    })
    .collect()
}

/// Evaluate `network` on `dataset`, batch by batch.
///
/// The result always holds `"loss"` (mean cross-entropy) plus one entry per spec.
pub fn evaluate_network(network: &Dnn, dataset: &Dataset, specs: &MetricSpecs) -> Result<EvalMetrics> {
    if dataset.n_features() != network.n_inputs() {
        return Err(Error::ShapeMismatch {
            expected: network.n_inputs(),
            found: dataset.n_features(),
        });
    }
    if dataset.is_empty() {
        return Err(Error::EmptyDataset);
    }
    dataset.check_labels(network.n_classes())?;

    let n_classes = network.n_classes();
    let n_features = dataset.n_features();
    let mut streams: Vec<(&String, Box<dyn StreamingMetric>)> =
        specs.iter().map(|(name, spec)| (name, spec.build())).collect();
    let mut total_loss = 0.0f64;

    for (batch_x, batch_y) in dataset
        .features()
        .chunks(EVAL_BATCH_SIZE * n_features)
        .zip(dataset.labels().chunks(EVAL_BATCH_SIZE))
    {
        let probs = network.predict_proba(batch_x, batch_y.len());
        let mut predictions = Vec::with_capacity(batch_y.len());
        for (row, &label) in probs.chunks_exact(n_classes).zip(batch_y) {
            total_loss -= f64::from(row[label].max(1e-9).ln());
            predictions.push(argmax(row));
        }
        for (_, metric) in streams.iter_mut() {
            metric.update(&predictions, batch_y);
        }
    }

    let mut results = EvalMetrics::new();
    results.insert("loss".to_string(), (total_loss / dataset.len() as f64) as f32);
    for (name, metric) in streams {
        results.insert(name.clone(), metric.result());
    }
    Ok(results)
}
