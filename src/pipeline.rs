//! Load → construct → fit → evaluate, as one call.

use log::info;

use crate::classifier::DnnClassifier;
use crate::config::{validate_config, PipelineConfig};
use crate::data::{load_csv_with_header, real_valued_column, Dataset, FeatureColumn};
use crate::error::Result;
use crate::estimator::{Estimator, FitSummary};
use crate::metrics::EvalMetrics;
use crate::monitors::{Monitor, ValidationMonitor, ValidationRecord};

/// What a full pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub fit: FitSummary,
    pub metrics: EvalMetrics,
    pub validation: Vec<ValidationRecord>,
}

impl PipelineReport {
    pub fn accuracy(&self) -> f32 {
        self.metrics.get("accuracy").copied().unwrap_or_default()
    }
}

/// The single unnamed real-valued column the pipeline feeds the network.
pub fn feature_columns(config: &PipelineConfig) -> Vec<FeatureColumn> {
    vec![real_valued_column("", config.feature_dimension)]
}

/// Build a classifier from `config` and fit it on `dataset`.
pub fn train(
    dataset: &Dataset,
    config: &PipelineConfig,
    monitors: &mut [&mut dyn Monitor],
) -> Result<(DnnClassifier, FitSummary)> {
    let mut classifier = DnnClassifier::new(feature_columns(config), config.classifier.clone())?;
    let summary = classifier.fit(dataset, config.steps, monitors)?;
    Ok((classifier, summary))
}

pub fn evaluate<E: Estimator>(model: &E, dataset: &Dataset) -> Result<EvalMetrics> {
    model.evaluate(dataset)
}

pub fn format_accuracy(accuracy: f32) -> String {
    format!("Accuracy: {:.6}", accuracy)
}

/// Run the whole load, train and evaluate sequence described by `config`.
pub fn run(config: &PipelineConfig) -> Result<PipelineReport> {
    validate_config(config)?;

    let training_set = load_csv_with_header(&config.train_path, config.target_column)?;
    let test_set = load_csv_with_header(&config.test_path, config.target_column)?;

    let mut monitor = ValidationMonitor::from_config(&test_set, &config.validation);
    let (classifier, fit) = train(&training_set, config, &mut [&mut monitor])?;
    info!(
        "Trained to global step {} ({} validation passes)",
        fit.global_step,
        monitor.invocations()
    );

    let metrics = evaluate(&classifier, &test_set)?;
    Ok(PipelineReport {
        fit,
        metrics,
        validation: monitor.history().to_vec(),
    })
}
