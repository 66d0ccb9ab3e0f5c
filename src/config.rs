//! Configuration structures for the training pipeline
//!
//! Every struct implements `Default` with the values of the stock iris run, and
//! deserializes with `#[serde(default)]`, so a JSON file only needs to mention
//! the values it changes.
//!
//! # Example
//!
//! ```json
//! {
//!   "steps": 500,
//!   "classifier": {
//!     "hidden_units": [16, 16],
//!     "optimizer": { "type": "sgd", "learning_rate": 0.01 },
//!     "run": { "random_seed": 7, "save_checkpoints_secs": null, "save_checkpoints_steps": 100 }
//!   },
//!   "validation": { "every_n_steps": 25, "early_stopping_rounds": 200 }
//! }
//! ```
//!
//! The two checkpoint triggers are exclusive: setting `save_checkpoints_steps`
//! requires `save_checkpoints_secs` to be explicitly `null`.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metrics::{default_validation_metrics, MetricSpecs};
use crate::optimizers::{Adagrad, OptimizerKind, Sgd};

/// Optimizer choice and hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Adagrad {
        learning_rate: f32,
        #[serde(default = "default_initial_accumulator_value")]
        initial_accumulator_value: f32,
    },
    Sgd {
        learning_rate: f32,
    },
}

fn default_initial_accumulator_value() -> f32 {
    0.1
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Adagrad {
            learning_rate: 0.05,
            initial_accumulator_value: default_initial_accumulator_value(),
        }
    }
}

impl OptimizerConfig {
    pub fn learning_rate(&self) -> f32 {
        match *self {
            OptimizerConfig::Adagrad { learning_rate, .. } => learning_rate,
            OptimizerConfig::Sgd { learning_rate } => learning_rate,
        }
    }

    /// Fresh optimizer with empty slot state.
    pub fn build(&self) -> OptimizerKind {
        match *self {
            OptimizerConfig::Adagrad {
                learning_rate,
                initial_accumulator_value,
            } => OptimizerKind::Adagrad(Adagrad::new(learning_rate, initial_accumulator_value)),
            OptimizerConfig::Sgd { learning_rate } => OptimizerKind::Sgd(Sgd::new(learning_rate)),
        }
    }
}

/// Runtime settings: checkpoint cadence, retention, seeding and log cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Save a checkpoint when this many seconds have passed since the last one.
    pub save_checkpoints_secs: Option<u64>,
    /// Save a checkpoint every N global steps.
    pub save_checkpoints_steps: Option<u64>,
    /// Number of most recent checkpoints kept on disk.
    pub keep_checkpoint_max: usize,
    /// Seed for weight initialization and batch shuffling; `None` seeds from the clock.
    pub random_seed: Option<u64>,
    /// Log the training loss every N global steps.
    pub log_step_count_steps: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            save_checkpoints_secs: Some(1),
            save_checkpoints_steps: None,
            keep_checkpoint_max: 5,
            random_seed: None,
            log_step_count_steps: 100,
        }
    }
}

/// Network shape, persistence and optimizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub hidden_units: Vec<usize>,
    pub n_classes: usize,
    /// Checkpoint directory; `None` keeps the model in memory only.
    pub model_dir: Option<PathBuf>,
    pub optimizer: OptimizerConfig,
    /// Rows per training step; `None` trains on the full dataset every step.
    pub batch_size: Option<usize>,
    pub run: RunConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            hidden_units: vec![10, 20, 10],
            n_classes: 3,
            model_dir: Some(PathBuf::from("/tmp/iris_model")),
            optimizer: OptimizerConfig::default(),
            batch_size: None,
            run: RunConfig::default(),
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hidden_units.is_empty() {
            return Err(Error::Config("hidden_units must not be empty".to_string()));
        }
        if let Some(i) = self.hidden_units.iter().position(|&w| w == 0) {
            return Err(Error::Config(format!("hidden_units[{}] must be positive", i)));
        }
        if self.n_classes < 2 {
            return Err(Error::Config("n_classes must be at least 2".to_string()));
        }
        let lr = self.optimizer.learning_rate();
        if !(lr > 0.0 && lr.is_finite()) {
            return Err(Error::Config("learning_rate must be positive".to_string()));
        }
        if let OptimizerConfig::Adagrad {
            initial_accumulator_value,
            ..
        } = self.optimizer
        {
            if initial_accumulator_value <= 0.0 {
                return Err(Error::Config(
                    "initial_accumulator_value must be positive".to_string(),
                ));
            }
        }
        if self.batch_size == Some(0) {
            return Err(Error::Config("batch_size must be positive".to_string()));
        }

        let run = &self.run;
        if run.save_checkpoints_secs.is_some() && run.save_checkpoints_steps.is_some() {
            return Err(Error::Config(
                "save_checkpoints_secs and save_checkpoints_steps are mutually exclusive".to_string(),
            ));
        }
        if run.save_checkpoints_steps == Some(0) {
            return Err(Error::Config("save_checkpoints_steps must be positive".to_string()));
        }
        if run.keep_checkpoint_max == 0 {
            return Err(Error::Config("keep_checkpoint_max must be positive".to_string()));
        }
        if run.log_step_count_steps == 0 {
            return Err(Error::Config("log_step_count_steps must be positive".to_string()));
        }
        Ok(())
    }
}

/// Periodic validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub every_n_steps: u64,
    pub metrics: MetricSpecs,
    /// Stop after this many global steps without improvement; `None` disables.
    pub early_stopping_rounds: Option<u64>,
    pub early_stopping_metric: String,
    pub early_stopping_metric_minimize: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            every_n_steps: 50,
            metrics: default_validation_metrics(),
            early_stopping_rounds: None,
            early_stopping_metric: "loss".to_string(),
            early_stopping_metric_minimize: true,
        }
    }
}

/// Top-level configuration for one load/train/evaluate run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    /// Column holding the label; negative values count from the end of the row.
    pub target_column: i64,
    pub feature_dimension: usize,
    pub steps: u64,
    pub classifier: ClassifierConfig,
    pub validation: ValidationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            train_path: PathBuf::from("data/iris_training.csv"),
            test_path: PathBuf::from("data/iris_test.csv"),
            target_column: -1,
            feature_dimension: 4,
            steps: 2000,
            classifier: ClassifierConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load `path` if it exists, otherwise return the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            info!("Using configuration from {}", path.display());
            load_config(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Loads a pipeline configuration from a JSON file and validates it.
///
/// # Examples
///
/// ```no_run
/// use iris_dnn::config::load_config;
///
/// let cfg = load_config("config/iris_dnn.json").unwrap();
/// assert_eq!(cfg.classifier.hidden_units, vec![10, 20, 10]);
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let config: PipelineConfig = serde_json::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &PipelineConfig) -> Result<()> {
    if config.feature_dimension == 0 {
        return Err(Error::Config("feature_dimension must be positive".to_string()));
    }
    if config.steps == 0 {
        return Err(Error::Config("steps must be positive".to_string()));
    }
    if config.validation.every_n_steps == 0 {
        return Err(Error::Config("every_n_steps must be positive".to_string()));
    }
    if config.validation.early_stopping_rounds == Some(0) {
        return Err(Error::Config("early_stopping_rounds must be positive".to_string()));
    }
    config.classifier.validate()
}
