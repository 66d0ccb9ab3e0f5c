//! Deep neural network classifier with checkpointing.

use log::{debug, info};

use crate::checkpoint::{CheckpointManager, ModelCheckpoint, SaveTrigger};
use crate::config::ClassifierConfig;
use crate::data::{check_dataset, input_dimension, Dataset, FeatureColumn};
use crate::error::{Error, Result};
use crate::estimator::{Estimator, FitSummary};
use crate::metrics::{evaluate_network, EvalMetrics, MetricFn, MetricSpec, MetricSpecs, PredictionKey};
use crate::monitors::{Monitor, MonitorAction, StepContext};
use crate::network::Dnn;
use crate::optimizers::{Optimizer, OptimizerKind};
use crate::utils::{argmax, SimpleRng};

/// Feed-forward classifier over real-valued feature columns.
///
/// With a `model_dir`, construction restores the newest checkpoint found there
/// and `fit` keeps saving new ones, so successive runs continue training the
/// same model.
///
/// # Example
///
/// ```no_run
/// use iris_dnn::classifier::DnnClassifier;
/// use iris_dnn::config::ClassifierConfig;
/// use iris_dnn::data::{load_csv_with_header, real_valued_column};
/// use iris_dnn::estimator::Estimator;
///
/// let train = load_csv_with_header("data/iris_training.csv", -1).unwrap();
/// let mut classifier =
///     DnnClassifier::new(vec![real_valued_column("", 4)], ClassifierConfig::default()).unwrap();
/// classifier.fit(&train, 2000, &mut []).unwrap();
/// ```
#[derive(Debug)]
pub struct DnnClassifier {
    feature_columns: Vec<FeatureColumn>,
    config: ClassifierConfig,
    network: Dnn,
    optimizer: OptimizerKind,
    global_step: u64,
    rng: SimpleRng,
    checkpoints: Option<CheckpointManager>,
}

impl DnnClassifier {
    pub fn new(feature_columns: Vec<FeatureColumn>, config: ClassifierConfig) -> Result<Self> {
        config.validate()?;
        let n_inputs = input_dimension(&feature_columns);
        if n_inputs == 0 {
            return Err(Error::Config("feature columns declare no inputs".to_string()));
        }

        let mut rng = SimpleRng::from_seed(config.run.random_seed);
        let network = Dnn::new(n_inputs, &config.hidden_units, config.n_classes, &mut rng);
        let checkpoints = config
            .model_dir
            .as_ref()
            .map(|dir| CheckpointManager::new(dir, config.run.keep_checkpoint_max));

        let mut classifier = Self {
            optimizer: config.optimizer.build(),
            feature_columns,
            config,
            network,
            global_step: 0,
            rng,
            checkpoints,
        };
        classifier.restore()?;

        info!(
            "DNN classifier: {} inputs, hidden units {:?}, {} classes, {} parameters, global step {}",
            n_inputs,
            classifier.config.hidden_units,
            classifier.config.n_classes,
            classifier.network.parameter_count(),
            classifier.global_step
        );
        Ok(classifier)
    }

    fn restore(&mut self) -> Result<()> {
        let Some(manager) = &self.checkpoints else {
            return Ok(());
        };
        let Some(checkpoint) = manager.latest()? else {
            return Ok(());
        };

        let restored = &checkpoint.network;
        if restored.n_inputs() != self.network.n_inputs()
            || restored.n_classes() != self.network.n_classes()
            || restored.hidden_units() != self.config.hidden_units
        {
            return Err(Error::Checkpoint(format!(
                "checkpoint in {} has shape {} -> {:?} -> {}, configured {} -> {:?} -> {}",
                manager.dir().display(),
                restored.n_inputs(),
                restored.hidden_units(),
                restored.n_classes(),
                self.network.n_inputs(),
                self.config.hidden_units,
                self.network.n_classes()
            )));
        }
        if checkpoint.optimizer.name() != self.optimizer.name() {
            return Err(Error::Checkpoint(format!(
                "checkpoint was trained with {}, configured optimizer is {}",
                checkpoint.optimizer.name(),
                self.optimizer.name()
            )));
        }

        if !checkpoint
            .optimizer
            .slots_fit(&checkpoint.network.slot_lengths())
        {
            return Err(Error::Checkpoint(format!(
                "optimizer state in {} does not match the network parameters",
                manager.dir().display()
            )));
        }

        info!(
            "Restoring parameters from {} at step {}",
            manager.dir().display(),
            checkpoint.global_step
        );
        let learning_rate = self.optimizer.learning_rate();
        self.network = checkpoint.network;
        self.optimizer = checkpoint.optimizer;
        self.optimizer.set_learning_rate(learning_rate);
        self.global_step = checkpoint.global_step;
        Ok(())
    }

    fn save(&self) -> Result<()> {
        if let Some(manager) = &self.checkpoints {
            manager.save(&ModelCheckpoint {
                global_step: self.global_step,
                network: self.network.clone(),
                optimizer: self.optimizer.clone(),
            })?;
        }
        Ok(())
    }

    pub fn feature_columns(&self) -> &[FeatureColumn] {
        &self.feature_columns
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn network(&self) -> &Dnn {
        &self.network
    }

    fn check_dataset(&self, dataset: &Dataset) -> Result<()> {
        check_dataset(&self.feature_columns, dataset)?;
        if dataset.is_empty() {
            return Err(Error::EmptyDataset);
        }
        dataset.check_labels(self.config.n_classes)
    }

    fn check_features(&self, features: &[f32]) -> Result<usize> {
        let width = self.network.n_inputs();
        if features.len() % width != 0 {
            return Err(Error::ShapeMismatch {
                expected: width,
                found: features.len() % width,
            });
        }
        Ok(features.len() / width)
    }

    /// Class probabilities for each row, `rows × n_classes`.
    pub fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>> {
        let rows = self.check_features(features)?;
        Ok(self.network.predict_proba(features, rows))
    }
}

impl Estimator for DnnClassifier {
    fn fit(
        &mut self,
        dataset: &Dataset,
        steps: u64,
        monitors: &mut [&mut dyn Monitor],
    ) -> Result<FitSummary> {
        self.check_dataset(dataset)?;

        let n = dataset.len();
        let batch_size = self.config.batch_size.map_or(n, |b| b.min(n));
        let start_step = self.global_step;
        let last_step = start_step + steps;
        let log_every = self.config.run.log_step_count_steps;

        let mut trigger = SaveTrigger::from_run_config(&self.config.run, start_step);
        let mut saved_step = start_step;
        let mut order: Vec<usize> = (0..n).collect();
        let mut cursor = n;
        let mut batch_x = Vec::with_capacity(batch_size * dataset.n_features());
        let mut batch_y = Vec::with_capacity(batch_size);
        let mut final_loss = None;
        let mut stopped_early = false;

        for monitor in monitors.iter_mut() {
            monitor.begin(start_step, last_step);
        }

        while self.global_step < last_step {
            let loss = if batch_size == n {
                self.network
                    .train_step(dataset.features(), dataset.labels(), &mut self.optimizer)
            } else {
                batch_x.clear();
                batch_y.clear();
                for _ in 0..batch_size {
                    if cursor == n {
                        self.rng.shuffle(&mut order);
                        cursor = 0;
                    }
                    let i = order[cursor];
                    cursor += 1;
                    batch_x.extend_from_slice(dataset.row(i));
                    batch_y.push(dataset.labels()[i]);
                }
                self.network.train_step(&batch_x, &batch_y, &mut self.optimizer)
            };
            self.global_step += 1;
            final_loss = Some(loss);

            if self.global_step % log_every == 0 {
                info!("loss = {}, step = {}", loss, self.global_step);
            }

            if self.checkpoints.is_some() && trigger.should_save(self.global_step) {
                self.save()?;
                trigger.mark_saved(self.global_step);
                saved_step = self.global_step;
            }

            let ctx = StepContext {
                step: self.global_step,
                loss,
                network: &self.network,
            };
            let mut stop = false;
            for monitor in monitors.iter_mut() {
                if monitor.step_end(&ctx)? == MonitorAction::Stop {
                    stop = true;
                }
            }
            if stop {
                debug!("Monitor requested stop at step {}", self.global_step);
                stopped_early = true;
                break;
            }
        }

        if self.global_step > saved_step {
            self.save()?;
        }
        for monitor in monitors.iter_mut() {
            monitor.end(self.global_step);
        }
        if let Some(loss) = final_loss {
            info!("Loss for final step: {}.", loss);
        }

        Ok(FitSummary {
            start_step,
            global_step: self.global_step,
            final_loss,
            stopped_early,
        })
    }

    fn evaluate(&self, dataset: &Dataset) -> Result<EvalMetrics> {
        self.check_dataset(dataset)?;

        let mut specs = MetricSpecs::new();
        specs.insert(
            "accuracy".to_string(),
            MetricSpec::new(MetricFn::StreamingAccuracy, PredictionKey::Classes),
        );
        let mut results = evaluate_network(&self.network, dataset, &specs)?;
        results.insert("global_step".to_string(), self.global_step as f32);

        info!(
            "Evaluation at step {}: accuracy = {:.6}, loss = {:.6}",
            self.global_step,
            results.get("accuracy").copied().unwrap_or_default(),
            results.get("loss").copied().unwrap_or_default()
        );
        Ok(results)
    }

    fn predict(&self, features: &[f32]) -> Result<Vec<usize>> {
        let probs = self.predict_proba(features)?;
        Ok(probs
            .chunks_exact(self.config.n_classes)
            .map(argmax)
            .collect())
    }

    fn global_step(&self) -> u64 {
        self.global_step
    }
}
