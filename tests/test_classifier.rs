//! Integration tests for DnnClassifier, monitors and checkpoints
//!
//! This file covers:
//! - Learning a separable toy problem
//! - Validation monitor cadence over a full 2000-step run
//! - Evaluation output keys and ranges
//! - Seeded reproducibility
//! - Checkpoint save, restore, pruning and shape checks
//! - Early stopping through the monitor interface

use approx::assert_abs_diff_eq;
use iris_dnn::checkpoint::{CheckpointManager, ModelCheckpoint};
use iris_dnn::config::{ClassifierConfig, OptimizerConfig};
use iris_dnn::data::{real_valued_column, Dataset};
use iris_dnn::metrics::default_validation_metrics;
use iris_dnn::monitors::{Monitor, MonitorAction, StepContext, ValidationMonitor};
use iris_dnn::network::Dnn;
use iris_dnn::optimizers::{Adagrad, Optimizer, OptimizerKind};
use iris_dnn::utils::SimpleRng;
use iris_dnn::{DnnClassifier, Error, Estimator, Result};
use tempfile::tempdir;

/// Three well separated clusters in the plane, ten points each.
fn toy_dataset() -> Dataset {
    let centers = [(0.0f32, 0.0f32), (3.0, 0.0), (0.0, 3.0)];
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for i in 0..10 {
        let dx = (i % 5) as f32 * 0.1 - 0.2;
        let dy = (i / 5) as f32 * 0.2 - 0.1;
        for (class, &(cx, cy)) in centers.iter().enumerate() {
            features.push(cx + dx);
            features.push(cy + dy);
            labels.push(class);
        }
    }
    Dataset::new(features, labels, 2).unwrap()
}

fn toy_config(seed: u64) -> ClassifierConfig {
    let mut config = ClassifierConfig {
        hidden_units: vec![10],
        n_classes: 3,
        model_dir: None,
        optimizer: OptimizerConfig::Adagrad {
            learning_rate: 0.1,
            initial_accumulator_value: 0.1,
        },
        ..ClassifierConfig::default()
    };
    config.run.random_seed = Some(seed);
    config
}

fn toy_classifier(config: ClassifierConfig) -> DnnClassifier {
    DnnClassifier::new(vec![real_valued_column("", 2)], config).unwrap()
}

// ============================================================================
// Training Tests
// ============================================================================

mod training_tests {
    use super::*;

    #[test]
    fn test_separable_toy_set_is_learned() {
        let dataset = toy_dataset();
        let mut classifier = toy_classifier(toy_config(1));

        let summary = classifier.fit(&dataset, 500, &mut []).unwrap();
        assert_eq!(summary.global_step, 500);
        assert!(!summary.stopped_early);

        let metrics = classifier.evaluate(&dataset).unwrap();
        assert!(metrics["accuracy"] >= 0.9, "accuracy {}", metrics["accuracy"]);
    }

    #[test]
    fn test_predict_matches_labels_after_training() {
        let dataset = toy_dataset();
        let mut classifier = toy_classifier(toy_config(2));
        classifier.fit(&dataset, 500, &mut []).unwrap();

        let predictions = classifier.predict(&[0.0, 0.0, 3.0, 0.0, 0.0, 3.0]).unwrap();
        assert_eq!(predictions, vec![0, 1, 2]);

        let probs = classifier.predict_proba(&[3.0, 0.0]).unwrap();
        assert_eq!(probs.len(), 3);
        assert_abs_diff_eq!(probs.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_sgd_minibatches_train() {
        let dataset = toy_dataset();
        let mut config = toy_config(4);
        config.optimizer = OptimizerConfig::Sgd { learning_rate: 0.1 };
        config.batch_size = Some(8);
        let mut classifier = toy_classifier(config);

        let before = classifier.evaluate(&dataset).unwrap()["loss"];
        classifier.fit(&dataset, 300, &mut []).unwrap();
        let after = classifier.evaluate(&dataset).unwrap()["loss"];
        assert!(after < before, "loss {} -> {}", before, after);
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let dataset = toy_dataset();
        let mut config = toy_config(5);
        config.batch_size = Some(7);

        let mut a = toy_classifier(config.clone());
        let mut b = toy_classifier(config);
        a.fit(&dataset, 100, &mut []).unwrap();
        b.fit(&dataset, 100, &mut []).unwrap();

        assert_eq!(a.evaluate(&dataset).unwrap(), b.evaluate(&dataset).unwrap());
    }
}

// ============================================================================
// Evaluation Tests
// ============================================================================

mod evaluation_tests {
    use super::*;

    #[test]
    fn test_evaluate_keys_and_ranges() {
        let dataset = toy_dataset();
        let mut classifier = toy_classifier(toy_config(6));

        let untrained = classifier.evaluate(&dataset).unwrap();
        assert!((0.0..=1.0).contains(&untrained["accuracy"]));

        classifier.fit(&dataset, 25, &mut []).unwrap();
        let metrics = classifier.evaluate(&dataset).unwrap();
        assert!((0.0..=1.0).contains(&metrics["accuracy"]));
        assert!(metrics["loss"] >= 0.0);
        assert_eq!(metrics["global_step"], 25.0);
    }

    #[test]
    fn test_empty_dataset_is_rejected() {
        let empty = Dataset::new(Vec::new(), Vec::new(), 2).unwrap();
        let mut classifier = toy_classifier(toy_config(7));
        assert!(matches!(classifier.evaluate(&empty), Err(Error::EmptyDataset)));
        assert!(matches!(
            classifier.fit(&empty, 1, &mut []),
            Err(Error::EmptyDataset)
        ));
    }
}

// ============================================================================
// Monitor Tests
// ============================================================================

mod monitor_tests {
    use super::*;

    /// Records every hook call and requests a stop at a fixed step.
    struct Recorder {
        began: Option<(u64, u64)>,
        steps: Vec<u64>,
        ended: Option<u64>,
        stop_at: Option<u64>,
    }

    impl Recorder {
        fn new(stop_at: Option<u64>) -> Self {
            Self {
                began: None,
                steps: Vec::new(),
                ended: None,
                stop_at,
            }
        }
    }

    impl Monitor for Recorder {
        fn begin(&mut self, first_step: u64, last_step: u64) {
            self.began = Some((first_step, last_step));
        }

        fn step_end(&mut self, ctx: &StepContext<'_>) -> Result<MonitorAction> {
            assert!(ctx.loss.is_finite());
            self.steps.push(ctx.step);
            if Some(ctx.step) == self.stop_at {
                return Ok(MonitorAction::Stop);
            }
            Ok(MonitorAction::Continue)
        }

        fn end(&mut self, step: u64) {
            self.ended = Some(step);
        }
    }

    #[test]
    fn test_validation_fires_forty_times_in_2000_steps() {
        let train = toy_dataset();
        let test = toy_dataset();
        let mut classifier = toy_classifier(toy_config(8));
        let mut monitor = ValidationMonitor::new(&test, 50, default_validation_metrics());

        classifier.fit(&train, 2000, &mut [&mut monitor]).unwrap();

        assert_eq!(monitor.invocations(), 40);
        let steps: Vec<u64> = monitor.history().iter().map(|r| r.step).collect();
        let expected: Vec<u64> = (1..=40).map(|k| k * 50).collect();
        assert_eq!(steps, expected);
        for record in monitor.history() {
            for key in ["accuracy", "precision", "recall"] {
                let value = record.metrics[key];
                assert!((0.0..=1.0).contains(&value), "{} = {}", key, value);
            }
        }
    }

    #[test]
    fn test_monitor_hooks_and_stop_request() {
        let dataset = toy_dataset();
        let mut classifier = toy_classifier(toy_config(9));
        let mut recorder = Recorder::new(Some(7));

        let summary = classifier.fit(&dataset, 10, &mut [&mut recorder]).unwrap();

        assert!(summary.stopped_early);
        assert_eq!(summary.global_step, 7);
        assert_eq!(recorder.began, Some((0, 10)));
        assert_eq!(recorder.steps, (1..=7).collect::<Vec<_>>());
        assert_eq!(recorder.ended, Some(7));
    }

    #[test]
    fn test_all_monitors_see_the_stopping_step() {
        let dataset = toy_dataset();
        let mut classifier = toy_classifier(toy_config(10));
        let mut stopper = Recorder::new(Some(3));
        let mut watcher = Recorder::new(None);

        classifier
            .fit(&dataset, 10, &mut [&mut stopper, &mut watcher])
            .unwrap();
        assert_eq!(watcher.steps, vec![1, 2, 3]);
        assert_eq!(watcher.ended, Some(3));
    }

    #[test]
    fn test_early_stopping_on_accuracy_plateau() {
        let dataset = toy_dataset();
        let mut classifier = toy_classifier(toy_config(11));
        let mut monitor = ValidationMonitor::new(&dataset, 10, default_validation_metrics())
            .with_early_stopping(100, "accuracy", false);

        let summary = classifier.fit(&dataset, 2000, &mut [&mut monitor]).unwrap();

        // Accuracy saturates at 1.0 on this set and cannot keep improving.
        assert!(summary.stopped_early);
        let (best_step, _) = monitor.best().unwrap();
        assert_eq!(monitor.stopped_at(), Some(summary.global_step));
        assert!(summary.global_step - best_step >= 100);
    }
}

// ============================================================================
// Checkpoint Tests
// ============================================================================

mod checkpoint_tests {
    use super::*;

    fn persistent_config(seed: u64, dir: &std::path::Path) -> ClassifierConfig {
        let mut config = toy_config(seed);
        config.model_dir = Some(dir.to_path_buf());
        config.run.save_checkpoints_secs = None;
        config
    }

    #[test]
    fn test_restore_continues_from_saved_step() {
        let dir = tempdir().unwrap();
        let dataset = toy_dataset();

        let mut first = toy_classifier(persistent_config(12, dir.path()));
        first.fit(&dataset, 20, &mut []).unwrap();
        let probs = first.predict_proba(&[1.0, 1.0]).unwrap();

        // A different seed proves the weights come from disk.
        let mut second = toy_classifier(persistent_config(99, dir.path()));
        assert_eq!(second.global_step(), 20);
        let restored = second.predict_proba(&[1.0, 1.0]).unwrap();
        for (a, b) in probs.iter().zip(&restored) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-5);
        }

        second.fit(&dataset, 5, &mut []).unwrap();
        assert_eq!(second.global_step(), 25);
        let manager = CheckpointManager::new(dir.path(), 5);
        assert_eq!(manager.latest().unwrap().unwrap().global_step, 25);
    }

    #[test]
    fn test_step_trigger_and_pruning() {
        let dir = tempdir().unwrap();
        let dataset = toy_dataset();
        let mut config = persistent_config(13, dir.path());
        config.run.save_checkpoints_steps = Some(5);
        config.run.keep_checkpoint_max = 2;

        toy_classifier(config).fit(&dataset, 20, &mut []).unwrap();

        let manager = CheckpointManager::new(dir.path(), 2);
        assert_eq!(
            manager.checkpoints().unwrap(),
            vec!["model.ckpt-15.json", "model.ckpt-20.json"]
        );
        assert!(!dir.path().join("model.ckpt-5.json").exists());
        assert!(dir.path().join("checkpoint").exists());
    }

    #[test]
    fn test_wall_clock_trigger_writes_intermediate_checkpoints() {
        let dir = tempdir().unwrap();
        let dataset = toy_dataset();
        let mut config = persistent_config(16, dir.path());
        config.run.save_checkpoints_secs = Some(0);
        config.run.keep_checkpoint_max = 3;

        toy_classifier(config).fit(&dataset, 10, &mut []).unwrap();

        let manager = CheckpointManager::new(dir.path(), 3);
        assert_eq!(
            manager.checkpoints().unwrap(),
            vec!["model.ckpt-8.json", "model.ckpt-9.json", "model.ckpt-10.json"]
        );
        assert!(dir.path().join("model.ckpt-9.json").exists());
    }

    #[test]
    fn test_one_second_trigger_saves_final_step() {
        let dir = tempdir().unwrap();
        let dataset = toy_dataset();
        let mut config = persistent_config(17, dir.path());
        config.run.save_checkpoints_secs = Some(1);

        toy_classifier(config).fit(&dataset, 5, &mut []).unwrap();

        let manager = CheckpointManager::new(dir.path(), 5);
        let saved = manager.checkpoints().unwrap();
        assert_eq!(saved.last().map(String::as_str), Some("model.ckpt-5.json"));
        assert_eq!(manager.latest().unwrap().unwrap().global_step, 5);
    }

    #[test]
    fn test_corrupt_optimizer_slots_are_an_error() {
        let dir = tempdir().unwrap();
        let mut optimizer = Adagrad::new(0.1, 0.1);
        // Slot 0 holds the 2x10 input weights; three values cannot belong to it.
        optimizer.update(0, &mut [0.0; 3], &[0.0; 3]);
        CheckpointManager::new(dir.path(), 5)
            .save(&ModelCheckpoint {
                global_step: 4,
                network: Dnn::new(2, &[10], 3, &mut SimpleRng::new(1)),
                optimizer: OptimizerKind::Adagrad(optimizer),
            })
            .unwrap();

        let err = DnnClassifier::new(
            vec![real_valued_column("", 2)],
            persistent_config(18, dir.path()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Checkpoint(_)));
    }

    #[test]
    fn test_incompatible_checkpoint_is_an_error() {
        let dir = tempdir().unwrap();
        let dataset = toy_dataset();
        toy_classifier(persistent_config(14, dir.path()))
            .fit(&dataset, 3, &mut [])
            .unwrap();

        let mut config = persistent_config(14, dir.path());
        config.hidden_units = vec![12];
        let err = DnnClassifier::new(vec![real_valued_column("", 2)], config).unwrap_err();
        assert!(matches!(err, Error::Checkpoint(_)));
    }

    #[test]
    fn test_optimizer_change_is_an_error() {
        let dir = tempdir().unwrap();
        let dataset = toy_dataset();
        toy_classifier(persistent_config(15, dir.path()))
            .fit(&dataset, 3, &mut [])
            .unwrap();

        let mut config = persistent_config(15, dir.path());
        config.optimizer = OptimizerConfig::Sgd { learning_rate: 0.1 };
        assert!(matches!(
            DnnClassifier::new(vec![real_valued_column("", 2)], config),
            Err(Error::Checkpoint(_))
        ));
    }
}
