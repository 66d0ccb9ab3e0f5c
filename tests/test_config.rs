//! Tests for configuration parsing
//!
//! This file tests the config module including:
//! - Loading the bundled default config
//! - Partial files falling back to defaults
//! - Optimizer and metric tagging
//! - Handling invalid JSON, missing files and invalid values

use iris_dnn::config::{load_config, validate_config, OptimizerConfig, PipelineConfig};
use iris_dnn::metrics::{MetricFn, PredictionKey};
use iris_dnn::Error;
use std::fs;
use tempfile::tempdir;

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().expect("failed to create temp dir");
    let path = dir.path().join("config.json");
    fs::write(&path, contents).expect("failed to write config");
    (dir, path)
}

// ============================================================================
// Valid Config Loading Tests
// ============================================================================

mod valid_config_tests {
    use super::*;

    #[test]
    fn test_bundled_config_equals_defaults() {
        let config = load_config("config/iris_dnn.json").expect("Failed to load bundled config");
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let (_dir, path) = write_config(
            r#"{
  "steps": 300,
  "classifier": { "hidden_units": [8, 8], "run": { "random_seed": 42 } },
  "validation": { "every_n_steps": 25 }
}"#,
        );
        let config = load_config(&path).unwrap();

        assert_eq!(config.steps, 300);
        assert_eq!(config.classifier.hidden_units, vec![8, 8]);
        assert_eq!(config.classifier.run.random_seed, Some(42));
        assert_eq!(config.classifier.run.keep_checkpoint_max, 5);
        assert_eq!(config.classifier.n_classes, 3);
        assert_eq!(config.validation.every_n_steps, 25);
        assert_eq!(config.validation.metrics.len(), 3);
        assert_eq!(config.target_column, -1);
    }

    #[test]
    fn test_sgd_and_step_checkpoints() {
        let (_dir, path) = write_config(
            r#"{
  "classifier": {
    "model_dir": null,
    "optimizer": { "type": "sgd", "learning_rate": 0.01 },
    "run": { "save_checkpoints_secs": null, "save_checkpoints_steps": 100 }
  }
}"#,
        );
        let config = load_config(&path).unwrap();

        assert_eq!(config.classifier.model_dir, None);
        assert_eq!(
            config.classifier.optimizer,
            OptimizerConfig::Sgd { learning_rate: 0.01 }
        );
        assert_eq!(config.classifier.run.save_checkpoints_steps, Some(100));
    }

    #[test]
    fn test_custom_metric_specs() {
        let (_dir, path) = write_config(
            r#"{ "validation": { "metrics": { "acc": { "metric_fn": "streaming_accuracy" } } } }"#,
        );
        let config = load_config(&path).unwrap();

        let spec = config.validation.metrics["acc"];
        assert_eq!(spec.metric_fn, MetricFn::StreamingAccuracy);
        assert_eq!(spec.prediction_key, PredictionKey::Classes);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::load_or_default(dir.path().join("missing.json")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }
}

// ============================================================================
// Invalid Config Tests
// ============================================================================

mod invalid_config_tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_config("config/does_not_exist.json"),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_malformed_json() {
        let (_dir, path) = write_config("{ \"steps\": ");
        assert!(matches!(load_config(&path), Err(Error::Json(_))));
    }

    #[test]
    fn test_unknown_optimizer() {
        let (_dir, path) =
            write_config(r#"{ "classifier": { "optimizer": { "type": "adam", "learning_rate": 0.1 } } }"#);
        assert!(matches!(load_config(&path), Err(Error::Json(_))));
    }

    #[test]
    fn test_invalid_values_are_rejected_on_load() {
        for body in [
            r#"{ "steps": 0 }"#,
            r#"{ "classifier": { "hidden_units": [] } }"#,
            r#"{ "classifier": { "n_classes": 1 } }"#,
            r#"{ "classifier": { "run": { "save_checkpoints_steps": 10 } } }"#,
            r#"{ "validation": { "every_n_steps": 0 } }"#,
        ] {
            let (_dir, path) = write_config(body);
            assert!(
                matches!(load_config(&path), Err(Error::Config(_))),
                "{} should be rejected",
                body
            );
        }
    }

    #[test]
    fn test_validate_negative_learning_rate() {
        let mut config = PipelineConfig::default();
        config.classifier.optimizer = OptimizerConfig::Adagrad {
            learning_rate: -0.1,
            initial_accumulator_value: 0.1,
        };
        assert!(validate_config(&config).is_err());
    }
}
