//! Iris DNN Library
//!
//! Trains a feed-forward classifier on the iris flower measurements and
//! reports its accuracy on a held-out set.
//!
//! # Modules
//!
//! - `data`: header-prefixed CSV loading and the feature schema
//! - `layers`: Layer trait and the dense layer
//! - `optimizers`: Optimizer trait with Adagrad and SGD
//! - `network`: the ReLU/softmax layer stack
//! - `metrics`: streaming accuracy, precision and recall
//! - `monitors`: per-step training observers, including validation
//! - `checkpoint`: model directory persistence
//! - `classifier`: `DnnClassifier`, the `Estimator` implementation
//! - `config`: pipeline configuration structures
//! - `pipeline`: the end-to-end load/train/evaluate run
//! - `utils`: RNG and activation helpers

pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod data;
pub mod error;
pub mod estimator;
pub mod layers;
pub mod metrics;
pub mod monitors;
pub mod network;
pub mod optimizers;
pub mod pipeline;
pub mod utils;

pub use classifier::DnnClassifier;
pub use error::{Error, Result};
pub use estimator::{Estimator, FitSummary};
