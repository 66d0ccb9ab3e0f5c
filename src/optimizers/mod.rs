//! Optimizer abstractions for neural network parameter updates
//!
//! Optimizers turn accumulated gradients into parameter updates. Each trainable
//! tensor (a layer's weights, a layer's biases) is addressed by a *slot* index so
//! that stateful optimizers can keep per-tensor statistics.
//!
//! # Available Optimizers
//!
//! - [`Adagrad`]: per-parameter learning rates from accumulated squared gradients
//!   (the classifier default)
//! - [`Sgd`]: vanilla stochastic gradient descent
//!
//! [`OptimizerKind`] wraps the concrete optimizers so their slot state can be
//! written into checkpoints.

pub mod adagrad;
pub mod sgd;

use serde::{Deserialize, Serialize};

pub use adagrad::Adagrad;
pub use sgd::Sgd;

/// Core trait for neural network optimizers.
///
/// # Example
///
/// ```
/// use iris_dnn::optimizers::{Optimizer, Sgd};
///
/// let mut optimizer = Sgd::new(0.1);
/// let mut weights = vec![1.0, 2.0];
/// optimizer.update(0, &mut weights, &[0.5, -0.5]);
/// assert!((weights[0] - 0.95).abs() < 1e-6);
/// assert!((weights[1] - 2.05).abs() < 1e-6);
/// ```
pub trait Optimizer {
    /// Apply one update to the tensor stored in `slot`.
    ///
    /// # Panics
    ///
    /// Implementations panic if `parameters` and `gradients` have different lengths,
    /// or if a slot is reused with a different tensor length.
    fn update(&mut self, slot: usize, parameters: &mut [f32], gradients: &[f32]);

    /// Clear any per-slot state.
    fn reset(&mut self);

    fn learning_rate(&self) -> f32;

    fn set_learning_rate(&mut self, lr: f32);
}

/// Serializable wrapper over the concrete optimizers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerKind {
    Adagrad(Adagrad),
    Sgd(Sgd),
}

impl OptimizerKind {
    pub fn name(&self) -> &'static str {
        match self {
            OptimizerKind::Adagrad(_) => "adagrad",
            OptimizerKind::Sgd(_) => "sgd",
        }
    }

    /// True if the optimizer's slot state can drive tensors of these lengths.
    pub fn slots_fit(&self, lengths: &[usize]) -> bool {
        match self {
            OptimizerKind::Adagrad(opt) => opt.slots_fit(lengths),
            OptimizerKind::Sgd(_) => true,
        }
    }

    fn inner(&self) -> &dyn Optimizer {
        match self {
            OptimizerKind::Adagrad(opt) => opt,
            OptimizerKind::Sgd(opt) => opt,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Optimizer {
        match self {
            OptimizerKind::Adagrad(opt) => opt,
            OptimizerKind::Sgd(opt) => opt,
        }
    }
}

impl Optimizer for OptimizerKind {
    fn update(&mut self, slot: usize, parameters: &mut [f32], gradients: &[f32]) {
        self.inner_mut().update(slot, parameters, gradients);
    }

    fn reset(&mut self) {
        self.inner_mut().reset();
    }

    fn learning_rate(&self) -> f32 {
        self.inner().learning_rate()
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.inner_mut().set_learning_rate(lr);
    }
}
