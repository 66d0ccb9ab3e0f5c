//! Adagrad optimizer implementation
//!
//! Adagrad scales each parameter's step by the inverse square root of the sum
//! of all squared gradients seen for that parameter:
//!
//! ```text
//! accum = accum + gradient²
//! parameter = parameter - α * gradient / √accum
//! ```
//!
//! Accumulators start at `initial_accumulator_value` (0.1 by default), which
//! keeps the first steps bounded without an epsilon term.
//!
//! # Reference
//!
//! Duchi, J., Hazan, E., & Singer, Y. (2011). Adaptive subgradient methods for
//! online learning and stochastic optimization. JMLR 12.

use serde::{Deserialize, Serialize};

use crate::optimizers::Optimizer;

/// Adagrad with one accumulator vector per slot.
///
/// # Example
///
/// ```
/// use iris_dnn::optimizers::{Adagrad, Optimizer};
///
/// let mut optimizer = Adagrad::new(0.05, 0.1);
/// let mut weights = vec![1.0];
/// optimizer.update(0, &mut weights, &[0.3]);
/// // accum = 0.1 + 0.09 = 0.19; step = 0.05 * 0.3 / sqrt(0.19)
/// assert!((weights[0] - (1.0 - 0.05 * 0.3 / 0.19f32.sqrt())).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adagrad {
    learning_rate: f32,
    initial_accumulator_value: f32,
    /// Squared-gradient accumulators, indexed by slot.
    #[serde(default)]
    accumulators: Vec<Vec<f32>>,
}

impl Adagrad {
    pub fn new(learning_rate: f32, initial_accumulator_value: f32) -> Self {
        Self {
            learning_rate,
            initial_accumulator_value,
            accumulators: Vec::new(),
        }
    }

    pub fn initial_accumulator_value(&self) -> f32 {
        self.initial_accumulator_value
    }

    /// Accumulator state for `slot`, if that slot has been updated at least once.
    pub fn accumulator(&self, slot: usize) -> Option<&[f32]> {
        self.accumulators
            .get(slot)
            .filter(|acc| !acc.is_empty())
            .map(Vec::as_slice)
    }

    /// True if every stored accumulator matches the tensor length of its slot.
    ///
    /// `lengths[i]` is the number of parameters in slot `i`.
    pub fn slots_fit(&self, lengths: &[usize]) -> bool {
        self.accumulators.len() <= lengths.len()
            && self
                .accumulators
                .iter()
                .zip(lengths)
                .all(|(acc, &len)| acc.is_empty() || acc.len() == len)
    }

    fn slot_mut(&mut self, slot: usize, len: usize) -> &mut Vec<f32> {
        if self.accumulators.len() <= slot {
            self.accumulators.resize_with(slot + 1, Vec::new);
        }
        let acc = &mut self.accumulators[slot];
        if acc.is_empty() {
            *acc = vec![self.initial_accumulator_value; len];
        }
        assert_eq!(acc.len(), len, "Adagrad slot {} reused with a different length", slot);
        acc
    }
}

impl Optimizer for Adagrad {
    fn update(&mut self, slot: usize, parameters: &mut [f32], gradients: &[f32]) {
        assert_eq!(
            parameters.len(),
            gradients.len(),
            "Parameters and gradients must have the same length"
        );

        let lr = self.learning_rate;
        let acc = self.slot_mut(slot, parameters.len());
        for ((param, &grad), a) in parameters.iter_mut().zip(gradients).zip(acc.iter_mut()) {
            *a += grad * grad;
            *param -= lr * grad / a.sqrt();
        }
    }

    fn reset(&mut self) {
        self.accumulators.clear();
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }
}
