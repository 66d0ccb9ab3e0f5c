//! Dense (fully connected) layer implementation
//!
//! Performs `output = input × weights + biases` on flat row-major buffers.

use serde::{Deserialize, Serialize};

use crate::layers::Layer;
use crate::optimizers::Optimizer;
use crate::utils::SimpleRng;

/// Dense (fully connected) layer with weights and biases.
///
/// `weights` is stored row-major as `input_size × output_size`, so the weight
/// from input `i` to output `j` lives at `i * output_size + j`.
///
/// Gradient buffers are transient and are not part of the serialized state.
///
/// # Example
///
/// ```
/// use iris_dnn::layers::{DenseLayer, Layer};
/// use iris_dnn::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// let layer = DenseLayer::new(4, 10, &mut rng);
/// assert_eq!(layer.parameter_count(), 4 * 10 + 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    input_size: usize,
    output_size: usize,
    weights: Vec<f32>,
    biases: Vec<f32>,
    #[serde(skip)]
    grad_weights: Vec<f32>,
    #[serde(skip)]
    grad_biases: Vec<f32>,
}

impl DenseLayer {
    /// Create a layer with Glorot/Xavier uniform weights and zero biases.
    ///
    /// Weights are drawn from `[-limit, limit)` with
    /// `limit = sqrt(6 / (input_size + output_size))`.
    pub fn new(input_size: usize, output_size: usize, rng: &mut SimpleRng) -> Self {
        let limit = (6.0f32 / (input_size + output_size) as f32).sqrt();
        let weights = (0..input_size * output_size)
            .map(|_| rng.gen_range_f32(-limit, limit))
            .collect();

        Self {
            input_size,
            output_size,
            weights,
            biases: vec![0.0; output_size],
            grad_weights: vec![0.0; input_size * output_size],
            grad_biases: vec![0.0; output_size],
        }
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn biases(&self) -> &[f32] {
        &self.biases
    }

    /// Restore gradient buffers after deserialization.
    fn ensure_grad_buffers(&mut self) {
        if self.grad_weights.len() != self.weights.len() {
            self.grad_weights = vec![0.0; self.weights.len()];
        }
        if self.grad_biases.len() != self.biases.len() {
            self.grad_biases = vec![0.0; self.biases.len()];
        }
    }

    /// Check that the stored tensors agree with the declared sizes.
    pub fn is_consistent(&self) -> bool {
        self.weights.len() == self.input_size * self.output_size
            && self.biases.len() == self.output_size
    }
}

impl Layer for DenseLayer {
    fn forward(&self, input: &[f32], output: &mut [f32], batch_size: usize) {
        for b in 0..batch_size {
            let x = &input[b * self.input_size..(b + 1) * self.input_size];
            let y = &mut output[b * self.output_size..(b + 1) * self.output_size];
            y.copy_from_slice(&self.biases);

            for (i, &xi) in x.iter().enumerate() {
                if xi == 0.0 {
                    continue;
                }
                let w_row = &self.weights[i * self.output_size..(i + 1) * self.output_size];
                for (yj, &w) in y.iter_mut().zip(w_row) {
                    *yj += xi * w;
                }
            }
        }
    }

    fn backward(
        &mut self,
        input: &[f32],
        grad_output: &[f32],
        grad_input: &mut [f32],
        batch_size: usize,
    ) {
        self.ensure_grad_buffers();
        let scale = 1.0 / batch_size as f32;

        for b in 0..batch_size {
            let x = &input[b * self.input_size..(b + 1) * self.input_size];
            let g = &grad_output[b * self.output_size..(b + 1) * self.output_size];
            let gx = &mut grad_input[b * self.input_size..(b + 1) * self.input_size];

            for (gb, &gj) in self.grad_biases.iter_mut().zip(g) {
                *gb += gj * scale;
            }

            for i in 0..self.input_size {
                let w_row = &self.weights[i * self.output_size..(i + 1) * self.output_size];
                let gw_row = &mut self.grad_weights[i * self.output_size..(i + 1) * self.output_size];
                let mut acc = 0.0f32;
                for j in 0..self.output_size {
                    gw_row[j] += x[i] * g[j] * scale;
                    acc += g[j] * w_row[j];
                }
                gx[i] = acc;
            }
        }
    }

    fn apply_gradients(&mut self, optimizer: &mut dyn Optimizer, first_slot: usize) {
        self.ensure_grad_buffers();
        optimizer.update(first_slot, &mut self.weights, &self.grad_weights);
        optimizer.update(first_slot + 1, &mut self.biases, &self.grad_biases);

        self.grad_weights.iter_mut().for_each(|g| *g = 0.0);
        self.grad_biases.iter_mut().for_each(|g| *g = 0.0);
    }

    fn slot_count(&self) -> usize {
        2
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}
