//! Feed-forward network: ReLU hidden layers followed by a softmax output layer.

use serde::{Deserialize, Serialize};

use crate::layers::{DenseLayer, Layer};
use crate::optimizers::Optimizer;
use crate::utils::{relu_backward_inplace, relu_inplace, softmax_rows, SimpleRng};

/// Smallest probability fed to `ln` when computing the loss.
const PROB_EPSILON: f32 = 1e-9;

/// Multi-layer perceptron classifier body.
///
/// The layer stack is `n_inputs -> hidden_units[0] -> ... -> n_classes`; every
/// layer except the last is followed by ReLU, and the last produces logits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dnn {
    n_inputs: usize,
    n_classes: usize,
    layers: Vec<DenseLayer>,
}

impl Dnn {
    pub fn new(n_inputs: usize, hidden_units: &[usize], n_classes: usize, rng: &mut SimpleRng) -> Self {
        let mut layers = Vec::with_capacity(hidden_units.len() + 1);
        let mut fan_in = n_inputs;
        for &width in hidden_units.iter().chain(std::iter::once(&n_classes)) {
            layers.push(DenseLayer::new(fan_in, width, rng));
            fan_in = width;
        }

        Self {
            n_inputs,
            n_classes,
            layers,
        }
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    /// Widths of the hidden layers, in order.
    pub fn hidden_units(&self) -> Vec<usize> {
        let hidden = self.layers.len().saturating_sub(1);
        self.layers[..hidden].iter().map(|l| l.output_size()).collect()
    }

    /// Parameter count of each optimizer slot, in slot order.
    pub fn slot_lengths(&self) -> Vec<usize> {
        self.layers
            .iter()
            .flat_map(|l| [l.weights().len(), l.biases().len()])
            .collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|l| l.parameter_count()).sum()
    }

    /// True if the layer chain matches the declared input and class counts.
    /// Used to reject corrupt checkpoints.
    pub fn is_consistent(&self) -> bool {
        let mut fan_in = self.n_inputs;
        for layer in &self.layers {
            if !layer.is_consistent() || layer.input_size() != fan_in {
                return false;
            }
            fan_in = layer.output_size();
        }
        !self.layers.is_empty() && fan_in == self.n_classes
    }

    /// Run the forward pass, returning every layer's activations.
    ///
    /// `activations[0]` is the input, `activations[k + 1]` the output of layer `k`
    /// (after ReLU for hidden layers, raw logits for the last one).
    fn forward_all(&self, input: &[f32], batch_size: usize) -> Vec<Vec<f32>> {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input[..batch_size * self.n_inputs].to_vec());

        let last = self.layers.len() - 1;
        for (k, layer) in self.layers.iter().enumerate() {
            let mut output = vec![0.0f32; batch_size * layer.output_size()];
            layer.forward(&activations[k], &mut output, batch_size);
            if k < last {
                relu_inplace(&mut output);
            }
            activations.push(output);
        }
        activations
    }

    /// Raw class scores, `batch_size × n_classes`.
    pub fn logits(&self, input: &[f32], batch_size: usize) -> Vec<f32> {
        self.forward_all(input, batch_size)
            .pop()
            .unwrap_or_default()
    }

    /// Class probabilities, `batch_size × n_classes`.
    pub fn predict_proba(&self, input: &[f32], batch_size: usize) -> Vec<f32> {
        let mut probs = self.logits(input, batch_size);
        softmax_rows(&mut probs, batch_size, self.n_classes);
        probs
    }

    /// One optimization step on a batch. Returns the mean cross-entropy loss
    /// measured before the update.
    pub fn train_step(
        &mut self,
        input: &[f32],
        labels: &[usize],
        optimizer: &mut dyn Optimizer,
    ) -> f32 {
        let batch_size = labels.len();
        let mut activations = self.forward_all(input, batch_size);

        let mut delta = vec![0.0f32; batch_size * self.n_classes];
        let output = self.layers.len();
        softmax_rows(&mut activations[output], batch_size, self.n_classes);
        let total_loss =
            softmax_cross_entropy(&activations[output], labels, self.n_classes, &mut delta);

        for k in (0..self.layers.len()).rev() {
            let layer = &mut self.layers[k];
            let mut grad_input = vec![0.0f32; batch_size * layer.input_size()];
            layer.backward(&activations[k], &delta, &mut grad_input, batch_size);
            if k > 0 {
                relu_backward_inplace(&activations[k], &mut grad_input);
            }
            delta = grad_input;
        }

        let mut slot = 0;
        for layer in &mut self.layers {
            layer.apply_gradients(optimizer, slot);
            slot += layer.slot_count();
        }

        total_loss / batch_size as f32
    }
}

/// Summed cross-entropy of softmax `probs` against integer `labels`.
///
/// Writes the gradient with respect to the logits into `delta`: the predicted
/// probabilities with 1 subtracted at the true class.
pub fn softmax_cross_entropy(probs: &[f32], labels: &[usize], cols: usize, delta: &mut [f32]) -> f32 {
    let mut total_loss = 0.0f32;

    for (row_idx, &label) in labels.iter().enumerate() {
        let row = &probs[row_idx * cols..(row_idx + 1) * cols];
        let delta_row = &mut delta[row_idx * cols..(row_idx + 1) * cols];
        total_loss -= row[label].max(PROB_EPSILON).ln();

        delta_row.copy_from_slice(row);
        delta_row[label] -= 1.0;
    }

    total_loss
}
