//! Layer trait definition for neural network layers

use crate::optimizers::Optimizer;

/// Core trait for neural network layers.
///
/// Layers work on flat row-major `f32` buffers: a batch of `batch_size`
/// samples is `batch_size × input_size` values laid out sample after sample.
///
/// # Example
///
/// ```ignore
/// let mut output = vec![0.0f32; batch_size * layer.output_size()];
/// layer.forward(&input, &mut output, batch_size);
///
/// let mut grad_input = vec![0.0f32; batch_size * layer.input_size()];
/// layer.backward(&input, &grad_output, &mut grad_input, batch_size);
/// layer.apply_gradients(&mut optimizer, first_slot);
/// ```
pub trait Layer {
    /// Forward propagation through the layer.
    ///
    /// # Arguments
    ///
    /// * `input` - Input data (batch_size × input_size)
    /// * `output` - Output buffer to store results (batch_size × output_size)
    /// * `batch_size` - Number of samples in the batch
    ///
    /// # Panics
    ///
    /// Implementations may panic if the buffers are shorter than the batch requires.
    fn forward(&self, input: &[f32], output: &mut [f32], batch_size: usize);

    /// Backward propagation through the layer.
    ///
    /// Writes the gradient with respect to the layer input into `grad_input` and
    /// accumulates the batch-averaged parameter gradients internally. The `input`
    /// must be the same data used in the corresponding forward pass.
    fn backward(
        &mut self,
        input: &[f32],
        grad_output: &[f32],
        grad_input: &mut [f32],
        batch_size: usize,
    );

    /// Hand the accumulated gradients to `optimizer` and clear them.
    ///
    /// The layer owns the slots `first_slot..first_slot + self.slot_count()`.
    fn apply_gradients(&mut self, optimizer: &mut dyn Optimizer, first_slot: usize);

    /// Number of optimizer slots (trainable tensors) this layer uses.
    fn slot_count(&self) -> usize;

    fn input_size(&self) -> usize;

    fn output_size(&self) -> usize;

    /// Total count of trainable weights and biases.
    fn parameter_count(&self) -> usize;
}
