//! Shared utilities: random number generation and activation helpers.

pub mod activations;
pub mod rng;

pub use activations::{argmax, relu_backward_inplace, relu_inplace, softmax_rows};
pub use rng::SimpleRng;
