//! Layer abstractions for neural networks

mod r#trait;
pub mod dense;

pub use dense::DenseLayer;
pub use r#trait::Layer;
