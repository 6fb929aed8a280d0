//! Convolutional building blocks for the acoustic classifiers.
//!
//! Everything here operates on `(batch, channel, height, width)` tensors and
//! is assembled into networks by the `model` crate: the activation catalogue,
//! pooling wrappers that add the padding candle's kernels lack, reshape
//! helpers, shape assertions, and the parameter-initialisation policies
//! applied at construction time.

pub mod activations;
pub mod checks;
pub mod init;
pub mod pool;
pub mod reshape;

pub use activations::ActivationKind;
pub use pool::{AvgPool2d, MaxPool2d};
