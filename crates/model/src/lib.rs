//! DenseNet-BC classifier for acoustic spectrogram frames.
//!
//! The network maps a fixed-size flattened spectrogram tensor to scores (or a
//! clamped probability distribution) over a fixed label vocabulary. Dense
//! connectivity means each layer concatenates its new channels onto everything
//! it received, so no activation computed inside a block is ever discarded.

pub mod config;
pub mod dense;
pub mod model;
pub mod transition;

pub use config::{ConfigError, DenseNetConfig, ShapePlan, StageShape};
pub use dense::{DenseBlock, DenseLayer};
pub use model::DenseNet;
pub use transition::Transition;
