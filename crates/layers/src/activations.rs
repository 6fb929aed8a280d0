//! Activation catalogue for the convolutional stacks.
//!
//! Activations are element-wise, parameter-free, and behave identically in
//! training and evaluation. `Swish` computes `x * sigmoid(x)` through the
//! fused SiLU kernel exposed by candle; the acoustic networks use it
//! everywhere a plain rectifier would otherwise appear.

use candle_core::{Result, Tensor};
use serde::{Deserialize, Serialize};

/// Identifies which non-linearity a block applies between norm and conv.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationKind {
    /// Identity function, useful when wiring diagnostic stacks.
    Identity,
    /// Standard rectifier.
    Relu,
    /// `x * sigmoid(x)`, a.k.a. SiLU.
    #[default]
    Swish,
}

impl ActivationKind {
    /// Applies the activation element-wise, preserving shape and dtype.
    pub fn apply(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            ActivationKind::Identity => Ok(xs.clone()),
            ActivationKind::Relu => xs.relu(),
            ActivationKind::Swish => xs.silu(),
        }
    }
}
