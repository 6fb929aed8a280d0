//! Parameter-initialisation policies for the acoustic networks.
//!
//! Every parameter declares its policy at construction through a
//! [`VarBuilder`], so the whole network is initialised in a single pass with
//! no after-the-fact module sweep. The policies:
//!
//! * convolution weights — variance-scaled Kaiming-normal fill, fan-in,
//!   rectifier gain (kept even though the networks activate with swish);
//! * batch-norm scales — constant one; batch-norm biases — constant zero;
//! * classifier weight — the framework's stock linear default, which
//!   intentionally differs from the convolutional policy;
//! * classifier bias — constant zero.

use candle_core::Result;
use candle_nn::init::{FanInOut, Init, NonLinearity, NormalOrUniform};
use candle_nn::{BatchNorm, BatchNormConfig, Conv2d, Conv2dConfig, Linear, VarBuilder};

/// Variance-scaled fill for convolution weights.
pub const CONV_WEIGHT: Init = Init::Kaiming {
    dist: NormalOrUniform::Normal,
    fan: FanInOut::FanIn,
    non_linearity: NonLinearity::ReLU,
};

/// Unit scale for normalisation layers.
pub const NORM_WEIGHT: Init = Init::Const(1.0);

/// Zero shift for normalisation layers.
pub const NORM_BIAS: Init = Init::Const(0.0);

/// The classification head keeps candle's stock linear initialiser.
pub const CLASSIFIER_WEIGHT: Init = candle_nn::init::DEFAULT_KAIMING_NORMAL;

/// Zero bias for the classification head.
pub const CLASSIFIER_BIAS: Init = Init::Const(0.0);

/// Builds a bias-free square convolution with the [`CONV_WEIGHT`] policy.
pub fn conv2d(
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    padding: usize,
    vb: VarBuilder,
) -> Result<Conv2d> {
    let cfg = Conv2dConfig {
        padding,
        stride: 1,
        ..Default::default()
    };
    let weight = vb.get_with_hints(
        (out_channels, in_channels, kernel, kernel),
        "weight",
        CONV_WEIGHT,
    )?;
    Ok(Conv2d::new(weight, None, cfg))
}

/// Builds a batch norm with unit scale, zero bias, and candle's default
/// epsilon and momentum.
pub fn batch_norm(channels: usize, vb: VarBuilder) -> Result<BatchNorm> {
    candle_nn::batch_norm(channels, BatchNormConfig::default(), vb)
}

/// Builds the classification head: default weight policy, zero bias.
pub fn classifier(in_features: usize, out_features: usize, vb: VarBuilder) -> Result<Linear> {
    let weight = vb.get_with_hints((out_features, in_features), "weight", CLASSIFIER_WEIGHT)?;
    let bias = vb.get_with_hints(out_features, "bias", CLASSIFIER_BIAS)?;
    Ok(Linear::new(weight, Some(bias)))
}
