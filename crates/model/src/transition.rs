//! Transition stage between dense blocks.
//!
//! Compresses channels through a 1x1 convolution and halves each spatial
//! dimension with a padded average pool. Used strictly between consecutive
//! blocks, never after the last one.

use candle_core::{Result, Tensor};
use candle_nn::{BatchNorm, Conv2d, Module, ModuleT, VarBuilder};
use layers::{checks, init, ActivationKind, AvgPool2d};

#[derive(Debug)]
pub struct Transition {
    norm: BatchNorm,
    conv: Conv2d,
    pool: AvgPool2d,
    activation: ActivationKind,
    in_channels: usize,
    out_channels: usize,
}

impl Transition {
    pub fn new(in_channels: usize, out_channels: usize, vb: VarBuilder) -> Result<Self> {
        let norm = init::batch_norm(in_channels, vb.pp("norm"))?;
        let conv = init::conv2d(in_channels, out_channels, 1, 0, vb.pp("conv"))?;
        let pool = AvgPool2d::new((3, 3), (2, 2), (1, 1));
        Ok(Self {
            norm,
            conv,
            pool,
            activation: ActivationKind::Swish,
            in_channels,
            out_channels,
        })
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }
}

impl ModuleT for Transition {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        checks::expect_channels("transition input", xs, self.in_channels)?;
        let xs = self.norm.forward_t(xs, train)?;
        let xs = self.activation.apply(&xs)?;
        let xs = self.conv.forward(&xs)?;
        self.pool.forward(&xs)
    }
}
