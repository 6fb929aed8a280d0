//! Densely connected layers and blocks.
//!
//! A dense layer never overwrites what it receives: it computes
//! `growth_rate` new channels through a bottlenecked pair of convolutions and
//! concatenates them onto its input, so every layer in a block sees the raw
//! output of every predecessor.

use candle_core::{Result, Tensor};
use candle_nn::{BatchNorm, Conv2d, Dropout, Module, ModuleT, VarBuilder};
use layers::{checks, init, ActivationKind};

/// One dense micro-block: norm, swish, 1x1 bottleneck conv, norm, swish,
/// 3x3 conv, optional dropout, channel concatenation.
#[derive(Debug)]
pub struct DenseLayer {
    norm1: BatchNorm,
    conv1: Conv2d,
    norm2: BatchNorm,
    conv2: Conv2d,
    dropout: Option<Dropout>,
    activation: ActivationKind,
    in_channels: usize,
    growth_rate: usize,
}

impl DenseLayer {
    pub fn new(
        in_channels: usize,
        growth_rate: usize,
        bn_size: usize,
        drop_rate: f32,
        vb: VarBuilder,
    ) -> Result<Self> {
        let bottleneck = bn_size * growth_rate;
        let norm1 = init::batch_norm(in_channels, vb.pp("norm1"))?;
        let conv1 = init::conv2d(in_channels, bottleneck, 1, 0, vb.pp("conv1"))?;
        let norm2 = init::batch_norm(bottleneck, vb.pp("norm2"))?;
        let conv2 = init::conv2d(bottleneck, growth_rate, 3, 1, vb.pp("conv2"))?;
        // The original only routes through dropout for a strictly positive
        // rate; rate zero must stay byte-deterministic.
        let dropout = (drop_rate > 0.0).then(|| Dropout::new(drop_rate));

        Ok(Self {
            norm1,
            conv1,
            norm2,
            conv2,
            dropout,
            activation: ActivationKind::Swish,
            in_channels,
            growth_rate,
        })
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.in_channels + self.growth_rate
    }
}

impl ModuleT for DenseLayer {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        checks::expect_channels("dense layer input", xs, self.in_channels)?;

        let mut new = self.norm1.forward_t(xs, train)?;
        new = self.activation.apply(&new)?;
        new = self.conv1.forward(&new)?;
        new = self.norm2.forward_t(&new, train)?;
        new = self.activation.apply(&new)?;
        new = self.conv2.forward(&new)?;
        if train {
            if let Some(dropout) = &self.dropout {
                new = dropout.forward(&new, train)?;
            }
        }
        Tensor::cat(&[xs, &new], 1)
    }
}

/// A chain of dense layers with additively growing channel counts.
#[derive(Debug)]
pub struct DenseBlock {
    layers: Vec<DenseLayer>,
    in_channels: usize,
    growth_rate: usize,
}

impl DenseBlock {
    pub fn new(
        num_layers: usize,
        in_channels: usize,
        growth_rate: usize,
        bn_size: usize,
        drop_rate: f32,
        vb: VarBuilder,
    ) -> Result<Self> {
        let mut layers = Vec::with_capacity(num_layers);
        for i in 0..num_layers {
            layers.push(DenseLayer::new(
                in_channels + i * growth_rate,
                growth_rate,
                bn_size,
                drop_rate,
                vb.pp(format!("denselayer{}", i + 1)),
            )?);
        }
        Ok(Self {
            layers,
            in_channels,
            growth_rate,
        })
    }

    pub fn out_channels(&self) -> usize {
        self.in_channels + self.layers.len() * self.growth_rate
    }
}

impl ModuleT for DenseBlock {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let mut xs = xs.clone();
        for layer in &self.layers {
            xs = layer.forward_t(&xs, train)?;
        }
        Ok(xs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn cpu_vb(varmap: &VarMap) -> VarBuilder<'_> {
        VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu)
    }

    #[test]
    fn dense_layer_appends_growth_channels_and_preserves_input() -> Result<()> {
        let varmap = VarMap::new();
        let layer = DenseLayer::new(5, 3, 2, 0.0, cpu_vb(&varmap).pp("layer"))?;
        assert_eq!(layer.out_channels(), 8);

        let input = Tensor::randn(0f32, 1.0, (2, 5, 6, 4), &Device::Cpu)?;
        let output = layer.forward_t(&input, false)?;
        assert_eq!(output.dims(), &[2, 8, 6, 4]);

        let carried = output.narrow(1, 0, 5)?;
        assert_eq!(
            carried.flatten_all()?.to_vec1::<f32>()?,
            input.flatten_all()?.to_vec1::<f32>()?,
            "pre-existing channels must pass through unchanged"
        );
        Ok(())
    }

    #[test]
    fn dense_layer_passthrough_survives_training_dropout() -> Result<()> {
        let varmap = VarMap::new();
        let layer = DenseLayer::new(4, 3, 2, 0.9, cpu_vb(&varmap).pp("layer"))?;

        let input = Tensor::randn(0f32, 1.0, (2, 4, 6, 4), &Device::Cpu)?;
        let output = layer.forward_t(&input, true)?;

        let carried = output.narrow(1, 0, 4)?;
        assert_eq!(
            carried.flatten_all()?.to_vec1::<f32>()?,
            input.flatten_all()?.to_vec1::<f32>()?
        );

        let appended = output.narrow(1, 4, 3)?.flatten_all()?.to_vec1::<f32>()?;
        assert!(
            appended.iter().any(|&v| v == 0.0),
            "dropout at 0.9 should zero some appended features"
        );
        Ok(())
    }

    #[test]
    fn block_accumulates_channels_additively() -> Result<()> {
        let varmap = VarMap::new();
        let block = DenseBlock::new(3, 4, 2, 2, 0.0, cpu_vb(&varmap).pp("block"))?;
        assert_eq!(block.out_channels(), 10);
        assert_eq!(
            block.layers.iter().map(|l| l.in_channels()).collect::<Vec<_>>(),
            vec![4, 6, 8]
        );

        let input = Tensor::randn(0f32, 1.0, (1, 4, 5, 5), &Device::Cpu)?;
        let output = block.forward_t(&input, false)?;
        assert_eq!(output.dims(), &[1, 10, 5, 5]);
        Ok(())
    }

    #[test]
    fn mismatched_channel_count_is_rejected() -> Result<()> {
        let varmap = VarMap::new();
        let layer = DenseLayer::new(5, 3, 2, 0.0, cpu_vb(&varmap).pp("layer"))?;
        let input = Tensor::randn(0f32, 1.0, (2, 4, 6, 4), &Device::Cpu)?;
        assert!(layer.forward_t(&input, false).is_err());
        Ok(())
    }
}
