//! DenseNet-BC assembly for spectrogram classification.
//!
//! Stem, (dense block, transition) stages, and the classification head are
//! composed from the `layers` crate and the blocks in this crate. The whole
//! tree is built and initialised in a single constructor pass; afterwards the
//! structure is immutable and only parameter values change, driven by an
//! external optimizer.

use candle_core::{Error, Result, Tensor};
use candle_nn::{ops, BatchNorm, Conv2d, Linear, Module, ModuleT, VarBuilder};
use layers::{checks, init, reshape, ActivationKind, AvgPool2d, MaxPool2d};

use crate::config::{DenseNetConfig, ShapePlan};
use crate::dense::DenseBlock;
use crate::transition::Transition;

#[derive(Debug)]
struct Stage {
    block: DenseBlock,
    transition: Option<Transition>,
}

/// Densely connected convolutional classifier over flat spectrogram frames.
#[derive(Debug)]
pub struct DenseNet {
    config: DenseNetConfig,
    plan: ShapePlan,
    stem_conv: Conv2d,
    stem_norm: BatchNorm,
    stem_pool: MaxPool2d,
    stages: Vec<Stage>,
    final_norm: BatchNorm,
    head_pool: AvgPool2d,
    classifier: Linear,
    activation: ActivationKind,
}

impl DenseNet {
    /// Validates `config`, assembles the module tree, and initialises every
    /// parameter according to the policies in [`layers::init`].
    pub fn new(config: DenseNetConfig, vb: VarBuilder) -> Result<Self> {
        let plan = config.validate().map_err(Error::wrap)?;
        let features = vb.pp("features");

        let stem_conv = init::conv2d(
            config.in_channels,
            config.num_init_features,
            3,
            1,
            features.pp("conv0"),
        )?;
        let stem_norm = init::batch_norm(config.num_init_features, features.pp("norm0"))?;
        let stem_pool = MaxPool2d::new((3, 3), (2, 1), (1, 1));

        let mut channels = config.num_init_features;
        let last = config.block_config.len() - 1;
        let mut stages = Vec::with_capacity(config.block_config.len());
        for (i, &num_layers) in config.block_config.iter().enumerate() {
            let block = DenseBlock::new(
                num_layers,
                channels,
                config.growth_rate,
                config.bn_size,
                config.drop_rate,
                features.pp(format!("denseblock{}", i + 1)),
            )?;
            channels = block.out_channels();
            let transition = if i != last {
                let t = Transition::new(
                    channels,
                    channels / 2,
                    features.pp(format!("transition{}", i + 1)),
                )?;
                channels = t.out_channels();
                Some(t)
            } else {
                None
            };
            stages.push(Stage { block, transition });
        }

        let final_norm = init::batch_norm(channels, features.pp("norm5"))?;
        let head_pool = AvgPool2d::new((2, 2), (1, 1), (0, 0));
        let classifier = init::classifier(plan.flatten_dim, config.num_labels, vb.pp("classifier"))?;

        Ok(Self {
            config,
            plan,
            stem_conv,
            stem_norm,
            stem_pool,
            stages,
            final_norm,
            head_pool,
            classifier,
            activation: ActivationKind::Swish,
        })
    }

    pub fn config(&self) -> &DenseNetConfig {
        &self.config
    }

    /// The shape trace computed at construction.
    pub fn plan(&self) -> &ShapePlan {
        &self.plan
    }

    /// Runs the network on a `(batch, input_dim)` tensor.
    ///
    /// Returns raw class scores, or, with `probabilities` set, a softmax
    /// distribution clamped into `[prob_eps, 1 - prob_eps]` so downstream
    /// probabilistic losses never see an exact 0 or 1.
    pub fn forward(&self, xs: &Tensor, train: bool, probabilities: bool) -> Result<Tensor> {
        checks::expect_rank("network input", xs, 2)?;
        let dims = xs.dims();
        if dims[1] != self.config.input_dim() {
            return Err(Error::Msg(format!(
                "network input: expected {} features per sample, got {}",
                self.config.input_dim(),
                dims[1]
            )));
        }

        let mut xs = reshape::to_spatial(
            xs,
            self.config.in_channels,
            self.config.input_height,
            self.config.input_width,
        )?;
        xs = self.stem_conv.forward(&xs)?;
        xs = self.stem_norm.forward_t(&xs, train)?;
        xs = self.activation.apply(&xs)?;
        xs = self.stem_pool.forward(&xs)?;

        for stage in &self.stages {
            xs = stage.block.forward_t(&xs, train)?;
            if let Some(transition) = &stage.transition {
                xs = transition.forward_t(&xs, train)?;
            }
        }

        xs = self.final_norm.forward_t(&xs, train)?;
        xs = self.activation.apply(&xs)?;
        xs = self.head_pool.forward(&xs)?;
        xs = reshape::to_flat(&xs, self.plan.flatten_dim)?;
        let scores = self.classifier.forward(&xs)?;

        if probabilities {
            let eps = self.config.prob_eps as f32;
            let probs = ops::softmax(&scores, 1)?;
            probs.clamp(eps, 1.0 - eps)
        } else {
            Ok(scores)
        }
    }
}

impl ModuleT for DenseNet {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        self.forward(xs, train, false)
    }
}
