//! Configuration and shape planning for the DenseNet classifier.
//!
//! The original network hard-coded its pre-classifier flatten size next to an
//! independently chosen block configuration; the two agreed only by hand
//! tuning. Here the flatten size is derived from the configuration by
//! [`DenseNetConfig::plan`], and an optional [`DenseNetConfig::final_features`]
//! pin turns any disagreement into a hard validation error instead of a
//! silent recomputation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stem pooling geometry: kernel 3, stride (2, 1), padding 1.
const STEM_POOL: (usize, usize, usize, usize) = (3, 2, 1, 1);
/// Transition pooling geometry: kernel 3, stride 2, padding 1.
const TRANSITION_POOL: (usize, usize, usize, usize) = (3, 2, 2, 1);
/// Head pooling geometry: kernel 2, stride 1, no padding.
const HEAD_POOL: (usize, usize, usize, usize) = (2, 1, 1, 0);

/// Construction-time validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroField(&'static str),

    #[error("block_config must name at least one block")]
    EmptyBlocks,

    #[error("drop_rate must lie in [0, 1), got {0}")]
    DropRate(String),

    #[error("prob_eps must lie in (0, 0.5), got {0}")]
    ProbEps(String),

    #[error("{stage}: spatial extent {size} with padding {padding} cannot fit pooling kernel {kernel}")]
    SpatialUnderflow {
        stage: &'static str,
        size: usize,
        kernel: usize,
        padding: usize,
    },

    #[error(
        "final_features is pinned to {pinned} but block_config implies {computed}; \
         the block configuration and the flatten size disagree"
    )]
    FlattenMismatch { pinned: usize, computed: usize },
}

/// DenseNet-BC hyper-parameters for the spectrogram classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenseNetConfig {
    /// Number of output labels.
    pub num_labels: usize,
    /// Channels of the spectrogram input (real/imaginary planes).
    pub in_channels: usize,
    /// Frequency bins per input frame.
    pub input_height: usize,
    /// Time steps per input frame.
    pub input_width: usize,
    /// New channels contributed by every dense layer.
    pub growth_rate: usize,
    /// Dense-layer count per block, in order.
    pub block_config: Vec<usize>,
    /// Channels produced by the stem convolution.
    pub num_init_features: usize,
    /// Bottleneck multiplier for the 1x1 compression inside dense layers.
    pub bn_size: usize,
    /// Dropout probability applied to each dense layer's new features.
    pub drop_rate: f32,
    /// Clamp applied to probabilistic outputs, keeping them away from 0 and 1.
    pub prob_eps: f64,
    /// Optional pin for the pre-classifier flatten size. When set it must
    /// match the value implied by the rest of the configuration.
    pub final_features: Option<usize>,
}

impl Default for DenseNetConfig {
    fn default() -> Self {
        Self {
            num_labels: 187,
            in_channels: 2,
            input_height: 129,
            input_width: 21,
            growth_rate: 4,
            block_config: vec![6, 12, 24, 48, 16],
            num_init_features: 64,
            bn_size: 4,
            drop_rate: 0.0,
            prob_eps: 1e-9,
            final_features: None,
        }
    }
}

impl DenseNetConfig {
    /// Flattened per-sample input size expected by the forward pass.
    pub fn input_dim(&self) -> usize {
        self.in_channels * self.input_height * self.input_width
    }

    /// Checks field ranges, traces the architecture, and cross-checks the
    /// optional flatten pin. Returns the traced [`ShapePlan`] on success.
    pub fn validate(&self) -> Result<ShapePlan, ConfigError> {
        for (value, name) in [
            (self.num_labels, "num_labels"),
            (self.in_channels, "in_channels"),
            (self.input_height, "input_height"),
            (self.input_width, "input_width"),
            (self.growth_rate, "growth_rate"),
            (self.num_init_features, "num_init_features"),
            (self.bn_size, "bn_size"),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroField(name));
            }
        }
        if self.block_config.is_empty() {
            return Err(ConfigError::EmptyBlocks);
        }
        if self.block_config.iter().any(|&layers| layers == 0) {
            return Err(ConfigError::ZeroField("block_config entries"));
        }
        if !(0.0..1.0).contains(&self.drop_rate) {
            return Err(ConfigError::DropRate(self.drop_rate.to_string()));
        }
        if !(self.prob_eps > 0.0 && self.prob_eps < 0.5) {
            return Err(ConfigError::ProbEps(self.prob_eps.to_string()));
        }

        let plan = self.plan()?;
        if let Some(pinned) = self.final_features {
            if pinned != plan.flatten_dim {
                return Err(ConfigError::FlattenMismatch {
                    pinned,
                    computed: plan.flatten_dim,
                });
            }
        }
        Ok(plan)
    }

    /// Traces channel counts and spatial extents through the architecture.
    pub fn plan(&self) -> Result<ShapePlan, ConfigError> {
        if self.block_config.is_empty() {
            return Err(ConfigError::EmptyBlocks);
        }
        let mut spatial = pooled2("stem pool", (self.input_height, self.input_width), STEM_POOL)?;
        let stem_spatial = spatial;

        let mut channels = self.num_init_features;
        let mut stages = Vec::with_capacity(self.block_config.len());
        let last = self.block_config.len() - 1;
        for (i, &layers) in self.block_config.iter().enumerate() {
            channels += layers * self.growth_rate;
            let channels_after_block = channels;
            let channels_after_transition = if i != last {
                channels /= 2;
                spatial = pooled2("transition pool", spatial, TRANSITION_POOL)?;
                Some(channels)
            } else {
                None
            };
            stages.push(StageShape {
                block_layers: layers,
                channels_after_block,
                channels_after_transition,
                spatial,
            });
        }

        let head_spatial = pooled2("head pool", spatial, HEAD_POOL)?;
        let flatten_dim = channels * head_spatial.0 * head_spatial.1;

        Ok(ShapePlan {
            stem_channels: self.num_init_features,
            stem_spatial,
            stages,
            final_channels: channels,
            head_spatial,
            flatten_dim,
        })
    }
}

/// Resolved layer geometry for one (block, transition) stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageShape {
    /// Dense layers in the block.
    pub block_layers: usize,
    /// Channels leaving the block.
    pub channels_after_block: usize,
    /// Channels leaving the transition, absent for the final block.
    pub channels_after_transition: Option<usize>,
    /// Spatial extent entering the next stage (after the transition, if any).
    pub spatial: (usize, usize),
}

/// Full arithmetic trace of the assembled network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapePlan {
    /// Channels leaving the stem convolution.
    pub stem_channels: usize,
    /// Spatial extent after the stem max-pool.
    pub stem_spatial: (usize, usize),
    /// Per-stage channel and spatial trace.
    pub stages: Vec<StageShape>,
    /// Channels entering the classification head.
    pub final_channels: usize,
    /// Spatial extent after the head average pool.
    pub head_spatial: (usize, usize),
    /// Features seen by the linear classifier.
    pub flatten_dim: usize,
}

fn pooled(
    stage: &'static str,
    size: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
) -> Result<usize, ConfigError> {
    let padded = size + 2 * padding;
    if padded < kernel {
        return Err(ConfigError::SpatialUnderflow {
            stage,
            size,
            kernel,
            padding,
        });
    }
    Ok((padded - kernel) / stride + 1)
}

fn pooled2(
    stage: &'static str,
    (h, w): (usize, usize),
    (kernel, stride_h, stride_w, padding): (usize, usize, usize, usize),
) -> Result<(usize, usize), ConfigError> {
    Ok((
        pooled(stage, h, kernel, stride_h, padding)?,
        pooled(stage, w, kernel, stride_w, padding)?,
    ))
}
