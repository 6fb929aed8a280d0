//! Pooling wrappers with explicit padding.
//!
//! Candle's pooling kernels take a kernel size and stride but no padding, so
//! these wrappers pad first and pool second. Max pooling pads by edge
//! replication: for `padding < kernel` every window that touches the pad ring
//! also contains the replicated source element, so the window maxima are
//! identical to the conventional negative-infinity padding. Average pooling
//! pads with zeros and counts them in the divisor (count-include-pad
//! semantics, matching the behaviour the original pooling layers assume).

use candle_core::{Error, Result, Tensor};
use candle_nn::Module;

use crate::checks;

/// Max pooling over `(batch, channel, height, width)` with symmetric padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxPool2d {
    kernel: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
}

impl MaxPool2d {
    pub fn new(kernel: (usize, usize), stride: (usize, usize), padding: (usize, usize)) -> Self {
        Self {
            kernel,
            stride,
            padding,
        }
    }
}

impl Module for MaxPool2d {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        validate_window("max_pool2d", xs, self.kernel, self.padding)?;
        let padded = pad_replicate(xs, self.padding)?;
        padded.max_pool2d_with_stride(self.kernel, self.stride)
    }
}

/// Average pooling over `(batch, channel, height, width)` with symmetric
/// zero padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvgPool2d {
    kernel: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
}

impl AvgPool2d {
    pub fn new(kernel: (usize, usize), stride: (usize, usize), padding: (usize, usize)) -> Self {
        Self {
            kernel,
            stride,
            padding,
        }
    }
}

impl Module for AvgPool2d {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        validate_window("avg_pool2d", xs, self.kernel, self.padding)?;
        let padded = pad_zeros(xs, self.padding)?;
        padded.avg_pool2d_with_stride(self.kernel, self.stride)
    }
}

fn validate_window(
    what: &str,
    xs: &Tensor,
    kernel: (usize, usize),
    padding: (usize, usize),
) -> Result<()> {
    checks::expect_rank(what, xs, 4)?;
    if padding.0 >= kernel.0 || padding.1 >= kernel.1 {
        return Err(Error::Msg(format!(
            "{what}: padding {padding:?} must be smaller than kernel {kernel:?}"
        )));
    }
    let (_, _, h, w) = xs.dims4()?;
    if h + 2 * padding.0 < kernel.0 || w + 2 * padding.1 < kernel.1 {
        return Err(Error::Msg(format!(
            "{what}: input {h}x{w} with padding {padding:?} cannot fit kernel {kernel:?}"
        )));
    }
    Ok(())
}

fn pad_replicate(xs: &Tensor, padding: (usize, usize)) -> Result<Tensor> {
    let mut out = xs.clone();
    if padding.0 > 0 {
        out = out.pad_with_same(2, padding.0, padding.0)?;
    }
    if padding.1 > 0 {
        out = out.pad_with_same(3, padding.1, padding.1)?;
    }
    Ok(out)
}

fn pad_zeros(xs: &Tensor, padding: (usize, usize)) -> Result<Tensor> {
    let mut out = xs.clone();
    if padding.0 > 0 {
        out = out.pad_with_zeros(2, padding.0, padding.0)?;
    }
    if padding.1 > 0 {
        out = out.pad_with_zeros(3, padding.1, padding.1)?;
    }
    Ok(out)
}
