//! Reshape helpers between flat feature vectors and spatial layouts.
//!
//! Both directions infer the batch dimension and fail when the element count
//! is incompatible with the requested geometry. These are pure shape
//! reinterpretations, not copies.

use candle_core::{Error, Result, Tensor};

/// Reinterprets a flat `(batch, features)` tensor as
/// `(batch, channels, height, width)`.
pub fn to_spatial(xs: &Tensor, channels: usize, height: usize, width: usize) -> Result<Tensor> {
    let per_sample = channels * height * width;
    ensure_divisible("to_spatial", xs, per_sample)?;
    xs.reshape(((), channels, height, width))
}

/// Collapses a spatial tensor back to `(batch, features)`.
pub fn to_flat(xs: &Tensor, features: usize) -> Result<Tensor> {
    ensure_divisible("to_flat", xs, features)?;
    xs.reshape(((), features))
}

fn ensure_divisible(what: &str, xs: &Tensor, per_sample: usize) -> Result<()> {
    if per_sample == 0 {
        return Err(Error::Msg(format!("{what}: target shape has zero elements")));
    }
    let total = xs.elem_count();
    if total % per_sample != 0 {
        return Err(Error::Msg(format!(
            "{what}: {total} elements do not divide into samples of {per_sample}"
        )));
    }
    Ok(())
}
