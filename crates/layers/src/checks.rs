//! Lightweight shape assertions shared across layer components.
//!
//! These return `candle_core::Result<()>` so call sites can propagate
//! failures with `?` instead of panicking.

use candle_core::{Error, Result, Tensor};

/// Ensures a tensor has exactly `rank` dimensions.
pub fn expect_rank(what: &str, tensor: &Tensor, rank: usize) -> Result<()> {
    let dims = tensor.dims();
    if dims.len() == rank {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{what}: expected rank {rank}, got shape {dims:?}"
        )))
    }
}

/// Ensures a tensor matches the expected dimensions exactly.
pub fn expect_shape(what: &str, tensor: &Tensor, expected: &[usize]) -> Result<()> {
    let actual = tensor.dims();
    if actual == expected {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{what}: expected shape {expected:?}, got {actual:?}"
        )))
    }
}

/// Validates the `(batch, channel, height, width)` convention with a known
/// channel count.
pub fn expect_channels(what: &str, tensor: &Tensor, channels: usize) -> Result<()> {
    let dims = tensor.dims();
    match dims {
        [_, c, _, _] if *c == channels => Ok(()),
        _ => Err(Error::Msg(format!(
            "{what}: expected (batch, {channels}, h, w) layout, got {dims:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn channel_check_accepts_matching_layout() -> Result<()> {
        let t = Tensor::zeros((2, 3, 4, 5), candle_core::DType::F32, &Device::Cpu)?;
        expect_rank("t", &t, 4)?;
        expect_channels("t", &t, 3)?;
        assert!(expect_channels("t", &t, 4).is_err());
        assert!(expect_shape("t", &t, &[2, 3, 4, 4]).is_err());
        Ok(())
    }
}
