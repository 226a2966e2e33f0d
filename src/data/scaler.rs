//! Per-feature min-max scaling to the unit interval.
//!
//! ```text
//! scaled   = (x - min) / (max - min)
//! original = scaled * (max - min) + min
//! ```
//!
//! A constant feature gets a unit range so it maps to 0 instead of NaN.

use candle_core::{DType, Tensor};

use crate::error::check_width;
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct FittedRange {
    min: Tensor,   // [1, D]
    range: Tensor, // [1, D]
    width: usize,
}

/// Min-max scaler whose state is learned by [`MinMaxScaler::fit_transform`].
#[derive(Debug, Clone, Default)]
pub struct MinMaxScaler {
    fitted: Option<FittedRange>,
}

impl MinMaxScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Learn per-feature min/max from `data` `[N, D]` and return it scaled.
    pub fn fit_transform(&mut self, data: &Tensor) -> Result<Tensor> {
        let width = data.dim(candle_core::D::Minus1)?;
        let rows = check_width("scaler fit", data, width)?;
        if rows == 0 {
            return Err(Error::InvalidSampleCount(rows));
        }

        let data = data.to_dtype(DType::F32)?;
        let min = data.min_keepdim(0)?;
        let max = data.max_keepdim(0)?;
        let range: Vec<f32> = (&max - &min)?
            .flatten_all()?
            .to_vec1::<f32>()?
            .into_iter()
            .map(|r| if r > 0.0 { r } else { 1.0 })
            .collect();
        let range = Tensor::from_vec(range, (1, width), data.device())?;

        self.fitted = Some(FittedRange { min, range, width });
        self.transform(&data)
    }

    /// Scale new data with the fitted ranges.
    pub fn transform(&self, data: &Tensor) -> Result<Tensor> {
        let fitted = self.fitted.as_ref().ok_or(Error::ScalerNotFitted)?;
        check_width("scaler transform", data, fitted.width)?;
        let scaled = data
            .to_dtype(DType::F32)?
            .broadcast_sub(&fitted.min)?
            .broadcast_div(&fitted.range)?;
        Ok(scaled)
    }

    /// Map scaled data back to original units.
    pub fn inverse_transform(&self, scaled: &Tensor) -> Result<Tensor> {
        let fitted = self.fitted.as_ref().ok_or(Error::ScalerNotFitted)?;
        check_width("scaler inverse_transform", scaled, fitted.width)?;
        let original = scaled
            .to_dtype(DType::F32)?
            .broadcast_mul(&fitted.range)?
            .broadcast_add(&fitted.min)?;
        Ok(original)
    }

    /// Fitted per-feature minimum, `None` before `fit_transform`.
    pub fn data_min(&self) -> Result<Option<Vec<f32>>> {
        let Some(fitted) = self.fitted.as_ref() else {
            return Ok(None);
        };
        Ok(Some(fitted.min.flatten_all()?.to_vec1::<f32>()?))
    }
}
