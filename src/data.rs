//! Tabular data: synthetic correlated sample and min-max scaling.
//!
//! Datasets are `[N, D]` `f32` tensors. The raw and scaled forms keep the
//! same row order so they stay index-aligned through training and evaluation.

mod scaler;
mod synthetic;

pub use scaler::MinMaxScaler;
pub use synthetic::{SyntheticGenerator, correlated_covariance, is_positive_semi_definite};
