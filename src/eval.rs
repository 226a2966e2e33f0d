//! Evaluation suite.
//!
//! Every analysis is a read-only consumer of a trained model and its data:
//!
//! - [`correlation`] — Pearson-matrix preservation score
//! - [`distribution`] — per-feature Wasserstein-1 and multivariate MMD
//! - [`latent`] — latent means projected to 2-D with PCA and t-SNE
//! - [`interpolation`] — decoding a straight line between two latent means
//!
//! Tensors are pulled into `nalgebra` matrices (`f64`) for the statistics.

pub mod correlation;
pub mod distribution;
pub mod interpolation;
pub mod latent;

use candle_core::{DType, Tensor};
use nalgebra::DMatrix;

use crate::{Error, Result};

/// Copy an `[N, D]` tensor into an `N × D` matrix of `f64`.
pub fn tensor_to_matrix(tensor: &Tensor) -> Result<DMatrix<f64>> {
    let (rows, cols) = match tensor.dims() {
        [rows, cols] => (*rows, *cols),
        dims => return Err(Error::shape("matrix rank", 2, dims.len())),
    };
    let values: Vec<f64> = tensor
        .to_dtype(DType::F64)?
        .flatten_all()?
        .to_vec1::<f64>()?;
    Ok(DMatrix::from_row_slice(rows, cols, &values))
}

/// Render a matrix as whitespace-delimited rows with four decimals.
pub fn format_matrix(matrix: &DMatrix<f64>) -> String {
    let mut out = String::new();
    for row in matrix.row_iter() {
        let line: Vec<String> = row.iter().map(|v| format!("{v:.4}")).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

/// Write [`format_matrix`] output to `path`.
pub fn write_matrix(matrix: &DMatrix<f64>, path: impl AsRef<std::path::Path>) -> Result<()> {
    std::fs::write(path, format_matrix(matrix))?;
    Ok(())
}
