//! Correlation preservation.
//!
//! Compares the Pearson matrix of the original data with that of its
//! reconstruction. The score is the mean absolute difference over all
//! `D × D` entries, diagonal included.

use nalgebra::DMatrix;

use crate::{Error, Result};

/// Pearson correlation matrix of an `N × D` sample matrix.
///
/// A feature with zero variance correlates 0 with every other feature and
/// 1 with itself.
pub fn pearson_matrix(data: &DMatrix<f64>) -> DMatrix<f64> {
    let (n, d) = data.shape();
    let mut centered = data.clone();
    for mut col in centered.column_iter_mut() {
        let mean = col.sum() / n.max(1) as f64;
        col.add_scalar_mut(-mean);
    }
    let norms: Vec<f64> = centered.column_iter().map(|c| c.norm()).collect();

    DMatrix::from_fn(d, d, |i, j| {
        if i == j {
            return 1.0;
        }
        let denom = norms[i] * norms[j];
        if denom == 0.0 {
            return 0.0;
        }
        let r = centered.column(i).dot(&centered.column(j)) / denom;
        r.clamp(-1.0, 1.0)
    })
}

/// Mean absolute difference between two correlation matrices.
pub fn correlation_mae(original: &DMatrix<f64>, reconstructed: &DMatrix<f64>) -> Result<f64> {
    if original.shape() != reconstructed.shape() {
        return Err(Error::shape(
            "correlation matrix",
            original.ncols(),
            reconstructed.ncols(),
        ));
    }
    let total: f64 = original
        .iter()
        .zip(reconstructed.iter())
        .map(|(a, b)| (a - b).abs())
        .sum();
    Ok(total / original.len().max(1) as f64)
}

/// Both Pearson matrices and their mean absolute difference.
#[derive(Debug, Clone)]
pub struct CorrelationReport {
    pub original: DMatrix<f64>,
    pub reconstructed: DMatrix<f64>,
    pub mae: f64,
}

/// Score how well `reconstructed` keeps the feature correlations of `original`.
pub fn correlation_preservation(
    original: &DMatrix<f64>,
    reconstructed: &DMatrix<f64>,
) -> Result<CorrelationReport> {
    if original.ncols() != reconstructed.ncols() {
        return Err(Error::shape(
            "reconstructed features",
            original.ncols(),
            reconstructed.ncols(),
        ));
    }
    let original = pearson_matrix(original);
    let reconstructed = pearson_matrix(reconstructed);
    let mae = correlation_mae(&original, &reconstructed)?;
    tracing::info!("Correlation MAE: {mae:.4}");
    Ok(CorrelationReport {
        original,
        reconstructed,
        mae,
    })
}
