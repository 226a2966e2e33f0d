//! Distribution discrepancy between original and reconstructed data.
//!
//! ```text
//! W1(u, v) = ∫ |F_u(t) − F_v(t)| dt              per feature, then averaged
//! MMD²     = mean(Kxx) + mean(Kyy) − 2·mean(Kxy)  k(x, y) = exp(−‖x − y‖² / 2σ²)
//! ```
//!
//! Both statistics are exactly zero when the two sample sets are identical.

use nalgebra::{DMatrix, DVector};

use crate::{Error, Result};

/// Exact Wasserstein-1 distance between two 1-D empirical distributions.
///
/// Sample counts may differ. Either side empty yields `InvalidSampleCount`.
pub fn wasserstein_1d(u: &[f64], v: &[f64]) -> Result<f64> {
    if u.is_empty() || v.is_empty() {
        return Err(Error::InvalidSampleCount(u.len().min(v.len())));
    }
    let mut u = u.to_vec();
    let mut v = v.to_vec();
    u.sort_by(f64::total_cmp);
    v.sort_by(f64::total_cmp);

    let mut all: Vec<f64> = u.iter().chain(v.iter()).copied().collect();
    all.sort_by(f64::total_cmp);

    let (nu, nv) = (u.len() as f64, v.len() as f64);
    let (mut iu, mut iv) = (0usize, 0usize);
    let mut distance = 0.0;
    for w in all.windows(2) {
        let (t, next) = (w[0], w[1]);
        while iu < u.len() && u[iu] <= t {
            iu += 1;
        }
        while iv < v.len() && v[iv] <= t {
            iv += 1;
        }
        let gap = (iu as f64 / nu - iv as f64 / nv).abs();
        distance += gap * (next - t);
    }
    Ok(distance)
}

/// Per-feature Wasserstein-1 distances, one entry per column.
pub fn feature_wasserstein(
    original: &DMatrix<f64>,
    reconstructed: &DMatrix<f64>,
) -> Result<Vec<f64>> {
    if original.ncols() != reconstructed.ncols() {
        return Err(Error::shape(
            "reconstructed features",
            original.ncols(),
            reconstructed.ncols(),
        ));
    }
    original
        .column_iter()
        .zip(reconstructed.column_iter())
        .map(|(a, b)| {
            let a: Vec<f64> = a.iter().copied().collect();
            let b: Vec<f64> = b.iter().copied().collect();
            wasserstein_1d(&a, &b)
        })
        .collect()
}

/// Mean of [`feature_wasserstein`] over all features.
pub fn mean_wasserstein(original: &DMatrix<f64>, reconstructed: &DMatrix<f64>) -> Result<f64> {
    Ok(average(&feature_wasserstein(original, reconstructed)?))
}

fn average(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len().max(1) as f64
}

/// Squared maximum mean discrepancy with a Gaussian kernel of bandwidth `sigma`.
///
/// Rows are samples. Biased V-statistic, clamped at zero.
pub fn mmd(x: &DMatrix<f64>, y: &DMatrix<f64>, sigma: f64) -> Result<f64> {
    if x.ncols() != y.ncols() {
        return Err(Error::shape("mmd features", x.ncols(), y.ncols()));
    }
    if x.nrows() == 0 || y.nrows() == 0 {
        return Err(Error::InvalidSampleCount(x.nrows().min(y.nrows())));
    }
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(Error::Config(format!(
            "mmd bandwidth must be positive, got {sigma}"
        )));
    }
    let gamma = 1.0 / (2.0 * sigma * sigma);
    let kxx = mean_kernel(x, x, gamma);
    let kyy = mean_kernel(y, y, gamma);
    let kxy = mean_kernel(x, y, gamma);
    Ok((kxx + kyy - 2.0 * kxy).max(0.0))
}

/// Mean of `exp(−γ‖a_i − b_j‖²)` over all row pairs.
fn mean_kernel(a: &DMatrix<f64>, b: &DMatrix<f64>, gamma: f64) -> f64 {
    let dist = squared_distances(a, b);
    dist.iter().map(|d| (-gamma * d).exp()).sum::<f64>() / dist.len() as f64
}

/// `‖a_i‖² + ‖b_j‖² − 2·a_i·b_j`, floored at zero.
fn squared_distances(a: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    let a_sq = DVector::from_iterator(a.nrows(), a.row_iter().map(|r| r.norm_squared()));
    let b_sq = DVector::from_iterator(b.nrows(), b.row_iter().map(|r| r.norm_squared()));
    let cross = a * b.transpose();
    DMatrix::from_fn(a.nrows(), b.nrows(), |i, j| {
        (a_sq[i] + b_sq[j] - 2.0 * cross[(i, j)]).max(0.0)
    })
}

/// Wasserstein and MMD results for one comparison.
#[derive(Debug, Clone)]
pub struct DiscrepancyReport {
    pub feature_wasserstein: Vec<f64>,
    pub mean_wasserstein: f64,
    pub mmd: f64,
}

/// Compute both discrepancy statistics.
pub fn distribution_discrepancy(
    original: &DMatrix<f64>,
    reconstructed: &DMatrix<f64>,
    bandwidth: f64,
) -> Result<DiscrepancyReport> {
    let feature_wasserstein = feature_wasserstein(original, reconstructed)?;
    let mean_wasserstein = average(&feature_wasserstein);
    let mmd = mmd(original, reconstructed, bandwidth)?;
    tracing::info!("Mean Wasserstein distance: {mean_wasserstein:.4}, MMD: {mmd:.6}");
    Ok(DiscrepancyReport {
        feature_wasserstein,
        mean_wasserstein,
        mmd,
    })
}
