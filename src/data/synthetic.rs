//! Multivariate-normal sample with a compound-symmetric correlation structure.
//!
//! ```text
//! Σ[i][i] = std[i]²
//! Σ[i][j] = ρ · std[i] · std[j]      (i ≠ j)
//! x       = μ + L · ε,   ε ~ N(0, I),   L Lᵀ = Σ
//! ```
//!
//! `L` is the Cholesky factor when Σ is positive definite. A singular but
//! positive semi-definite Σ (ρ = 1, or a zero std) falls back to the
//! eigen factor `V · √Λ`.

use candle_core::{Device, Tensor};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::config::DataConfig;
use crate::{Error, Result};

/// Tolerance on negative eigenvalues when testing semi-definiteness.
const PSD_TOLERANCE: f64 = 1e-9;

/// Build Σ from per-feature standard deviations and a shared correlation.
pub fn correlated_covariance(stds: &[f64], correlation: f64) -> DMatrix<f64> {
    let d = stds.len();
    DMatrix::from_fn(d, d, |i, j| {
        if i == j {
            stds[i] * stds[i]
        } else {
            correlation * stds[i] * stds[j]
        }
    })
}

/// Symmetric and every eigenvalue ≥ −tolerance (scaled by the largest entry).
pub fn is_positive_semi_definite(matrix: &DMatrix<f64>) -> bool {
    if !matrix.is_square() {
        return false;
    }
    let scale = matrix.amax().max(1.0);
    if (matrix - matrix.transpose()).amax() > PSD_TOLERANCE * scale {
        return false;
    }
    let eigen = SymmetricEigen::new(matrix.clone());
    eigen
        .eigenvalues
        .iter()
        .all(|&lambda| lambda >= -PSD_TOLERANCE * scale)
}

/// Seeded sampler for the synthetic dataset.
pub struct SyntheticGenerator {
    means: DVector<f64>,
    covariance: DMatrix<f64>,
    factor: DMatrix<f64>,
    rng: ChaCha8Rng,
}

impl SyntheticGenerator {
    pub fn new(cfg: &DataConfig) -> Result<Self> {
        cfg.validate()?;
        let covariance = correlated_covariance(&cfg.stds, cfg.correlation);
        let factor = sampling_factor(&covariance)?;
        Ok(Self {
            means: DVector::from_column_slice(&cfg.means),
            covariance,
            factor,
            rng: ChaCha8Rng::seed_from_u64(cfg.seed),
        })
    }

    /// Feature count (D).
    pub fn num_features(&self) -> usize {
        self.means.len()
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    pub fn means(&self) -> &DVector<f64> {
        &self.means
    }

    /// Draw `n` rows as an `[n, D]` f32 tensor.
    ///
    /// Generators built from the same config return bit-identical draws.
    pub fn sample(&mut self, n: usize, device: &Device) -> Result<Tensor> {
        if n == 0 {
            return Err(Error::InvalidSampleCount(n));
        }
        let d = self.num_features();
        let rng = &mut self.rng;
        // One column of standard normals per row of the output.
        let eps = DMatrix::<f64>::from_fn(d, n, |_, _| rng.sample(StandardNormal));
        let mut draws = &self.factor * eps;
        for j in 0..n {
            for i in 0..d {
                draws[(i, j)] += self.means[i];
            }
        }

        // Column-major [D, n] storage is the row-major [n, D] layout.
        let data: Vec<f32> = draws.iter().map(|&v| v as f32).collect();
        let tensor = Tensor::from_vec(data, (n, d), device)?;
        tracing::debug!("Drew {n} synthetic rows with {d} features");
        Ok(tensor)
    }
}

/// Matrix `L` with `L Lᵀ = Σ`.
fn sampling_factor(covariance: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if let Some(chol) = covariance.clone().cholesky() {
        return Ok(chol.l());
    }
    if !is_positive_semi_definite(covariance) {
        return Err(Error::LinAlg(
            "covariance is not positive semi-definite".into(),
        ));
    }
    let eigen = SymmetricEigen::new(covariance.clone());
    let sqrt_values = eigen.eigenvalues.map(|lambda| lambda.max(0.0).sqrt());
    Ok(eigen.eigenvectors * DMatrix::from_diagonal(&sqrt_values))
}
