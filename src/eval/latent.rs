//! Latent space analysis.
//!
//! The dataset is encoded to latent means (evaluation mode) and projected to
//! two dimensions twice:
//!
//! ```text
//! PCA:   centre → covariance → symmetric eigendecomposition → top-2 axes
//! t-SNE: Barnes-Hut neighbour embedding from `linfa-tsne`, perplexity
//!        capped to the sample size, seeded initial layout
//! ```

use std::cmp::Ordering;
use std::path::Path;

use candle_core::Tensor;
use linfa::traits::Transformer;
use linfa_tsne::TSneParams;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::Array2;
use rand_xoshiro::rand_core::SeedableRng as _;
use rand_xoshiro::Xoshiro256Plus;

use super::tensor_to_matrix;
use crate::config::EvalConfig;
use crate::vae::TransformerVae;
use crate::{Error, Result};

// ---------------------------------------------------------------------------
// PCA
// ---------------------------------------------------------------------------

/// Two-component principal projection.
#[derive(Debug, Clone)]
pub struct PcaProjection {
    /// `N × 2` coordinates.
    pub points: DMatrix<f64>,
    /// `L × 2` principal axes, unit length.
    pub components: DMatrix<f64>,
    /// Share of total variance carried by each axis.
    pub explained_variance_ratio: [f64; 2],
}

/// Project the rows of `data` onto their two leading principal axes.
///
/// Each axis is signed so its largest-magnitude loading is positive.
pub fn pca_2d(data: &DMatrix<f64>) -> Result<PcaProjection> {
    let (n, d) = data.shape();
    if n < 2 {
        return Err(Error::InvalidSampleCount(n));
    }
    if d < 2 {
        return Err(Error::Config(format!(
            "PCA to 2-D needs at least 2 dimensions, got {d}"
        )));
    }

    let mut centered = data.clone();
    for mut col in centered.column_iter_mut() {
        let mean = col.sum() / n as f64;
        col.add_scalar_mut(-mean);
    }
    let covariance = centered.transpose() * &centered / (n - 1) as f64;
    let eigen = SymmetricEigen::new(covariance);

    let mut order: Vec<(usize, f64)> = eigen.eigenvalues.iter().copied().enumerate().collect();
    order.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let mut components = DMatrix::zeros(d, 2);
    for (k, &(idx, _)) in order.iter().take(2).enumerate() {
        let mut axis = eigen.eigenvectors.column(idx).clone_owned();
        let pivot = axis
            .iter()
            .copied()
            .max_by(|a, b| a.abs().partial_cmp(&b.abs()).unwrap_or(Ordering::Equal))
            .unwrap_or(0.0);
        if pivot < 0.0 {
            axis.neg_mut();
        }
        components.set_column(k, &axis);
    }

    let total: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();
    let ratio = |k: usize| {
        if total > 0.0 {
            order[k].1.max(0.0) / total
        } else {
            0.0
        }
    };
    let explained_variance_ratio = [ratio(0), ratio(1)];

    Ok(PcaProjection {
        points: centered * &components,
        components,
        explained_variance_ratio,
    })
}

// ---------------------------------------------------------------------------
// t-SNE
// ---------------------------------------------------------------------------

/// t-SNE settings.
#[derive(Debug, Clone)]
pub struct TsneParams {
    pub perplexity: f64,
    pub iterations: usize,
    /// Barnes-Hut θ.
    pub approx_threshold: f64,
    pub seed: u64,
}

impl TsneParams {
    pub fn from_eval(cfg: &EvalConfig) -> Self {
        Self {
            perplexity: cfg.tsne_perplexity,
            iterations: cfg.tsne_iterations,
            approx_threshold: cfg.tsne_approx_threshold,
            seed: cfg.seed,
        }
    }
}

/// Smallest input t-SNE accepts: perplexity must stay below `(N − 1) / 3`.
const MIN_TSNE_ROWS: usize = 4;

/// Keeps the capped perplexity strictly under `(N − 1) / 3`.
const PERPLEXITY_MARGIN: f64 = 1e-6;

/// Embed the rows of `data` in two dimensions with `linfa-tsne`.
///
/// The perplexity is capped just below `(N − 1) / 3` so small inputs stay
/// well-posed. The initial embedding is drawn from a generator seeded with
/// `params.seed`.
pub fn tsne_2d(data: &DMatrix<f64>, params: &TsneParams) -> Result<DMatrix<f64>> {
    let (n, d) = data.shape();
    if n < MIN_TSNE_ROWS {
        return Err(Error::InvalidSampleCount(n));
    }
    if d < 2 {
        return Err(Error::Config(format!(
            "t-SNE to 2-D needs at least 2 dimensions, got {d}"
        )));
    }
    if !(params.perplexity > 0.0 && params.approx_threshold >= 0.0) {
        return Err(Error::Config(format!(
            "t-SNE perplexity must be positive and threshold non-negative, got {} and {}",
            params.perplexity, params.approx_threshold
        )));
    }

    let perplexity = params
        .perplexity
        .min((n - 1) as f64 / 3.0 - PERPLEXITY_MARGIN);
    let input = Array2::from_shape_fn((n, d), |(i, j)| data[(i, j)]);
    let embedded = TSneParams::embedding_size_with_rng(2, Xoshiro256Plus::seed_from_u64(params.seed))
        .perplexity(perplexity)
        .approx_threshold(params.approx_threshold)
        .max_iter(params.iterations)
        .transform(input)
        .map_err(|e| Error::LinAlg(format!("t-SNE: {e}")))?;
    tracing::debug!("t-SNE embedded {n} points at perplexity {perplexity:.2}");
    Ok(DMatrix::from_fn(n, 2, |i, j| embedded[[i, j]]))
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Latent means and their two projections.
#[derive(Debug, Clone)]
pub struct LatentAnalysis {
    /// `N × L` latent means.
    pub means: DMatrix<f64>,
    pub pca: PcaProjection,
    /// `N × 2` t-SNE embedding.
    pub tsne: DMatrix<f64>,
}

impl LatentAnalysis {
    /// Write `latent_pca.tsv` style output: header then one row per sample.
    pub fn write_pca_tsv(&self, path: impl AsRef<Path>) -> Result<()> {
        write_points(&self.pca.points, "PC1\tPC2", path)
    }

    pub fn write_tsne_tsv(&self, path: impl AsRef<Path>) -> Result<()> {
        write_points(&self.tsne, "TSNE1\tTSNE2", path)
    }
}

fn write_points(points: &DMatrix<f64>, header: &str, path: impl AsRef<Path>) -> Result<()> {
    let mut out = String::from(header);
    out.push('\n');
    for row in points.row_iter() {
        out.push_str(&format!("{:.4}\t{:.4}\n", row[0], row[1]));
    }
    std::fs::write(path, out)?;
    Ok(())
}

/// Encode `data` to latent means and project them with PCA and t-SNE.
pub fn analyze_latent_space(
    model: &TransformerVae,
    data: &Tensor,
    cfg: &EvalConfig,
) -> Result<LatentAnalysis> {
    let means = tensor_to_matrix(&model.latent_means(data)?)?;
    tracing::info!(
        "Latent analysis: {} points in {} dimensions",
        means.nrows(),
        means.ncols()
    );
    let pca = pca_2d(&means)?;
    tracing::info!(
        "PCA explained variance: {:.3}, {:.3}",
        pca.explained_variance_ratio[0],
        pca.explained_variance_ratio[1]
    );
    let tsne = tsne_2d(&means, &TsneParams::from_eval(cfg))?;
    Ok(LatentAnalysis { means, pca, tsne })
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, VarMap};
    use crate::config::VaeConfig;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use rand_distr::StandardNormal;

    fn two_clusters() -> DMatrix<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        DMatrix::from_fn(20, 3, |i, _| {
            let centre = if i < 10 { 0.0 } else { 10.0 };
            centre + 0.1 * rng.sample::<f64, _>(StandardNormal)
        })
    }

    #[test]
    fn test_pca_recovers_dominant_axis() {
        // Points spread along (1, 1, 0) with small noise off-axis.
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let data = DMatrix::from_fn(50, 3, |i, j| {
            let t = i as f64 - 25.0;
            let noise = 0.01 * rng.sample::<f64, _>(StandardNormal);
            if j < 2 { t + noise } else { noise }
        });
        let pca = pca_2d(&data).unwrap();
        let axis = pca.components.column(0);
        let s = std::f64::consts::FRAC_1_SQRT_2;
        assert!((axis[0] - s).abs() < 1e-3, "{axis}");
        assert!((axis[1] - s).abs() < 1e-3, "{axis}");
        assert!(pca.explained_variance_ratio[0] > 0.99);
        assert!(pca.explained_variance_ratio[0] >= pca.explained_variance_ratio[1]);
        assert_eq!(pca.points.shape(), (50, 2));
    }

    #[test]
    fn test_pca_points_are_centred() {
        let pca = pca_2d(&two_clusters()).unwrap();
        for col in pca.points.column_iter() {
            assert!(col.mean().abs() < 1e-9);
        }
        let ratio_sum: f64 = pca.explained_variance_ratio.iter().sum();
        assert!(ratio_sum <= 1.0 + 1e-12);
    }

    #[test]
    fn test_pca_needs_two_dimensions() {
        let data = DMatrix::from_element(5, 1, 1.0);
        assert!(matches!(pca_2d(&data), Err(Error::Config(_))));
    }

    #[test]
    fn test_tsne_separates_clusters() {
        let params = TsneParams {
            perplexity: 5.0,
            iterations: 400,
            approx_threshold: 0.5,
            seed: 3,
        };
        let y = tsne_2d(&two_clusters(), &params).unwrap();
        assert_eq!(y.shape(), (20, 2));
        assert!(y.iter().all(|v| v.is_finite()));

        let centroid = |rows: std::ops::Range<usize>| {
            let len = rows.len() as f64;
            let (mut cx, mut cy) = (0.0, 0.0);
            for i in rows {
                cx += y[(i, 0)];
                cy += y[(i, 1)];
            }
            (cx / len, cy / len)
        };
        let spread = |rows: std::ops::Range<usize>, c: (f64, f64)| {
            rows.map(|i| ((y[(i, 0)] - c.0).powi(2) + (y[(i, 1)] - c.1).powi(2)).sqrt())
                .fold(0.0, f64::max)
        };
        let (a, b) = (centroid(0..10), centroid(10..20));
        let gap = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
        assert!(
            gap > spread(0..10, a) && gap > spread(10..20, b),
            "clusters overlap: gap {gap}"
        );
    }

    #[test]
    fn test_tsne_is_seeded() {
        let params = TsneParams {
            perplexity: 5.0,
            iterations: 50,
            approx_threshold: 0.5,
            seed: 9,
        };
        let a = tsne_2d(&two_clusters(), &params).unwrap();
        let b = tsne_2d(&two_clusters(), &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tsne_caps_perplexity_for_small_inputs() {
        let data = two_clusters().rows(0, 6).clone_owned();
        let params = TsneParams {
            perplexity: 30.0,
            iterations: 50,
            approx_threshold: 0.5,
            seed: 1,
        };
        let y = tsne_2d(&data, &params).unwrap();
        assert_eq!(y.shape(), (6, 2));
        assert!(y.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_tsne_rejects_too_few_rows() {
        let data = two_clusters().rows(0, 3).clone_owned();
        let params = TsneParams {
            perplexity: 5.0,
            iterations: 10,
            approx_threshold: 0.5,
            seed: 1,
        };
        assert!(matches!(
            tsne_2d(&data, &params),
            Err(Error::InvalidSampleCount(3))
        ));
    }

    #[test]
    fn test_analyze_latent_space_shapes() {
        let dev = Device::Cpu;
        let cfg = VaeConfig {
            input_dim: 4,
            latent_dim: 3,
            hidden_dim: 16,
            num_heads: 2,
            num_layers: 1,
            feedforward_dim: 32,
            ..VaeConfig::default()
        };
        let varmap = VarMap::new();
        let vae = TransformerVae::new(&cfg, VarBuilder::from_varmap(&varmap, DType::F32, &dev))
            .unwrap();
        let data = Tensor::rand(0f32, 1.0, (12, 4), &dev).unwrap();
        let eval = EvalConfig {
            tsne_iterations: 30,
            ..EvalConfig::default()
        };
        let analysis = analyze_latent_space(&vae, &data, &eval).unwrap();
        assert_eq!(analysis.means.shape(), (12, 3));
        assert_eq!(analysis.pca.points.shape(), (12, 2));
        assert_eq!(analysis.tsne.shape(), (12, 2));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latent_pca.tsv");
        analysis.write_pca_tsv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 13);
        assert!(text.starts_with("PC1\tPC2\n"));
    }
}
