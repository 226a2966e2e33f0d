//! Latent interpolation between two samples.
//!
//! ```text
//! μ_a, μ_b = encode(x_a), encode(x_b)               evaluation mode
//! w_t      = t / (steps − 1),  t = 0 .. steps − 1
//! z_t      = (1 − w_t) · μ_a + w_t · μ_b
//! x̂_t      = decode(z_t)
//! ```

use std::fmt::Write as _;
use std::path::Path;

use candle_core::{DType, Tensor};

use crate::error::check_width;
use crate::vae::TransformerVae;
use crate::{Error, Result};

/// Interpolation path and its decoded features.
#[derive(Debug, Clone)]
pub struct Interpolation {
    /// Mixing weight of the second endpoint per step.
    pub weights: Vec<f64>,
    /// `[steps, L]` latent points.
    pub latents: Tensor,
    /// `[steps, D]` decoded rows, scaled units.
    pub decoded: Tensor,
}

impl Interpolation {
    /// Tab-separated table: `Step`, `Weight`, then one column per feature.
    pub fn to_tsv(&self) -> Result<String> {
        let rows: Vec<Vec<f32>> = self.decoded.to_dtype(DType::F32)?.to_vec2()?;
        let width = rows.first().map_or(0, Vec::len);
        let mut out = String::from("Step\tWeight");
        for f in 0..width {
            let _ = write!(out, "\tFeature {}", f + 1);
        }
        out.push('\n');
        for (step, (w, row)) in self.weights.iter().zip(rows.iter()).enumerate() {
            let _ = write!(out, "{step}\t{w:.4}");
            for v in row {
                let _ = write!(out, "\t{v:.4}");
            }
            out.push('\n');
        }
        Ok(out)
    }

    pub fn write_tsv(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_tsv()?)?;
        Ok(())
    }
}

/// Interpolate between the latent means of rows `index_a` and `index_b` of `data`.
pub fn interpolate(
    model: &TransformerVae,
    data: &Tensor,
    index_a: usize,
    index_b: usize,
    steps: usize,
) -> Result<Interpolation> {
    if steps < 2 {
        return Err(Error::Config(format!(
            "interpolation needs at least 2 steps, got {steps}"
        )));
    }
    let n = check_width("interpolation data", data, model.config().input_dim)?;
    for index in [index_a, index_b] {
        if index >= n {
            return Err(Error::shape("interpolation row index", n, index));
        }
    }

    let device = data.device();
    let pair = Tensor::from_slice(&[index_a as u32, index_b as u32], 2, device)?;
    let means = model.latent_means(&data.index_select(&pair, 0)?)?;
    let mean_a = means.narrow(0, 0, 1)?;
    let mean_b = means.narrow(0, 1, 1)?;

    let weights: Vec<f64> = (0..steps)
        .map(|t| t as f64 / (steps - 1) as f64)
        .collect();
    let w: Vec<f32> = weights.iter().map(|&w| w as f32).collect();
    let w = Tensor::from_vec(w, (steps, 1), device)?.to_dtype(means.dtype())?;
    let one_minus_w = w.affine(-1.0, 1.0)?;

    let latents = (mean_a.broadcast_mul(&one_minus_w)? + mean_b.broadcast_mul(&w)?)?;
    let decoded = model.decode(&latents, false)?;
    tracing::info!(
        "Interpolated rows {} and {} in {} steps",
        index_a,
        index_b,
        steps
    );
    Ok(Interpolation {
        weights,
        latents,
        decoded,
    })
}
