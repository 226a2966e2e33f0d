//! β-VAE objective.
//!
//! ```text
//! recon = Σ (x̂ − x)²                                   summed over batch and features
//! kl    = −0.5 · Σ (1 + log σ² − μ² − exp(log σ²))     summed over batch and latent dims
//! total = recon + β · kl
//! ```

use candle_core::Tensor;

use crate::Result;

/// The three scalar tensors of one batch. `total` carries the graph for backprop.
#[derive(Debug, Clone)]
pub struct VaeLoss {
    pub reconstruction: Tensor,
    pub kl: Tensor,
    pub total: Tensor,
}

/// Sum of squared element-wise differences.
pub fn reconstruction_loss(reconstruction: &Tensor, target: &Tensor) -> Result<Tensor> {
    Ok((reconstruction - target)?.sqr()?.sum_all()?)
}

/// Closed-form KL divergence from `N(mean, exp(logvar))` to `N(0, I)`.
pub fn kl_divergence(mean: &Tensor, logvar: &Tensor) -> Result<Tensor> {
    let inner = ((logvar + 1.0)? - mean.sqr()?)?;
    let inner = (inner - logvar.exp()?)?;
    Ok((inner.sum_all()? * -0.5)?)
}

/// `reconstruction + beta · kl`.
pub fn beta_vae_loss(
    reconstruction: &Tensor,
    target: &Tensor,
    mean: &Tensor,
    logvar: &Tensor,
    beta: f64,
) -> Result<VaeLoss> {
    let recon = reconstruction_loss(reconstruction, target)?;
    let kl = kl_divergence(mean, logvar)?;
    let total = (&recon + (&kl * beta)?)?;
    Ok(VaeLoss {
        reconstruction: recon,
        kl,
        total,
    })
}
