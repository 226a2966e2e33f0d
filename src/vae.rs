//! Transformer variational autoencoder.
//!
//! ```text
//! encode:  x [B, D] → Linear(D, H) → ReLU → [B, 1, H]
//!          → N × EncoderLayer → mean over sequence → [B, H]
//!          → Linear(H, L) = μ,  Linear(H, L) = log σ²
//! sample:  z = μ + ε · exp(0.5 · log σ²),   ε from a NoiseSource
//! decode:  z [B, L] → Linear(L, H) → ReLU → [B, 1, H] = target = memory
//!          → N × DecoderLayer(target, memory) → [B, H] → Linear(H, D)
//! ```
//!
//! Each feature vector is a sequence of length one, so attention acts as a
//! learned feature mixer rather than a sequence model. The pooling step is
//! kept as a mean over that single position.

use candle_core::{Module, Tensor};
use candle_nn::{Linear, VarBuilder};

use crate::config::VaeConfig;
use crate::error::check_width;
use crate::model::attention::xavier_linear;
use crate::model::layers::{DecoderLayer, EncoderLayer};
use crate::model::noise::NoiseSource;
use crate::Result;

/// Result of a full forward pass.
#[derive(Debug, Clone)]
pub struct VaeOutput {
    /// `[B, D]` reconstruction in scaled units.
    pub reconstruction: Tensor,
    /// `[B, L]` latent mean.
    pub mean: Tensor,
    /// `[B, L]` latent log-variance.
    pub logvar: Tensor,
}

#[derive(Debug, Clone)]
pub struct TransformerVae {
    cfg: VaeConfig,
    input_proj: Linear,
    encoder_layers: Vec<EncoderLayer>,
    fc_mean: Linear,
    fc_logvar: Linear,
    latent_proj: Linear,
    decoder_layers: Vec<DecoderLayer>,
    output_proj: Linear,
}

impl TransformerVae {
    /// Build the model, creating or loading every weight through `vb`.
    pub fn new(cfg: &VaeConfig, vb: VarBuilder) -> Result<Self> {
        cfg.validate()?;
        let h = cfg.hidden_dim;

        let input_proj = xavier_linear(cfg.input_dim, h, vb.pp("input_proj"))?;
        let mut encoder_layers = Vec::with_capacity(cfg.num_layers);
        for i in 0..cfg.num_layers {
            encoder_layers.push(EncoderLayer::new(cfg, vb.pp(format!("encoder.{i}")))?);
        }
        let fc_mean = xavier_linear(h, cfg.latent_dim, vb.pp("fc_mean"))?;
        let fc_logvar = xavier_linear(h, cfg.latent_dim, vb.pp("fc_logvar"))?;

        let latent_proj = xavier_linear(cfg.latent_dim, h, vb.pp("latent_proj"))?;
        let mut decoder_layers = Vec::with_capacity(cfg.num_layers);
        for i in 0..cfg.num_layers {
            decoder_layers.push(DecoderLayer::new(cfg, vb.pp(format!("decoder.{i}")))?);
        }
        let output_proj = xavier_linear(h, cfg.input_dim, vb.pp("output_proj"))?;

        Ok(Self {
            cfg: cfg.clone(),
            input_proj,
            encoder_layers,
            fc_mean,
            fc_logvar,
            latent_proj,
            decoder_layers,
            output_proj,
        })
    }

    pub fn config(&self) -> &VaeConfig {
        &self.cfg
    }

    /// Map `[B, D]` inputs to latent `(mean, logvar)`, each `[B, L]`.
    pub fn encode(&self, xs: &Tensor, train: bool) -> Result<(Tensor, Tensor)> {
        check_width("encoder input", xs, self.cfg.input_dim)?;
        let mut h = self.input_proj.forward(xs)?.relu()?.unsqueeze(1)?;
        for layer in &self.encoder_layers {
            h = layer.forward(&h, train)?;
        }
        let pooled = h.mean(1)?;
        let mean = self.fc_mean.forward(&pooled)?;
        let logvar = self.fc_logvar.forward(&pooled)?;
        Ok((mean, logvar))
    }

    /// `z = mean + ε · exp(0.5 · logvar)`.
    ///
    /// `ε` is a constant tensor, so gradients reach `mean` and `logvar` only.
    pub fn reparameterize(
        &self,
        mean: &Tensor,
        logvar: &Tensor,
        noise: &mut dyn NoiseSource,
    ) -> Result<Tensor> {
        let std = (logvar * 0.5)?.exp()?;
        let eps = noise
            .sample(mean.shape(), mean.device())?
            .to_dtype(mean.dtype())?;
        Ok((mean + (eps * std)?)?)
    }

    /// Map `[B, L]` latents back to `[B, D]` features.
    pub fn decode(&self, z: &Tensor, train: bool) -> Result<Tensor> {
        check_width("decoder latent", z, self.cfg.latent_dim)?;
        let memory = self.latent_proj.forward(z)?.relu()?.unsqueeze(1)?;
        let mut h = memory.clone();
        for layer in &self.decoder_layers {
            h = layer.forward(&h, &memory, train)?;
        }
        let h = h.squeeze(1)?;
        Ok(self.output_proj.forward(&h)?)
    }

    /// `decode(reparameterize(encode(x)))`.
    pub fn forward(
        &self,
        xs: &Tensor,
        noise: &mut dyn NoiseSource,
        train: bool,
    ) -> Result<VaeOutput> {
        let (mean, logvar) = self.encode(xs, train)?;
        let z = self.reparameterize(&mean, &logvar, noise)?;
        let reconstruction = self.decode(&z, train)?;
        Ok(VaeOutput {
            reconstruction,
            mean,
            logvar,
        })
    }

    /// Evaluation-mode reconstruction of a whole dataset.
    pub fn reconstruct(&self, xs: &Tensor, noise: &mut dyn NoiseSource) -> Result<Tensor> {
        Ok(self.forward(xs, noise, false)?.reconstruction)
    }

    /// Deterministic latent means, evaluation mode.
    pub fn latent_means(&self, xs: &Tensor) -> Result<Tensor> {
        Ok(self.encode(xs, false)?.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;
    use crate::model::noise::{GaussianNoise, ZeroNoise};
    use crate::Error;

    fn small_cfg() -> VaeConfig {
        VaeConfig {
            input_dim: 6,
            latent_dim: 2,
            hidden_dim: 16,
            num_heads: 2,
            num_layers: 1,
            feedforward_dim: 32,
            dropout: 0.0,
            ..VaeConfig::default()
        }
    }

    fn build(cfg: &VaeConfig) -> (VarMap, TransformerVae) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let vae = TransformerVae::new(cfg, vb).unwrap();
        (varmap, vae)
    }

    #[test]
    fn test_forward_shapes() {
        let (_varmap, vae) = build(&small_cfg());
        let x = Tensor::rand(0f32, 1.0, (5, 6), &Device::Cpu).unwrap();
        let out = vae.forward(&x, &mut GaussianNoise::new(0), true).unwrap();
        assert_eq!(out.reconstruction.dims(), &[5, 6]);
        assert_eq!(out.mean.dims(), &[5, 2]);
        assert_eq!(out.logvar.dims(), &[5, 2]);
    }

    #[test]
    fn test_default_architecture_shapes() {
        let cfg = VaeConfig::default();
        let (_varmap, vae) = build(&cfg);
        let x = Tensor::rand(0f32, 1.0, (4, 10), &Device::Cpu).unwrap();
        let (mean, logvar) = vae.encode(&x, false).unwrap();
        assert_eq!(mean.dims(), &[4, 3]);
        assert_eq!(logvar.dims(), &[4, 3]);
        assert_eq!(vae.decode(&mean, false).unwrap().dims(), &[4, 10]);
    }

    #[test]
    fn test_input_width_mismatch_fails_fast() {
        let (_varmap, vae) = build(&small_cfg());
        let x = Tensor::zeros((3, 7), DType::F32, &Device::Cpu).unwrap();
        assert!(matches!(
            vae.encode(&x, false),
            Err(Error::ShapeMismatch {
                expected: 6,
                actual: 7,
                ..
            })
        ));
    }

    #[test]
    fn test_latent_width_mismatch_fails_fast() {
        let (_varmap, vae) = build(&small_cfg());
        let z = Tensor::zeros((3, 3), DType::F32, &Device::Cpu).unwrap();
        assert!(matches!(
            vae.decode(&z, false),
            Err(Error::ShapeMismatch {
                expected: 2,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_zero_noise_sample_is_mean() {
        let (_varmap, vae) = build(&small_cfg());
        let mean = Tensor::new(&[[0.5f32, -1.0], [2.0, 0.0]], &Device::Cpu).unwrap();
        let logvar = Tensor::new(&[[1.0f32, -2.0], [0.0, 3.0]], &Device::Cpu).unwrap();
        let z = vae.reparameterize(&mean, &logvar, &mut ZeroNoise).unwrap();
        let z: Vec<Vec<f32>> = z.to_vec2().unwrap();
        assert_eq!(z, vec![vec![0.5, -1.0], vec![2.0, 0.0]]);
    }

    #[test]
    fn test_reparameterize_scales_noise_by_std() {
        let (_varmap, vae) = build(&small_cfg());
        let dev = Device::Cpu;
        let mean = Tensor::zeros((1, 2), DType::F32, &dev).unwrap();
        // logvar = 2 ln 3  →  std = 3
        let logvar = Tensor::full(2.0 * 3f32.ln(), (1, 2), &dev).unwrap();
        let z: Vec<f32> = vae
            .reparameterize(&mean, &logvar, &mut GaussianNoise::new(11))
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();
        let eps: Vec<f32> = GaussianNoise::new(11)
            .sample(&candle_core::Shape::from((1, 2)), &dev)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();
        for (zi, ei) in z.iter().zip(eps.iter()) {
            assert!((zi - 3.0 * ei).abs() < 1e-5, "{zi} vs 3 * {ei}");
        }
    }

    #[test]
    fn test_gradients_reach_mean_and_logvar() {
        let (_varmap, vae) = build(&small_cfg());
        let dev = Device::Cpu;
        let mean = candle_core::Var::zeros((2, 2), DType::F32, &dev).unwrap();
        let logvar = candle_core::Var::zeros((2, 2), DType::F32, &dev).unwrap();
        let z = vae
            .reparameterize(mean.as_tensor(), logvar.as_tensor(), &mut GaussianNoise::new(3))
            .unwrap();
        let loss = z.sum_all().unwrap();
        let grads = loss.backward().unwrap();
        let g_mean: Vec<Vec<f32>> = grads.get(mean.as_tensor()).unwrap().to_vec2().unwrap();
        assert_eq!(g_mean, vec![vec![1.0, 1.0], vec![1.0, 1.0]]);
        assert!(grads.get(logvar.as_tensor()).is_some());
    }

    #[test]
    fn test_eval_forward_with_zero_noise_is_deterministic() {
        let (_varmap, vae) = build(&VaeConfig {
            dropout: 0.3,
            ..small_cfg()
        });
        let x = Tensor::rand(0f32, 1.0, (4, 6), &Device::Cpu).unwrap();
        let a: Vec<Vec<f32>> = vae.reconstruct(&x, &mut ZeroNoise).unwrap().to_vec2().unwrap();
        let b: Vec<Vec<f32>> = vae.reconstruct(&x, &mut ZeroNoise).unwrap().to_vec2().unwrap();
        assert_eq!(a, b);
    }
}
