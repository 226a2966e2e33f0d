//! Noise sources for the reparameterisation step.
//!
//! The model never draws randomness itself; callers hand it a
//! [`NoiseSource`]. [`GaussianNoise`] is seeded through `ChaCha8Rng` so a
//! training run is reproducible, [`ZeroNoise`] collapses the sample onto the
//! latent mean.

use candle_core::{DType, Device, Shape, Tensor};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::Result;

/// Supplier of the `ε` tensor in `z = μ + ε · σ`.
pub trait NoiseSource {
    /// Draw an `f32` tensor of the given shape.
    fn sample(&mut self, shape: &Shape, device: &Device) -> Result<Tensor>;
}

/// Standard-normal noise from a seeded generator.
pub struct GaussianNoise {
    rng: ChaCha8Rng,
}

impl GaussianNoise {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl NoiseSource for GaussianNoise {
    fn sample(&mut self, shape: &Shape, device: &Device) -> Result<Tensor> {
        let values: Vec<f32> = (0..shape.elem_count())
            .map(|_| self.rng.sample(StandardNormal))
            .collect();
        Ok(Tensor::from_vec(values, shape.clone(), device)?)
    }
}

/// All-zero noise: the latent sample equals the mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroNoise;

impl NoiseSource for ZeroNoise {
    fn sample(&mut self, shape: &Shape, device: &Device) -> Result<Tensor> {
        Ok(Tensor::zeros(shape.clone(), DType::F32, device)?)
    }
}
