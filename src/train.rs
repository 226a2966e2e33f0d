//! Fixed-budget β-VAE training.
//!
//! Per batch: forward (train mode) → `recon + β · kl` → backward → clip the
//! global gradient norm → one AdamW step. Per epoch: both loss terms are
//! summed over batches, divided by the number of examples, and appended to
//! the [`LossHistory`]. There is no validation split and no early stopping.
//!
//! Rows are reshuffled between epochs with a seeded `ChaCha8Rng`; a batch is
//! a contiguous slice of that permutation.

pub mod clip;
pub mod history;

use candle_core::{DType, Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::TrainConfig;
use crate::loss::beta_vae_loss;
use crate::model::noise::{GaussianNoise, NoiseSource};
use crate::vae::TransformerVae;
use crate::{Error, Result};

pub use clip::clip_grad_norm;
pub use history::{EpochLoss, LOSS_HEADER, LossHistory};

/// Owns the optimizer state, the noise stream and the loss trace of one run.
pub struct Trainer {
    cfg: TrainConfig,
    vars: Vec<Var>,
    optimizer: AdamW,
    noise: Box<dyn NoiseSource>,
    rng: ChaCha8Rng,
    history: LossHistory,
}

impl Trainer {
    /// Bind an optimizer to every variable in `varmap`.
    pub fn new(varmap: &VarMap, cfg: &TrainConfig) -> Result<Self> {
        Self::with_noise(varmap, cfg, Box::new(GaussianNoise::new(cfg.seed)))
    }

    /// Like [`Trainer::new`] with a caller-supplied noise source.
    pub fn with_noise(
        varmap: &VarMap,
        cfg: &TrainConfig,
        noise: Box<dyn NoiseSource>,
    ) -> Result<Self> {
        cfg.validate()?;
        let vars = varmap.all_vars();
        let optimizer = AdamW::new(
            vars.clone(),
            ParamsAdamW {
                lr: cfg.learning_rate,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;
        let num_params: usize = vars.iter().map(|v| v.as_tensor().elem_count()).sum();
        tracing::info!(
            "Trainer: {} tensors, {} parameters, lr={:.1e}, beta={}",
            vars.len(),
            num_params,
            cfg.learning_rate,
            cfg.beta
        );
        Ok(Self {
            cfg: cfg.clone(),
            vars,
            optimizer,
            noise,
            rng: ChaCha8Rng::seed_from_u64(cfg.seed.wrapping_add(1)),
            history: LossHistory::new(),
        })
    }

    pub fn history(&self) -> &LossHistory {
        &self.history
    }

    pub fn into_history(self) -> LossHistory {
        self.history
    }

    /// Run `epochs` full passes over `data` `[N, D]`.
    pub fn fit(
        &mut self,
        model: &TransformerVae,
        data: &Tensor,
        epochs: usize,
    ) -> Result<&LossHistory> {
        for _ in 0..epochs {
            self.train_epoch(model, data)?;
        }
        Ok(&self.history)
    }

    /// One pass over `data`; appends and returns the epoch's mean losses.
    pub fn train_epoch(&mut self, model: &TransformerVae, data: &Tensor) -> Result<EpochLoss> {
        let epoch = self.history.len();
        let n = crate::error::check_width("training data", data, model.config().input_dim)?;
        if n == 0 {
            return Err(Error::InvalidSampleCount(n));
        }

        let mut order: Vec<u32> = (0..n as u32).collect();
        if self.cfg.shuffle {
            order.shuffle(&mut self.rng);
        }

        let mut recon_sum = 0f64;
        let mut kl_sum = 0f64;
        for (batch_idx, chunk) in order.chunks(self.cfg.batch_size).enumerate() {
            let index = Tensor::from_slice(chunk, chunk.len(), data.device())?;
            let batch = data.index_select(&index, 0)?;

            let out = model.forward(&batch, self.noise.as_mut(), true)?;
            let loss = beta_vae_loss(
                &out.reconstruction,
                &batch,
                &out.mean,
                &out.logvar,
                self.cfg.beta,
            )?;
            let recon = scalar(&loss.reconstruction)?;
            let kl = scalar(&loss.kl)?;
            if !recon.is_finite() || !kl.is_finite() {
                return Err(Error::NonFiniteLoss {
                    epoch,
                    batch: batch_idx,
                });
            }

            let mut grads = loss.total.backward()?;
            let grad_norm = clip_grad_norm(&self.vars, &mut grads, self.cfg.clip_norm)?;
            self.optimizer.step(&grads)?;

            tracing::debug!(
                "epoch {epoch} batch {batch_idx}: recon {recon:.4} kl {kl:.4} grad_norm {grad_norm:.4}"
            );
            recon_sum += recon;
            kl_sum += kl;
        }

        let entry = EpochLoss {
            epoch,
            reconstruction: recon_sum / n as f64,
            kl: kl_sum / n as f64,
        };
        tracing::info!(
            "Epoch {}: recon {:.4}, kl {:.4}",
            epoch,
            entry.reconstruction,
            entry.kl
        );
        self.history.push(entry);
        Ok(entry)
    }
}

fn scalar(t: &Tensor) -> Result<f64> {
    Ok(t.to_dtype(DType::F64)?.to_scalar::<f64>()?)
}
