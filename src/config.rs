//! Configuration for the transformer VAE pipeline.
//!
//! Every hyperparameter is carried in an explicit struct and passed into the
//! component that needs it. Defaults reproduce the reference run: ten
//! correlated features, a three-dimensional latent space, β = 4.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Model architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaeConfig {
    /// Number of input features (D).
    #[serde(default = "default_input_dim")]
    pub input_dim: usize,

    /// Latent width (L).
    #[serde(default = "default_latent_dim")]
    pub latent_dim: usize,

    /// Width of the transformer blocks.
    #[serde(default = "default_hidden_dim")]
    pub hidden_dim: usize,

    /// Attention heads per block. Must divide `hidden_dim`.
    #[serde(default = "default_num_heads")]
    pub num_heads: usize,

    /// Transformer layers in each of the encoder and decoder stacks.
    #[serde(default = "default_num_layers")]
    pub num_layers: usize,

    /// Inner width of the position-wise feed-forward network.
    #[serde(default = "default_feedforward_dim")]
    pub feedforward_dim: usize,

    /// Dropout inside transformer layers (training only).
    #[serde(default = "default_dropout")]
    pub dropout: f32,

    /// LayerNorm epsilon.
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
}

impl Default for VaeConfig {
    fn default() -> Self {
        Self {
            input_dim: default_input_dim(),
            latent_dim: default_latent_dim(),
            hidden_dim: default_hidden_dim(),
            num_heads: default_num_heads(),
            num_layers: default_num_layers(),
            feedforward_dim: default_feedforward_dim(),
            dropout: default_dropout(),
            layer_norm_eps: default_layer_norm_eps(),
        }
    }
}

impl VaeConfig {
    /// Dimension per attention head.
    pub fn head_dim(&self) -> usize {
        self.hidden_dim / self.num_heads
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 || self.latent_dim == 0 || self.hidden_dim == 0 {
            return Err(Error::Config(format!(
                "input_dim, latent_dim and hidden_dim must be positive (got {}, {}, {})",
                self.input_dim, self.latent_dim, self.hidden_dim
            )));
        }
        if self.num_heads == 0 || self.hidden_dim % self.num_heads != 0 {
            return Err(Error::Config(format!(
                "hidden_dim {} is not divisible by num_heads {}",
                self.hidden_dim, self.num_heads
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::Config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }
}

/// Optimisation settings for one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// KL weight (β). Values above 1 push toward a disentangled latent space.
    #[serde(default = "default_beta")]
    pub beta: f64,

    /// Ceiling for the global L2 norm of the gradients.
    #[serde(default = "default_clip_norm")]
    pub clip_norm: f64,

    /// Reshuffle rows between epochs.
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,

    /// Seed for shuffling and reparameterisation noise.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            beta: default_beta(),
            clip_norm: default_clip_norm(),
            shuffle: default_shuffle(),
            seed: default_seed(),
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be positive".into()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(Error::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.beta >= 0.0) {
            return Err(Error::Config(format!(
                "beta must be non-negative, got {}",
                self.beta
            )));
        }
        if !(self.clip_norm > 0.0) {
            return Err(Error::Config(format!(
                "clip_norm must be positive, got {}",
                self.clip_norm
            )));
        }
        Ok(())
    }
}

/// Synthetic dataset definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Rows to draw.
    #[serde(default = "default_num_samples")]
    pub num_samples: usize,

    /// Per-feature means; its length fixes D.
    #[serde(default = "default_means")]
    pub means: Vec<f64>,

    /// Per-feature standard deviations.
    #[serde(default = "default_stds")]
    pub stds: Vec<f64>,

    /// Pairwise correlation shared by every off-diagonal pair.
    #[serde(default = "default_correlation")]
    pub correlation: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            num_samples: default_num_samples(),
            means: default_means(),
            stds: default_stds(),
            correlation: default_correlation(),
            seed: default_seed(),
        }
    }
}

impl DataConfig {
    /// Feature count (D).
    pub fn num_features(&self) -> usize {
        self.means.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.means.is_empty() {
            return Err(Error::Config("means must not be empty".into()));
        }
        if self.means.len() != self.stds.len() {
            return Err(Error::Config(format!(
                "means has {} entries but stds has {}",
                self.means.len(),
                self.stds.len()
            )));
        }
        if let Some(s) = self.stds.iter().find(|s| !(**s >= 0.0)) {
            return Err(Error::Config(format!(
                "standard deviations must be non-negative, got {s}"
            )));
        }
        if !(-1.0..=1.0).contains(&self.correlation) {
            return Err(Error::Config(format!(
                "correlation must be in [-1, 1], got {}",
                self.correlation
            )));
        }
        Ok(())
    }
}

/// Evaluation-suite settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Gaussian-kernel bandwidth σ for MMD.
    #[serde(default = "default_mmd_bandwidth")]
    pub mmd_bandwidth: f64,

    /// Points along the latent interpolation path, endpoints included.
    #[serde(default = "default_interpolation_steps")]
    pub interpolation_steps: usize,

    /// Dataset rows whose latent means are interpolated.
    #[serde(default = "default_interpolation_pair")]
    pub interpolation_pair: (usize, usize),

    #[serde(default = "default_tsne_perplexity")]
    pub tsne_perplexity: f64,

    #[serde(default = "default_tsne_iterations")]
    pub tsne_iterations: usize,

    /// Barnes-Hut accuracy θ; 0 gives exact gradients.
    #[serde(default = "default_tsne_approx_threshold")]
    pub tsne_approx_threshold: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            mmd_bandwidth: default_mmd_bandwidth(),
            interpolation_steps: default_interpolation_steps(),
            interpolation_pair: default_interpolation_pair(),
            tsne_perplexity: default_tsne_perplexity(),
            tsne_iterations: default_tsne_iterations(),
            tsne_approx_threshold: default_tsne_approx_threshold(),
            seed: default_seed(),
        }
    }
}

impl EvalConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.mmd_bandwidth > 0.0) {
            return Err(Error::Config(format!(
                "mmd_bandwidth must be positive, got {}",
                self.mmd_bandwidth
            )));
        }
        if self.interpolation_steps < 2 {
            return Err(Error::Config(format!(
                "interpolation_steps must be at least 2, got {}",
                self.interpolation_steps
            )));
        }
        if !(self.tsne_perplexity > 0.0) {
            return Err(Error::Config("tsne_perplexity must be positive".into()));
        }
        if !(self.tsne_approx_threshold >= 0.0) {
            return Err(Error::Config(format!(
                "tsne_approx_threshold must be non-negative, got {}",
                self.tsne_approx_threshold
            )));
        }
        Ok(())
    }
}

/// Everything one end-to-end run needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub model: VaeConfig,
    #[serde(default)]
    pub train: TrainConfig,
    #[serde(default)]
    pub eval: EvalConfig,
}

impl PipelineConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Validate each section and their cross-constraints.
    pub fn validate(&self) -> Result<()> {
        self.data.validate()?;
        self.model.validate()?;
        self.train.validate()?;
        self.eval.validate()?;
        if self.data.num_features() != self.model.input_dim {
            return Err(Error::Config(format!(
                "data has {} features but model input_dim is {}",
                self.data.num_features(),
                self.model.input_dim
            )));
        }
        let (a, b) = self.eval.interpolation_pair;
        if a >= self.data.num_samples || b >= self.data.num_samples {
            return Err(Error::Config(format!(
                "interpolation pair ({a}, {b}) outside {} samples",
                self.data.num_samples
            )));
        }
        Ok(())
    }
}

fn default_input_dim() -> usize {
    10
}

fn default_latent_dim() -> usize {
    3
}

fn default_hidden_dim() -> usize {
    128
}

fn default_num_heads() -> usize {
    4
}

fn default_num_layers() -> usize {
    2
}

fn default_feedforward_dim() -> usize {
    512
}

fn default_dropout() -> f32 {
    0.1
}

fn default_layer_norm_eps() -> f64 {
    1e-5
}

fn default_epochs() -> usize {
    100
}

fn default_batch_size() -> usize {
    32
}

fn default_learning_rate() -> f64 {
    1e-3
}

fn default_beta() -> f64 {
    4.0
}

fn default_clip_norm() -> f64 {
    1.0
}

fn default_shuffle() -> bool {
    true
}

fn default_seed() -> u64 {
    42
}

fn default_num_samples() -> usize {
    100
}

fn default_means() -> Vec<f64> {
    (1..=10).map(|i| 5.0 * i as f64).collect()
}

fn default_stds() -> Vec<f64> {
    (1..=10).map(|i| 0.5 + 0.5 * i as f64).collect()
}

fn default_correlation() -> f64 {
    0.8
}

fn default_mmd_bandwidth() -> f64 {
    1.0
}

fn default_interpolation_steps() -> usize {
    10
}

fn default_interpolation_pair() -> (usize, usize) {
    (0, 1)
}

fn default_tsne_perplexity() -> f64 {
    30.0
}

fn default_tsne_iterations() -> usize {
    1000
}

fn default_tsne_approx_threshold() -> f64 {
    0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.model.input_dim, 10);
        assert_eq!(cfg.model.latent_dim, 3);
        assert_eq!(cfg.model.hidden_dim, 128);
        assert_eq!(cfg.model.head_dim(), 32);
        assert_eq!(cfg.data.num_features(), 10);
        assert_eq!(cfg.data.stds.len(), 10);
        assert_eq!(cfg.train.beta, 4.0);
        assert_eq!(cfg.train.clip_norm, 1.0);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let json = r#"{"train": {"epochs": 5}, "model": {"latent_dim": 2}}"#;
        let cfg: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.train.epochs, 5);
        assert_eq!(cfg.train.batch_size, 32);
        assert_eq!(cfg.model.latent_dim, 2);
        assert_eq!(cfg.model.hidden_dim, 128);
        assert_eq!(cfg.data.num_samples, 100);
    }

    #[test]
    fn test_heads_must_divide_hidden() {
        let cfg = VaeConfig {
            num_heads: 3,
            ..VaeConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_feature_count_must_match_model() {
        let mut cfg = PipelineConfig::default();
        cfg.data.means.push(0.0);
        cfg.data.stds.push(1.0);
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_negative_tsne_threshold_rejected() {
        let cfg = EvalConfig {
            tsne_approx_threshold: -0.1,
            ..EvalConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
        assert_eq!(EvalConfig::default().tsne_approx_threshold, 0.5);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{"data": {"num_samples": 64, "seed": 7}}"#).unwrap();
        let cfg = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.data.num_samples, 64);
        assert_eq!(cfg.data.seed, 7);
        assert_eq!(cfg.data.correlation, 0.8);
    }
}
