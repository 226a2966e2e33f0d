//! Transformer β-VAE for correlated tabular data, in pure Rust.
//!
//! A candle-based variational autoencoder whose encoder and decoder are
//! stacks of multi-head attention blocks, trained on synthetic correlated
//! samples and checked by an evaluation suite that measures how much of the
//! input's statistical structure survives reconstruction.
//!
//! ## Architecture
//!
//! ```text
//! DataConfig → SyntheticGenerator ─→ [N, D] ─→ MinMaxScaler ─→ [N, D] in [0, 1]
//!                                                   ↓
//!                         TransformerVae (encode → reparameterize → decode)
//!                                                   ↓
//!                         Trainer (recon + β·KL, clip, AdamW) → LossHistory
//!                                                   ↓
//!            eval: correlation MAE, Wasserstein / MMD, PCA / t-SNE, interpolation
//! ```
//!
//! ## Modules
//!
//! - [`data`] — correlated Gaussian generator and min-max scaler
//! - [`model`] — attention, encoder/decoder layers, reparameterization noise
//! - [`vae`] — the transformer VAE itself
//! - [`loss`] — reconstruction and KL terms of the β-VAE objective
//! - [`train`] — fixed-budget training loop and loss trace
//! - [`checkpoint`] — safetensors weights plus JSON architecture sidecar
//! - [`eval`] — evaluation suite
//! - [`pipeline`] — end-to-end run writing every artefact

pub mod checkpoint;
pub mod config;
pub mod data;
pub mod eval;
pub mod loss;
pub mod model;
pub mod pipeline;
pub mod train;
pub mod vae;

mod error;

pub use error::{Error, Result};
