//! Transformer layer types for the VAE.
//!
//! - [`EncoderLayer`] — post-norm self-attention + feed-forward
//! - [`DecoderLayer`] — post-norm self-attention + attention onto a memory
//!   tensor + feed-forward
//!
//! Both follow the post-norm arrangement `x = norm(x + dropout(sublayer(x)))`
//! with a ReLU feed-forward of width `feedforward_dim`.

use candle_core::{Module, Tensor};
use candle_nn::{Dropout, Linear, VarBuilder};

use super::attention::{xavier_linear, LayerNorm, MultiHeadAttention};
use crate::config::VaeConfig;
use crate::Result;

// ---------------------------------------------------------------------------
// Feed-forward
// ---------------------------------------------------------------------------

/// Position-wise `Linear → ReLU → Dropout → Linear`.
#[derive(Debug, Clone)]
pub struct FeedForward {
    linear1: Linear,
    linear2: Linear,
    dropout: Dropout,
}

impl FeedForward {
    pub fn new(cfg: &VaeConfig, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            linear1: xavier_linear(cfg.hidden_dim, cfg.feedforward_dim, vb.pp("linear1"))?,
            linear2: xavier_linear(cfg.feedforward_dim, cfg.hidden_dim, vb.pp("linear2"))?,
            dropout: Dropout::new(cfg.dropout),
        })
    }

    pub fn forward(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let h = self.linear1.forward(xs)?.relu()?;
        let h = self.dropout.forward(&h, train)?;
        Ok(self.linear2.forward(&h)?)
    }
}

// ---------------------------------------------------------------------------
// Encoder layer
// ---------------------------------------------------------------------------

/// Self-attention encoder layer.
#[derive(Debug, Clone)]
pub struct EncoderLayer {
    self_attn: MultiHeadAttention,
    norm1: LayerNorm,
    feed_forward: FeedForward,
    norm2: LayerNorm,
    dropout: Dropout,
}

impl EncoderLayer {
    pub fn new(cfg: &VaeConfig, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            self_attn: MultiHeadAttention::new(
                cfg.hidden_dim,
                cfg.num_heads,
                cfg.dropout,
                vb.pp("self_attn"),
            )?,
            norm1: LayerNorm::new(cfg.hidden_dim, cfg.layer_norm_eps, vb.pp("norm1"))?,
            feed_forward: FeedForward::new(cfg, vb.pp("feed_forward"))?,
            norm2: LayerNorm::new(cfg.hidden_dim, cfg.layer_norm_eps, vb.pp("norm2"))?,
            dropout: Dropout::new(cfg.dropout),
        })
    }

    /// `hidden_states`: `[B, S, hidden_dim]` → same shape.
    pub fn forward(&self, hidden_states: &Tensor, train: bool) -> Result<Tensor> {
        let attn = self
            .self_attn
            .forward(hidden_states, hidden_states, train)?;
        let h = (hidden_states + self.dropout.forward(&attn, train)?)?;
        let h = self.norm1.forward(&h)?;

        let ff = self.feed_forward.forward(&h, train)?;
        let h = (&h + self.dropout.forward(&ff, train)?)?;
        Ok(self.norm2.forward(&h)?)
    }
}

// ---------------------------------------------------------------------------
// Decoder layer
// ---------------------------------------------------------------------------

/// Decoder layer: self-attention, attention onto `memory`, feed-forward.
///
/// The VAE passes the projected latent as both target and memory, so the
/// second attention is the target attending to its own starting point.
#[derive(Debug, Clone)]
pub struct DecoderLayer {
    self_attn: MultiHeadAttention,
    norm1: LayerNorm,
    memory_attn: MultiHeadAttention,
    norm2: LayerNorm,
    feed_forward: FeedForward,
    norm3: LayerNorm,
    dropout: Dropout,
}

impl DecoderLayer {
    pub fn new(cfg: &VaeConfig, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            self_attn: MultiHeadAttention::new(
                cfg.hidden_dim,
                cfg.num_heads,
                cfg.dropout,
                vb.pp("self_attn"),
            )?,
            norm1: LayerNorm::new(cfg.hidden_dim, cfg.layer_norm_eps, vb.pp("norm1"))?,
            memory_attn: MultiHeadAttention::new(
                cfg.hidden_dim,
                cfg.num_heads,
                cfg.dropout,
                vb.pp("memory_attn"),
            )?,
            norm2: LayerNorm::new(cfg.hidden_dim, cfg.layer_norm_eps, vb.pp("norm2"))?,
            feed_forward: FeedForward::new(cfg, vb.pp("feed_forward"))?,
            norm3: LayerNorm::new(cfg.hidden_dim, cfg.layer_norm_eps, vb.pp("norm3"))?,
            dropout: Dropout::new(cfg.dropout),
        })
    }

    /// Forward pass.
    ///
    /// - `target`: `[B, S, hidden_dim]`
    /// - `memory`: `[B, S_mem, hidden_dim]`
    pub fn forward(&self, target: &Tensor, memory: &Tensor, train: bool) -> Result<Tensor> {
        let attn = self.self_attn.forward(target, target, train)?;
        let h = (target + self.dropout.forward(&attn, train)?)?;
        let h = self.norm1.forward(&h)?;

        let attn = self.memory_attn.forward(&h, memory, train)?;
        let h = (&h + self.dropout.forward(&attn, train)?)?;
        let h = self.norm2.forward(&h)?;

        let ff = self.feed_forward.forward(&h, train)?;
        let h = (&h + self.dropout.forward(&ff, train)?)?;
        Ok(self.norm3.forward(&h)?)
    }
}
