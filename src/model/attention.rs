//! Attention building blocks for the transformer VAE.
//!
//! - [`MultiHeadAttention`] — scaled dot-product attention, used both as
//!   self-attention (query = key/value) and as the decoder's attention onto
//!   its own memory
//! - [`LayerNorm`] — layer normalisation written with primitive tensor ops
//!   so gradients flow through it during training
//! - [`xavier_linear`] — Glorot-uniform weight, zero bias

use candle_core::{Module, Tensor, D};
use candle_nn::{Dropout, Init, Linear, VarBuilder};

use crate::Result;

/// Linear layer with Xavier/Glorot uniform weights and zero bias.
///
/// `bound = sqrt(6 / (fan_in + fan_out))`
pub fn xavier_linear(in_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Linear> {
    let bound = (6.0 / (in_dim + out_dim) as f64).sqrt();
    let weight = vb.get_with_hints(
        (out_dim, in_dim),
        "weight",
        Init::Uniform {
            lo: -bound,
            up: bound,
        },
    )?;
    let bias = vb.get_with_hints(out_dim, "bias", Init::Const(0.0))?;
    Ok(Linear::new(weight, Some(bias)))
}

/// Layer normalisation over the last dimension with learnable affine terms.
///
/// `candle_nn::LayerNorm` dispatches to a fused kernel without a backward
/// pass; this version is composed of differentiable ops.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    weight: Tensor,
    bias: Tensor,
    eps: f64,
}

impl LayerNorm {
    pub fn new(dim: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        let weight = vb.get_with_hints(dim, "weight", Init::Const(1.0))?;
        let bias = vb.get_with_hints(dim, "bias", Init::Const(0.0))?;
        Ok(Self { weight, bias, eps })
    }
}

impl Module for LayerNorm {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mean = xs.mean_keepdim(D::Minus1)?;
        let centered = xs.broadcast_sub(&mean)?;
        let var = centered.sqr()?.mean_keepdim(D::Minus1)?;
        let normed = centered.broadcast_div(&(var + self.eps)?.sqrt()?)?;
        normed.broadcast_mul(&self.weight)?.broadcast_add(&self.bias)
    }
}

/// Standard multi-head scaled dot-product attention.
#[derive(Debug, Clone)]
pub struct MultiHeadAttention {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    out_proj: Linear,
    dropout: Dropout,
    num_heads: usize,
    head_dim: usize,
}

impl MultiHeadAttention {
    pub fn new(dim: usize, num_heads: usize, dropout: f32, vb: VarBuilder) -> Result<Self> {
        let head_dim = dim / num_heads;
        Ok(Self {
            q_proj: xavier_linear(dim, dim, vb.pp("q_proj"))?,
            k_proj: xavier_linear(dim, dim, vb.pp("k_proj"))?,
            v_proj: xavier_linear(dim, dim, vb.pp("v_proj"))?,
            out_proj: xavier_linear(dim, dim, vb.pp("out_proj"))?,
            dropout: Dropout::new(dropout),
            num_heads,
            head_dim,
        })
    }

    /// Forward pass.
    ///
    /// - `query`: `[B, S_q, dim]`
    /// - `context`: `[B, S_kv, dim]` — keys and values
    ///
    /// Returns `[B, S_q, dim]`.
    pub fn forward(&self, query: &Tensor, context: &Tensor, train: bool) -> Result<Tensor> {
        let (batch, seq_q, _) = query.dims3()?;
        let (_, seq_kv, _) = context.dims3()?;

        // [B, S, dim] → [B, H, S, head_dim]
        let q = self
            .q_proj
            .forward(query)?
            .reshape((batch, seq_q, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?;
        let k = self
            .k_proj
            .forward(context)?
            .reshape((batch, seq_kv, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?;
        let v = self
            .v_proj
            .forward(context)?
            .reshape((batch, seq_kv, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?;

        let scale = (self.head_dim as f64).sqrt();
        let scores = (q.matmul(&k.t()?.contiguous()?)? / scale)?; // [B, H, S_q, S_kv]
        let weights = candle_nn::ops::softmax(&scores, D::Minus1)?;
        let weights = self.dropout.forward(&weights, train)?;
        let out = weights.matmul(&v)?; // [B, H, S_q, head_dim]

        let out = out
            .transpose(1, 2)?
            .reshape((batch, seq_q, self.num_heads * self.head_dim))?;
        Ok(self.out_proj.forward(&out)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn make_vb(device: &Device) -> (VarMap, VarBuilder<'static>) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        (varmap, vb)
    }

    #[test]
    fn self_attention_output_shape() {
        let device = Device::Cpu;
        let (_varmap, vb) = make_vb(&device);
        let attn = MultiHeadAttention::new(32, 4, 0.0, vb).unwrap();
        let x = Tensor::randn(0f32, 1.0, (5, 1, 32), &device).unwrap();
        let out = attn.forward(&x, &x, false).unwrap();
        assert_eq!(out.dims(), &[5, 1, 32]);
    }

    #[test]
    fn attention_over_longer_context() {
        let device = Device::Cpu;
        let (_varmap, vb) = make_vb(&device);
        let attn = MultiHeadAttention::new(16, 2, 0.0, vb).unwrap();
        let q = Tensor::randn(0f32, 1.0, (2, 3, 16), &device).unwrap();
        let ctx = Tensor::randn(0f32, 1.0, (2, 7, 16), &device).unwrap();
        let out = attn.forward(&q, &ctx, false).unwrap();
        assert_eq!(out.dims(), &[2, 3, 16]);
    }

    #[test]
    fn xavier_weights_within_bound_and_zero_bias() {
        let device = Device::Cpu;
        let (varmap, vb) = make_vb(&device);
        let linear = xavier_linear(10, 128, vb.pp("proj")).unwrap();
        let bound = (6.0f32 / 138.0).sqrt();
        let w_max: f32 = linear
            .weight()
            .abs()
            .unwrap()
            .flatten_all()
            .unwrap()
            .max(0)
            .unwrap()
            .to_scalar()
            .unwrap();
        assert!(w_max <= bound, "weight {w_max} exceeds bound {bound}");
        let b_sum: f32 = linear
            .bias()
            .unwrap()
            .abs()
            .unwrap()
            .sum_all()
            .unwrap()
            .to_scalar()
            .unwrap();
        assert_eq!(b_sum, 0.0);
        assert_eq!(varmap.all_vars().len(), 2);
    }

    #[test]
    fn layer_norm_zero_mean_unit_variance() {
        let device = Device::Cpu;
        let (_varmap, vb) = make_vb(&device);
        let norm = LayerNorm::new(8, 1e-5, vb.pp("norm")).unwrap();
        let x = Tensor::randn(3f32, 2.0, (4, 8), &device).unwrap();
        let y = norm.forward(&x).unwrap();
        let means: Vec<f32> = y.mean(D::Minus1).unwrap().to_vec1().unwrap();
        for m in means {
            assert!(m.abs() < 1e-4, "mean {m}");
        }
        let vars: Vec<f32> = y.sqr().unwrap().mean(D::Minus1).unwrap().to_vec1().unwrap();
        for v in vars {
            assert!((v - 1.0).abs() < 1e-3, "variance {v}");
        }
    }

    #[test]
    fn layer_norm_propagates_gradients() {
        let device = Device::Cpu;
        let (varmap, vb) = make_vb(&device);
        let norm = LayerNorm::new(4, 1e-5, vb.pp("norm")).unwrap();
        let x = candle_core::Var::randn(0f32, 1.0, (2, 4), &device).unwrap();
        let y = norm.forward(x.as_tensor()).unwrap();
        let loss = (y.sum_all().unwrap() + x.as_tensor().sqr().unwrap().sum_all().unwrap())
            .unwrap();
        let grads = loss.backward().unwrap();
        assert!(grads.get(x.as_tensor()).is_some());
        for var in varmap.all_vars() {
            assert!(grads.get(var.as_tensor()).is_some());
        }
    }
}
