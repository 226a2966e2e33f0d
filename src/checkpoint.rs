//! Model checkpoints.
//!
//! A checkpoint is a directory with two files:
//!
//! - `model.safetensors` — every variable of the training `VarMap`
//! - `config.json` — the [`VaeConfig`] the weights were built for

use std::path::Path;

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};

use crate::config::VaeConfig;
use crate::vae::TransformerVae;
use crate::Result;

pub const WEIGHTS_FILE: &str = "model.safetensors";
pub const CONFIG_FILE: &str = "config.json";

/// Write weights and architecture into `dir`, creating it if needed.
pub fn save(varmap: &VarMap, cfg: &VaeConfig, dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    varmap.save(dir.join(WEIGHTS_FILE))?;
    std::fs::write(dir.join(CONFIG_FILE), serde_json::to_string_pretty(cfg)?)?;
    tracing::info!("Saved checkpoint to {:?}", dir);
    Ok(())
}

/// Rebuild a frozen model from a checkpoint directory.
pub fn load(dir: impl AsRef<Path>, device: &Device) -> Result<TransformerVae> {
    let dir = dir.as_ref();
    let text = std::fs::read_to_string(dir.join(CONFIG_FILE))?;
    let cfg: VaeConfig = serde_json::from_str(&text)?;
    tracing::info!("Loading checkpoint weights from {:?}", dir.join(WEIGHTS_FILE));
    let tensors = candle_core::safetensors::load(dir.join(WEIGHTS_FILE), device)?;
    let vb = VarBuilder::from_tensors(tensors, DType::F32, device);
    TransformerVae::new(&cfg, vb)
}
