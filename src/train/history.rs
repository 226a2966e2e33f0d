//! Per-epoch loss trace.
//!
//! Written as tab-separated text:
//!
//! ```text
//! Epoch	Recon Loss	KL Loss
//! 0	12.3456	0.7890
//! ```

use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;

use crate::Result;

/// Header line of the loss trace file.
pub const LOSS_HEADER: &str = "Epoch\tRecon Loss\tKL Loss";

/// Mean losses of one epoch, each divided by the number of examples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochLoss {
    pub epoch: usize,
    pub reconstruction: f64,
    pub kl: f64,
}

/// Append-only list of [`EpochLoss`] entries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LossHistory {
    entries: Vec<EpochLoss>,
}

impl LossHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: EpochLoss) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[EpochLoss] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&EpochLoss> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&EpochLoss> {
        self.entries.last()
    }

    /// Render the trace with four decimals per value.
    pub fn to_tsv(&self) -> String {
        let mut out = String::with_capacity(32 * (self.entries.len() + 1));
        out.push_str(LOSS_HEADER);
        out.push('\n');
        for e in &self.entries {
            let _ = writeln!(out, "{}\t{:.4}\t{:.4}", e.epoch, e.reconstruction, e.kl);
        }
        out
    }

    pub fn write_tsv(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_tsv())?;
        Ok(())
    }
}
