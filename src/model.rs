//! Building blocks of the transformer VAE.
//!
//! ## Components
//!
//! - [`attention`] — multi-head attention, differentiable layer norm, Xavier-initialised linears
//! - [`layers`] — post-norm encoder and decoder blocks
//! - [`noise`] — reparameterization noise sources

pub mod attention;
pub mod layers;
pub mod noise;
