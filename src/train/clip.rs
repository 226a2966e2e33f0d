//! Global gradient-norm clipping over a candle `GradStore`.

use candle_core::backprop::GradStore;
use candle_core::{DType, Var};

use crate::Result;

/// Rescale every gradient so their joint L2 norm is at most `max_norm`.
///
/// ```text
/// norm  = sqrt(Σ_v ‖∇v‖²)
/// coef  = max_norm / (norm + 1e-6)
/// ∇v   *= coef        when coef < 1
/// ```
///
/// Returns the norm measured before clipping.
pub fn clip_grad_norm(vars: &[Var], grads: &mut GradStore, max_norm: f64) -> Result<f64> {
    let mut total_sq = 0f64;
    for var in vars {
        if let Some(grad) = grads.get(var.as_tensor()) {
            total_sq += grad
                .sqr()?
                .sum_all()?
                .to_dtype(DType::F64)?
                .to_scalar::<f64>()?;
        }
    }
    let norm = total_sq.sqrt();

    let coef = max_norm / (norm + 1e-6);
    if coef < 1.0 {
        for var in vars {
            if let Some(grad) = grads.remove(var.as_tensor()) {
                grads.insert(var.as_tensor(), (grad * coef)?);
            }
        }
    }
    Ok(norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn grad_norm(vars: &[Var], grads: &GradStore) -> f64 {
        vars.iter()
            .filter_map(|v| grads.get(v.as_tensor()))
            .map(|g| g.sqr().unwrap().sum_all().unwrap().to_scalar::<f32>().unwrap() as f64)
            .sum::<f64>()
            .sqrt()
    }

    #[test]
    fn clips_large_gradients_to_ceiling() {
        let dev = Device::Cpu;
        let a = Var::new(&[1f32, 2.0, 3.0], &dev).unwrap();
        let b = Var::new(&[4f32], &dev).unwrap();
        // d/da = 10, d/db = 20
        let loss = ((a.as_tensor() * 10.0).unwrap().sum_all().unwrap()
            + (b.as_tensor() * 20.0).unwrap().sum_all().unwrap())
        .unwrap();
        let mut grads = loss.backward().unwrap();
        let vars = vec![a.clone(), b.clone()];

        let before = clip_grad_norm(&vars, &mut grads, 1.0).unwrap();
        assert!((before - (3.0f64 * 100.0 + 400.0).sqrt()).abs() < 1e-3);
        let after = grad_norm(&vars, &grads);
        assert!((after - 1.0).abs() < 1e-4, "clipped norm {after}");

        // Direction is preserved.
        let ga: Vec<f32> = grads.get(a.as_tensor()).unwrap().to_vec1().unwrap();
        let gb: Vec<f32> = grads.get(b.as_tensor()).unwrap().to_vec1().unwrap();
        assert!((gb[0] / ga[0] - 2.0).abs() < 1e-4);
    }

    #[test]
    fn leaves_small_gradients_alone() {
        let dev = Device::Cpu;
        let a = Var::new(&[1f32, 2.0], &dev).unwrap();
        let loss = (a.as_tensor() * 0.1).unwrap().sum_all().unwrap();
        let mut grads = loss.backward().unwrap();
        let vars = vec![a.clone()];
        let norm = clip_grad_norm(&vars, &mut grads, 1.0).unwrap();
        assert!(norm < 1.0);
        let g: Vec<f32> = grads.get(a.as_tensor()).unwrap().to_vec1().unwrap();
        assert!((g[0] - 0.1).abs() < 1e-6);
        assert!((g[1] - 0.1).abs() < 1e-6);
    }
}
