//! Weight initialization functions.
//!
//! # References
//!
//! - Glorot, X., & Bengio, Y. (2010). Understanding the difficulty of training
//!   deep feedforward neural networks. AISTATS.

use crate::autograd::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Xavier uniform initialization (Glorot & Bengio, 2010).
///
/// Samples from U(-a, a) where a = sqrt(6 / (`fan_in` + `fan_out`)).
///
/// ```
/// use traffic_gnn::nn::init::xavier_uniform;
///
/// let w = xavier_uniform(&[64, 6], 6, 64, Some(42));
/// let bound = (6.0_f32 / 70.0).sqrt();
/// assert!(w.data().iter().all(|v| v.abs() <= bound));
/// ```
#[must_use]
pub fn xavier_uniform(shape: &[usize], fan_in: usize, fan_out: usize, seed: Option<u64>) -> Tensor {
    let a = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
    uniform(shape, -a, a, seed)
}

/// Uniform distribution initialization: U(low, high).
#[must_use]
pub fn uniform(shape: &[usize], low: f32, high: f32, seed: Option<u64>) -> Tensor {
    let numel: usize = shape.iter().product();
    let mut rng = rng_from(seed);
    let data: Vec<f32> = (0..numel).map(|_| rng.gen_range(low..high)).collect();
    Tensor::from_vec(data, shape)
}

/// Normal distribution initialization: N(mean, std).
#[must_use]
pub fn normal(shape: &[usize], mean: f32, std: f32, seed: Option<u64>) -> Tensor {
    let numel: usize = shape.iter().product();
    let mut rng = rng_from(seed);

    // Box-Muller transform
    let data: Vec<f32> = (0..numel)
        .map(|_| {
            let u1: f32 = rng.gen_range(0.0001_f32..1.0_f32);
            let u2: f32 = rng.gen_range(0.0_f32..1.0_f32);
            let z = (-2.0_f32 * u1.ln()).sqrt() * (2.0_f32 * std::f32::consts::PI * u2).cos();
            mean + std * z
        })
        .collect();

    Tensor::from_vec(data, shape)
}

#[must_use]
pub fn zeros(shape: &[usize]) -> Tensor {
    Tensor::zeros(shape)
}

pub(crate) fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xavier_uniform_bounds() {
        let t = xavier_uniform(&[100, 50], 50, 100, Some(42));
        let a = (6.0_f32 / 150.0).sqrt();
        assert_eq!(t.shape(), &[100, 50]);
        assert!(t.data().iter().all(|&v| v >= -a && v < a));
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = xavier_uniform(&[8, 8], 8, 8, Some(7));
        let b = xavier_uniform(&[8, 8], 8, 8, Some(7));
        let c = xavier_uniform(&[8, 8], 8, 8, Some(8));
        assert_eq!(a.data(), b.data());
        assert_ne!(a.data(), c.data());
    }

    #[test]
    fn test_normal_statistics() {
        let t = normal(&[10_000], 0.0, 1.0, Some(1));
        let n = t.numel() as f32;
        let mean: f32 = t.data().iter().sum::<f32>() / n;
        let var: f32 = t.data().iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.1, "var {var}");
    }

    #[test]
    fn test_zeros() {
        let t = zeros(&[3]);
        assert_eq!(t.data(), &[0.0, 0.0, 0.0]);
    }
}
