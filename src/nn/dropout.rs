//! Dropout regularization.
//!
//! # Reference
//!
//! - Srivastava, N., et al. (2014). Dropout: A simple way to prevent neural
//!   networks from overfitting. JMLR.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::Rng;

use super::init::rng_from;
use super::module::Module;
use crate::autograd::Tensor;

/// Dropout regularization layer.
///
/// During training, zeroes each element with probability `p` and scales
/// the survivors by `1/(1-p)` (inverted dropout). During evaluation the
/// input passes through unchanged.
///
/// The mask is applied through a differentiable multiply, so gradients
/// only reach the surviving elements.
pub struct Dropout {
    p: f32,
    training: bool,
    rng: Mutex<StdRng>,
}

impl Dropout {
    /// # Panics
    ///
    /// Panics if `p` is not in [0, 1).
    #[must_use]
    pub fn new(p: f32) -> Self {
        Self::with_seed(p, None)
    }

    /// Create a Dropout layer whose masks are reproducible from `seed`.
    ///
    /// # Panics
    ///
    /// Panics if `p` is not in [0, 1).
    #[must_use]
    pub fn with_seed(p: f32, seed: Option<u64>) -> Self {
        assert!(
            (0.0..1.0).contains(&p),
            "Dropout probability must be in [0, 1), got {p}",
        );

        Self {
            p,
            training: true,
            rng: Mutex::new(rng_from(seed)),
        }
    }

    #[must_use]
    pub fn probability(&self) -> f32 {
        self.p
    }
}

impl Module for Dropout {
    fn forward(&self, input: &Tensor) -> Tensor {
        if !self.training || self.p == 0.0 {
            return input.clone();
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let scale = 1.0 / (1.0 - self.p);
        let mask: Vec<f32> = (0..input.numel())
            .map(|_| if rng.gen::<f32>() < self.p { 0.0 } else { scale })
            .collect();

        input.mul(&Tensor::from_vec(mask, input.shape()))
    }

    fn train(&mut self) {
        self.training = true;
    }

    fn eval(&mut self) {
        self.training = false;
    }

    fn training(&self) -> bool {
        self.training
    }
}

impl std::fmt::Debug for Dropout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dropout")
            .field("p", &self.p)
            .field("training", &self.training)
            .finish_non_exhaustive()
    }
}
