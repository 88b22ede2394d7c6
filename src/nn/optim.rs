//! Optimizers.
//!
//! # References
//!
//! - Kingma, D. P., & Ba, J. (2015). Adam: A method for stochastic
//!   optimization. ICLR.

use crate::autograd::{clear_grad, get_grad, Tensor, TensorId};

/// Updates parameters in place from the gradients of the last backward pass.
pub trait Optimizer {
    /// Perform a single optimization step.
    ///
    /// `params` must be passed in the same order on every call.
    fn step(&mut self, params: &mut [&mut Tensor]);

    /// Zero all parameter gradients.
    fn zero_grad(&mut self);

    fn lr(&self) -> f32;

    fn set_lr(&mut self, lr: f32);
}

/// Adam optimizer (Kingma & Ba, 2015).
///
/// ```text
/// m_t = β₁ m_{t-1} + (1-β₁) g
/// v_t = β₂ v_{t-1} + (1-β₂) g²
/// θ  -= lr · m̂_t / (√v̂_t + ε)
/// ```
#[derive(Debug)]
pub struct Adam {
    param_ids: Vec<TensorId>,
    lr: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    /// First moment estimates
    m: Vec<Vec<f32>>,
    /// Second moment estimates
    v: Vec<Vec<f32>>,
    /// Timestep for bias correction
    t: usize,
}

impl Adam {
    /// Create an Adam optimizer over `params`.
    ///
    /// Default: β₁=0.9, β₂=0.999, ε=1e-8
    #[must_use]
    pub fn new(params: &[&Tensor], lr: f32) -> Self {
        Self {
            param_ids: params.iter().map(|p| p.id()).collect(),
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            m: params.iter().map(|p| vec![0.0; p.numel()]).collect(),
            v: params.iter().map(|p| vec![0.0; p.numel()]).collect(),
            t: 0,
        }
    }

    /// Number of steps taken so far.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.t
    }

    fn update_param(&mut self, param: &mut Tensor, idx: usize) {
        let Some(grad) = get_grad(param.id()) else {
            return;
        };

        let bias_correction1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t as i32);

        let m = &mut self.m[idx];
        let v = &mut self.v[idx];
        let param_data = param.data_mut();

        for (i, &g) in grad.data().iter().enumerate() {
            m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
            v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;

            let m_hat = m[i] / bias_correction1;
            let v_hat = v[i] / bias_correction2;

            param_data[i] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
        }
    }
}

impl Optimizer for Adam {
    /// # Panics
    ///
    /// Panics if `params` differ in count from the construction list.
    fn step(&mut self, params: &mut [&mut Tensor]) {
        assert_eq!(
            params.len(),
            self.m.len(),
            "Adam was built for {} parameters, got {}",
            self.m.len(),
            params.len()
        );
        self.t += 1;
        for (idx, param) in params.iter_mut().enumerate() {
            self.update_param(param, idx);
        }
    }

    fn zero_grad(&mut self) {
        for &id in &self.param_ids {
            clear_grad(id);
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
