//! Base trait for neural network layers.

use crate::autograd::Tensor;

/// A layer with learnable parameters and a train/eval mode.
///
/// Parameters are returned in a stable order; optimizers and checkpoint
/// code rely on that order matching between calls.
pub trait Module {
    /// Forward pass over a 2D input `[rows, features]`.
    fn forward(&self, input: &Tensor) -> Tensor;

    fn parameters(&self) -> Vec<&Tensor> {
        Vec::new()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        Vec::new()
    }

    /// Switch to training mode (dropout active).
    fn train(&mut self) {}

    /// Switch to evaluation mode.
    fn eval(&mut self) {}

    fn training(&self) -> bool {
        false
    }

    /// Total number of learnable scalars.
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.numel()).sum()
    }
}
