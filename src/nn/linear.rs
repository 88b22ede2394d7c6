//! Fully connected (linear) layer.
//!
//! Implements the transformation y = xW^T + b.

use super::init::{xavier_uniform, zeros};
use super::module::Module;
use crate::autograd::Tensor;

/// Fully connected layer: y = xW^T + b
///
/// Weight initialization follows Xavier/Glorot (Glorot & Bengio, 2010).
///
/// # Shape
///
/// - Input: `[rows, in_features]`
/// - Output: `[rows, out_features]`
///
/// ```
/// use traffic_gnn::autograd::Tensor;
/// use traffic_gnn::nn::{Linear, Module};
///
/// let layer = Linear::with_seed(64, 3, Some(0));
/// let x = Tensor::zeros(&[10, 64]);
/// assert_eq!(layer.forward(&x).shape(), &[10, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct Linear {
    /// Weight matrix, shape: [out_features, in_features]
    weight: Tensor,
    /// Bias vector, shape: [out_features]
    bias: Tensor,
    in_features: usize,
    out_features: usize,
}

impl Linear {
    #[must_use]
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self::with_seed(in_features, out_features, None)
    }

    /// Create a Linear layer with a specific random seed.
    #[must_use]
    pub fn with_seed(in_features: usize, out_features: usize, seed: Option<u64>) -> Self {
        let weight = xavier_uniform(
            &[out_features, in_features],
            in_features,
            out_features,
            seed,
        )
        .requires_grad();
        let bias = zeros(&[out_features]).requires_grad();

        Self {
            weight,
            bias,
            in_features,
            out_features,
        }
    }

    #[must_use]
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    #[must_use]
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    #[must_use]
    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    #[must_use]
    pub fn bias(&self) -> &Tensor {
        &self.bias
    }
}

impl Module for Linear {
    fn forward(&self, input: &Tensor) -> Tensor {
        assert_eq!(
            input.shape()[1],
            self.in_features,
            "Linear: expected {} input features, got {}",
            self.in_features,
            input.shape()[1]
        );
        input
            .matmul(&self.weight.transpose())
            .broadcast_add(&self.bias)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weight, &self.bias]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weight, &mut self.bias]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{clear_graph, get_grad};

    #[test]
    fn test_forward_known_weights() {
        let mut layer = Linear::with_seed(2, 2, Some(1));
        layer.weight.data_mut().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        layer.bias.data_mut().copy_from_slice(&[0.5, -0.5]);

        let x = Tensor::new(&[1.0, 1.0, 2.0, 0.0], &[2, 2]);
        let y = layer.forward(&x);
        // rows: [1+2+0.5, 3+4-0.5], [2+0.5, 6-0.5]
        assert_eq!(y.data(), &[3.5, 6.5, 2.5, 5.5]);
    }

    #[test]
    fn test_parameters_receive_gradients() {
        clear_graph();
        let layer = Linear::with_seed(3, 2, Some(3));
        let x = Tensor::new(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        layer.forward(&x).sum().backward();

        let gw = get_grad(layer.weight().id()).expect("weight grad");
        // d/dW sum(xWᵀ) = column sums of x, repeated per output row
        assert_eq!(gw.data(), &[5.0, 7.0, 9.0, 5.0, 7.0, 9.0]);
        let gb = get_grad(layer.bias().id()).expect("bias grad");
        assert_eq!(gb.data(), &[2.0, 2.0]);
    }

    #[test]
    fn test_num_parameters() {
        let layer = Linear::new(64, 3);
        assert_eq!(layer.num_parameters(), 64 * 3 + 3);
    }
}
