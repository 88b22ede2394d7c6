//! Gradient function trait and the backward rules of the dense operations.
//!
//! Each differentiable operation implements `GradFn` to define how
//! gradients flow backward through it. Graph message-passing kernels live
//! next to their layers in [`crate::nn::gnn`].

use super::ops::matmul_kernel;
use super::tensor::Tensor;

/// Trait for functions that compute gradients during the backward pass.
///
/// For element-wise addition z = x + y:
/// - ∂z/∂x = 1
/// - ∂z/∂y = 1
///
/// So `backward(grad_output)` returns [`grad_output`, `grad_output`].
pub trait GradFn: Send + Sync {
    /// Compute gradients with respect to inputs.
    ///
    /// The returned vector holds one gradient per input, in the order the
    /// inputs were recorded during the forward pass.
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor>;

    /// Human-readable name for debugging.
    fn name(&self) -> &'static str;
}

// ============================================================================
// Element-wise Operations
// ============================================================================

/// z = x + y
pub(crate) struct AddBackward;

impl GradFn for AddBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![grad_output.detach(), grad_output.detach()]
    }

    fn name(&self) -> &'static str {
        "AddBackward"
    }
}

/// z = x * y
pub(crate) struct MulBackward {
    pub(crate) x: Tensor,
    pub(crate) y: Tensor,
}

impl GradFn for MulBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x*y)/∂x = y, ∂(x*y)/∂y = x
        let g = grad_output.data();
        let grad_x: Vec<f32> = g.iter().zip(self.y.data()).map(|(&g, &y)| g * y).collect();
        let grad_y: Vec<f32> = g.iter().zip(self.x.data()).map(|(&g, &x)| g * x).collect();
        vec![
            Tensor::from_vec(grad_x, self.x.shape()),
            Tensor::from_vec(grad_y, self.y.shape()),
        ]
    }

    fn name(&self) -> &'static str {
        "MulBackward"
    }
}

/// z = x * c
pub(crate) struct MulScalarBackward {
    pub(crate) scalar: f32,
}

impl GradFn for MulScalarBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let data = grad_output.data().iter().map(|&g| g * self.scalar).collect();
        vec![Tensor::from_vec(data, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "MulScalarBackward"
    }
}

// ============================================================================
// Reductions
// ============================================================================

/// z = sum(x)
pub(crate) struct SumBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for SumBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let len: usize = self.input_shape.iter().product();
        vec![Tensor::from_vec(
            vec![grad_output.item(); len],
            &self.input_shape,
        )]
    }

    fn name(&self) -> &'static str {
        "SumBackward"
    }
}

/// z = mean(x)
pub(crate) struct MeanBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for MeanBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let len: usize = self.input_shape.iter().product();
        let g = grad_output.item() / len as f32;
        vec![Tensor::from_vec(vec![g; len], &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "MeanBackward"
    }
}

// ============================================================================
// Activations
// ============================================================================

/// z = max(0, x)
pub(crate) struct ReluBackward {
    pub(crate) x: Tensor,
}

impl GradFn for ReluBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let data = grad_output
            .data()
            .iter()
            .zip(self.x.data())
            .map(|(&g, &x)| if x > 0.0 { g } else { 0.0 })
            .collect();
        vec![Tensor::from_vec(data, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "ReluBackward"
    }
}

// ============================================================================
// Linear Algebra
// ============================================================================

/// z = x @ y
pub(crate) struct MatmulBackward {
    pub(crate) x: Tensor,
    pub(crate) y: Tensor,
}

impl GradFn for MatmulBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂L/∂x = G @ yᵀ, ∂L/∂y = xᵀ @ G
        let (m, k) = (self.x.shape()[0], self.x.shape()[1]);
        let n = self.y.shape()[1];

        let y_t = transpose_data(self.y.data(), k, n);
        let grad_x = matmul_kernel(grad_output.data(), &y_t, m, n, k);

        let x_t = transpose_data(self.x.data(), m, k);
        let grad_y = matmul_kernel(&x_t, grad_output.data(), k, m, n);

        vec![
            Tensor::from_vec(grad_x, &[m, k]),
            Tensor::from_vec(grad_y, &[k, n]),
        ]
    }

    fn name(&self) -> &'static str {
        "MatmulBackward"
    }
}

/// z = xᵀ
pub(crate) struct TransposeBackward;

impl GradFn for TransposeBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let (rows, cols) = (grad_output.shape()[0], grad_output.shape()[1]);
        let data = transpose_data(grad_output.data(), rows, cols);
        vec![Tensor::from_vec(data, &[cols, rows])]
    }

    fn name(&self) -> &'static str {
        "TransposeBackward"
    }
}

/// z = x + b, with `b` broadcast over rows.
pub(crate) struct BroadcastAddBackward {
    pub(crate) cols: usize,
}

impl GradFn for BroadcastAddBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let mut grad_b = vec![0.0; self.cols];
        for row in grad_output.data().chunks(self.cols) {
            for (acc, &g) in grad_b.iter_mut().zip(row) {
                *acc += g;
            }
        }
        vec![
            grad_output.detach(),
            Tensor::from_vec(grad_b, &[self.cols]),
        ]
    }

    fn name(&self) -> &'static str {
        "BroadcastAddBackward"
    }
}

/// z = x[indices, :]
pub(crate) struct IndexSelectBackward {
    pub(crate) input_shape: Vec<usize>,
    pub(crate) indices: Vec<usize>,
}

impl GradFn for IndexSelectBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let cols = self.input_shape[1];
        let mut grad = vec![0.0; self.input_shape[0] * cols];
        for (out_row, &src) in self.indices.iter().enumerate() {
            let g = &grad_output.data()[out_row * cols..(out_row + 1) * cols];
            for (acc, &v) in grad[src * cols..(src + 1) * cols].iter_mut().zip(g) {
                *acc += v;
            }
        }
        vec![Tensor::from_vec(grad, &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "IndexSelectBackward"
    }
}

pub(crate) fn transpose_data(data: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut out = vec![0.0; rows * cols];
    for i in 0..rows {
        for j in 0..cols {
            out[j * rows + i] = data[i * cols + j];
        }
    }
    out
}
