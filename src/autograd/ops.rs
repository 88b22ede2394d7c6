//! Differentiable tensor operations.
//!
//! Each operation computes its forward result eagerly and, when gradient
//! tracking is on, records a [`GradFn`](super::GradFn) on the tape.

use std::sync::Arc;

use super::grad_fn::{
    transpose_data, AddBackward, BroadcastAddBackward, IndexSelectBackward, MatmulBackward,
    MeanBackward, MulBackward, MulScalarBackward, ReluBackward, SumBackward, TransposeBackward,
};
use super::record_op;
use super::tensor::Tensor;

/// Row-major `[m, k] @ [k, n]`.
pub(crate) fn matmul_kernel(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let mut out = vec![0.0; m * n];
    for i in 0..m {
        let out_row = &mut out[i * n..(i + 1) * n];
        for p in 0..k {
            let a_ip = a[i * k + p];
            if a_ip == 0.0 {
                continue;
            }
            for (o, &b_pj) in out_row.iter_mut().zip(&b[p * n..(p + 1) * n]) {
                *o += a_ip * b_pj;
            }
        }
    }
    out
}

// ============================================================================
// Element-wise Operations
// ============================================================================

impl Tensor {
    /// Element-wise addition of two tensors with the same shape.
    #[must_use]
    pub fn add(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.shape(), other.shape(), "add: shape mismatch");
        let data = self
            .data()
            .iter()
            .zip(other.data())
            .map(|(a, b)| a + b)
            .collect();
        let mut result = Tensor::from_vec(data, self.shape());
        record_op(&mut result, Arc::new(AddBackward), &[self, other]);
        result
    }

    /// Element-wise multiplication of two tensors with the same shape.
    #[must_use]
    pub fn mul(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.shape(), other.shape(), "mul: shape mismatch");
        let data = self
            .data()
            .iter()
            .zip(other.data())
            .map(|(a, b)| a * b)
            .collect();
        let mut result = Tensor::from_vec(data, self.shape());
        record_op(
            &mut result,
            Arc::new(MulBackward {
                x: self.detach(),
                y: other.detach(),
            }),
            &[self, other],
        );
        result
    }

    #[must_use]
    pub fn mul_scalar(&self, scalar: f32) -> Tensor {
        let data = self.data().iter().map(|&x| x * scalar).collect();
        let mut result = Tensor::from_vec(data, self.shape());
        record_op(&mut result, Arc::new(MulScalarBackward { scalar }), &[self]);
        result
    }
}

// ============================================================================
// Reductions
// ============================================================================

impl Tensor {
    /// Sum of all elements.
    #[must_use]
    pub fn sum(&self) -> Tensor {
        let total: f32 = self.data().iter().sum();
        let mut result = Tensor::new(&[total], &[1]);
        record_op(
            &mut result,
            Arc::new(SumBackward {
                input_shape: self.shape().to_vec(),
            }),
            &[self],
        );
        result
    }

    /// Mean of all elements.
    #[must_use]
    pub fn mean(&self) -> Tensor {
        let n = self.numel().max(1) as f32;
        let total: f32 = self.data().iter().sum();
        let mut result = Tensor::new(&[total / n], &[1]);
        record_op(
            &mut result,
            Arc::new(MeanBackward {
                input_shape: self.shape().to_vec(),
            }),
            &[self],
        );
        result
    }
}

// ============================================================================
// Activations
// ============================================================================

impl Tensor {
    #[must_use]
    pub fn relu(&self) -> Tensor {
        let data = self.data().iter().map(|&x| x.max(0.0)).collect();
        let mut result = Tensor::from_vec(data, self.shape());
        record_op(
            &mut result,
            Arc::new(ReluBackward { x: self.detach() }),
            &[self],
        );
        result
    }
}

// ============================================================================
// Linear Algebra and Indexing
// ============================================================================

impl Tensor {
    /// Matrix multiplication: z = self @ other (2D only).
    #[must_use]
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.ndim(), 2, "matmul requires 2D tensors");
        assert_eq!(other.ndim(), 2, "matmul requires 2D tensors");

        let (m, k1) = (self.shape()[0], self.shape()[1]);
        let (k2, n) = (other.shape()[0], other.shape()[1]);
        assert_eq!(k1, k2, "matmul dimension mismatch: {k1} vs {k2}");

        let data = matmul_kernel(self.data(), other.data(), m, k1, n);
        let mut result = Tensor::from_vec(data, &[m, n]);
        record_op(
            &mut result,
            Arc::new(MatmulBackward {
                x: self.detach(),
                y: other.detach(),
            }),
            &[self, other],
        );
        result
    }

    /// Transpose a 2D tensor.
    ///
    /// ```
    /// use traffic_gnn::autograd::Tensor;
    ///
    /// let a = Tensor::new(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
    /// let a_t = a.transpose();
    /// assert_eq!(a_t.shape(), &[3, 2]);
    /// assert_eq!(a_t.data(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    /// ```
    #[must_use]
    pub fn transpose(&self) -> Tensor {
        assert_eq!(self.ndim(), 2, "transpose requires 2D tensor");
        let (rows, cols) = (self.shape()[0], self.shape()[1]);
        let data = transpose_data(self.data(), rows, cols);
        let mut result = Tensor::from_vec(data, &[cols, rows]);
        record_op(&mut result, Arc::new(TransposeBackward), &[self]);
        result
    }

    /// Broadcast addition: `[N, M] + [M]`, used for biases.
    #[must_use]
    pub fn broadcast_add(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.ndim(), 2, "broadcast_add requires 2D matrix");
        assert_eq!(other.ndim(), 1, "broadcast_add requires 1D vector");
        let cols = self.shape()[1];
        assert_eq!(
            cols,
            other.shape()[0],
            "Matrix columns {} must match vector length {}",
            cols,
            other.shape()[0]
        );

        let mut data = self.data().to_vec();
        for row in data.chunks_mut(cols) {
            for (x, &b) in row.iter_mut().zip(other.data()) {
                *x += b;
            }
        }

        let mut result = Tensor::from_vec(data, self.shape());
        record_op(
            &mut result,
            Arc::new(BroadcastAddBackward { cols }),
            &[self, other],
        );
        result
    }

    /// Gather rows of a 2D tensor. Indices may repeat.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of range.
    #[must_use]
    pub fn select_rows(&self, indices: &[usize]) -> Tensor {
        assert_eq!(self.ndim(), 2, "select_rows requires 2D tensor");
        let (rows, cols) = (self.shape()[0], self.shape()[1]);
        let mut data = Vec::with_capacity(indices.len() * cols);
        for &i in indices {
            assert!(i < rows, "row index {i} out of range for {rows} rows");
            data.extend_from_slice(self.row(i));
        }
        let mut result = Tensor::from_vec(data, &[indices.len(), cols]);
        record_op(
            &mut result,
            Arc::new(IndexSelectBackward {
                input_shape: self.shape().to_vec(),
                indices: indices.to_vec(),
            }),
            &[self],
        );
        result
    }
}
