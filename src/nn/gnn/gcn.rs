use std::sync::Arc;

use super::{AdjacencyMatrix, MessagePassing};
use crate::autograd::grad_fn::GradFn;
use crate::autograd::{record_op, Tensor};
use crate::nn::init::{xavier_uniform, zeros};

/// Graph Convolutional Network layer (Kipf & Welling, 2017).
///
/// Implements the propagation rule:
/// X' = D̂^(-1/2) Â D̂^(-1/2) X W + b
///
/// Where:
/// - Â = A + I (self loops with weight 1 where missing)
/// - D̂ = weighted in-degree of Â
/// - W = learnable weight matrix `[in_features, out_features]`
///
/// Edge weights, when present, scale the corresponding entries of Â.
#[derive(Debug, Clone)]
pub struct GCNConv {
    in_features: usize,
    out_features: usize,
    weight: Tensor,
    bias: Tensor,
}

impl GCNConv {
    #[must_use]
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self::with_seed(in_features, out_features, None)
    }

    /// Glorot-initialized weight, zero bias.
    #[must_use]
    pub fn with_seed(in_features: usize, out_features: usize, seed: Option<u64>) -> Self {
        Self {
            in_features,
            out_features,
            weight: xavier_uniform(&[in_features, out_features], in_features, out_features, seed)
                .requires_grad(),
            bias: zeros(&[out_features]).requires_grad(),
        }
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

impl MessagePassing for GCNConv {
    fn forward(&self, x: &Tensor, adj: &AdjacencyMatrix) -> Tensor {
        assert_eq!(
            x.shape()[1],
            self.in_features,
            "Input features mismatch: expected {}, got {}",
            self.in_features,
            x.shape()[1]
        );
        assert_eq!(x.shape()[0], adj.num_nodes(), "node count mismatch");

        let adj = adj.add_remaining_self_loops(1.0);
        let coeffs = symmetric_norm(&adj);
        let h = x.matmul(&self.weight);
        propagate(&h, adj.edge_src(), adj.edge_tgt(), &coeffs).broadcast_add(&self.bias)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weight, &self.bias]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weight, &mut self.bias]
    }

    fn in_features(&self) -> usize {
        self.in_features
    }

    fn out_features(&self) -> usize {
        self.out_features
    }
}

/// Per-edge coefficient `d_src^-1/2 · w · d_tgt^-1/2`.
///
/// Nodes with zero degree contribute a coefficient of 0.
pub(crate) fn symmetric_norm(adj: &AdjacencyMatrix) -> Vec<f32> {
    let deg_inv_sqrt: Vec<f32> = adj
        .in_degrees()
        .into_iter()
        .map(|d| if d > 0.0 { d.powf(-0.5) } else { 0.0 })
        .collect();

    (0..adj.num_edges())
        .map(|e| {
            deg_inv_sqrt[adj.edge_src()[e]] * adj.weight(e) * deg_inv_sqrt[adj.edge_tgt()[e]]
        })
        .collect()
}

/// Sparse aggregation: `out[tgt] += coeff · h[src]` for every edge.
pub(crate) fn propagate(h: &Tensor, src: &[usize], tgt: &[usize], coeffs: &[f32]) -> Tensor {
    let (n, f) = (h.shape()[0], h.shape()[1]);
    let mut out = vec![0.0f32; n * f];
    for ((&s, &t), &c) in src.iter().zip(tgt).zip(coeffs) {
        let row = h.row(s);
        for (o, &v) in out[t * f..(t + 1) * f].iter_mut().zip(row) {
            *o += c * v;
        }
    }

    let mut result = Tensor::from_vec(out, &[n, f]);
    record_op(
        &mut result,
        Arc::new(SpmmBackward {
            src: src.to_vec(),
            tgt: tgt.to_vec(),
            coeffs: coeffs.to_vec(),
            shape: [n, f],
        }),
        &[h],
    );
    result
}

/// Transpose of the aggregation: `grad_h[src] += coeff · G[tgt]`.
struct SpmmBackward {
    src: Vec<usize>,
    tgt: Vec<usize>,
    coeffs: Vec<f32>,
    shape: [usize; 2],
}

impl GradFn for SpmmBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let [n, f] = self.shape;
        let mut grad = vec![0.0f32; n * f];
        for ((&s, &t), &c) in self.src.iter().zip(&self.tgt).zip(&self.coeffs) {
            let g = grad_output.row(t);
            for (acc, &v) in grad[s * f..(s + 1) * f].iter_mut().zip(g) {
                *acc += c * v;
            }
        }
        vec![Tensor::from_vec(grad, &self.shape)]
    }

    fn name(&self) -> &'static str {
        "SpmmBackward"
    }
}
