use std::sync::Arc;

use super::{AdjacencyMatrix, MessagePassing};
use crate::autograd::grad_fn::GradFn;
use crate::autograd::{record_op, Tensor};
use crate::nn::init::{xavier_uniform, zeros};

/// Graph Attention Network layer with a single head (Veličković et al., 2018).
///
/// ```text
/// e_ij  = LeakyReLU(a_srcᵀ W h_j + a_dstᵀ W h_i)
/// α_ij  = softmax_j(e_ij)          over incoming neighbors j of i
/// h'_i  = Σ_j α_ij W h_j + b
/// ```
///
/// Existing self loops are replaced by exactly one loop per node, so every
/// node attends at least to itself. Edge weights are ignored.
#[derive(Debug, Clone)]
pub struct GATConv {
    in_features: usize,
    out_features: usize,
    /// [`in_features`, `out_features`]
    weight: Tensor,
    /// Attention vector for source nodes [`out_features`]
    att_src: Tensor,
    /// Attention vector for target nodes [`out_features`]
    att_dst: Tensor,
    bias: Tensor,
    negative_slope: f32,
}

impl GATConv {
    #[must_use]
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self::with_seed(in_features, out_features, None)
    }

    #[must_use]
    pub fn with_seed(in_features: usize, out_features: usize, seed: Option<u64>) -> Self {
        let sub_seed = |k: u64| seed.map(|s| s.wrapping_add(k));
        Self {
            in_features,
            out_features,
            weight: xavier_uniform(
                &[in_features, out_features],
                in_features,
                out_features,
                sub_seed(0),
            )
            .requires_grad(),
            att_src: xavier_uniform(&[out_features], 1, out_features, sub_seed(1)).requires_grad(),
            att_dst: xavier_uniform(&[out_features], 1, out_features, sub_seed(2)).requires_grad(),
            bias: zeros(&[out_features]).requires_grad(),
            negative_slope: 0.2,
        }
    }

    /// Slope of the `LeakyReLU` applied to attention scores.
    #[must_use]
    pub fn negative_slope(&self) -> f32 {
        self.negative_slope
    }
}

impl MessagePassing for GATConv {
    fn forward(&self, x: &Tensor, adj: &AdjacencyMatrix) -> Tensor {
        assert_eq!(
            x.shape()[1],
            self.in_features,
            "Input features mismatch: expected {}, got {}",
            self.in_features,
            x.shape()[1]
        );
        assert_eq!(x.shape()[0], adj.num_nodes(), "node count mismatch");

        let adj = adj.remove_self_loops().add_self_loops();
        let h = x.matmul(&self.weight);
        attend(
            &h,
            &self.att_src,
            &self.att_dst,
            adj.edge_src(),
            adj.edge_tgt(),
            self.negative_slope,
        )
        .broadcast_add(&self.bias)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weight, &self.att_src, &self.att_dst, &self.bias]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![
            &mut self.weight,
            &mut self.att_src,
            &mut self.att_dst,
            &mut self.bias,
        ]
    }

    fn in_features(&self) -> usize {
        self.in_features
    }

    fn out_features(&self) -> usize {
        self.out_features
    }
}

/// Attention-weighted aggregation over `src → tgt` edges.
///
/// Every target must have at least one incoming edge.
pub(crate) fn attend(
    h: &Tensor,
    att_src: &Tensor,
    att_dst: &Tensor,
    src: &[usize],
    tgt: &[usize],
    negative_slope: f32,
) -> Tensor {
    let (n, f) = (h.shape()[0], h.shape()[1]);

    let dot = |row: &[f32], a: &Tensor| -> f32 { row.iter().zip(a.data()).map(|(x, y)| x * y).sum() };
    let s_src: Vec<f32> = (0..n).map(|i| dot(h.row(i), att_src)).collect();
    let s_dst: Vec<f32> = (0..n).map(|i| dot(h.row(i), att_dst)).collect();

    let z: Vec<f32> = src
        .iter()
        .zip(tgt)
        .map(|(&j, &i)| s_src[j] + s_dst[i])
        .collect();
    let scores: Vec<f32> = z
        .iter()
        .map(|&v| if v > 0.0 { v } else { negative_slope * v })
        .collect();

    // softmax over the incoming edges of each target
    let mut max = vec![f32::NEG_INFINITY; n];
    for (&i, &e) in tgt.iter().zip(&scores) {
        max[i] = max[i].max(e);
    }
    let mut alpha: Vec<f32> = tgt
        .iter()
        .zip(&scores)
        .map(|(&i, &e)| (e - max[i]).exp())
        .collect();
    let mut denom = vec![0.0f32; n];
    for (&i, &a) in tgt.iter().zip(&alpha) {
        denom[i] += a;
    }
    for (a, &i) in alpha.iter_mut().zip(tgt) {
        *a /= denom[i];
    }

    let mut out = vec![0.0f32; n * f];
    for ((&j, &i), &a) in src.iter().zip(tgt).zip(&alpha) {
        for (o, &v) in out[i * f..(i + 1) * f].iter_mut().zip(h.row(j)) {
            *o += a * v;
        }
    }

    let mut result = Tensor::from_vec(out, &[n, f]);
    record_op(
        &mut result,
        Arc::new(AttentionBackward {
            h: h.detach(),
            att_src: att_src.data().to_vec(),
            att_dst: att_dst.data().to_vec(),
            src: src.to_vec(),
            tgt: tgt.to_vec(),
            z,
            alpha,
            negative_slope,
        }),
        &[h, att_src, att_dst],
    );
    result
}

/// Gradients of [`attend`] with respect to `h`, `att_src` and `att_dst`.
struct AttentionBackward {
    h: Tensor,
    att_src: Vec<f32>,
    att_dst: Vec<f32>,
    src: Vec<usize>,
    tgt: Vec<usize>,
    /// Pre-activation scores
    z: Vec<f32>,
    alpha: Vec<f32>,
    negative_slope: f32,
}

impl GradFn for AttentionBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let (n, f) = (self.h.shape()[0], self.h.shape()[1]);
        let mut grad_h = vec![0.0f32; n * f];

        // Through the weighted sum: out_i = Σ α_e h_j
        let mut d_alpha = Vec::with_capacity(self.alpha.len());
        for ((&j, &i), &a) in self.src.iter().zip(&self.tgt).zip(&self.alpha) {
            let g_i = grad_output.row(i);
            let h_j = self.h.row(j);
            d_alpha.push(g_i.iter().zip(h_j).map(|(g, h)| g * h).sum::<f32>());
            for (acc, &g) in grad_h[j * f..(j + 1) * f].iter_mut().zip(g_i) {
                *acc += a * g;
            }
        }

        // Through the softmax
        let mut weighted = vec![0.0f32; n];
        for ((&i, &a), &da) in self.tgt.iter().zip(&self.alpha).zip(&d_alpha) {
            weighted[i] += a * da;
        }

        // Through LeakyReLU and the two score projections
        let mut ds_src = vec![0.0f32; n];
        let mut ds_dst = vec![0.0f32; n];
        for e in 0..self.alpha.len() {
            let (j, i) = (self.src[e], self.tgt[e]);
            let de = self.alpha[e] * (d_alpha[e] - weighted[i]);
            let slope = if self.z[e] > 0.0 { 1.0 } else { self.negative_slope };
            let dz = de * slope;
            ds_src[j] += dz;
            ds_dst[i] += dz;
        }

        let mut grad_att_src = vec![0.0f32; f];
        let mut grad_att_dst = vec![0.0f32; f];
        for node in 0..n {
            let h_row = self.h.row(node);
            let grad_row = &mut grad_h[node * f..(node + 1) * f];
            for k in 0..f {
                grad_row[k] += ds_src[node] * self.att_src[k] + ds_dst[node] * self.att_dst[k];
                grad_att_src[k] += ds_src[node] * h_row[k];
                grad_att_dst[k] += ds_dst[node] * h_row[k];
            }
        }

        vec![
            Tensor::from_vec(grad_h, &[n, f]),
            Tensor::from_vec(grad_att_src, &[f]),
            Tensor::from_vec(grad_att_dst, &[f]),
        ]
    }

    fn name(&self) -> &'static str {
        "AttentionBackward"
    }
}
