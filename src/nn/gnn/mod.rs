//! Graph Neural Network layers for learning on road networks.
//!
//! - [`GCNConv`] - Graph Convolutional Network (Kipf & Welling, 2017)
//! - [`GATConv`] - Graph Attention Network (Veličković et al., 2018)
//!
//! Both layers record differentiable message-passing kernels on the
//! autograd tape, so their weights train like any other parameter.
//!
//! # Example
//!
//! ```
//! use traffic_gnn::autograd::Tensor;
//! use traffic_gnn::nn::gnn::{AdjacencyMatrix, GCNConv, MessagePassing};
//!
//! let adj = AdjacencyMatrix::from_edge_index(&[[0, 1], [1, 2]], 3).to_undirected();
//! let gcn = GCNConv::with_seed(6, 16, Some(0));
//! let x = Tensor::new(&vec![0.1; 3 * 6], &[3, 6]);
//! assert_eq!(gcn.forward(&x, &adj).shape(), &[3, 16]);
//! ```
//!
//! # References
//!
//! - Kipf, T. N., & Welling, M. (2017). Semi-Supervised Classification with
//!   Graph Convolutional Networks. ICLR.
//! - Veličković, P., et al. (2018). Graph Attention Networks. ICLR.

mod gat;
mod gcn;

pub use gat::GATConv;
pub use gcn::GCNConv;

use crate::autograd::Tensor;

/// A layer that transforms node features along graph edges.
pub trait MessagePassing {
    /// Node features `[num_nodes, in_features]` to `[num_nodes, out_features]`.
    fn forward(&self, x: &Tensor, adj: &AdjacencyMatrix) -> Tensor;

    fn parameters(&self) -> Vec<&Tensor>;

    fn parameters_mut(&mut self) -> Vec<&mut Tensor>;

    fn in_features(&self) -> usize;

    fn out_features(&self) -> usize;
}

/// Directed edge list in COO format with optional weights.
///
/// Messages flow from `edge_src[e]` to `edge_tgt[e]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjacencyMatrix {
    num_nodes: usize,
    edge_src: Vec<usize>,
    edge_tgt: Vec<usize>,
    /// Defaults to 1.0 per edge when absent
    edge_weights: Option<Vec<f32>>,
}

impl AdjacencyMatrix {
    /// Create adjacency matrix from `[source, target]` pairs.
    ///
    /// ```
    /// use traffic_gnn::nn::gnn::AdjacencyMatrix;
    ///
    /// let adj = AdjacencyMatrix::from_edge_index(&[[0, 1], [1, 2], [2, 0]], 3);
    /// assert_eq!(adj.num_nodes(), 3);
    /// assert_eq!(adj.num_edges(), 3);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if an endpoint is not below `num_nodes`.
    #[must_use]
    pub fn from_edge_index(edges: &[[usize; 2]], num_nodes: usize) -> Self {
        let edge_src = edges.iter().map(|e| e[0]).collect();
        let edge_tgt = edges.iter().map(|e| e[1]).collect();
        Self::from_coo(edge_src, edge_tgt, num_nodes)
    }

    /// Create adjacency matrix from separate source and target vectors.
    ///
    /// # Panics
    ///
    /// Panics if the vectors differ in length or an endpoint is out of range.
    #[must_use]
    pub fn from_coo(src: Vec<usize>, tgt: Vec<usize>, num_nodes: usize) -> Self {
        assert_eq!(src.len(), tgt.len(), "COO source/target length mismatch");
        assert!(
            src.iter().chain(&tgt).all(|&n| n < num_nodes),
            "edge endpoint out of range for {num_nodes} nodes"
        );
        Self {
            num_nodes,
            edge_src: src,
            edge_tgt: tgt,
            edge_weights: None,
        }
    }

    /// Attach one weight per edge.
    ///
    /// # Panics
    ///
    /// Panics if the weight count differs from the edge count.
    #[must_use]
    pub fn with_weights(mut self, weights: Vec<f32>) -> Self {
        assert_eq!(
            weights.len(),
            self.num_edges(),
            "expected {} edge weights, got {}",
            self.num_edges(),
            weights.len()
        );
        self.edge_weights = Some(weights);
        self
    }

    /// Add the reverse of every non-loop edge, carrying its weight.
    #[must_use]
    pub fn to_undirected(&self) -> Self {
        let mut src = self.edge_src.clone();
        let mut tgt = self.edge_tgt.clone();
        let mut weights = self.edge_weights.clone();

        for e in 0..self.num_edges() {
            let (s, t) = (self.edge_src[e], self.edge_tgt[e]);
            if s == t {
                continue;
            }
            src.push(t);
            tgt.push(s);
            if let Some(w) = weights.as_mut() {
                w.push(self.weight(e));
            }
        }

        Self {
            num_nodes: self.num_nodes,
            edge_src: src,
            edge_tgt: tgt,
            edge_weights: weights,
        }
    }

    /// Drop every `i → i` edge.
    #[must_use]
    pub fn remove_self_loops(&self) -> Self {
        let keep: Vec<usize> = (0..self.num_edges())
            .filter(|&e| self.edge_src[e] != self.edge_tgt[e])
            .collect();
        Self {
            num_nodes: self.num_nodes,
            edge_src: keep.iter().map(|&e| self.edge_src[e]).collect(),
            edge_tgt: keep.iter().map(|&e| self.edge_tgt[e]).collect(),
            edge_weights: self
                .edge_weights
                .as_ref()
                .map(|w| keep.iter().map(|&e| w[e]).collect()),
        }
    }

    /// Append one weight-1 self loop per node.
    #[must_use]
    pub fn add_self_loops(&self) -> Self {
        let mut out = self.clone();
        for i in 0..self.num_nodes {
            out.edge_src.push(i);
            out.edge_tgt.push(i);
        }
        if let Some(w) = out.edge_weights.as_mut() {
            w.extend(std::iter::repeat(1.0).take(self.num_nodes));
        }
        out
    }

    /// Ensure exactly one self loop per node.
    ///
    /// Existing loops keep their weight (the last one wins when a node has
    /// several); nodes without a loop get weight `fill`.
    #[must_use]
    pub fn add_remaining_self_loops(&self, fill: f32) -> Self {
        let mut loop_weight = vec![fill; self.num_nodes];
        for e in 0..self.num_edges() {
            if self.edge_src[e] == self.edge_tgt[e] {
                loop_weight[self.edge_src[e]] = self.weight(e);
            }
        }

        let stripped = self.remove_self_loops();
        let mut weights = stripped.weights();
        let mut src = stripped.edge_src;
        let mut tgt = stripped.edge_tgt;
        for (i, w) in loop_weight.into_iter().enumerate() {
            src.push(i);
            tgt.push(i);
            weights.push(w);
        }

        Self {
            num_nodes: self.num_nodes,
            edge_src: src,
            edge_tgt: tgt,
            edge_weights: Some(weights),
        }
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edge_src.len()
    }

    #[must_use]
    pub fn edge_src(&self) -> &[usize] {
        &self.edge_src
    }

    #[must_use]
    pub fn edge_tgt(&self) -> &[usize] {
        &self.edge_tgt
    }

    #[must_use]
    pub fn has_weights(&self) -> bool {
        self.edge_weights.is_some()
    }

    /// Weight of edge `e` (1.0 when unweighted).
    #[must_use]
    pub fn weight(&self, e: usize) -> f32 {
        self.edge_weights.as_ref().map_or(1.0, |w| w[e])
    }

    /// All edge weights, materialized.
    #[must_use]
    pub fn weights(&self) -> Vec<f32> {
        self.edge_weights
            .clone()
            .unwrap_or_else(|| vec![1.0; self.num_edges()])
    }

    #[must_use]
    pub fn has_self_loops(&self) -> bool {
        self.edge_src.iter().zip(&self.edge_tgt).any(|(s, t)| s == t)
    }

    /// Weighted in-degree of each node.
    #[must_use]
    pub fn in_degrees(&self) -> Vec<f32> {
        let mut degrees = vec![0.0f32; self.num_nodes];
        for (e, &tgt) in self.edge_tgt.iter().enumerate() {
            degrees[tgt] += self.weight(e);
        }
        degrees
    }

    /// Sources of edges pointing at `node`.
    #[must_use]
    pub fn neighbors(&self, node: usize) -> Vec<usize> {
        self.edge_src
            .iter()
            .zip(&self.edge_tgt)
            .filter(|(_, &tgt)| tgt == node)
            .map(|(&src, _)| src)
            .collect()
    }
}

#[cfg(test)]
mod tests;
