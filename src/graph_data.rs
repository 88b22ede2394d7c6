//! Graph container consumed by the model.

use crate::autograd::Tensor;
use crate::data::Position;
use crate::error::{Result, TrafficError};
use crate::nn::AdjacencyMatrix;

/// Node features, connectivity, labels and optional node masks.
///
/// All per-node vectors share the row order of `x`.
///
/// ```
/// use traffic_gnn::autograd::Tensor;
/// use traffic_gnn::GraphData;
///
/// let x = Tensor::new(&[0.0, 1.0, 2.0], &[3, 1]);
/// let data = GraphData::new(x, vec![[0, 1], [1, 2]], None, vec![0, 1, 1]).unwrap();
/// assert_eq!(data.num_nodes(), 3);
/// assert_eq!(data.num_classes(), 2);
/// assert_eq!(data.adjacency().num_edges(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct GraphData {
    /// Node features `[num_nodes, num_features]`
    pub x: Tensor,
    /// One `[u, v]` pair per road segment
    pub edge_index: Vec<[usize; 2]>,
    pub edge_weight: Option<Vec<f32>>,
    /// Congestion class per node
    pub y: Vec<usize>,
    /// Raw geographic positions, when known
    pub positions: Option<Vec<Position>>,
    pub node_ids: Option<Vec<String>>,
    pub train_mask: Option<Vec<bool>>,
    pub test_mask: Option<Vec<bool>>,
}

impl GraphData {
    /// Validate and package a graph.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::DimensionMismatch`] when `x` is not 2D, the
    /// label count differs from the node count, an edge endpoint is out of
    /// range, or the weight count differs from the edge count.
    pub fn new(
        x: Tensor,
        edge_index: Vec<[usize; 2]>,
        edge_weight: Option<Vec<f32>>,
        y: Vec<usize>,
    ) -> Result<Self> {
        if x.ndim() != 2 {
            return Err(TrafficError::DimensionMismatch {
                expected: "2D node feature matrix".to_string(),
                actual: format!("{:?}", x.shape()),
            });
        }
        let n = x.shape()[0];
        if y.len() != n {
            return Err(TrafficError::DimensionMismatch {
                expected: format!("{n} labels"),
                actual: format!("{} labels", y.len()),
            });
        }
        if let Some(&[u, v]) = edge_index.iter().find(|[u, v]| *u >= n || *v >= n) {
            return Err(TrafficError::DimensionMismatch {
                expected: format!("edge endpoints below {n}"),
                actual: format!("edge ({u}, {v})"),
            });
        }
        if let Some(w) = &edge_weight {
            if w.len() != edge_index.len() {
                return Err(TrafficError::DimensionMismatch {
                    expected: format!("{} edge weights", edge_index.len()),
                    actual: format!("{} edge weights", w.len()),
                });
            }
        }

        Ok(Self {
            x,
            edge_index,
            edge_weight,
            y,
            positions: None,
            node_ids: None,
            train_mask: None,
            test_mask: None,
        })
    }

    /// Attach positions (one per node).
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::DimensionMismatch`] on a length mismatch.
    pub fn with_positions(mut self, positions: Vec<Position>) -> Result<Self> {
        self.check_len("positions", positions.len())?;
        self.positions = Some(positions);
        Ok(self)
    }

    /// Attach intersection ids (one per node).
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::DimensionMismatch`] on a length mismatch.
    pub fn with_node_ids(mut self, ids: Vec<String>) -> Result<Self> {
        self.check_len("node ids", ids.len())?;
        self.node_ids = Some(ids);
        Ok(self)
    }

    /// Attach train/test masks.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::DimensionMismatch`] on a length mismatch.
    pub fn with_masks(mut self, train: Vec<bool>, test: Vec<bool>) -> Result<Self> {
        self.check_len("train mask", train.len())?;
        self.check_len("test mask", test.len())?;
        self.train_mask = Some(train);
        self.test_mask = Some(test);
        Ok(self)
    }

    fn check_len(&self, what: &str, len: usize) -> Result<()> {
        if len == self.num_nodes() {
            Ok(())
        } else {
            Err(TrafficError::DimensionMismatch {
                expected: format!("{} {what}", self.num_nodes()),
                actual: format!("{len} {what}"),
            })
        }
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.x.shape()[0]
    }

    #[must_use]
    pub fn num_features(&self) -> usize {
        self.x.shape()[1]
    }

    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edge_index.len()
    }

    /// Largest label plus one (0 for a graph without nodes).
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.y.iter().max().map_or(0, |&m| m + 1)
    }

    /// Message-passing structure: every segment in both directions.
    ///
    /// Road segments are stored once but carry traffic both ways, so each is
    /// mirrored with its weight; messages flow `u → v` and `v → u`.
    #[must_use]
    pub fn adjacency(&self) -> AdjacencyMatrix {
        let adj = AdjacencyMatrix::from_edge_index(&self.edge_index, self.num_nodes());
        match &self.edge_weight {
            Some(w) => adj.with_weights(w.clone()),
            None => adj,
        }
        .to_undirected()
    }

    /// Indices of nodes in the training mask.
    #[must_use]
    pub fn train_indices(&self) -> Option<Vec<usize>> {
        self.train_mask.as_deref().map(mask_indices)
    }

    /// Indices of nodes in the test mask.
    #[must_use]
    pub fn test_indices(&self) -> Option<Vec<usize>> {
        self.test_mask.as_deref().map(mask_indices)
    }
}

/// Positions of `true` entries.
#[must_use]
pub fn mask_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &m)| m.then_some(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(n: usize) -> Tensor {
        Tensor::from_vec((0..n * 2).map(|i| i as f32).collect(), &[n, 2])
    }

    #[test]
    fn test_rejects_label_count_mismatch() {
        let err = GraphData::new(features(3), vec![], None, vec![0, 1]).expect_err("labels");
        assert!(matches!(err, TrafficError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_rejects_out_of_range_edge() {
        assert!(GraphData::new(features(2), vec![[0, 2]], None, vec![0, 0]).is_err());
    }

    #[test]
    fn test_rejects_weight_count_mismatch() {
        assert!(GraphData::new(features(2), vec![[0, 1]], Some(vec![1.0, 2.0]), vec![0, 0]).is_err());
    }

    #[test]
    fn test_adjacency_is_symmetric_with_weights() {
        let data = GraphData::new(features(3), vec![[0, 1], [1, 2]], Some(vec![0.5, 2.0]), vec![0; 3])
            .expect("valid");
        let adj = data.adjacency();
        assert_eq!(adj.edge_src(), &[0, 1, 1, 2]);
        assert_eq!(adj.edge_tgt(), &[1, 2, 0, 1]);
        assert_eq!(adj.weights(), vec![0.5, 2.0, 0.5, 2.0]);
    }

    #[test]
    fn test_masks_and_indices() {
        let data = GraphData::new(features(4), vec![], None, vec![0, 2, 1, 0])
            .and_then(|d| d.with_masks(vec![true, false, true, false], vec![false, true, false, true]))
            .expect("valid");
        assert_eq!(data.train_indices(), Some(vec![0, 2]));
        assert_eq!(data.test_indices(), Some(vec![1, 3]));
        assert_eq!(data.num_classes(), 3);

        assert!(data.with_masks(vec![true], vec![false]).is_err());
    }

    #[test]
    fn test_mask_indices_empty() {
        assert!(mask_indices(&[false, false]).is_empty());
    }
}
