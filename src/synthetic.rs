//! Random graphs for demos and benchmarks.

use rand::Rng;

use crate::error::Result;
use crate::graph_data::GraphData;
use crate::nn::init::{normal, rng_from};

/// Sizes for [`generate_sample_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpec {
    pub num_nodes: usize,
    pub num_features: usize,
    pub num_classes: usize,
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self {
            num_nodes: 100,
            num_features: 10,
            num_classes: 3,
        }
    }
}

/// Random graph with standard-normal features, `3 · num_nodes` directed
/// edges, uniform `[0, 1)` weights and uniform labels.
///
/// The first 80% of nodes form the train mask, the rest the test mask.
/// Edges may repeat or be self loops.
///
/// # Errors
///
/// Propagates [`GraphData::new`] validation; generated graphs always pass.
///
/// ```
/// use traffic_gnn::synthetic::{generate_sample_data, SampleSpec};
///
/// let data = generate_sample_data(SampleSpec::default(), Some(42)).unwrap();
/// assert_eq!(data.num_nodes(), 100);
/// assert_eq!(data.num_edges(), 300);
/// assert_eq!(data.train_indices().unwrap().len(), 80);
/// ```
pub fn generate_sample_data(spec: SampleSpec, seed: Option<u64>) -> Result<GraphData> {
    let SampleSpec {
        num_nodes: n,
        num_features,
        num_classes,
    } = spec;

    let x = normal(&[n, num_features], 0.0, 1.0, seed);

    let mut rng = rng_from(seed.map(|s| s.wrapping_add(1)));
    let (edge_index, edge_weight, y) = if n == 0 {
        (Vec::new(), Vec::new(), Vec::new())
    } else {
        let num_edges = 3 * n;
        let edges: Vec<[usize; 2]> = (0..num_edges)
            .map(|_| [rng.gen_range(0..n), rng.gen_range(0..n)])
            .collect();
        let weights: Vec<f32> = (0..num_edges).map(|_| rng.gen::<f32>()).collect();
        let labels: Vec<usize> = (0..n)
            .map(|_| rng.gen_range(0..num_classes.max(1)))
            .collect();
        (edges, weights, labels)
    };

    let num_train = (0.8 * n as f64) as usize;
    let train: Vec<bool> = (0..n).map(|i| i < num_train).collect();
    let test = train.iter().map(|t| !t).collect();

    GraphData::new(x, edge_index, Some(edge_weight), y)?.with_masks(train, test)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes_and_ranges() {
        let spec = SampleSpec {
            num_nodes: 20,
            num_features: 4,
            num_classes: 5,
        };
        let data = generate_sample_data(spec, Some(7)).expect("generate");

        assert_eq!(data.x.shape(), &[20, 4]);
        assert_eq!(data.num_edges(), 60);
        assert!(data.y.iter().all(|&y| y < 5));
        assert!(data
            .edge_weight
            .as_ref()
            .expect("weights")
            .iter()
            .all(|w| (0.0..1.0).contains(w)));
        assert_eq!(data.train_indices().expect("mask"), (0..16).collect::<Vec<_>>());
        assert_eq!(data.test_indices().expect("mask"), (16..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_seed_reproducibility() {
        let a = generate_sample_data(SampleSpec::default(), Some(3)).expect("generate");
        let b = generate_sample_data(SampleSpec::default(), Some(3)).expect("generate");
        assert_eq!(a.x.data(), b.x.data());
        assert_eq!(a.edge_index, b.edge_index);
        assert_eq!(a.y, b.y);
    }

    #[test]
    fn test_empty_graph() {
        let spec = SampleSpec {
            num_nodes: 0,
            ..SampleSpec::default()
        };
        let data = generate_sample_data(spec, Some(0)).expect("generate");
        assert_eq!(data.num_nodes(), 0);
        assert_eq!(data.num_edges(), 0);
    }
}
