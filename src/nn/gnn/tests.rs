use super::gcn::symmetric_norm;
use super::*;
use crate::autograd::{clear_graph, get_grad, no_grad};

/// Deterministic test data.
fn create_test_tensor(shape: &[usize], seed: u32) -> Tensor {
    let len: usize = shape.iter().product();
    let data: Vec<f32> = (0..len)
        .map(|i| ((i as f32 + seed as f32) * 0.7).sin())
        .collect();
    Tensor::new(&data, shape)
}

fn path_graph() -> AdjacencyMatrix {
    AdjacencyMatrix::from_edge_index(&[[0, 1], [1, 2], [2, 3]], 4).to_undirected()
}

/// Fixed projection so `Σ out ⊙ r` exercises every output entry.
fn readout(out: &Tensor) -> Tensor {
    let r = create_test_tensor(out.shape(), 11);
    out.mul(&r).sum()
}

/// Compare the autograd gradient of parameter `index` to central differences.
fn check_param_gradient<L: MessagePassing>(layer: &mut L, x: &Tensor, adj: &AdjacencyMatrix, index: usize) {
    clear_graph();
    readout(&layer.forward(x, adj)).backward();
    let id = layer.parameters()[index].id();
    let analytical = get_grad(id).expect("parameter gradient");

    let eps = 1e-3;
    for k in 0..analytical.numel() {
        let original = layer.parameters()[index].data()[k];

        layer.parameters_mut()[index].data_mut()[k] = original + eps;
        let plus = no_grad(|| readout(&layer.forward(x, adj)).item());
        layer.parameters_mut()[index].data_mut()[k] = original - eps;
        let minus = no_grad(|| readout(&layer.forward(x, adj)).item());
        layer.parameters_mut()[index].data_mut()[k] = original;

        let numerical = (plus - minus) / (2.0 * eps);
        assert!(
            (analytical.data()[k] - numerical).abs() < 1e-2,
            "param {index}[{k}]: analytical {} vs numerical {numerical}",
            analytical.data()[k]
        );
    }
}

fn check_input_gradient<L: MessagePassing>(layer: &L, x: &Tensor, adj: &AdjacencyMatrix) {
    clear_graph();
    let x_grad = x.clone().requires_grad();
    readout(&layer.forward(&x_grad, adj)).backward();
    let analytical = get_grad(x_grad.id()).expect("input gradient");

    let eps = 1e-3;
    for k in 0..x.numel() {
        let mut plus = x.data().to_vec();
        let mut minus = x.data().to_vec();
        plus[k] += eps;
        minus[k] -= eps;
        let f = |v: Vec<f32>| no_grad(|| readout(&layer.forward(&Tensor::from_vec(v, x.shape()), adj)).item());
        let numerical = (f(plus) - f(minus)) / (2.0 * eps);
        assert!(
            (analytical.data()[k] - numerical).abs() < 1e-2,
            "x[{k}]: analytical {} vs numerical {numerical}",
            analytical.data()[k]
        );
    }
}

// ==================== AdjacencyMatrix Tests ====================

#[test]
fn test_adjacency_matrix_creation() {
    let adj = AdjacencyMatrix::from_edge_index(&[[0, 1], [1, 2], [2, 0]], 3);
    assert_eq!(adj.num_nodes(), 3);
    assert_eq!(adj.num_edges(), 3);
    assert!(!adj.has_weights());
    assert_eq!(adj.weight(1), 1.0);
}

#[test]
#[should_panic(expected = "out of range")]
fn test_adjacency_rejects_out_of_range_endpoint() {
    let _ = AdjacencyMatrix::from_edge_index(&[[0, 5]], 3);
}

#[test]
fn test_to_undirected_mirrors_edges_and_weights() {
    let adj = AdjacencyMatrix::from_edge_index(&[[0, 1], [2, 2]], 3)
        .with_weights(vec![0.5, 2.0])
        .to_undirected();
    assert_eq!(adj.edge_src(), &[0, 2, 1]);
    assert_eq!(adj.edge_tgt(), &[1, 2, 0]);
    assert_eq!(adj.weights(), vec![0.5, 2.0, 0.5]);
}

#[test]
fn test_remove_then_add_self_loops() {
    let adj = AdjacencyMatrix::from_edge_index(&[[0, 0], [0, 1]], 2);
    let cleaned = adj.remove_self_loops();
    assert!(!cleaned.has_self_loops());
    assert_eq!(cleaned.num_edges(), 1);

    let looped = cleaned.add_self_loops();
    assert_eq!(looped.num_edges(), 3);
    assert_eq!(looped.neighbors(0), vec![0]);
    assert_eq!(looped.neighbors(1), vec![0, 1]);
}

#[test]
fn test_add_remaining_self_loops_keeps_existing_weight() {
    let adj = AdjacencyMatrix::from_edge_index(&[[0, 1], [1, 1]], 3).with_weights(vec![4.0, 3.0]);
    let looped = adj.add_remaining_self_loops(1.0);

    assert_eq!(looped.edge_src(), &[0, 0, 1, 2]);
    assert_eq!(looped.edge_tgt(), &[1, 0, 1, 2]);
    assert_eq!(looped.weights(), vec![4.0, 1.0, 3.0, 1.0]);
}

#[test]
fn test_weighted_in_degrees() {
    let adj = AdjacencyMatrix::from_edge_index(&[[0, 1], [2, 1], [1, 0]], 3)
        .with_weights(vec![0.5, 1.5, 2.0]);
    assert_eq!(adj.in_degrees(), vec![2.0, 2.0, 0.0]);
}

#[test]
fn test_symmetric_norm_on_single_edge() {
    let adj = AdjacencyMatrix::from_edge_index(&[[0, 1]], 2)
        .to_undirected()
        .add_remaining_self_loops(1.0);
    // every node has degree 2, so every coefficient is 1/2
    for c in symmetric_norm(&adj) {
        assert!((c - 0.5).abs() < 1e-6);
    }
}

// ==================== GCNConv Tests ====================

#[test]
fn test_gcn_output_shape() {
    let gcn = GCNConv::with_seed(6, 16, Some(1));
    let x = create_test_tensor(&[4, 6], 0);
    let out = gcn.forward(&x, &path_graph());
    assert_eq!(out.shape(), &[4, 16]);
    assert_eq!(gcn.in_features(), 6);
    assert_eq!(gcn.out_features(), 16);
}

#[test]
fn test_gcn_averages_neighbors_with_unit_weight() {
    let mut gcn = GCNConv::with_seed(1, 1, Some(0));
    gcn.parameters_mut()[0].data_mut()[0] = 1.0;

    let adj = AdjacencyMatrix::from_edge_index(&[[0, 1]], 2).to_undirected();
    let x = Tensor::new(&[1.0, 3.0], &[2, 1]);
    let out = gcn.forward(&x, &adj);
    assert!((out.data()[0] - 2.0).abs() < 1e-6);
    assert!((out.data()[1] - 2.0).abs() < 1e-6);
}

#[test]
fn test_gcn_isolated_node_keeps_own_features() {
    let mut gcn = GCNConv::with_seed(2, 2, Some(0));
    gcn.parameters_mut()[0]
        .data_mut()
        .copy_from_slice(&[1.0, 0.0, 0.0, 1.0]);

    let adj = AdjacencyMatrix::from_edge_index(&[], 1);
    let x = Tensor::new(&[0.5, -2.0], &[1, 2]);
    assert_eq!(gcn.forward(&x, &adj).data(), &[0.5, -2.0]);
}

#[test]
fn test_gcn_gradients_match_numerical() {
    let adj = AdjacencyMatrix::from_edge_index(&[[0, 1], [1, 2], [2, 3], [3, 0]], 4)
        .with_weights(vec![0.5, 1.0, 2.0, 1.5])
        .to_undirected();
    let x = create_test_tensor(&[4, 3], 2);
    let mut gcn = GCNConv::with_seed(3, 2, Some(5));

    check_input_gradient(&gcn, &x, &adj);
    check_param_gradient(&mut gcn, &x, &adj, 0);
    check_param_gradient(&mut gcn, &x, &adj, 1);
}

// ==================== GATConv Tests ====================

#[test]
fn test_gat_output_shape() {
    let gat = GATConv::with_seed(8, 5, Some(3));
    let x = create_test_tensor(&[4, 8], 1);
    assert_eq!(gat.forward(&x, &path_graph()).shape(), &[4, 5]);
    assert_eq!(gat.parameters().len(), 4);
    assert!((gat.negative_slope() - 0.2).abs() < f32::EPSILON);
}

#[test]
fn test_gat_zero_attention_is_neighbor_mean() {
    let mut gat = GATConv::with_seed(1, 1, Some(0));
    {
        let mut params = gat.parameters_mut();
        params[0].data_mut()[0] = 1.0;
        params[1].data_mut()[0] = 0.0;
        params[2].data_mut()[0] = 0.0;
    }

    let x = Tensor::new(&[1.0, 2.0, 6.0, 10.0], &[4, 1]);
    let out = gat.forward(&x, &path_graph());
    // node 0 attends to {1, 0}; node 1 to {0, 2, 1}
    assert!((out.data()[0] - 1.5).abs() < 1e-6);
    assert!((out.data()[1] - 3.0).abs() < 1e-6);
    assert!((out.data()[3] - 8.0).abs() < 1e-6);
}

#[test]
fn test_gat_ignores_duplicate_self_loops() {
    let gat = GATConv::with_seed(2, 2, Some(4));
    let x = create_test_tensor(&[3, 2], 3);
    let plain = AdjacencyMatrix::from_edge_index(&[[0, 1], [1, 2]], 3).to_undirected();
    let looped = AdjacencyMatrix::from_edge_index(&[[0, 1], [1, 2], [1, 1], [1, 1]], 3).to_undirected();

    let a = no_grad(|| gat.forward(&x, &plain));
    let b = no_grad(|| gat.forward(&x, &looped));
    for (u, v) in a.data().iter().zip(b.data()) {
        assert!((u - v).abs() < 1e-6);
    }
}

#[test]
fn test_gat_gradients_match_numerical() {
    let adj = AdjacencyMatrix::from_edge_index(&[[0, 1], [1, 2], [2, 3], [0, 2]], 4).to_undirected();
    let x = create_test_tensor(&[4, 3], 7);
    let mut gat = GATConv::with_seed(3, 2, Some(9));

    check_input_gradient(&gat, &x, &adj);
    for index in 0..4 {
        check_param_gradient(&mut gat, &x, &adj, index);
    }
}
