//! Reverse-mode automatic differentiation for GNN training.
//!
//! The engine uses a define-by-run computational graph:
//! - Operations are recorded to a thread-local tape during the forward pass
//! - Gradients are computed in reverse order during the backward pass
//! - Gradients of tensors used more than once are accumulated
//!
//! # Example
//!
//! ```
//! use traffic_gnn::autograd::{clear_graph, get_grad, Tensor};
//!
//! clear_graph();
//! let x = Tensor::from_slice(&[1.0, 2.0, 3.0]).requires_grad();
//! let w = Tensor::from_slice(&[0.5, 0.5, 0.5]);
//!
//! let y = x.mul(&w).sum();
//! y.backward();
//!
//! let grad = get_grad(x.id()).expect("x participates in y");
//! assert_eq!(grad.data(), &[0.5, 0.5, 0.5]);
//! ```
//!
//! # References
//!
//! - Baydin, A. G., et al. (2018). Automatic differentiation in machine learning: a survey. JMLR.
//! - Griewank, A., & Walther, A. (2008). Evaluating derivatives. SIAM.

pub(crate) mod grad_fn;
mod graph;
mod ops;
mod tensor;

pub use grad_fn::GradFn;
pub use graph::ComputationGraph;
pub use tensor::{Tensor, TensorId};

use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    /// Computation graph for the current thread.
    static GRAPH: RefCell<ComputationGraph> = RefCell::new(ComputationGraph::new());

    /// Gradient tracking switch (disabled for inference).
    static GRAD_ENABLED: RefCell<bool> = const { RefCell::new(true) };
}

/// Execute a closure without gradient tracking.
///
/// ```
/// use traffic_gnn::autograd::{no_grad, Tensor};
///
/// let x = Tensor::from_slice(&[1.0, 2.0]).requires_grad();
/// let y = no_grad(|| x.mul(&x).sum());
/// assert!(!y.requires_grad_enabled());
/// ```
pub fn no_grad<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    GRAD_ENABLED.with(|enabled| {
        let prev = *enabled.borrow();
        *enabled.borrow_mut() = false;
        let result = f();
        *enabled.borrow_mut() = prev;
        result
    })
}

/// Check if gradient tracking is currently enabled.
#[must_use]
pub fn is_grad_enabled() -> bool {
    GRAD_ENABLED.with(|enabled| *enabled.borrow())
}

pub(crate) fn with_graph<F, R>(f: F) -> R
where
    F: FnOnce(&mut ComputationGraph) -> R,
{
    GRAPH.with(|graph| f(&mut graph.borrow_mut()))
}

/// Record `result = op(inputs)` on the tape when any input tracks gradients.
///
/// Shared by every differentiable operation, including the graph kernels
/// in [`crate::nn::gnn`].
pub(crate) fn record_op(result: &mut Tensor, grad_fn: Arc<dyn GradFn>, inputs: &[&Tensor]) {
    if !is_grad_enabled() || !inputs.iter().any(|t| t.requires_grad_enabled()) {
        return;
    }

    result.requires_grad_(true);
    result.set_grad_fn(grad_fn.clone());

    with_graph(|graph| {
        for input in inputs {
            graph.register_tensor((*input).clone());
        }
        graph.record(
            result.id(),
            grad_fn,
            inputs.iter().map(|t| t.id()).collect(),
        );
    });
}

/// Clear the computation graph (call once per training step).
pub fn clear_graph() {
    GRAPH.with(|graph| graph.borrow_mut().clear());
}

/// Get gradient for a tensor by ID from the graph.
#[must_use]
pub fn get_grad(id: TensorId) -> Option<Tensor> {
    with_graph(|graph| graph.get_grad(id))
}

/// Clear gradient for a specific tensor by ID.
pub fn clear_grad(id: TensorId) {
    with_graph(|graph| graph.clear_grad(id));
}
