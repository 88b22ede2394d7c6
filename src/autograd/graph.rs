//! Tape recording and the backward pass.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::grad_fn::GradFn;
use super::tensor::{Tensor, TensorId};

/// Entry in the computation tape.
#[derive(Clone)]
pub(crate) struct TapeEntry {
    pub output_id: TensorId,
    pub grad_fn: Arc<dyn GradFn>,
    pub input_ids: Vec<TensorId>,
}

/// Computation graph that records operations for the backward pass.
///
/// Operations are appended in execution order during the forward pass and
/// replayed in reverse during [`ComputationGraph::backward`]. Each thread
/// owns its own graph, so a training step never synchronizes.
#[allow(missing_debug_implementations)]
pub struct ComputationGraph {
    tape: Vec<TapeEntry>,

    /// Snapshot of every tensor that fed a recorded operation
    tensors: HashMap<TensorId, Tensor>,

    requires_grad: HashSet<TensorId>,
}

impl ComputationGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tape: Vec::new(),
            tensors: HashMap::new(),
            requires_grad: HashSet::new(),
        }
    }

    /// Clear all recorded operations and stored gradients.
    pub fn clear(&mut self) {
        self.tape.clear();
        self.tensors.clear();
        self.requires_grad.clear();
    }

    /// Register a tensor that participates in a recorded operation.
    ///
    /// Re-registering an ID keeps the gradient already accumulated for it.
    pub fn register_tensor(&mut self, tensor: Tensor) {
        if tensor.requires_grad_enabled() {
            self.requires_grad.insert(tensor.id());
        }
        self.tensors.entry(tensor.id()).or_insert(tensor);
    }

    pub fn record(
        &mut self,
        output_id: TensorId,
        grad_fn: Arc<dyn GradFn>,
        input_ids: Vec<TensorId>,
    ) {
        self.tape.push(TapeEntry {
            output_id,
            grad_fn,
            input_ids,
        });
    }

    #[must_use]
    pub fn get_tensor(&self, id: TensorId) -> Option<&Tensor> {
        self.tensors.get(&id)
    }

    /// Compute gradients via backpropagation.
    ///
    /// 1. Seed `grad_output` for the output tensor
    /// 2. Walk the tape in reverse order
    /// 3. Ask each operation for the gradients of its inputs
    /// 4. Sum gradients of tensors used more than once
    ///
    /// Only leaf tensors that require gradients keep theirs afterwards.
    pub fn backward(&mut self, output_id: TensorId, grad_output: Tensor) {
        let mut grads: HashMap<TensorId, Tensor> = HashMap::new();
        grads.insert(output_id, grad_output);

        for entry in self.tape.iter().rev() {
            let Some(grad_out) = grads.get(&entry.output_id).cloned() else {
                continue;
            };

            let input_grads = entry.grad_fn.backward(&grad_out);

            for (input_id, input_grad) in entry.input_ids.iter().zip(input_grads) {
                if !self.requires_grad.contains(input_id) {
                    continue;
                }
                match grads.get_mut(input_id) {
                    Some(existing) => {
                        for (a, b) in existing.data_mut().iter_mut().zip(input_grad.data()) {
                            *a += b;
                        }
                    }
                    None => {
                        grads.insert(*input_id, input_grad);
                    }
                }
            }
        }

        for (id, grad) in grads {
            if let Some(tensor) = self.tensors.get_mut(&id) {
                if tensor.requires_grad_enabled() && tensor.is_leaf() {
                    tensor.accumulate_grad(grad);
                }
            }
        }
    }

    /// Number of recorded operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tape.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tape.is_empty()
    }

    /// Gradient for a tensor by ID (after backward).
    #[must_use]
    pub fn get_grad(&self, id: TensorId) -> Option<Tensor> {
        self.tensors.get(&id).and_then(|t| t.grad().cloned())
    }

    pub fn clear_grad(&mut self, id: TensorId) {
        if let Some(tensor) = self.tensors.get_mut(&id) {
            tensor.clear_grad();
        }
    }
}

impl Default for ComputationGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::grad_fn::MulScalarBackward;

    #[test]
    fn test_graph_clear() {
        let mut graph = ComputationGraph::new();
        graph.register_tensor(Tensor::from_slice(&[1.0, 2.0]).requires_grad());
        assert!(!graph.tensors.is_empty());

        graph.clear();
        assert!(graph.is_empty());
        assert!(graph.tensors.is_empty());
    }

    #[test]
    fn test_tensor_registration() {
        let mut graph = ComputationGraph::new();
        let t1 = Tensor::from_slice(&[1.0]).requires_grad();
        let t2 = Tensor::from_slice(&[2.0]);
        let (id1, id2) = (t1.id(), t2.id());

        graph.register_tensor(t1);
        graph.register_tensor(t2);

        assert!(graph.get_tensor(id1).is_some());
        assert!(graph.get_tensor(id2).is_some());
        assert!(graph.requires_grad.contains(&id1));
        assert!(!graph.requires_grad.contains(&id2));
    }

    #[test]
    fn test_backward_scales_gradient() {
        let mut graph = ComputationGraph::new();
        let input = Tensor::from_slice(&[1.0, 2.0]).requires_grad();
        let input_id = input.id();
        graph.register_tensor(input);

        let output_id = TensorId::new();
        graph.record(
            output_id,
            Arc::new(MulScalarBackward { scalar: -3.0 }),
            vec![input_id],
        );

        graph.backward(output_id, Tensor::from_slice(&[1.0, 1.0]));

        let grad = graph.get_grad(input_id).expect("leaf gradient");
        assert_eq!(grad.data(), &[-3.0, -3.0]);
    }

    #[test]
    fn test_backward_accumulates_shared_input() {
        let mut graph = ComputationGraph::new();
        let input = Tensor::from_slice(&[1.0]).requires_grad();
        let input_id = input.id();
        graph.register_tensor(input);

        let out = TensorId::new();
        graph.record(out, Arc::new(MulScalarBackward { scalar: 2.0 }), vec![input_id]);
        graph.record(out, Arc::new(MulScalarBackward { scalar: 5.0 }), vec![input_id]);

        graph.backward(out, Tensor::from_slice(&[1.0]));
        assert_eq!(graph.get_grad(input_id).map(|g| g.item()), Some(7.0));
    }

    #[test]
    fn test_backward_unknown_output_is_noop() {
        let mut graph = ComputationGraph::new();
        let t = Tensor::from_slice(&[1.0]).requires_grad();
        let id = t.id();
        graph.register_tensor(t);

        graph.backward(TensorId::new(), Tensor::from_slice(&[1.0]));
        assert!(graph.get_grad(id).is_none());
    }

    #[test]
    fn test_clear_grad() {
        let mut graph = ComputationGraph::new();
        let input = Tensor::from_slice(&[1.0]).requires_grad();
        let id = input.id();
        graph.register_tensor(input);
        let out = TensorId::new();
        graph.record(out, Arc::new(MulScalarBackward { scalar: 1.0 }), vec![id]);
        graph.backward(out, Tensor::from_slice(&[1.0]));
        assert!(graph.get_grad(id).is_some());

        graph.clear_grad(id);
        assert!(graph.get_grad(id).is_none());
    }
}
