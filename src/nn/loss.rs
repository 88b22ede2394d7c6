//! Classification loss.

use std::sync::Arc;

use crate::autograd::grad_fn::GradFn;
use crate::autograd::{record_op, Tensor};

/// How per-sample losses are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    /// Mean over samples (default)
    #[default]
    Mean,
    Sum,
}

/// Cross-Entropy Loss for classification.
///
/// Combines log_softmax and negative log likelihood for numerical stability:
/// ```text
/// loss = -log(softmax(logits)[target_class])
/// ```
///
/// ```
/// use traffic_gnn::autograd::Tensor;
/// use traffic_gnn::nn::CrossEntropyLoss;
///
/// let logits = Tensor::new(&[0.0, 0.0, 0.0, 0.0], &[2, 2]);
/// let loss = CrossEntropyLoss::new().forward(&logits, &[0, 1]);
/// assert!((loss.item() - std::f32::consts::LN_2).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrossEntropyLoss {
    reduction: Reduction,
}

impl CrossEntropyLoss {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_reduction(reduction: Reduction) -> Self {
        Self { reduction }
    }

    /// Compute cross-entropy loss.
    ///
    /// * `logits` - Shape [batch, num_classes]
    /// * `targets` - One class index per row
    ///
    /// An empty batch yields a loss of 0.
    ///
    /// # Panics
    ///
    /// Panics if shapes disagree or a target is out of range.
    #[must_use]
    pub fn forward(&self, logits: &Tensor, targets: &[usize]) -> Tensor {
        assert_eq!(logits.ndim(), 2, "Logits must be 2D [batch, classes]");
        assert_eq!(logits.shape()[0], targets.len(), "Batch sizes must match");

        let batch_size = targets.len();
        let num_classes = logits.shape()[1];
        let softmax = softmax_rows(logits.data(), num_classes);

        let mut total = 0.0f32;
        for (b, &target) in targets.iter().enumerate() {
            assert!(
                target < num_classes,
                "Target class {target} out of bounds for {num_classes} classes"
            );
            total -= log_softmax_at(logits.row(b), target);
        }

        let scale = match self.reduction {
            Reduction::Mean if batch_size > 0 => 1.0 / batch_size as f32,
            Reduction::Mean => 0.0,
            Reduction::Sum => 1.0,
        };

        let mut loss = Tensor::new(&[total * scale], &[1]);
        record_op(
            &mut loss,
            Arc::new(CrossEntropyBackward {
                softmax,
                targets: targets.to_vec(),
                num_classes,
                scale,
            }),
            &[logits],
        );
        loss
    }
}

/// ∂L/∂logits = scale · (softmax − onehot(target))
struct CrossEntropyBackward {
    softmax: Vec<f32>,
    targets: Vec<usize>,
    num_classes: usize,
    scale: f32,
}

impl GradFn for CrossEntropyBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let g = grad_output.item() * self.scale;
        let mut grad = self.softmax.clone();
        for (b, &target) in self.targets.iter().enumerate() {
            grad[b * self.num_classes + target] -= 1.0;
        }
        for v in &mut grad {
            *v *= g;
        }
        vec![Tensor::from_vec(grad, &[self.targets.len(), self.num_classes])]
    }

    fn name(&self) -> &'static str {
        "CrossEntropyBackward"
    }
}

fn softmax_rows(data: &[f32], cols: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(data.len());
    for row in data.chunks(cols) {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let start = out.len();
        out.extend(row.iter().map(|&x| (x - max).exp()));
        let sum: f32 = out[start..].iter().sum();
        for v in &mut out[start..] {
            *v /= sum;
        }
    }
    out
}

fn log_softmax_at(row: &[f32], index: usize) -> f32 {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let log_sum: f32 = row.iter().map(|&x| (x - max).exp()).sum::<f32>().ln();
    row[index] - max - log_sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{clear_graph, get_grad, no_grad};

    #[test]
    fn test_confident_prediction_has_low_loss() {
        let logits = Tensor::new(&[10.0, 0.0, 0.0, 0.0, 10.0, 0.0], &[2, 3]);
        let loss = CrossEntropyLoss::new().forward(&logits, &[0, 1]);
        assert!(loss.item() < 1e-3);

        let wrong = CrossEntropyLoss::new().forward(&logits, &[2, 2]);
        assert!(wrong.item() > 9.0);
    }

    #[test]
    fn test_sum_reduction() {
        let logits = Tensor::new(&[0.0, 0.0, 0.0, 0.0], &[2, 2]);
        let loss = CrossEntropyLoss::with_reduction(Reduction::Sum).forward(&logits, &[0, 1]);
        assert!((loss.item() - 2.0 * std::f32::consts::LN_2).abs() < 1e-6);
    }

    #[test]
    fn test_large_logits_are_stable() {
        let logits = Tensor::new(&[1000.0, -1000.0], &[1, 2]);
        let loss = CrossEntropyLoss::new().forward(&logits, &[1]);
        assert!(loss.item().is_finite());
        assert!((loss.item() - 2000.0).abs() < 1e-2);
    }

    #[test]
    fn test_empty_batch_is_zero() {
        let logits = Tensor::zeros(&[0, 3]);
        let loss = CrossEntropyLoss::new().forward(&logits, &[]);
        assert_eq!(loss.item(), 0.0);
    }

    #[test]
    fn test_gradient_matches_numerical() {
        clear_graph();
        let values = [0.3, -1.2, 0.8, 2.0, 0.1, -0.5];
        let targets = [2, 0];
        let logits = Tensor::new(&values, &[2, 3]).requires_grad();
        CrossEntropyLoss::new().forward(&logits, &targets).backward();
        let analytical = get_grad(logits.id()).expect("grad");

        let eps = 1e-2;
        for i in 0..values.len() {
            let mut plus = values;
            let mut minus = values;
            plus[i] += eps;
            minus[i] -= eps;
            let f = |v: &[f32]| {
                no_grad(|| CrossEntropyLoss::new().forward(&Tensor::new(v, &[2, 3]), &targets).item())
            };
            let numerical = (f(&plus) - f(&minus)) / (2.0 * eps);
            assert!(
                (analytical.data()[i] - numerical).abs() < 1e-3,
                "index {i}: {} vs {numerical}",
                analytical.data()[i]
            );
        }
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_target_out_of_range() {
        let logits = Tensor::zeros(&[1, 2]);
        let _ = CrossEntropyLoss::new().forward(&logits, &[5]);
    }
}
