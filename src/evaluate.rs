//! Inference and accuracy.

use std::fmt;

use crate::autograd::no_grad;
use crate::error::{Result, TrafficError};
use crate::graph_data::GraphData;
use crate::model::TrafficGNN;

/// Predicted class per node.
///
/// Switches the model to eval mode and runs without gradient tracking.
///
/// # Errors
///
/// See [`TrafficGNN::forward_graph`].
pub fn predict(model: &mut TrafficGNN, data: &GraphData) -> Result<Vec<usize>> {
    model.eval();
    let logits = no_grad(|| model.forward_graph(data))?;
    Ok(logits.argmax_rows())
}

/// Accuracy over the test mask.
///
/// # Errors
///
/// [`TrafficError::DimensionMismatch`] if `data` has no test mask, or any
/// error from [`predict`].
pub fn evaluate_model(model: &mut TrafficGNN, data: &GraphData) -> Result<f64> {
    let mask = data.test_mask.as_deref().ok_or_else(|| TrafficError::DimensionMismatch {
        expected: "graph with a test mask".to_string(),
        actual: "no test mask".to_string(),
    })?;
    let pred = predict(model, data)?;
    Ok(accuracy(&pred, &data.y, Some(mask)))
}

/// Fraction of selected nodes predicted correctly.
///
/// Without a mask every node counts. An empty selection scores 0.
///
/// ```
/// use traffic_gnn::evaluate::accuracy;
///
/// assert_eq!(accuracy(&[0, 1, 2], &[0, 1, 1], None), 2.0 / 3.0);
/// assert_eq!(accuracy(&[0, 1, 2], &[0, 1, 1], Some(&[false, false, true][..])), 0.0);
/// assert_eq!(accuracy(&[0], &[0], Some(&[false][..])), 0.0);
/// ```
#[must_use]
pub fn accuracy(pred: &[usize], labels: &[usize], mask: Option<&[bool]>) -> f64 {
    let mut total = 0usize;
    let mut correct = 0usize;
    for (i, (p, y)) in pred.iter().zip(labels).enumerate() {
        if mask.map_or(true, |m| m.get(i).copied().unwrap_or(false)) {
            total += 1;
            correct += usize::from(p == y);
        }
    }
    if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    }
}

/// Distribution of predicted congestion levels.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionStats {
    pub num_nodes: usize,
    /// Node count per level, indexed by level
    pub counts: Vec<usize>,
}

impl PredictionStats {
    /// Tally predictions, reporting at least `num_classes` levels.
    #[must_use]
    pub fn from_predictions(pred: &[usize], num_classes: usize) -> Self {
        let levels = pred.iter().max().map_or(0, |&m| m + 1).max(num_classes);
        let mut counts = vec![0; levels];
        for &p in pred {
            counts[p] += 1;
        }
        Self {
            num_nodes: pred.len(),
            counts,
        }
    }

    /// Percentage of nodes at `level` (0 when there are no nodes).
    #[must_use]
    pub fn percentage(&self, level: usize) -> f64 {
        if self.num_nodes == 0 {
            return 0.0;
        }
        let count = self.counts.get(level).copied().unwrap_or(0);
        100.0 * count as f64 / self.num_nodes as f64
    }
}

impl fmt::Display for PredictionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of nodes: {}", self.num_nodes)?;
        writeln!(f, "Congestion level distribution:")?;
        for (level, count) in self.counts.iter().enumerate() {
            writeln!(
                f,
                "  Level {level}: {count} nodes ({:.1}%)",
                self.percentage(level)
            )?;
        }
        Ok(())
    }
}
