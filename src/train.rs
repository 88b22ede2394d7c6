//! Full-batch training loop.

use tracing::{debug, info, warn};

use crate::autograd::{clear_graph, no_grad};
use crate::config::TrainConfig;
use crate::error::{Result, TrafficError};
use crate::evaluate::accuracy;
use crate::graph_data::GraphData;
use crate::model::TrafficGNN;
use crate::nn::{Adam, AdjacencyMatrix, CrossEntropyLoss, Optimizer};

/// Per-epoch training record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    /// Mean cross-entropy over the training nodes
    pub train_losses: Vec<f32>,
    /// Accuracy over the test mask after each step; empty without a test mask
    pub test_accuracies: Vec<f64>,
}

impl TrainingHistory {
    #[must_use]
    pub fn epochs(&self) -> usize {
        self.train_losses.len()
    }

    #[must_use]
    pub fn final_loss(&self) -> Option<f32> {
        self.train_losses.last().copied()
    }

    #[must_use]
    pub fn final_accuracy(&self) -> Option<f64> {
        self.test_accuracies.last().copied()
    }
}

/// Owns the optimizer and loss for one model.
///
/// The optimizer tracks parameters by identity, so a trainer must only be
/// stepped with the model it was built for.
#[derive(Debug)]
pub struct Trainer {
    optimizer: Adam,
    loss_fn: CrossEntropyLoss,
}

impl Trainer {
    #[must_use]
    pub fn new(model: &TrafficGNN, learning_rate: f32) -> Self {
        Self {
            optimizer: Adam::new(&model.parameters(), learning_rate),
            loss_fn: CrossEntropyLoss::new(),
        }
    }

    /// One optimization step over the nodes in `train_idx`.
    ///
    /// Returns the loss before the update. The tape is cleared afterwards.
    pub fn step(
        &mut self,
        model: &mut TrafficGNN,
        data: &GraphData,
        adj: &AdjacencyMatrix,
        train_idx: &[usize],
    ) -> f32 {
        model.train();
        clear_graph();
        self.optimizer.zero_grad();

        let logits = model.forward(&data.x, adj).select_rows(train_idx);
        let targets: Vec<usize> = train_idx.iter().map(|&i| data.y[i]).collect();
        let loss = self.loss_fn.forward(&logits, &targets);
        let value = loss.item();

        loss.backward();
        self.optimizer.step(&mut model.parameters_mut());
        clear_graph();
        value
    }

    #[must_use]
    pub fn optimizer(&self) -> &Adam {
        &self.optimizer
    }
}

/// Train `model` in place for `config.epochs` epochs.
///
/// Uses every node when `data` has no train mask. Test accuracy is recorded
/// only when a test mask exists.
///
/// The architecture fields of `config` (`hidden_channels`, `dropout`,
/// `seed`) are not applied here; they belong to model construction via
/// [`TrainConfig::build_model`]. A model whose architecture disagrees with
/// `config` is trained as built, with a warning.
///
/// # Errors
///
/// Invalid configuration, a feature-width mismatch, a label outside the
/// model's classes, or an empty training set.
pub fn train_model(
    model: &mut TrafficGNN,
    data: &GraphData,
    config: &TrainConfig,
) -> Result<TrainingHistory> {
    config.validate()?;

    let model_config = model.config();
    if data.num_features() != model_config.num_features {
        return Err(TrafficError::DimensionMismatch {
            expected: format!("{} node features", model_config.num_features),
            actual: format!("{} node features", data.num_features()),
        });
    }
    if let Some(&bad) = data.y.iter().find(|&&y| y >= model_config.num_classes) {
        return Err(TrafficError::DimensionMismatch {
            expected: format!("labels below {}", model_config.num_classes),
            actual: format!("label {bad}"),
        });
    }

    if model_config.hidden_channels != config.hidden_channels
        || (model_config.dropout - config.dropout).abs() > f32::EPSILON
    {
        warn!(
            model_hidden = model_config.hidden_channels,
            config_hidden = config.hidden_channels,
            model_dropout = model_config.dropout,
            config_dropout = config.dropout,
            "model architecture differs from training config; training the model as built"
        );
    }

    let train_idx = data
        .train_indices()
        .unwrap_or_else(|| (0..data.num_nodes()).collect());
    if train_idx.is_empty() {
        return Err(TrafficError::invalid_param(
            "train_mask",
            format!("0 of {} nodes", data.num_nodes()),
            "must select at least one node",
        ));
    }
    let adj = data.adjacency();
    let test_mask = data.test_mask.as_deref();

    info!(
        epochs = config.epochs,
        train_nodes = train_idx.len(),
        parameters = model.num_parameters(),
        "training"
    );

    let mut trainer = Trainer::new(model, config.learning_rate);
    let mut history = TrainingHistory::default();

    for epoch in 1..=config.epochs {
        let loss = trainer.step(model, data, &adj, &train_idx);
        history.train_losses.push(loss);

        let acc = test_mask.map(|mask| {
            model.eval();
            let pred = no_grad(|| model.forward(&data.x, &adj)).argmax_rows();
            accuracy(&pred, &data.y, Some(mask))
        });
        if let Some(acc) = acc {
            history.test_accuracies.push(acc);
        }

        if config.log_every > 0 && epoch % config.log_every == 0 {
            match acc {
                Some(acc) => info!("Epoch: {epoch:03}, Loss: {loss:.4}, Test Acc: {acc:.4}"),
                None => info!("Epoch: {epoch:03}, Loss: {loss:.4}"),
            }
        } else {
            debug!(epoch, loss, "step");
        }
    }

    model.eval();
    Ok(history)
}
