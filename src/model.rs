//! The traffic congestion classifier.
//!
//! ```text
//! x ─► GCN ─► ReLU ─► Dropout ─► GCN ─► ReLU ─► GAT ─► ReLU ─► Linear ─► logits
//! ```
//!
//! Checkpoints are `SafeTensors` files whose `__metadata__` holds the
//! [`ModelConfig`] as JSON, so [`TrafficGNN::load`] needs nothing but a path.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::autograd::Tensor;
use crate::error::{Result, TrafficError};
use crate::graph_data::GraphData;
use crate::nn::serialize::{load_state_dict_into, state_dict};
use crate::nn::{
    AdjacencyMatrix, Dropout, GATConv, GCNConv, Linear, MessagePassing, Module, StateDict,
};
use crate::serialization::{load_safetensors, save_safetensors, UserMetadata};

/// Checkpoint format tag stored under `format`.
pub const CHECKPOINT_FORMAT: &str = "traffic-gnn/1";

/// Default checkpoint path.
pub const DEFAULT_CHECKPOINT: &str = "traffic_gnn_model.safetensors";

const META_FORMAT: &str = "format";
const META_CONFIG: &str = "config";

/// Layer sizes and regularization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub num_features: usize,
    #[serde(default = "default_hidden_channels")]
    pub hidden_channels: usize,
    pub num_classes: usize,
    #[serde(default = "default_dropout")]
    pub dropout: f32,
}

fn default_hidden_channels() -> usize {
    64
}

fn default_dropout() -> f32 {
    0.2
}

impl ModelConfig {
    /// Config with the default hidden width and dropout.
    #[must_use]
    pub fn new(num_features: usize, num_classes: usize) -> Self {
        Self {
            num_features,
            hidden_channels: default_hidden_channels(),
            num_classes,
            dropout: default_dropout(),
        }
    }

    #[must_use]
    pub fn hidden_channels(mut self, hidden: usize) -> Self {
        self.hidden_channels = hidden;
        self
    }

    #[must_use]
    pub fn dropout(mut self, p: f32) -> Self {
        self.dropout = p;
        self
    }

    /// # Errors
    ///
    /// [`TrafficError::InvalidHyperparameter`] for zero-sized layers or a
    /// dropout probability outside `[0, 1)`.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("num_features", self.num_features),
            ("hidden_channels", self.hidden_channels),
            ("num_classes", self.num_classes),
        ] {
            if value == 0 {
                return Err(TrafficError::invalid_param(name, value, "must be positive"));
            }
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(TrafficError::invalid_param(
                "dropout",
                self.dropout,
                "must be in [0, 1)",
            ));
        }
        Ok(())
    }
}

/// Graph neural network classifying each intersection's congestion level.
///
/// ```
/// use traffic_gnn::autograd::Tensor;
/// use traffic_gnn::model::{ModelConfig, TrafficGNN};
/// use traffic_gnn::nn::AdjacencyMatrix;
///
/// let mut model = TrafficGNN::with_seed(ModelConfig::new(4, 3).hidden_channels(8), Some(1)).unwrap();
/// model.eval();
/// let adj = AdjacencyMatrix::from_edge_index(&[[0, 1]], 2).to_undirected();
/// let logits = model.forward(&Tensor::zeros(&[2, 4]), &adj);
/// assert_eq!(logits.shape(), &[2, 3]);
/// ```
pub struct TrafficGNN {
    config: ModelConfig,
    conv1: GCNConv,
    dropout: Dropout,
    conv2: GCNConv,
    attention: GATConv,
    classifier: Linear,
}

impl std::fmt::Debug for TrafficGNN {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficGNN")
            .field("config", &self.config)
            .field("training", &self.dropout.training())
            .finish_non_exhaustive()
    }
}

impl TrafficGNN {
    /// # Errors
    ///
    /// See [`ModelConfig::validate`].
    pub fn new(config: ModelConfig) -> Result<Self> {
        Self::with_seed(config, None)
    }

    /// Build a model whose initialization and dropout masks derive from `seed`.
    ///
    /// # Errors
    ///
    /// See [`ModelConfig::validate`].
    pub fn with_seed(config: ModelConfig, seed: Option<u64>) -> Result<Self> {
        config.validate()?;
        let sub = |k: u64| seed.map(|s| s.wrapping_mul(31).wrapping_add(k));
        let hidden = config.hidden_channels;

        Ok(Self {
            config,
            conv1: GCNConv::with_seed(config.num_features, hidden, sub(1)),
            dropout: Dropout::with_seed(config.dropout, sub(2)),
            conv2: GCNConv::with_seed(hidden, hidden, sub(3)),
            attention: GATConv::with_seed(hidden, hidden, sub(4)),
            classifier: Linear::with_seed(hidden, config.num_classes, sub(5)),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Per-node logits `[num_nodes, num_classes]`.
    ///
    /// # Panics
    ///
    /// Panics if `x` does not have `num_features` columns.
    #[must_use]
    pub fn forward(&self, x: &Tensor, adj: &AdjacencyMatrix) -> Tensor {
        let h = self.conv1.forward(x, adj).relu();
        let h = self.dropout.forward(&h);
        let h = self.conv2.forward(&h, adj).relu();
        let h = self.attention.forward(&h, adj).relu();
        self.classifier.forward(&h)
    }

    /// Forward over a graph container.
    ///
    /// # Errors
    ///
    /// [`TrafficError::DimensionMismatch`] if the feature width differs from
    /// the model's input width.
    pub fn forward_graph(&self, data: &GraphData) -> Result<Tensor> {
        if data.num_features() != self.config.num_features {
            return Err(TrafficError::DimensionMismatch {
                expected: format!("{} node features", self.config.num_features),
                actual: format!("{} node features", data.num_features()),
            });
        }
        Ok(self.forward(&data.x, &data.adjacency()))
    }

    pub fn train(&mut self) {
        self.dropout.train();
    }

    pub fn eval(&mut self) {
        self.dropout.eval();
    }

    #[must_use]
    pub fn training(&self) -> bool {
        self.dropout.training()
    }

    /// Learnable tensors in a fixed order.
    #[must_use]
    pub fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.conv1.parameters();
        params.extend(self.conv2.parameters());
        params.extend(self.attention.parameters());
        params.extend(self.classifier.parameters());
        params
    }

    /// Same order as [`TrafficGNN::parameters`].
    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.conv1.parameters_mut();
        params.extend(self.conv2.parameters_mut());
        params.extend(self.attention.parameters_mut());
        params.extend(self.classifier.parameters_mut());
        params
    }

    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.numel()).sum()
    }

    /// Dotted parameter names, matching [`TrafficGNN::parameters`].
    #[must_use]
    pub fn parameter_names() -> Vec<String> {
        let mut names = Vec::new();
        for (layer, fields) in [
            ("conv1", &["weight", "bias"][..]),
            ("conv2", &["weight", "bias"][..]),
            ("attention", &["weight", "att_src", "att_dst", "bias"][..]),
            ("classifier", &["weight", "bias"][..]),
        ] {
            names.extend(fields.iter().map(|f| format!("{layer}.{f}")));
        }
        names
    }

    #[must_use]
    pub fn state_dict(&self) -> StateDict {
        state_dict(Self::parameter_names().into_iter().zip(self.parameters()))
    }

    /// Overwrite parameters in place.
    ///
    /// # Errors
    ///
    /// See [`load_state_dict_into`].
    pub fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        load_state_dict_into(Self::parameter_names().into_iter().zip(self.parameters_mut()), state)
    }

    /// Write a checkpoint.
    ///
    /// # Errors
    ///
    /// I/O or serialization failures.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config = serde_json::to_string(&self.config)
            .map_err(|e| TrafficError::Checkpoint(format!("encoding config: {e}")))?;
        let mut metadata = UserMetadata::new();
        metadata.insert(META_FORMAT.to_string(), CHECKPOINT_FORMAT.to_string());
        metadata.insert(META_CONFIG.to_string(), config);

        save_safetensors(path.as_ref(), &self.state_dict(), &metadata)?;
        info!(path = %path.as_ref().display(), "saved model");
        Ok(())
    }

    /// Read the configuration stored in a checkpoint without loading weights.
    ///
    /// # Errors
    ///
    /// [`TrafficError::Checkpoint`] for a foreign or damaged file.
    pub fn read_config<P: AsRef<Path>>(path: P) -> Result<ModelConfig> {
        let loaded = load_safetensors(path)?;
        config_from_metadata(&loaded.user_metadata)
    }

    /// Rebuild a model from a checkpoint, in eval mode.
    ///
    /// # Errors
    ///
    /// [`TrafficError::Checkpoint`] for a foreign or damaged file, or
    /// [`TrafficError::DimensionMismatch`] when stored shapes disagree with
    /// the stored configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let loaded = load_safetensors(path.as_ref())?;
        let config = config_from_metadata(&loaded.user_metadata)?;

        let mut model = Self::new(config)?;
        model.load_state_dict(&loaded.tensors()?)?;
        model.eval();
        debug!(path = %path.as_ref().display(), ?config, "loaded model");
        Ok(model)
    }
}

fn config_from_metadata(metadata: &UserMetadata) -> Result<ModelConfig> {
    match metadata.get(META_FORMAT).map(String::as_str) {
        Some(CHECKPOINT_FORMAT) => {}
        Some(other) => {
            return Err(TrafficError::Checkpoint(format!(
                "unsupported checkpoint format '{other}'"
            )))
        }
        None => return Err(TrafficError::Checkpoint("not a traffic-gnn checkpoint".to_string())),
    }
    let raw = metadata
        .get(META_CONFIG)
        .ok_or_else(|| TrafficError::Checkpoint("checkpoint has no model config".to_string()))?;
    let config: ModelConfig = serde_json::from_str(raw)
        .map_err(|e| TrafficError::Checkpoint(format!("invalid model config: {e}")))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{clear_graph, no_grad};
    use crate::nn::{Adam, CrossEntropyLoss, Optimizer};

    fn small_config() -> ModelConfig {
        ModelConfig::new(3, 2).hidden_channels(4)
    }

    fn path_graph(n: usize) -> AdjacencyMatrix {
        let edges: Vec<[usize; 2]> = (1..n).map(|i| [i - 1, i]).collect();
        AdjacencyMatrix::from_edge_index(&edges, n).to_undirected()
    }

    #[test]
    fn test_config_validation() {
        assert!(small_config().validate().is_ok());
        assert!(ModelConfig::new(0, 2).validate().is_err());
        assert!(ModelConfig::new(3, 0).validate().is_err());
        assert!(small_config().dropout(1.0).validate().is_err());
        assert!(TrafficGNN::new(small_config().hidden_channels(0)).is_err());
    }

    #[test]
    fn test_config_json_defaults() {
        let cfg: ModelConfig =
            serde_json::from_str(r#"{"num_features": 6, "num_classes": 4}"#).expect("json");
        assert_eq!(cfg, ModelConfig::new(6, 4));
        assert_eq!(cfg.hidden_channels, 64);
        assert!((cfg.dropout - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_parameter_names_match_parameters() {
        let model = TrafficGNN::with_seed(small_config(), Some(0)).expect("model");
        let names = TrafficGNN::parameter_names();
        assert_eq!(names.len(), model.parameters().len());
        assert_eq!(names[4], "attention.weight");

        let state = model.state_dict();
        assert_eq!(state["conv1.weight"].1, vec![3, 4]);
        assert_eq!(state["attention.att_src"].1, vec![4]);
        assert_eq!(state["classifier.weight"].1, vec![2, 4]);
        // 3·4+4 + 4·4+4 + 4·4+4+4+4 + 2·4+2
        assert_eq!(model.num_parameters(), 16 + 20 + 28 + 10);
    }

    #[test]
    fn test_eval_forward_is_deterministic() {
        let mut model = TrafficGNN::with_seed(small_config().dropout(0.5), Some(3)).expect("model");
        model.eval();
        assert!(!model.training());

        let x = Tensor::from_vec((0..15).map(|i| i as f32 * 0.1).collect(), &[5, 3]);
        let adj = path_graph(5);
        let a = no_grad(|| model.forward(&x, &adj));
        let b = no_grad(|| model.forward(&x, &adj));
        assert_eq!(a.shape(), &[5, 2]);
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn test_seeded_models_match() {
        let a = TrafficGNN::with_seed(small_config(), Some(9)).expect("model");
        let b = TrafficGNN::with_seed(small_config(), Some(9)).expect("model");
        assert_eq!(a.state_dict(), b.state_dict());
    }

    #[test]
    fn test_forward_graph_checks_width() {
        let model = TrafficGNN::with_seed(small_config(), Some(0)).expect("model");
        let data = GraphData::new(Tensor::zeros(&[2, 5]), vec![[0, 1]], None, vec![0, 1]).expect("graph");
        assert!(matches!(
            model.forward_graph(&data),
            Err(TrafficError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_every_parameter_receives_gradient() {
        clear_graph();
        let mut model = TrafficGNN::with_seed(small_config().dropout(0.0), Some(5)).expect("model");
        model.train();
        let x = Tensor::from_vec((0..12).map(|i| (i as f32 * 0.37).sin()).collect(), &[4, 3]);
        let logits = model.forward(&x, &path_graph(4));
        CrossEntropyLoss::new().forward(&logits, &[0, 1, 1, 0]).backward();

        for (name, p) in TrafficGNN::parameter_names().iter().zip(model.parameters()) {
            assert!(
                crate::autograd::get_grad(p.id()).is_some(),
                "no gradient for {name}"
            );
        }
        clear_graph();
    }

    #[test]
    fn test_overfits_tiny_graph() {
        let mut model = TrafficGNN::with_seed(small_config().hidden_channels(8).dropout(0.0), Some(2))
            .expect("model");
        model.train();
        let x = Tensor::from_vec(
            vec![1.0, 0.0, 0.0, 0.9, 0.1, 0.0, 0.0, 0.0, 1.0, 0.0, 0.1, 0.9],
            &[4, 3],
        );
        let adj = AdjacencyMatrix::from_edge_index(&[[0, 1], [2, 3]], 4).to_undirected();
        let targets = [0, 0, 1, 1];
        let mut adam = Adam::new(&model.parameters(), 0.05);
        let loss_fn = CrossEntropyLoss::new();

        let mut first = None;
        let mut last = 0.0;
        for _ in 0..200 {
            clear_graph();
            adam.zero_grad();
            let loss = loss_fn.forward(&model.forward(&x, &adj), &targets);
            last = loss.item();
            first.get_or_insert(last);
            loss.backward();
            adam.step(&mut model.parameters_mut());
        }
        clear_graph();

        let first = first.expect("ran");
        assert!(last < first * 0.8, "loss {first} -> {last}");
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("model.safetensors");

        let model = TrafficGNN::with_seed(small_config(), Some(4)).expect("model");
        model.save(&path).expect("save");

        assert_eq!(TrafficGNN::read_config(&path).expect("config"), small_config());
        let restored = TrafficGNN::load(&path).expect("load");
        assert!(!restored.training());
        assert_eq!(restored.state_dict(), model.state_dict());
    }

    #[test]
    fn test_load_rejects_foreign_checkpoint() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("other.safetensors");
        let mut tensors = StateDict::new();
        tensors.insert("w".to_string(), (vec![1.0], vec![1]));
        save_safetensors(&path, &tensors, &UserMetadata::new()).expect("save");

        assert!(matches!(
            TrafficGNN::load(&path),
            Err(TrafficError::Checkpoint(_))
        ));
    }
}
