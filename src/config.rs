//! Training configuration.
//!
//! Every field has a default, so a JSON file only needs the values it
//! changes:
//!
//! ```json
//! { "epochs": 50, "seed": 42 }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrafficError};
use crate::model::{ModelConfig, TrafficGNN};

/// Hyperparameters for a training run.
///
/// `hidden_channels`, `dropout` and `seed` shape the model itself; build it
/// with [`TrainConfig::build_model`]. The remaining fields drive
/// [`crate::train::train_model`] and the split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainConfig {
    pub epochs: usize,
    pub learning_rate: f32,
    pub hidden_channels: usize,
    pub dropout: f32,
    /// Fraction of nodes placed in the training mask
    pub train_ratio: f64,
    /// Seeds initialization, dropout and the split when set
    pub seed: Option<u64>,
    /// Log a progress line every this many epochs (0 disables)
    pub log_every: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 200,
            learning_rate: 0.01,
            hidden_channels: 64,
            dropout: 0.2,
            train_ratio: 0.8,
            seed: None,
            log_every: 10,
        }
    }
}

impl TrainConfig {
    /// Read and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// [`TrafficError::Config`] when the file cannot be read or parsed, or
    /// any error from [`TrainConfig::validate`].
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_error = |message: String| TrafficError::Config {
            path: path.to_path_buf(),
            message,
        };

        let text = std::fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| config_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Model architecture for `num_features` inputs and `num_classes` outputs.
    #[must_use]
    pub fn model_config(&self, num_features: usize, num_classes: usize) -> ModelConfig {
        ModelConfig::new(num_features, num_classes)
            .hidden_channels(self.hidden_channels)
            .dropout(self.dropout)
    }

    /// Construct a model seeded with `self.seed`.
    ///
    /// # Errors
    ///
    /// Any error from [`TrafficGNN::with_seed`].
    pub fn build_model(&self, num_features: usize, num_classes: usize) -> Result<TrafficGNN> {
        TrafficGNN::with_seed(self.model_config(num_features, num_classes), self.seed)
    }

    /// # Errors
    ///
    /// [`TrafficError::InvalidHyperparameter`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(TrafficError::invalid_param("epochs", self.epochs, "must be positive"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(TrafficError::invalid_param(
                "learning_rate",
                self.learning_rate,
                "must be positive",
            ));
        }
        if self.hidden_channels == 0 {
            return Err(TrafficError::invalid_param(
                "hidden_channels",
                self.hidden_channels,
                "must be positive",
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(TrafficError::invalid_param("dropout", self.dropout, "must be in [0, 1)"));
        }
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(TrafficError::invalid_param(
                "train_ratio",
                self.train_ratio,
                "must be in (0, 1)",
            ));
        }
        Ok(())
    }
}
