//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use traffic_gnn::prelude::*;
//! ```

pub use crate::autograd::{no_grad, Tensor};
pub use crate::config::TrainConfig;
pub use crate::data::{Position, StandardScaler, TrafficDataLoader};
pub use crate::error::{Result, TrafficError};
pub use crate::evaluate::{accuracy, evaluate_model, predict, PredictionStats};
pub use crate::graph_data::GraphData;
pub use crate::model::{ModelConfig, TrafficGNN};
pub use crate::synthetic::{generate_sample_data, SampleSpec};
pub use crate::train::{train_model, Trainer, TrainingHistory};
pub use crate::viz::{plot_predictions, plot_training_progress};
