//! traffic-gnn: congestion prediction on road networks with graph neural
//! networks, in pure Rust.
//!
//! Intersections become graph nodes carrying aggregated traffic statistics;
//! road segments become edges. A two-layer graph convolution stack followed
//! by a graph attention layer and a linear classifier predicts a congestion
//! level for every intersection.
//!
//! # Quick Start
//!
//! ```
//! use traffic_gnn::prelude::*;
//!
//! let data = generate_sample_data(
//!     SampleSpec { num_nodes: 30, num_features: 4, num_classes: 3 },
//!     Some(42),
//! ).unwrap();
//!
//! let config = ModelConfig::new(data.num_features(), 3).hidden_channels(8);
//! let mut model = TrafficGNN::with_seed(config, Some(42)).unwrap();
//!
//! let train = TrainConfig { epochs: 5, ..TrainConfig::default() };
//! let history = train_model(&mut model, &data, &train).unwrap();
//! assert_eq!(history.epochs(), 5);
//!
//! let predictions = predict(&mut model, &data).unwrap();
//! assert_eq!(predictions.len(), 30);
//! ```
//!
//! # Modules
//!
//! - [`data`]: CSV ingestion, road graph, feature scaling
//! - [`graph_data`]: The graph container consumed by the model
//! - [`autograd`]: Tape-based reverse-mode automatic differentiation
//! - [`nn`]: Layers, graph convolutions, loss and optimizer
//! - [`model`]: The `TrafficGNN` classifier and its checkpoints
//! - [`train`]: Full-batch training loop
//! - [`evaluate`]: Inference, accuracy and prediction statistics
//! - [`viz`]: Training curves and prediction maps
//! - [`synthetic`]: Random graphs for demos
//! - [`serialization`]: `SafeTensors` reading and writing
//! - [`config`]: Training hyperparameters

pub mod autograd;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod graph_data;
pub mod model;
pub mod nn;
pub mod prelude;
pub mod serialization;
pub mod synthetic;
pub mod train;
pub mod viz;

pub use error::{Result, TrafficError};
pub use graph_data::GraphData;
