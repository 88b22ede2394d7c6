//! Neural network building blocks for the traffic model.
//!
//! - **Layers**: [`Linear`], [`Dropout`]
//! - **Graph layers**: [`GCNConv`], [`GATConv`] over an [`AdjacencyMatrix`]
//! - **Loss**: [`CrossEntropyLoss`]
//! - **Optimizer**: [`Adam`]
//!
//! # References
//!
//! - Paszke, A., et al. (2019). `PyTorch`: An imperative style, high-performance
//!   deep learning library. `NeurIPS`.
//! - Glorot, X., & Bengio, Y. (2010). Understanding the difficulty of training
//!   deep feedforward neural networks. AISTATS.

mod dropout;
pub mod gnn;
pub mod init;
mod linear;
pub mod loss;
mod module;
pub mod optim;
pub mod serialize;

pub use dropout::Dropout;
pub use gnn::{AdjacencyMatrix, GATConv, GCNConv, MessagePassing};
pub use linear::Linear;
pub use loss::{CrossEntropyLoss, Reduction};
pub use module::Module;
pub use optim::{Adam, Optimizer};
pub use serialize::StateDict;
