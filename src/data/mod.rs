//! Traffic and road-network ingestion.
//!
//! [`TrafficDataLoader`] reads the two input tables, builds a [`RoadGraph`],
//! engineers per-intersection features and standardizes them with a
//! [`StandardScaler`].

mod loader;
mod road_graph;
mod scaler;

pub use loader::{
    LoadedTraffic, RoadRecord, TrafficDataLoader, TrafficRecord, FEATURE_NAMES, NUM_NODE_FEATURES,
};
pub use road_graph::{Position, RoadGraph};
pub use scaler::StandardScaler;
