//! CSV ingestion and feature engineering for road networks.
//!
//! # Input tables
//!
//! - traffic: `intersection_id, traffic_volume, average_speed, congestion_level`
//!   (many rows per intersection)
//! - road network: `intersection_id, longitude, latitude, from_intersection,
//!   to_intersection, distance` (one row declares a node and a segment)
//!
//! # Node features
//!
//! `[mean volume, mean speed, mean congestion, degree, longitude, latitude]`,
//! standardized per column over all nodes.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;
use tracing::{debug, info};

use super::road_graph::{Position, RoadGraph};
use super::scaler::StandardScaler;
use crate::autograd::Tensor;
use crate::error::{Result, TrafficError};
use crate::graph_data::GraphData;

/// Number of engineered features per node.
pub const NUM_NODE_FEATURES: usize = 6;

/// Feature column names, in matrix order.
pub const FEATURE_NAMES: [&str; NUM_NODE_FEATURES] = [
    "traffic_volume",
    "average_speed",
    "congestion_level",
    "degree",
    "longitude",
    "latitude",
];

const TRAFFIC_COLUMNS: [&str; 4] = [
    "intersection_id",
    "traffic_volume",
    "average_speed",
    "congestion_level",
];

const ROAD_COLUMNS: [&str; 6] = [
    "intersection_id",
    "longitude",
    "latitude",
    "from_intersection",
    "to_intersection",
    "distance",
];

/// One traffic measurement.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrafficRecord {
    pub intersection_id: String,
    pub traffic_volume: f64,
    pub average_speed: f64,
    pub congestion_level: f64,
}

/// One road-network row: a node declaration plus a segment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoadRecord {
    pub intersection_id: String,
    pub longitude: f64,
    pub latitude: f64,
    pub from_intersection: String,
    pub to_intersection: String,
    pub distance: f64,
}

/// Both input tables, as read.
#[derive(Debug, Clone, Default)]
pub struct LoadedTraffic {
    pub traffic: Vec<TrafficRecord>,
    pub roads: Vec<RoadRecord>,
}

/// Builds [`GraphData`] from traffic and road-network tables.
#[derive(Debug, Clone, Default)]
pub struct TrafficDataLoader {
    scaler: StandardScaler,
    seed: Option<u64>,
}

impl TrafficDataLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make train/test splits reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Scaler fitted by the last [`TrafficDataLoader::create_graph_data`].
    #[must_use]
    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Read both CSV files.
    ///
    /// # Errors
    ///
    /// I/O and CSV errors, or [`TrafficError::MissingColumn`].
    pub fn load_traffic_data<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        traffic_path: P,
        roads_path: Q,
    ) -> Result<LoadedTraffic> {
        let traffic = read_table(
            csv_reader().from_path(traffic_path.as_ref())?,
            "traffic",
            &TRAFFIC_COLUMNS,
        )?;
        let roads = read_table(
            csv_reader().from_path(roads_path.as_ref())?,
            "road network",
            &ROAD_COLUMNS,
        )?;
        info!(
            traffic_rows = traffic.len(),
            road_rows = roads.len(),
            "loaded traffic data"
        );
        Ok(LoadedTraffic { traffic, roads })
    }

    /// Read both tables from in-memory readers.
    ///
    /// # Errors
    ///
    /// Same as [`TrafficDataLoader::load_traffic_data`].
    pub fn load_from_readers<R: Read, S: Read>(&self, traffic: R, roads: S) -> Result<LoadedTraffic> {
        Ok(LoadedTraffic {
            traffic: read_table(csv_reader().from_reader(traffic), "traffic", &TRAFFIC_COLUMNS)?,
            roads: read_table(csv_reader().from_reader(roads), "road network", &ROAD_COLUMNS)?,
        })
    }

    /// Build the road graph declared by the road-network rows.
    ///
    /// # Errors
    ///
    /// [`TrafficError::EmptyGraph`] or [`TrafficError::UnknownIntersection`].
    pub fn build_graph(&self, roads: &[RoadRecord]) -> Result<RoadGraph> {
        let mut graph = RoadGraph::new();
        for row in roads {
            graph.add_node(
                &row.intersection_id,
                Position {
                    longitude: row.longitude,
                    latitude: row.latitude,
                },
            );
        }
        if graph.is_empty() {
            return Err(TrafficError::EmptyGraph);
        }
        for row in roads {
            graph.add_edge(&row.from_intersection, &row.to_intersection, row.distance)?;
        }
        Ok(graph)
    }

    /// Assemble standardized node features, edges, weights and labels.
    ///
    /// Refits the scaler on every call.
    ///
    /// # Errors
    ///
    /// Graph construction errors, or [`TrafficError::MissingTraffic`] for a
    /// node without measurements.
    pub fn create_graph_data(&mut self, loaded: &LoadedTraffic) -> Result<GraphData> {
        let graph = self.build_graph(&loaded.roads)?;
        let n = graph.num_nodes();

        let mut sums: HashMap<usize, ([f64; 3], usize)> = HashMap::new();
        for row in &loaded.traffic {
            let Some(node) = graph.index_of(&row.intersection_id) else {
                debug!(intersection = %row.intersection_id, "traffic row for unknown intersection ignored");
                continue;
            };
            let entry = sums.entry(node).or_insert(([0.0; 3], 0));
            entry.0[0] += row.traffic_volume;
            entry.0[1] += row.average_speed;
            entry.0[2] += row.congestion_level;
            entry.1 += 1;
        }

        let mut raw = Vec::with_capacity(n * NUM_NODE_FEATURES);
        let mut labels = Vec::with_capacity(n);
        for (node, id) in graph.node_ids().iter().enumerate() {
            let (sum, count) = sums.get(&node).ok_or_else(|| TrafficError::MissingTraffic {
                intersection: id.clone(),
            })?;
            let count = *count as f64;
            let [volume, speed, congestion] = sum.map(|s| s / count);
            let pos = graph.positions()[node];

            raw.extend_from_slice(&[
                volume,
                speed,
                congestion,
                graph.degree(node) as f64,
                pos.longitude,
                pos.latitude,
            ]);
            // truncation toward zero; negative means saturate to class 0
            labels.push(congestion.trunc() as usize);
        }

        let features = self
            .scaler
            .fit_transform(&raw, NUM_NODE_FEATURES)?
            .into_iter()
            .map(|v| v as f32)
            .collect();
        let x = Tensor::from_vec(features, &[n, NUM_NODE_FEATURES]);

        let edges = graph.edges();
        let edge_index = edges.iter().map(|&(u, v, _)| [u, v]).collect();
        let edge_weight = edges.iter().map(|&(_, _, w)| w as f32).collect();

        info!(
            nodes = n,
            edges = edges.len(),
            classes = labels.iter().max().map_or(0, |&m| m + 1),
            "built traffic graph"
        );

        GraphData::new(x, edge_index, Some(edge_weight), labels)?
            .with_positions(graph.positions().to_vec())?
            .with_node_ids(graph.node_ids().to_vec())
    }

    /// Attach a random train/test split.
    ///
    /// The first `floor(train_ratio · N)` nodes of a random permutation
    /// train; the rest test.
    ///
    /// # Errors
    ///
    /// [`TrafficError::InvalidHyperparameter`] unless `0 < train_ratio < 1`.
    pub fn create_train_test_split(&self, data: GraphData, train_ratio: f64) -> Result<GraphData> {
        if !(train_ratio > 0.0 && train_ratio < 1.0) {
            return Err(TrafficError::invalid_param(
                "train_ratio",
                train_ratio,
                "must be in (0, 1)",
            ));
        }

        let n = data.num_nodes();
        let num_train = (train_ratio * n as f64).floor() as usize;
        let perm = shuffle_indices(n, self.seed);

        let mut train = vec![false; n];
        for &i in &perm[..num_train] {
            train[i] = true;
        }
        let test = train.iter().map(|t| !t).collect();

        debug!(train = num_train, test = n - num_train, "split nodes");
        data.with_masks(train, test)
    }
}

fn shuffle_indices(n: usize, seed: Option<u64>) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    match seed {
        Some(s) => indices.shuffle(&mut StdRng::seed_from_u64(s)),
        None => indices.shuffle(&mut rand::thread_rng()),
    }
    indices
}

/// Headers and cells are trimmed, so `A, 100, 40, 1` parses.
fn csv_reader() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.trim(csv::Trim::All);
    builder
}

fn read_table<R, T>(mut reader: csv::Reader<R>, table: &str, required: &[&str]) -> Result<Vec<T>>
where
    R: Read,
    T: for<'de> Deserialize<'de>,
{
    let headers = reader.headers()?;
    if let Some(missing) = required.iter().find(|c| !headers.iter().any(|h| h == **c)) {
        return Err(TrafficError::MissingColumn {
            table: table.to_string(),
            column: (*missing).to_string(),
        });
    }

    reader
        .deserialize()
        .map(|row| row.map_err(TrafficError::from))
        .collect()
}
