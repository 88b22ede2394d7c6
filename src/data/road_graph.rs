//! Undirected road graph keyed by intersection id.
//!
//! Node order is the order in which intersections are first declared; it is
//! the single index space shared by features, labels, positions and edges.

use std::collections::HashMap;

use crate::error::{Result, TrafficError};

/// Geographic position of an intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub longitude: f64,
    pub latitude: f64,
}

/// Insertion-ordered undirected graph with one weighted edge per node pair.
#[derive(Debug, Clone, Default)]
pub struct RoadGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    positions: Vec<Position>,
    /// Neighbors per node in insertion order, with edge weight
    adjacency: Vec<Vec<(usize, f64)>>,
}

impl RoadGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an intersection, or move it if the id is already known.
    ///
    /// Returns the node index.
    pub fn add_node(&mut self, id: &str, position: Position) -> usize {
        if let Some(&i) = self.index.get(id) {
            self.positions[i] = position;
            return i;
        }
        let i = self.ids.len();
        self.ids.push(id.to_string());
        self.index.insert(id.to_string(), i);
        self.positions.push(position);
        self.adjacency.push(Vec::new());
        i
    }

    /// Add an undirected segment; a repeated pair overwrites the weight.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::UnknownIntersection`] if either endpoint was
    /// never added as a node.
    pub fn add_edge(&mut self, from: &str, to: &str, weight: f64) -> Result<()> {
        let u = self.require(from)?;
        let v = self.require(to)?;

        if let Some(slot) = self.adjacency[u].iter_mut().find(|(n, _)| *n == v) {
            slot.1 = weight;
            if let Some(back) = self.adjacency[v].iter_mut().find(|(n, _)| *n == u) {
                back.1 = weight;
            }
            return Ok(());
        }

        self.adjacency[u].push((v, weight));
        if u != v {
            self.adjacency[v].push((u, weight));
        }
        Ok(())
    }

    fn require(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| TrafficError::UnknownIntersection {
                intersection: id.to_string(),
            })
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edges().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn node_ids(&self) -> &[String] {
        &self.ids
    }

    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    #[must_use]
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Number of incident segments; a self loop counts twice.
    #[must_use]
    pub fn degree(&self, node: usize) -> usize {
        let loops = self.adjacency[node].iter().filter(|(n, _)| *n == node).count();
        self.adjacency[node].len() + loops
    }

    /// Every segment once as `(u, v, weight)`, with `u` earlier in node order.
    ///
    /// Ordered by `u`, then by the order `u`'s neighbors were attached.
    #[must_use]
    pub fn edges(&self) -> Vec<(usize, usize, f64)> {
        let mut out = Vec::new();
        for (u, neighbors) in self.adjacency.iter().enumerate() {
            for &(v, w) in neighbors {
                if v >= u {
                    out.push((u, v, w));
                }
            }
        }
        out
    }
}
