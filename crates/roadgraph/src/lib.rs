//! In-memory road network built from OpenStreetMap data.
//!
//! The graph is populated once by replaying loader calls (`add_vertex`,
//! `add_way_sequence`, `set_name`, ...), cleaned with `finalize_and_clean`,
//! and then only read. Distances are Euclidean in the (longitude, latitude)
//! plane, which is good enough for routing inside a city-sized map.

use std::collections::HashMap;

use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

mod loader;
mod trie;

pub use loader::{is_routable_highway, load_osm_pbf, ROUTABLE_HIGHWAYS};
pub use trie::NameTrie;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("OSM error: {0}")]
    OsmError(String),

    #[error("Vertex {0} not found")]
    NotFound(i64),

    #[error("Vertex {0} already present")]
    DuplicateVertex(i64),

    #[error("A way needs at least 2 vertices, got {0}")]
    ShortWay(usize),

    #[error("Vertex {0} already has a name")]
    NameAlreadySet(i64),

    #[error("Graph has no vertices")]
    Empty,
}

pub type StatusOr<T> = Result<T, GraphError>;

/// Strips everything but ASCII letters and spaces, then lowercases.
pub fn clean_string(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphabetic() || *c == ' ')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn euclidean(lon_a: f64, lat_a: f64, lon_b: f64, lat_b: f64) -> f64 {
    let lon_diff = lon_a - lon_b;
    let lat_diff = lat_a - lat_b;
    (lon_diff * lon_diff + lat_diff * lat_diff).sqrt()
}

/// A road network vertex (an OSM node).
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    id: i64,
    lon: f64,
    lat: f64,
    name: Option<String>,
    clean_name: Option<String>,
}

impl Vertex {
    pub fn new(id: i64, lon: f64, lat: f64) -> Self {
        Self {
            id,
            lon,
            lat,
            name: None,
            clean_name: None,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Human readable name, if the loader provided one
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name in the form used as a search key
    pub fn clean_name(&self) -> Option<&str> {
        self.clean_name.as_deref()
    }
}

/// A named point returned by location search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub id: i64,
    pub lon: f64,
    pub lat: f64,
    pub name: String,
}

/// Undirected adjacency-list graph keyed by OSM node id.
#[derive(Debug, Default)]
pub struct RoadGraph {
    vertices: HashMap<i64, Vertex>,
    adj: HashMap<i64, Vec<i64>>,
    // Cleaned name -> every location registered under it. Kept apart from
    // `vertices` so named points off the road network survive cleaning.
    locations: HashMap<String, Vec<Location>>,
    names: NameTrie,
}

impl RoadGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, id: i64, lon: f64, lat: f64) -> StatusOr<()> {
        if self.vertices.contains_key(&id) {
            return Err(GraphError::DuplicateVertex(id));
        }
        self.vertices.insert(id, Vertex::new(id, lon, lat));
        self.adj.insert(id, Vec::new());
        Ok(())
    }

    /// Connects `a` and `b` in both directions.
    pub fn add_edge(&mut self, a: i64, b: i64) -> StatusOr<()> {
        self.ensure_present(a)?;
        self.ensure_present(b)?;
        self.push_edge(a, b);
        Ok(())
    }

    /// Adds an edge between every consecutive pair of `ids`, modelling a road
    /// as a path graph. Nothing is inserted unless every id is known.
    pub fn add_way_sequence(&mut self, ids: &[i64]) -> StatusOr<()> {
        if ids.len() < 2 {
            return Err(GraphError::ShortWay(ids.len()));
        }
        for &id in ids {
            self.ensure_present(id)?;
        }
        for pair in ids.windows(2) {
            self.push_edge(pair[0], pair[1]);
        }
        Ok(())
    }

    /// Names vertex `id` and makes it findable by location search and
    /// autocomplete.
    pub fn set_name(&mut self, id: i64, display_name: &str) -> StatusOr<()> {
        let vertex = self.vertices.get_mut(&id).ok_or(GraphError::NotFound(id))?;
        if vertex.name.is_some() {
            return Err(GraphError::NameAlreadySet(id));
        }

        let cleaned = clean_string(display_name);
        vertex.name = Some(display_name.to_string());
        vertex.clean_name = Some(cleaned.clone());

        let location = Location {
            id,
            lon: vertex.lon,
            lat: vertex.lat,
            name: display_name.to_string(),
        };
        self.names.put(&cleaned, display_name);
        self.locations.entry(cleaned).or_default().push(location);
        Ok(())
    }

    /// Registers a street name for autocomplete only.
    pub fn add_name(&mut self, display_name: &str) {
        self.names.put(&clean_string(display_name), display_name);
    }

    /// Drops every vertex without edges and returns how many were removed.
    pub fn finalize_and_clean(&mut self) -> usize {
        let isolated: Vec<i64> = self
            .adj
            .iter()
            .filter(|(_, neighbors)| neighbors.is_empty())
            .map(|(id, _)| *id)
            .collect();

        for id in &isolated {
            self.adj.remove(id);
            self.vertices.remove(id);
        }

        info!(
            "Removed {} isolated vertices, {} vertices and {} edges remain",
            isolated.len(),
            self.vertices.len(),
            self.edge_count()
        );
        isolated.len()
    }

    pub fn vertices(&self) -> impl Iterator<Item = i64> + '_ {
        self.vertices.keys().copied()
    }

    pub fn vertex(&self, id: i64) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    pub fn adjacent(&self, id: i64) -> StatusOr<&[i64]> {
        self.adj
            .get(&id)
            .map(Vec::as_slice)
            .ok_or(GraphError::NotFound(id))
    }

    /// Euclidean distance between two vertices in degrees.
    pub fn distance(&self, a: i64, b: i64) -> StatusOr<f64> {
        let va = self.get(a)?;
        let vb = self.get(b)?;
        Ok(euclidean(va.lon, va.lat, vb.lon, vb.lat))
    }

    /// Vertex closest to (`lon`, `lat`). Exact ties go to whichever vertex
    /// the map yields first.
    pub fn nearest_vertex(&self, lon: f64, lat: f64) -> StatusOr<i64> {
        self.vertices
            .values()
            .map(|v| (v.id, euclidean(v.lon, v.lat, lon, lat)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
            .ok_or(GraphError::Empty)
    }

    pub fn lon(&self, id: i64) -> StatusOr<f64> {
        Ok(self.get(id)?.lon)
    }

    pub fn lat(&self, id: i64) -> StatusOr<f64> {
        Ok(self.get(id)?.lat)
    }

    /// Every location whose cleaned name equals the cleaned `name`.
    pub fn locations_by_name(&self, name: &str) -> Vec<Location> {
        self.locations
            .get(&clean_string(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Display names whose cleaned form starts with the cleaned `prefix`.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.names.names_with_prefix(&clean_string(prefix))
    }

    /// Each undirected edge once, as `(smaller id, larger id)`.
    pub fn edges(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.adj.iter().flat_map(|(&v, neighbors)| {
            neighbors
                .iter()
                .filter(move |&&w| v < w)
                .map(move |&w| (v, w))
        })
    }

    pub fn edge_count(&self) -> usize {
        self.adj.values().map(Vec::len).sum::<usize>() / 2
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    fn get(&self, id: i64) -> StatusOr<&Vertex> {
        self.vertices.get(&id).ok_or(GraphError::NotFound(id))
    }

    fn ensure_present(&self, id: i64) -> StatusOr<()> {
        if self.vertices.contains_key(&id) {
            Ok(())
        } else {
            debug!("Edge references unknown vertex {}", id);
            Err(GraphError::NotFound(id))
        }
    }

    fn push_edge(&mut self, a: i64, b: i64) {
        if let Some(neighbors) = self.adj.get_mut(&a) {
            neighbors.push(b);
        }
        if let Some(neighbors) = self.adj.get_mut(&b) {
            neighbors.push(a);
        }
    }
}
