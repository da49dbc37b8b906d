use std::path::Path;
use std::time::Instant;

use log::{debug, error, info};
use osmpbf::{Element, ElementReader};

use crate::{GraphError, RoadGraph, StatusOr};

/// `highway` values that make a way part of the routable network.
pub const ROUTABLE_HIGHWAYS: &[&str] = &[
    "motorway",
    "trunk",
    "primary",
    "secondary",
    "tertiary",
    "unclassified",
    "residential",
    "living_street",
    "motorway_link",
    "trunk_link",
    "primary_link",
    "secondary_link",
    "tertiary_link",
];

pub fn is_routable_highway(highway: &str) -> bool {
    ROUTABLE_HIGHWAYS.contains(&highway)
}

struct OsmNode {
    id: i64,
    lon: f64,
    lat: f64,
    name: Option<String>,
}

struct OsmWay {
    id: i64,
    node_ids: Vec<i64>,
    name: Option<String>,
}

fn tag_value<'a>(mut tags: impl Iterator<Item = (&'a str, &'a str)>, key: &str) -> Option<&'a str> {
    tags.find(|(k, _)| *k == key).map(|(_, v)| v)
}

/// Reads an OSM PBF extract into a cleaned `RoadGraph`.
///
/// Nodes and ways are collected in a single pass and replayed afterwards, so
/// the file's element order does not matter. Any inconsistency in the data
/// (a way pointing at a missing node, a repeated node id) aborts the load.
pub fn load_osm_pbf<P: AsRef<Path>>(path: P) -> StatusOr<RoadGraph> {
    let path = path.as_ref();
    let start = Instant::now();
    info!("Reading OSM data from {}", path.display());

    let reader = ElementReader::from_path(path).map_err(|e| GraphError::OsmError(e.to_string()))?;

    let mut nodes = Vec::new();
    let mut ways = Vec::new();
    reader
        .for_each(|element| match element {
            Element::Node(node) => nodes.push(OsmNode {
                id: node.id(),
                lon: node.lon(),
                lat: node.lat(),
                name: tag_value(node.tags(), "name").map(str::to_string),
            }),
            Element::DenseNode(node) => nodes.push(OsmNode {
                id: node.id(),
                lon: node.lon(),
                lat: node.lat(),
                name: tag_value(node.tags(), "name").map(str::to_string),
            }),
            Element::Way(way) => {
                let routable = tag_value(way.tags(), "highway").is_some_and(is_routable_highway);
                if routable {
                    let node_ids: Vec<i64> = way.refs().collect();
                    if node_ids.len() < 2 {
                        debug!("Skipping way {} with {} node refs", way.id(), node_ids.len());
                        return;
                    }
                    ways.push(OsmWay {
                        id: way.id(),
                        node_ids,
                        name: tag_value(way.tags(), "name").map(str::to_string),
                    });
                }
            }
            _ => {}
        })
        .map_err(|e| GraphError::OsmError(e.to_string()))?;

    info!(
        "Collected {} nodes and {} routable ways (took {:?})",
        nodes.len(),
        ways.len(),
        start.elapsed()
    );

    let graph = build_graph(&nodes, &ways)?;
    info!(
        "Graph ready: {} vertices, {} edges (took {:?})",
        graph.len(),
        graph.edge_count(),
        start.elapsed()
    );
    Ok(graph)
}

/// Replays collected elements: vertices first, then ways and their names,
/// then node names, then cleaning.
fn build_graph(nodes: &[OsmNode], ways: &[OsmWay]) -> StatusOr<RoadGraph> {
    let mut graph = RoadGraph::new();
    for node in nodes {
        graph.add_vertex(node.id, node.lon, node.lat).map_err(|e| {
            error!("Node {} could not be added: {}", node.id, e);
            e
        })?;
    }
    for way in ways {
        if way.node_ids.len() < 2 {
            debug!("Skipping way {} with {} node refs", way.id, way.node_ids.len());
            continue;
        }
        graph.add_way_sequence(&way.node_ids).map_err(|e| {
            error!("Way {} could not be added: {}", way.id, e);
            e
        })?;
        if let Some(name) = &way.name {
            graph.add_name(name);
        }
    }
    for node in nodes {
        if let Some(name) = &node.name {
            graph.set_name(node.id, name)?;
        }
    }
    graph.finalize_and_clean();
    Ok(graph)
}
