//! Shortest paths over a [`RoadGraph`] with A*.
//!
//! The heuristic is the graph's own Euclidean distance, which is also the edge
//! weight, so it never overestimates and the first time the destination is
//! settled its distance is optimal.

use std::collections::{HashMap, HashSet};

use log::debug;
use roadgraph::{GraphError, RoadGraph};
use thiserror::Error;

mod pq;

pub use pq::{IndexedBinaryHeap, MinPriorityQueue, QueueError};

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Graph error: {0}")]
    GraphError(#[from] GraphError),

    #[error("Queue error: {0}")]
    QueueError(#[from] QueueError),

    #[error("No path from vertex {from} to vertex {to}")]
    NoPath { from: i64, to: i64 },
}

pub type StatusOr<T> = Result<T, RouteError>;

/// Working state of one search. A value is consumed by [`PathFinder::search`],
/// so nothing carries over between queries.
pub struct PathFinder<'g, Q = IndexedBinaryHeap<i64>> {
    graph: &'g RoadGraph,
    dist_to: HashMap<i64, f64>,
    edge_to: HashMap<i64, i64>,
    settled: HashSet<i64>,
    frontier: Q,
}

impl<'g> PathFinder<'g> {
    pub fn new(graph: &'g RoadGraph) -> Self {
        Self::with_queue(graph, IndexedBinaryHeap::new())
    }
}

impl<'g, Q: MinPriorityQueue<i64>> PathFinder<'g, Q> {
    /// Uses `frontier` as the priority queue. It should be empty.
    pub fn with_queue(graph: &'g RoadGraph, frontier: Q) -> Self {
        Self {
            graph,
            dist_to: HashMap::new(),
            edge_to: HashMap::new(),
            settled: HashSet::new(),
            frontier,
        }
    }

    /// Vertex ids of a shortest path from `source` to `destination`, both
    /// included.
    pub fn search(mut self, source: i64, destination: i64) -> StatusOr<Vec<i64>> {
        let graph = self.graph;
        graph.adjacent(source)?;
        graph.adjacent(destination)?;

        if source == destination {
            return Ok(vec![source]);
        }

        self.dist_to.insert(source, 0.0);
        self.frontier.insert(source, graph.distance(source, destination)?)?;

        while !self.frontier.is_empty() {
            let (v, _) = self.frontier.remove_min()?;
            self.settled.insert(v);

            if v == destination {
                debug!(
                    "Settled {} vertices, {} still queued",
                    self.settled.len(),
                    self.frontier.len()
                );
                return self.reconstruct_path(source, destination);
            }

            for &e in graph.adjacent(v)? {
                self.relax(v, e, destination)?;
            }
        }

        Err(RouteError::NoPath {
            from: source,
            to: destination,
        })
    }

    fn dist(&self, id: i64) -> f64 {
        self.dist_to.get(&id).copied().unwrap_or(f64::INFINITY)
    }

    fn relax(&mut self, from: i64, to: i64, destination: i64) -> StatusOr<()> {
        if self.settled.contains(&to) {
            return Ok(());
        }

        let candidate = self.dist(from) + self.graph.distance(from, to)?;
        if candidate >= self.dist(to) {
            return Ok(());
        }

        self.dist_to.insert(to, candidate);
        self.edge_to.insert(to, from);
        let priority = candidate + self.graph.distance(to, destination)?;

        if self.frontier.contains(&to) {
            match self.frontier.decrease_key(&to, priority) {
                // Adding the heuristic can round a smaller distance up to the
                // same priority; the queue order is still valid then.
                Ok(()) | Err(QueueError::NotLower { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        } else {
            self.frontier.insert(to, priority)?;
        }
        Ok(())
    }

    fn reconstruct_path(&self, source: i64, destination: i64) -> StatusOr<Vec<i64>> {
        let mut path = vec![destination];
        let mut current = destination;

        while current != source {
            match self.edge_to.get(&current) {
                Some(&prev) => {
                    path.push(prev);
                    current = prev;
                }
                None => {
                    return Err(RouteError::NoPath {
                        from: source,
                        to: destination,
                    })
                }
            }
        }

        path.reverse();
        Ok(path)
    }
}

/// Shortest path between the vertices closest to the two given points.
pub fn route(graph: &RoadGraph, start_lon: f64, start_lat: f64, dest_lon: f64, dest_lat: f64) -> StatusOr<Vec<i64>> {
    let source = graph.nearest_vertex(start_lon, start_lat)?;
    let destination = graph.nearest_vertex(dest_lon, dest_lat)?;
    debug!("Routing from vertex {} to vertex {}", source, destination);

    PathFinder::new(graph).search(source, destination)
}

/// Sum of the distances between consecutive vertices of `path`.
pub fn path_length(graph: &RoadGraph, path: &[i64]) -> Result<f64, GraphError> {
    path.windows(2)
        .map(|pair| graph.distance(pair[0], pair[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Small deterministic generator for synthetic graphs.
    struct Lcg(u64);

    impl Lcg {
        fn next_u64(&mut self) -> u64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            self.0 >> 33
        }

        fn next_f64(&mut self) -> f64 {
            self.next_u64() as f64 / (1u64 << 31) as f64
        }

        fn below(&mut self, n: u64) -> u64 {
            self.next_u64() % n
        }
    }

    /// Builds a 3x3 grid with ids 0..9, row-major, spacing 1.
    fn grid_graph() -> RoadGraph {
        let mut graph = RoadGraph::new();
        for id in 0..9 {
            graph.add_vertex(id, (id % 3) as f64, (id / 3) as f64).unwrap();
        }
        for row in 0..3 {
            graph.add_way_sequence(&[row * 3, row * 3 + 1, row * 3 + 2]).unwrap();
        }
        for col in 0..3 {
            graph.add_way_sequence(&[col, col + 3, col + 6]).unwrap();
        }
        graph.finalize_and_clean();
        graph
    }

    fn random_graph(rng: &mut Lcg, vertices: i64, edges: usize) -> RoadGraph {
        let mut graph = RoadGraph::new();
        for id in 0..vertices {
            graph.add_vertex(id, rng.next_f64(), rng.next_f64()).unwrap();
        }
        for _ in 0..edges {
            let a = rng.below(vertices as u64) as i64;
            let b = rng.below(vertices as u64) as i64;
            if a != b {
                graph.add_edge(a, b).unwrap();
            }
        }
        graph.finalize_and_clean();
        graph
    }

    /// Plain O(V^2) Dijkstra, used as the reference answer.
    fn brute_force_distance(graph: &RoadGraph, source: i64, destination: i64) -> Option<f64> {
        let ids: Vec<i64> = graph.vertices().collect();
        let mut dist: HashMap<i64, f64> = ids.iter().map(|&id| (id, f64::INFINITY)).collect();
        let mut done = HashSet::new();
        dist.insert(source, 0.0);

        loop {
            let next = ids
                .iter()
                .filter(|id| !done.contains(*id))
                .min_by(|a, b| dist[*a].total_cmp(&dist[*b]))
                .copied();
            let v = match next {
                Some(v) if dist[&v].is_finite() => v,
                _ => break,
            };
            done.insert(v);
            for &w in graph.adjacent(v).unwrap() {
                let candidate = dist[&v] + graph.distance(v, w).unwrap();
                if candidate < dist[&w] {
                    dist.insert(w, candidate);
                }
            }
        }

        let d = dist[&destination];
        d.is_finite().then_some(d)
    }

    fn assert_valid_path(graph: &RoadGraph, path: &[i64], source: i64, destination: i64) {
        assert_eq!(path.first(), Some(&source), "Path should start at the source");
        assert_eq!(path.last(), Some(&destination), "Path should end at the destination");
        for pair in path.windows(2) {
            assert!(
                graph.adjacent(pair[0]).unwrap().contains(&pair[1]),
                "{} and {} are not adjacent",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_grid_shortest_path() {
        let graph = grid_graph();
        let path = PathFinder::new(&graph).search(0, 8).unwrap();

        assert_valid_path(&graph, &path, 0, 8);
        assert_eq!(path.len(), 5, "Corner to corner on a 3x3 grid takes 4 edges");
        assert!((path_length(&graph, &path).unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_prefers_shorter_detour() {
        // Both roads have two edges; the one through 4 bends far south.
        let mut graph = RoadGraph::new();
        graph.add_vertex(1, 0.0, 0.0).unwrap();
        graph.add_vertex(2, 10.0, 0.0).unwrap();
        graph.add_vertex(3, 5.0, 0.1).unwrap();
        graph.add_vertex(4, 5.0, -8.0).unwrap();
        graph.add_way_sequence(&[1, 4, 2]).unwrap();
        graph.add_way_sequence(&[1, 3, 2]).unwrap();

        let path = PathFinder::new(&graph).search(1, 2).unwrap();
        assert_eq!(path, vec![1, 3, 2]);
    }

    #[test]
    fn test_matches_brute_force_on_random_graphs() {
        let mut rng = Lcg(42);
        for round in 0..20 {
            let graph = random_graph(&mut rng, 30, 45);
            let ids: Vec<i64> = graph.vertices().collect();

            for _ in 0..10 {
                let source = ids[rng.below(ids.len() as u64) as usize];
                let destination = ids[rng.below(ids.len() as u64) as usize];
                let expected = brute_force_distance(&graph, source, destination);

                match (PathFinder::new(&graph).search(source, destination), expected) {
                    (Ok(path), Some(best)) => {
                        assert_valid_path(&graph, &path, source, destination);
                        let length = path_length(&graph, &path).unwrap();
                        assert!(
                            (length - best).abs() < 1e-9,
                            "Round {}: path {} -> {} has length {} but best is {}",
                            round,
                            source,
                            destination,
                            length,
                            best
                        );
                    }
                    (Err(RouteError::NoPath { .. }), None) => {}
                    (result, expected) => panic!(
                        "Round {}: {} -> {} gave {:?}, expected distance {:?}",
                        round, source, destination, result, expected
                    ),
                }
            }
        }
    }

    #[test]
    fn test_same_point_is_single_vertex() {
        let graph = grid_graph();
        let path = route(&graph, 1.1, 0.9, 1.1, 0.9).unwrap();
        assert_eq!(path, vec![graph.nearest_vertex(1.1, 0.9).unwrap()]);
        assert_eq!(path, vec![4]);
    }

    #[test]
    fn test_route_snaps_to_nearest_vertices() {
        let graph = grid_graph();
        let path = route(&graph, -0.2, 0.1, 2.3, 1.9).unwrap();
        assert_valid_path(&graph, &path, 0, 8);
        assert_eq!(path.len(), 5);
    }

    #[test]
    fn test_disjoint_components_have_no_path() {
        let mut graph = RoadGraph::new();
        for id in 0..4 {
            graph.add_vertex(id, id as f64, 0.0).unwrap();
        }
        graph.add_edge(0, 1).unwrap();
        graph.add_edge(2, 3).unwrap();

        let err = PathFinder::new(&graph).search(0, 3).unwrap_err();
        assert!(matches!(err, RouteError::NoPath { from: 0, to: 3 }), "got {:?}", err);

        let err = route(&graph, 0.0, 0.0, 3.0, 0.0).unwrap_err();
        assert!(matches!(err, RouteError::NoPath { .. }), "got {:?}", err);
    }

    #[test]
    fn test_unknown_vertex_is_reported() {
        let graph = grid_graph();
        let err = PathFinder::new(&graph).search(0, 99).unwrap_err();
        assert!(matches!(err, RouteError::GraphError(GraphError::NotFound(99))), "got {:?}", err);
    }

    #[test]
    fn test_empty_graph() {
        let graph = RoadGraph::new();
        let err = route(&graph, 0.0, 0.0, 1.0, 1.0).unwrap_err();
        assert!(matches!(err, RouteError::GraphError(GraphError::Empty)), "got {:?}", err);
    }

    #[test]
    fn test_repeated_searches_are_independent() {
        let graph = grid_graph();
        let first = route(&graph, 0.0, 0.0, 2.0, 2.0).unwrap();
        let second = route(&graph, 2.0, 0.0, 0.0, 0.0).unwrap();
        let third = route(&graph, 0.0, 0.0, 2.0, 2.0).unwrap();

        assert_eq!(second, vec![2, 1, 0]);
        assert_eq!(first, third, "A previous search must not influence the next one");
    }

    /// Linear-scan queue; slow, but enough to show the queue is pluggable.
    #[derive(Default)]
    struct ScanQueue(Vec<(i64, f64)>);

    impl MinPriorityQueue<i64> for ScanQueue {
        fn insert(&mut self, item: i64, priority: f64) -> Result<(), QueueError> {
            if self.contains(&item) {
                return Err(QueueError::Duplicate);
            }
            self.0.push((item, priority));
            Ok(())
        }

        fn decrease_key(&mut self, item: &i64, priority: f64) -> Result<(), QueueError> {
            let entry = self.0.iter_mut().find(|(i, _)| i == item).ok_or(QueueError::Absent)?;
            if !(priority < entry.1) {
                return Err(QueueError::NotLower { current: entry.1, requested: priority });
            }
            entry.1 = priority;
            Ok(())
        }

        fn remove_min(&mut self) -> Result<(i64, f64), QueueError> {
            let index = (0..self.0.len())
                .min_by(|&a, &b| self.0[a].1.total_cmp(&self.0[b].1))
                .ok_or(QueueError::Empty)?;
            Ok(self.0.swap_remove(index))
        }

        fn contains(&self, item: &i64) -> bool {
            self.0.iter().any(|(i, _)| i == item)
        }

        fn priority(&self, item: &i64) -> Option<f64> {
            self.0.iter().find(|(i, _)| i == item).map(|(_, p)| *p)
        }

        fn len(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn test_custom_queue_gives_same_answer() {
        let mut rng = Lcg(7);
        let graph = random_graph(&mut rng, 25, 60);
        let ids: Vec<i64> = graph.vertices().collect();

        for &source in ids.iter().take(5) {
            for &destination in ids.iter().rev().take(5) {
                let heap = PathFinder::new(&graph).search(source, destination);
                let scan = PathFinder::with_queue(&graph, ScanQueue::default()).search(source, destination);
                match (heap, scan) {
                    (Ok(a), Ok(b)) => {
                        let la = path_length(&graph, &a).unwrap();
                        let lb = path_length(&graph, &b).unwrap();
                        assert!((la - lb).abs() < 1e-9, "{} vs {}", la, lb);
                    }
                    (Err(RouteError::NoPath { .. }), Err(RouteError::NoPath { .. })) => {}
                    (a, b) => panic!("Queues disagree: {:?} vs {:?}", a, b),
                }
            }
        }
    }
}
