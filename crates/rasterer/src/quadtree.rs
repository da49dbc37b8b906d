use std::collections::VecDeque;

use crate::tile::{Bounds, SpatialTile};

/// Index of the root node in [`TileQuadtree`].
pub const ROOT: usize = 0;

#[derive(Debug, Clone)]
pub struct QuadNode {
    tile: SpatialTile,
    children: Option<[usize; 4]>,
}

impl QuadNode {
    fn leaf(tile: SpatialTile) -> Self {
        Self { tile, children: None }
    }

    pub fn tile(&self) -> &SpatialTile {
        &self.tile
    }

    /// Child node indices in quadrant order, or `None` for a leaf.
    pub fn children(&self) -> Option<[usize; 4]> {
        self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Complete 4-ary tree over a fixed rectangle, stored as a flat arena.
///
/// Built eagerly: a tree of `max_depth` levels has `4^(max_depth - 1)` leaves.
#[derive(Debug, Clone)]
pub struct TileQuadtree {
    nodes: Vec<QuadNode>,
    max_depth: usize,
}

impl TileQuadtree {
    pub fn new(root: Bounds, max_depth: usize) -> Self {
        let max_depth = max_depth.max(1);
        let capacity = (4usize.pow(max_depth as u32) - 1) / 3;
        let mut nodes = Vec::with_capacity(capacity);
        nodes.push(QuadNode::leaf(SpatialTile::new("", root)));

        // Nodes are appended level by level, so walking the vector in order
        // visits parents before their children.
        let mut i = 0;
        while i < nodes.len() {
            if nodes[i].tile.depth() < max_depth {
                let first = nodes.len();
                let quadrants = nodes[i].tile.quadrants();
                nodes.extend(quadrants.into_iter().map(QuadNode::leaf));
                nodes[i].children = Some([first, first + 1, first + 2, first + 3]);
            }
            i += 1;
        }

        Self { nodes, max_depth }
    }

    pub fn root(&self) -> &QuadNode {
        &self.nodes[ROOT]
    }

    pub fn node(&self, index: usize) -> Option<&QuadNode> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[QuadNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn leaves(&self) -> impl Iterator<Item = &SpatialTile> {
        self.nodes.iter().filter(|n| n.is_leaf()).map(QuadNode::tile)
    }

    /// Breadth-first selection of the coarsest tiles overlapping `query` whose
    /// resolution is at least `target_lon_dpp`, falling back to leaves.
    pub fn select(&self, query: &Bounds, target_lon_dpp: f64, tile_size: u32) -> Vec<&SpatialTile> {
        let mut selected = Vec::new();
        let mut fringe = VecDeque::from([ROOT]);

        while let Some(index) = fringe.pop_front() {
            let node = &self.nodes[index];
            if !node.tile.bounds().intersects(query) {
                continue;
            }

            match node.children {
                Some(children) if node.tile.lon_dpp(tile_size) > target_lon_dpp => {
                    fringe.extend(
                        children
                            .into_iter()
                            .filter(|&c| self.nodes[c].tile.bounds().intersects(query)),
                    );
                }
                _ => selected.push(&node.tile),
            }
        }

        selected
    }
}
