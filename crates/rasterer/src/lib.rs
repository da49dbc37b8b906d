//! Picks the grid of map tile images that best covers a viewport.
//!
//! Tiles come from a quadtree over a fixed map rectangle. For a query box and
//! a viewport width in pixels, the coarsest level whose longitude-per-pixel
//! does not exceed the query's is chosen, and every tile of that level that
//! overlaps the box is returned as a row-major grid.

use log::debug;
use serde::Serialize;
use thiserror::Error;

mod quadtree;
mod tile;

pub use quadtree::{QuadNode, TileQuadtree, ROOT};
pub use tile::{Bounds, SpatialTile};

/// Deepest tree accepted by [`Rasterer::new`] (about 5.6 million nodes).
pub const MAX_SUPPORTED_DEPTH: usize = 12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RasterError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{selected} selected tiles do not form a grid of {rows} rows")]
    NonRectangular { selected: usize, rows: usize },
}

pub type StatusOr<T> = Result<T, RasterError>;

/// Fixed parameters shared by rasterization and tile image naming.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterConfig {
    pub root: Bounds,       // Rectangle covered by the root tile
    pub max_depth: usize,   // Levels in the tree, root included
    pub tile_size: u32,     // Width and height of a tile image in pixels
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            root: Bounds::new(-122.2998046875, 37.892195547244356, -122.2119140625, 37.82280243352756),
            max_depth: 8,  // leaf names have 7 digits
            tile_size: 256,
        }
    }
}

/// Tiles chosen for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RasterResult {
    /// Rows north to south, each row west to east
    pub grid: Vec<Vec<SpatialTile>>,
    /// Outer corners of the grid
    pub bounds: Bounds,
    /// Tree level of every tile in the grid, root being 1
    pub depth: usize,
}

impl RasterResult {
    pub fn rows(&self) -> usize {
        self.grid.len()
    }

    pub fn cols(&self) -> usize {
        self.grid.first().map_or(0, Vec::len)
    }

    /// The grid as image paths, e.g. `img/1234.png`.
    pub fn render_grid(&self, prefix: &str, extension: &str) -> Vec<Vec<String>> {
        self.grid
            .iter()
            .map(|row| {
                row.iter()
                    .map(|tile| format!("{}{}.{}", prefix, tile.file_stem(), extension))
                    .collect()
            })
            .collect()
    }
}

pub struct Rasterer {
    config: RasterConfig,
    tree: TileQuadtree,
}

impl Rasterer {
    pub fn new(config: RasterConfig) -> StatusOr<Self> {
        if config.max_depth == 0 || config.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(RasterError::InvalidConfig(format!(
                "depth must be between 1 and {}, got {}",
                MAX_SUPPORTED_DEPTH, config.max_depth
            )));
        }
        if config.tile_size == 0 {
            return Err(RasterError::InvalidConfig("tile size must be positive".to_string()));
        }
        if config.root.is_inverted() {
            return Err(RasterError::InvalidConfig(format!("root box {:?} is inverted", config.root)));
        }

        let tree = TileQuadtree::new(config.root, config.max_depth);
        debug!("Built tile quadtree with {} nodes", tree.len());
        Ok(Self { config, tree })
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    pub fn tree(&self) -> &TileQuadtree {
        &self.tree
    }

    /// Grid of tiles covering `query` when shown `width` pixels wide.
    pub fn rasterize(&self, query: &Bounds, width: f64) -> StatusOr<RasterResult> {
        if !(width.is_finite() && width > 0.0) {
            return Err(RasterError::InvalidQuery(format!("viewport width {} is not positive", width)));
        }
        if query.is_inverted() {
            return Err(RasterError::InvalidQuery(format!("query box {:?} is inverted or empty", query)));
        }
        if !query.intersects(&self.config.root) {
            return Err(RasterError::InvalidQuery(format!("query box {:?} is outside the map", query)));
        }

        let target_lon_dpp = query.width() / width;
        let mut selected = self.tree.select(query, target_lon_dpp, self.config.tile_size);

        let depth = match selected.first() {
            Some(tile) => tile.depth(),
            None => return Err(RasterError::InvalidQuery(format!("no tile overlaps {:?}", query))),
        };
        if selected.iter().any(|t| t.depth() != depth) {
            return Err(RasterError::NonRectangular {
                selected: selected.len(),
                rows: 0,
            });
        }

        selected.sort_by(|a, b| {
            b.bounds()
                .ullat
                .total_cmp(&a.bounds().ullat)
                .then(a.bounds().ullon.total_cmp(&b.bounds().ullon))
        });

        let mut grid: Vec<Vec<SpatialTile>> = Vec::new();
        for tile in selected {
            match grid.last_mut() {
                Some(row) if row.first().is_some_and(|t| t.bounds().ullat == tile.bounds().ullat) => {
                    row.push(tile.clone())
                }
                _ => grid.push(vec![tile.clone()]),
            }
        }

        let total: usize = grid.iter().map(Vec::len).sum();
        let rows = grid.len();
        let cols = total / rows;
        if total % rows != 0 || grid.iter().any(|row| row.len() != cols) {
            return Err(RasterError::NonRectangular { selected: total, rows });
        }

        let bounds = match (grid.first().and_then(|r| r.first()), grid.last().and_then(|r| r.last())) {
            (Some(ul), Some(lr)) => Bounds::new(
                ul.bounds().ullon,
                ul.bounds().ullat,
                lr.bounds().lrlon,
                lr.bounds().lrlat,
            ),
            _ => return Err(RasterError::NonRectangular { selected: total, rows }),
        };

        debug!("Selected {}x{} tiles at depth {}", rows, cols, depth);
        Ok(RasterResult { grid, bounds, depth })
    }
}
