use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use log::{debug, info};
use rasterer::{Bounds, SpatialTile, TileQuadtree, ROOT};
use rayon::prelude::*;
use roadgraph::RoadGraph;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TileBuildError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to write tile image: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Graph error: {0}")]
    GraphError(#[from] roadgraph::GraphError),
}

pub type StatusOr<T> = Result<T, TileBuildError>;

/// Configuration for tile building process
#[derive(Clone, Debug)]
pub struct TileBuildConfig {
    pub output_dir: PathBuf,    // Directory where tiles will be saved
    pub tile_size: u32,         // Width and height of every tile in pixels
    pub edge_width: f32,        // Road width in pixels
    pub background: Rgb<u8>,
    pub road_color: Rgb<u8>,
}

impl Default for TileBuildConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs/img"),
            tile_size: 256,
            edge_width: 2.0,
            background: Rgb([245, 243, 240]),
            road_color: Rgb([120, 120, 120]),
        }
    }
}

/// One road edge in geographic coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub from: (f64, f64),  // (lon, lat)
    pub to: (f64, f64),
}

impl Segment {
    /// Whether the segment's bounding box touches `bounds`.
    fn may_cross(&self, bounds: &Bounds) -> bool {
        let (min_lon, max_lon) = (self.from.0.min(self.to.0), self.from.0.max(self.to.0));
        let (min_lat, max_lat) = (self.from.1.min(self.to.1), self.from.1.max(self.to.1));
        min_lon <= bounds.lrlon && max_lon >= bounds.ullon && min_lat <= bounds.ullat && max_lat >= bounds.lrlat
    }
}

/// Every edge of `graph` as a segment.
pub fn collect_segments(graph: &RoadGraph) -> StatusOr<Vec<Segment>> {
    graph
        .edges()
        .map(|(a, b)| {
            Ok(Segment {
                from: (graph.lon(a)?, graph.lat(a)?),
                to: (graph.lon(b)?, graph.lat(b)?),
            })
        })
        .collect()
}

/// Draws a line `width` pixels wide by stamping circles along it.
fn draw_thick_line_segment_mut(image: &mut RgbImage, start: (f32, f32), end: (f32, f32), color: Rgb<u8>, width: f32) {
    if width <= 1.0 {
        draw_line_segment_mut(image, start, end, color);
        return;
    }

    let radius = (width / 2.0).max(1.0) as i32;
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let length = (dx * dx + dy * dy).sqrt();
    if length < 0.001 {
        draw_filled_circle_mut(image, (start.0 as i32, start.1 as i32), radius, color);
        return;
    }

    let step = (radius as f32 * 0.5).max(0.5);
    let steps = (length / step).ceil() as i32;
    for i in 0..=steps {
        let t = (i as f32 * step / length).min(1.0);
        let (x, y) = (start.0 + t * dx, start.1 + t * dy);
        draw_filled_circle_mut(image, (x as i32, y as i32), radius, color);
    }
}

pub struct TileBuilder {
    config: TileBuildConfig,
}

impl TileBuilder {
    pub fn new(config: TileBuildConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TileBuildConfig {
        &self.config
    }

    fn tile_path(&self, tile: &SpatialTile) -> PathBuf {
        self.config.output_dir.join(format!("{}.png", tile.file_stem()))
    }

    /// Draws the segments crossing `tile`. North is up, so y grows southward.
    pub fn render_tile(&self, tile: &SpatialTile, segments: &[Segment]) -> RgbImage {
        let size = self.config.tile_size;
        let mut image = RgbImage::from_pixel(size, size, self.config.background);
        let bounds = tile.bounds();

        let to_img_coords = |(lon, lat): (f64, f64)| -> (f32, f32) {
            let x = (lon - bounds.ullon) / bounds.width() * size as f64;
            let y = (bounds.ullat - lat) / bounds.height() * size as f64;
            (x as f32, y as f32)
        };

        for segment in segments.iter().filter(|s| s.may_cross(bounds)) {
            draw_thick_line_segment_mut(
                &mut image,
                to_img_coords(segment.from),
                to_img_coords(segment.to),
                self.config.road_color,
                self.config.edge_width,
            );
        }

        image
    }

    /// Renders every node of `tree` to `<output_dir>/<name>.png` and returns
    /// the number of tiles written.
    pub fn build_all_tiles(&self, graph: &RoadGraph, tree: &TileQuadtree) -> StatusOr<usize> {
        let start = Instant::now();
        fs::create_dir_all(&self.config.output_dir)?;

        let segments = collect_segments(graph)?;
        info!("Rendering {} road segments into {} tiles", segments.len(), tree.len());

        let written = self.build_node(tree, ROOT, &segments)?;
        info!(
            "Wrote {} tiles to {:?} in {:.2?}",
            written,
            self.config.output_dir,
            start.elapsed()
        );
        Ok(written)
    }

    fn build_node(&self, tree: &TileQuadtree, index: usize, segments: &[Segment]) -> StatusOr<usize> {
        let Some(node) = tree.node(index) else {
            return Ok(0);
        };
        let tile = node.tile();

        // Children only ever see what crosses their parent.
        let visible: Vec<Segment> = segments
            .iter()
            .filter(|s| s.may_cross(tile.bounds()))
            .copied()
            .collect();

        let image = self.render_tile(tile, &visible);
        save_png(&image, &self.tile_path(tile))?;
        debug!("Tile {:?} has {} segments", tile.file_stem(), visible.len());

        let below = match node.children() {
            Some(children) => children
                .par_iter()
                .map(|&child| self.build_node(tree, child, &visible))
                .try_reduce(|| 0, |a, b| Ok(a + b))?,
            None => 0,
        };
        Ok(below + 1)
    }
}

fn save_png(image: &RgbImage, path: &Path) -> StatusOr<()> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
