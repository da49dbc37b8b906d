use serde::{Deserialize, Serialize};

/// Axis-aligned geographic rectangle given by its upper-left and lower-right
/// corners, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub ullon: f64,
    pub ullat: f64,
    pub lrlon: f64,
    pub lrlat: f64,
}

impl Bounds {
    pub fn new(ullon: f64, ullat: f64, lrlon: f64, lrlat: f64) -> Self {
        Self { ullon, ullat, lrlon, lrlat }
    }

    pub fn width(&self) -> f64 {
        self.lrlon - self.ullon
    }

    pub fn height(&self) -> f64 {
        self.ullat - self.lrlat
    }

    pub fn mid_lon(&self) -> f64 {
        (self.ullon + self.lrlon) / 2.0
    }

    pub fn mid_lat(&self) -> f64 {
        (self.ullat + self.lrlat) / 2.0
    }

    /// True unless the upper-left corner is strictly west and north of the
    /// lower-right one.
    pub fn is_inverted(&self) -> bool {
        !(self.ullon < self.lrlon && self.ullat > self.lrlat)
    }

    /// Overlap of the open rectangles: sharing only an edge does not count.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.ullon < other.lrlon
            && self.lrlon > other.ullon
            && self.ullat > other.lrlat
            && self.lrlat < other.ullat
    }

    pub fn contains(&self, other: &Bounds) -> bool {
        self.ullon <= other.ullon
            && self.lrlon >= other.lrlon
            && self.ullat >= other.ullat
            && self.lrlat <= other.lrlat
    }
}

/// One quadtree tile. The name is the quadrant path from the root, one digit
/// per level: 1 upper-left, 2 upper-right, 3 lower-left, 4 lower-right.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialTile {
    name: String,
    bounds: Bounds,
}

impl SpatialTile {
    pub fn new(name: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            name: name.into(),
            bounds,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Tree level, the root being 1.
    pub fn depth(&self) -> usize {
        self.name.len() + 1
    }

    /// Longitude covered by one pixel when drawn `tile_size` pixels wide.
    pub fn lon_dpp(&self, tile_size: u32) -> f64 {
        self.bounds.width() / tile_size as f64
    }

    /// Image file name without extension; the root image is `root`.
    pub fn file_stem(&self) -> &str {
        if self.name.is_empty() {
            "root"
        } else {
            &self.name
        }
    }

    /// The four children, in quadrant order.
    pub fn quadrants(&self) -> [SpatialTile; 4] {
        let b = &self.bounds;
        let (mid_lon, mid_lat) = (b.mid_lon(), b.mid_lat());
        [
            SpatialTile::new(format!("{}1", self.name), Bounds::new(b.ullon, b.ullat, mid_lon, mid_lat)),
            SpatialTile::new(format!("{}2", self.name), Bounds::new(mid_lon, b.ullat, b.lrlon, mid_lat)),
            SpatialTile::new(format!("{}3", self.name), Bounds::new(b.ullon, mid_lat, mid_lon, b.lrlat)),
            SpatialTile::new(format!("{}4", self.name), Bounds::new(mid_lon, mid_lat, b.lrlon, b.lrlat)),
        ]
    }
}
