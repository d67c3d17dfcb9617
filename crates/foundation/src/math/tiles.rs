//! Slippy-map tile addressing (`z/x/y`, Web Mercator).

use std::f64::consts::PI;

use super::{GroundPoint, LatLng, LocalProjection};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileCoord {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub const fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Tile containing `(lat, lng)` at `zoom`.
    pub fn containing(lat: f64, lng: f64, zoom: u8) -> Self {
        let n = tiles_per_axis(zoom);
        let x = ((lng + 180.0) / 360.0 * n).floor();
        let lat_rad = lat.to_radians();
        let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();
        let max = n - 1.0;
        Self {
            zoom,
            x: x.clamp(0.0, max) as u32,
            y: y.clamp(0.0, max) as u32,
        }
    }

    /// Geographic position of this tile's north-west corner.
    pub fn north_west(&self) -> LatLng {
        tile_corner(self.x as f64, self.y as f64, self.zoom)
    }

    /// Geographic position of this tile's south-east corner.
    pub fn south_east(&self) -> LatLng {
        tile_corner(self.x as f64 + 1.0, self.y as f64 + 1.0, self.zoom)
    }

    /// Neighbour offset by `(dx, dy)` tiles, or `None` when it would leave the grid.
    pub fn offset(&self, dx: i64, dy: i64) -> Option<Self> {
        let n = 1i64 << self.zoom;
        let x = self.x as i64 + dx;
        let y = self.y as i64 + dy;
        if x < 0 || y < 0 || x >= n || y >= n {
            return None;
        }
        Some(Self::new(self.zoom, x as u32, y as u32))
    }

    /// Rectangle covered by this tile on the scene ground plane.
    pub fn scene_rect(&self, projection: &LocalProjection) -> TileRect {
        let nw = projection.project_lat_lng(self.north_west());
        let se = projection.project_lat_lng(self.south_east());
        TileRect {
            center: GroundPoint::new((nw.x + se.x) * 0.5, (nw.z + se.z) * 0.5),
            width: (se.x - nw.x).abs(),
            depth: (se.z - nw.z).abs(),
        }
    }
}

/// Axis-aligned ground rectangle in scene units.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TileRect {
    pub center: GroundPoint,
    pub width: f64,
    pub depth: f64,
}

fn tiles_per_axis(zoom: u8) -> f64 {
    (1u64 << zoom) as f64
}

/// Inverse of the slippy-map formula for a (possibly fractional) tile corner.
pub fn tile_corner(x: f64, y: f64, zoom: u8) -> LatLng {
    let n = tiles_per_axis(zoom);
    let m = PI - 2.0 * PI * y / n;
    LatLng {
        lat: m.sinh().atan().to_degrees(),
        lng: x / n * 360.0 - 180.0,
    }
}

/// Square grid of `count * count` tiles around the tile containing `center`.
///
/// Offsets run from `-count/2` to `count/2 - 1` on each axis, row-major by x.
pub fn tile_grid(center: LatLng, zoom: u8, count: u32) -> Vec<TileCoord> {
    let origin = TileCoord::containing(center.lat, center.lng, zoom);
    let half = (count / 2) as i64;
    let mut out = Vec::with_capacity((count * count) as usize);
    for dx in -half..(count as i64 - half) {
        for dy in -half..(count as i64 - half) {
            if let Some(tile) = origin.offset(dx, dy) {
                out.push(tile);
            }
        }
    }
    out
}
