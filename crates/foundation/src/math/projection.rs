use super::Vec3;

/// Geographic coordinates in degrees.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A point on the scene's ground plane (`y = 0`).
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct GroundPoint {
    pub x: f64,
    pub z: f64,
}

impl GroundPoint {
    pub const fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    pub fn at_height(self, y: f64) -> Vec3 {
        Vec3::new(self.x, y, self.z)
    }
}

/// Downtown Durham, NC.
pub const DEFAULT_ORIGIN: LatLng = LatLng::new(35.9940, -78.8986);

/// Scene units per degree.
pub const DEFAULT_SCALE: f64 = 100_000.0;

/// Equirectangular mapping around a fixed origin.
///
/// Longitude maps to `x`, latitude maps to `-z` so that north is "forward".
/// There is no latitude correction; distortion is negligible at city scale.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocalProjection {
    pub origin: LatLng,
    pub scale: f64,
}

impl Default for LocalProjection {
    fn default() -> Self {
        Self::new(DEFAULT_ORIGIN, DEFAULT_SCALE)
    }
}

impl LocalProjection {
    pub const fn new(origin: LatLng, scale: f64) -> Self {
        Self { origin, scale }
    }

    pub fn project(&self, lat: f64, lng: f64) -> GroundPoint {
        GroundPoint {
            x: (lng - self.origin.lng) * self.scale,
            z: -(lat - self.origin.lat) * self.scale,
        }
    }

    pub fn project_lat_lng(&self, p: LatLng) -> GroundPoint {
        self.project(p.lat, p.lng)
    }

    pub fn unproject(&self, p: GroundPoint) -> LatLng {
        LatLng {
            lat: self.origin.lat - p.z / self.scale,
            lng: self.origin.lng + p.x / self.scale,
        }
    }
}
