use std::fs;
use std::path::{Path, PathBuf};

use foundation::math::{LatLng, LocalProjection, TileCoord, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Invalid(reason) => write!(f, "invalid config: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Viewer tunables. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ViewerConfig {
    pub projection: ProjectionConfig,
    pub tiles: TileConfig,
    pub signposts: SignpostConfig,
    pub highlight: HighlightConfig,
    pub camera: CameraConfig,
    pub gestures: GestureConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub origin_lat: f64,
    pub origin_lng: f64,
    /// Scene units per degree.
    pub scale: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        let p = LocalProjection::default();
        Self {
            origin_lat: p.origin.lat,
            origin_lng: p.origin.lng,
            scale: p.scale,
        }
    }
}

/// Largest accepted `tiles.grid`.
pub const MAX_TILE_GRID: u32 = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    pub zoom: u8,
    /// Tiles per side of the square grid.
    pub grid: u32,
    /// `{z}`, `{x}` and `{y}` are substituted.
    pub url_template: String,
    pub opacity: f32,
    pub elevation: f64,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            zoom: 14,
            grid: 4,
            url_template: "https://a.basemaps.cartocdn.com/dark_nolabels/{z}/{x}/{y}@2x.png"
                .to_string(),
            opacity: 0.45,
            elevation: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignpostConfig {
    pub limit: usize,
    /// Height of the billboard center above the ground.
    pub elevation: f64,
    pub width: f64,
    pub height: f64,
    /// Neighborhood names that never get a signpost.
    pub excluded: Vec<String>,
}

impl Default for SignpostConfig {
    fn default() -> Self {
        Self {
            limit: 12,
            elevation: 40.0,
            width: 180.0,
            height: 45.0,
            excluded: vec!["Other".to_string(), "Unknown".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub dim_factor: f32,
    pub trunk_match_opacity: f32,
    pub trunk_dimmed_opacity: f32,
    /// Camera offset from the matched centroid.
    pub focus_offset: [f64; 3],
    pub overview_position: [f64; 3],
    pub overview_target: [f64; 3],
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            dim_factor: 0.15,
            trunk_match_opacity: 0.9,
            trunk_dimmed_opacity: 0.15,
            focus_offset: [120.0, 240.0, 360.0],
            overview_position: [0.0, 720.0, 60.0],
            overview_target: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_deg: f64,
    pub near: f64,
    pub far: f64,
    pub start_position: [f64; 3],
    pub min_distance: f64,
    pub max_distance: f64,
    /// Largest angle from straight down, in radians.
    pub max_polar_angle: f64,
    /// Scene units per pixel of pan drag.
    pub pan_speed: f64,
    pub flight_ms: f64,
    pub intro_ms: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 55.0,
            near: 0.1,
            far: 3000.0,
            start_position: [0.0, 720.0, 0.1],
            min_distance: 3.0,
            max_distance: 1500.0,
            max_polar_angle: std::f64::consts::FRAC_PI_2 - 0.05,
            pan_speed: 1.5,
            flight_ms: 1200.0,
            intro_ms: 3500.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub click_max_distance_px: f64,
    pub click_max_ms: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            click_max_distance_px: 5.0,
            click_max_ms: 400.0,
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(payload: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(payload).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let payload = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&payload)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.projection.scale.is_finite() && self.projection.scale > 0.0) {
            return Err(ConfigError::Invalid("projection.scale must be positive".into()));
        }
        if self.tiles.zoom > 22 {
            return Err(ConfigError::Invalid(format!(
                "tiles.zoom {} is beyond 22",
                self.tiles.zoom
            )));
        }
        if self.tiles.grid > MAX_TILE_GRID {
            return Err(ConfigError::Invalid(format!(
                "tiles.grid {} is beyond {MAX_TILE_GRID}",
                self.tiles.grid
            )));
        }
        if self.camera.min_distance > self.camera.max_distance {
            return Err(ConfigError::Invalid(
                "camera.min_distance exceeds camera.max_distance".into(),
            ));
        }
        Ok(())
    }

    pub fn projection(&self) -> LocalProjection {
        LocalProjection::new(
            LatLng::new(self.projection.origin_lat, self.projection.origin_lng),
            self.projection.scale,
        )
    }

    pub fn tile_url(&self, tile: TileCoord) -> String {
        self.tiles
            .url_template
            .replace("{z}", &tile.zoom.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }

    pub fn focus_offset(&self) -> Vec3 {
        vec3(self.highlight.focus_offset)
    }

    pub fn overview_position(&self) -> Vec3 {
        vec3(self.highlight.overview_position)
    }

    pub fn overview_target(&self) -> Vec3 {
        vec3(self.highlight.overview_target)
    }

    pub fn start_position(&self) -> Vec3 {
        vec3(self.camera.start_position)
    }
}

fn vec3(a: [f64; 3]) -> Vec3 {
    Vec3::new(a[0], a[1], a[2])
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, MAX_TILE_GRID, ViewerConfig};
    use foundation::math::{LocalProjection, TileCoord};
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_is_all_defaults() {
        let config = ViewerConfig::from_json_str("{}").expect("config");
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.projection(), LocalProjection::default());
        assert_eq!(config.tiles.zoom, 14);
        assert_eq!(config.tiles.grid, 4);
        assert_eq!(config.signposts.limit, 12);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config =
            ViewerConfig::from_json_str(r#"{"tiles":{"zoom":15},"highlight":{"dim_factor":0.3}}"#)
                .expect("config");
        assert_eq!(config.tiles.zoom, 15);
        assert_eq!(config.tiles.grid, 4);
        assert_eq!(config.highlight.dim_factor, 0.3);
        assert_eq!(config.highlight.trunk_match_opacity, 0.9);
    }

    #[test]
    fn tile_url_substitutes_placeholders() {
        let config = ViewerConfig::default();
        assert_eq!(
            config.tile_url(TileCoord::new(14, 4601, 6434)),
            "https://a.basemaps.cartocdn.com/dark_nolabels/14/4601/6434@2x.png"
        );
    }

    #[test]
    fn rejects_bad_values() {
        let err = ViewerConfig::from_json_str(r#"{"projection":{"scale":0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = ViewerConfig::from_json_str(r#"{"tiles":{"grid":65536}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = ViewerConfig::from_json_str(r#"{"tiles":{"grid":17}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let edge = ViewerConfig::from_json_str(r#"{"tiles":{"grid":16}}"#).expect("largest grid");
        assert_eq!(edge.tiles.grid, MAX_TILE_GRID);
        let err = ViewerConfig::from_json_str(r#"{"tiles":{"zoom":"x"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
