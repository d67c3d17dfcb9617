use foundation::math::{LatLng, LocalProjection, TileCoord};
use gpu::GroundQuad;
use streaming::{Request, TileLoadError, TilePipeline, TileRequest};

use crate::layer::{Layer, LayerId};

#[derive(Debug, Clone, PartialEq)]
pub struct GroundOptions {
    pub zoom: u8,
    pub grid: u32,
    pub elevation: f64,
    pub opacity: f32,
}

impl Default for GroundOptions {
    fn default() -> Self {
        Self {
            zoom: 14,
            grid: 4,
            elevation: 0.01,
            opacity: 0.45,
        }
    }
}

/// Map tiles laid flat under the trees. Each tile is placed the moment its
/// own load succeeds; failures leave a hole.
#[derive(Debug)]
pub struct RasterLayer {
    id: LayerId,
    options: GroundOptions,
    pipeline: TilePipeline,
}

impl RasterLayer {
    pub fn new(id: u64, projection: LocalProjection, options: GroundOptions) -> Self {
        Self {
            id: LayerId(id),
            pipeline: TilePipeline::new(projection, options.elevation, options.opacity),
            options,
        }
    }

    /// Requests for the grid around `center`; the host fetches them.
    pub fn request_tiles(
        &mut self,
        center: LatLng,
        url_for: impl Fn(TileCoord) -> String,
    ) -> Vec<TileRequest> {
        self.pipeline
            .request_grid(center, self.options.zoom, self.options.grid, url_for)
    }

    /// Returns the tile's quad if it was placed.
    pub fn tile_loaded(
        &mut self,
        request: Request,
        result: Result<(), TileLoadError>,
    ) -> Option<GroundQuad> {
        self.pipeline.complete(request, result).map(|p| GroundQuad {
            tile: p.tile,
            rect: p.rect,
            elevation: p.elevation,
            opacity: p.opacity,
        })
    }

    pub fn quads(&self) -> Vec<GroundQuad> {
        self.pipeline
            .resident()
            .map(|p| GroundQuad {
                tile: p.tile,
                rect: p.rect,
                elevation: p.elevation,
                opacity: p.opacity,
            })
            .collect()
    }

    pub fn pending(&self) -> usize {
        self.pipeline.pending_len()
    }

    pub fn cancel(&mut self) -> usize {
        self.pipeline.cancel_all()
    }
}

impl Layer for RasterLayer {
    fn id(&self) -> LayerId {
        self.id
    }

    fn name(&self) -> &'static str {
        "ground"
    }
}

#[cfg(test)]
mod tests {
    use super::{GroundOptions, RasterLayer};
    use foundation::math::{DEFAULT_ORIGIN, LocalProjection, TileCoord};
    use streaming::TileLoadError;

    #[test]
    fn out_of_order_loads_land_at_their_own_bounds() {
        let projection = LocalProjection::default();
        let mut layer = RasterLayer::new(4, projection, GroundOptions::default());
        let requests = layer.request_tiles(DEFAULT_ORIGIN, |t| format!("{}/{}/{}", t.zoom, t.x, t.y));
        assert_eq!(requests.len(), 16);

        let last = layer.tile_loaded(requests[15].request, Ok(())).expect("placed");
        let failed = layer.tile_loaded(requests[3].request, Err(TileLoadError::new("404")));
        let first = layer.tile_loaded(requests[0].request, Ok(())).expect("placed");

        assert!(failed.is_none());
        assert_eq!(last.rect, requests[15].tile.scene_rect(&projection));
        assert_eq!(first.rect, requests[0].tile.scene_rect(&projection));
        assert_eq!(first.opacity, 0.45);
        assert_eq!(first.elevation, 0.01);

        let quads: Vec<TileCoord> = layer.quads().iter().map(|q| q.tile).collect();
        assert_eq!(quads, vec![requests[0].tile, requests[15].tile]);
        assert_eq!(layer.pending(), 13);
        assert_eq!(layer.cancel(), 13);
    }
}
