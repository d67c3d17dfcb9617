use std::collections::BTreeMap;

use foundation::math::{LatLng, LocalProjection, TileCoord, TileRect, tile_grid};
use tracing::debug;

use crate::request::Request;
use crate::residency::ResidencyState;

#[derive(Debug, Clone, PartialEq)]
pub struct TileRequest {
    pub request: Request,
    pub tile: TileCoord,
    pub url: String,
}

/// Where a loaded tile goes: a ground quad covering `rect` at `elevation`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TilePlacement {
    pub tile: TileCoord,
    pub rect: TileRect,
    pub elevation: f64,
    pub opacity: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLoadError {
    pub reason: String,
}

impl TileLoadError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for TileLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tile load failed: {}", self.reason)
    }
}

impl std::error::Error for TileLoadError {}

/// Fire-and-forget ground tile loading.
///
/// Every tile is placed from its own coordinates the moment it completes,
/// so completion order does not matter and a failure affects only itself.
#[derive(Debug)]
pub struct TilePipeline {
    projection: LocalProjection,
    elevation: f64,
    opacity: f32,
    next_request: u64,
    pending: BTreeMap<Request, TileCoord>,
    states: BTreeMap<TileCoord, ResidencyState>,
}

impl TilePipeline {
    pub fn new(projection: LocalProjection, elevation: f64, opacity: f32) -> Self {
        Self {
            projection,
            elevation,
            opacity,
            next_request: 0,
            pending: BTreeMap::new(),
            states: BTreeMap::new(),
        }
    }

    /// Requests the `grid * grid` tiles around `center`. Tiles already known are skipped.
    pub fn request_grid(
        &mut self,
        center: LatLng,
        zoom: u8,
        grid: u32,
        url_for: impl Fn(TileCoord) -> String,
    ) -> Vec<TileRequest> {
        let mut out = Vec::new();
        for tile in tile_grid(center, zoom, grid) {
            if self.states.contains_key(&tile) {
                continue;
            }
            let request = Request(self.next_request);
            self.next_request += 1;
            self.pending.insert(request, tile);
            self.states.insert(tile, ResidencyState::Requested);
            out.push(TileRequest {
                request,
                tile,
                url: url_for(tile),
            });
        }
        out
    }

    /// Settles `request`. Returns the placement for a successful, still-pending load.
    ///
    /// Unknown or already-settled requests (for example after [`cancel_all`](Self::cancel_all))
    /// are ignored.
    pub fn complete(
        &mut self,
        request: Request,
        result: Result<(), TileLoadError>,
    ) -> Option<TilePlacement> {
        let tile = self.pending.remove(&request)?;
        match result {
            Ok(()) => {
                self.states.insert(tile, ResidencyState::Resident);
                Some(self.placement(tile))
            }
            Err(err) => {
                debug!(zoom = tile.zoom, x = tile.x, y = tile.y, %err, "skipping tile");
                self.states.insert(tile, ResidencyState::Failed);
                None
            }
        }
    }

    pub fn placement(&self, tile: TileCoord) -> TilePlacement {
        TilePlacement {
            tile,
            rect: tile.scene_rect(&self.projection),
            elevation: self.elevation,
            opacity: self.opacity,
        }
    }

    pub fn state(&self, tile: TileCoord) -> Option<ResidencyState> {
        self.states.get(&tile).copied()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Resident tiles in coordinate order.
    pub fn resident(&self) -> impl Iterator<Item = TilePlacement> + '_ {
        self.states
            .iter()
            .filter(|(_, s)| **s == ResidencyState::Resident)
            .map(|(tile, _)| self.placement(*tile))
    }

    /// Drops every outstanding request; late completions become no-ops.
    pub fn cancel_all(&mut self) -> usize {
        let n = self.pending.len();
        for tile in self.pending.values() {
            self.states.remove(tile);
        }
        self.pending.clear();
        n
    }
}

#[cfg(test)]
mod tests {
    use super::{TileLoadError, TilePipeline};
    use crate::residency::ResidencyState;
    use foundation::math::{DEFAULT_ORIGIN, LocalProjection, TileCoord};

    fn pipeline() -> TilePipeline {
        TilePipeline::new(LocalProjection::default(), 0.01, 0.45)
    }

    fn url(t: TileCoord) -> String {
        format!("{}/{}/{}", t.zoom, t.x, t.y)
    }

    #[test]
    fn requests_a_square_grid_once() {
        let mut p = pipeline();
        let reqs = p.request_grid(DEFAULT_ORIGIN, 14, 4, url);
        assert_eq!(reqs.len(), 16);
        assert_eq!(reqs[0].url, "14/4599/6432");
        assert_eq!(p.pending_len(), 16);
        assert!(p.request_grid(DEFAULT_ORIGIN, 14, 4, url).is_empty());
    }

    #[test]
    fn out_of_order_completions_land_at_their_own_bounds() {
        let projection = LocalProjection::default();
        let mut p = pipeline();
        let reqs = p.request_grid(DEFAULT_ORIGIN, 14, 4, url);
        let (a, b) = (&reqs[3], &reqs[12]);

        let placed_b = p.complete(b.request, Ok(())).expect("b placed");
        let placed_a = p.complete(a.request, Ok(())).expect("a placed");

        assert_eq!(placed_a.rect, a.tile.scene_rect(&projection));
        assert_eq!(placed_b.rect, b.tile.scene_rect(&projection));
        assert_eq!(placed_a.elevation, 0.01);
        assert_eq!(p.resident().count(), 2);
    }

    #[test]
    fn failure_is_skipped_without_blocking_others() {
        let mut p = pipeline();
        let reqs = p.request_grid(DEFAULT_ORIGIN, 14, 2, url);
        assert!(
            p.complete(reqs[0].request, Err(TileLoadError::new("404")))
                .is_none()
        );
        assert!(p.complete(reqs[1].request, Ok(())).is_some());
        assert_eq!(p.state(reqs[0].tile), Some(ResidencyState::Failed));
        assert_eq!(p.state(reqs[1].tile), Some(ResidencyState::Resident));
        assert!(p.state(reqs[0].tile).is_some_and(|s| s.is_settled()));
    }

    #[test]
    fn cancelled_requests_ignore_late_completions() {
        let mut p = pipeline();
        let reqs = p.request_grid(DEFAULT_ORIGIN, 14, 2, url);
        assert!(p.complete(reqs[0].request, Ok(())).is_some());
        assert_eq!(p.cancel_all(), 3);
        assert!(p.complete(reqs[1].request, Ok(())).is_none());
        assert!(p.complete(reqs[0].request, Ok(())).is_none());
        assert_eq!(p.resident().count(), 1);
    }
}
