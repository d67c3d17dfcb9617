//! One viewer session: the loaded catalog, its GPU batches, and the
//! interaction state driving them.
//!
//! Nothing here touches the browser. The host forwards pointer, wheel and
//! frame callbacks, passes its `GpuBackend` into the calls that upload, and
//! drains `UiEvent`s to update the DOM.

use foundation::math::{Vec2, Vec3};
use foundation::time::Time;
use formats::{ConfigError, DatasetError, ViewerConfig, parse_tree_dataset};
use gpu::{Camera3D, GpuBackend, GroundQuad, RenderFrame, Renderer, pixel_to_ndc};
use layers::labels::{CameraProjector, LabelLayoutConfig, PlacedLabel2D, layout_labels_2d};
use layers::{
    BatchError, ClickDetector, FilterOutcome, FilterStyle, ForestLayer, Gesture, GroundOptions,
    HighlightEngine, Layer, PickTarget, RasterLayer, ScenePicker, SignpostLayer, SignpostOptions,
};
use rand::Rng;
use runtime::animation::{CameraPose, Easing, Flight, FlightDirector};
use runtime::event_bus::{EventBus, Stamped};
use runtime::frame::Frame;
use scene::catalog::EntityCatalog;
use scene::stats::{NeighborhoodOption, StatsSnapshot, neighborhood_options};
use scene::tree::{InfoCard, TreeRecord};
use streaming::{Request, TileLoadError, TileRequest};
use tracing::{debug, info, warn};

use crate::controls::{DragMode, OrbitControls};

const FOREST_LAYER: u64 = 1;
const SIGNPOST_LAYER: u64 = 2;
const GROUND_LAYER: u64 = 3;

const INTRO_POSITION: Vec3 = Vec3::new(100.0, 240.0, -710.0);
const INTRO_TARGET: Vec3 = Vec3::new(100.0, 0.0, -350.0);
/// Tooltips sit down-right of the pointer.
const TOOLTIP_OFFSET_PX: f64 = 14.0;

#[derive(Debug)]
pub enum SessionError {
    NotLoaded,
    Dataset(DatasetError),
    Config(ConfigError),
    Batch(BatchError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::NotLoaded => write!(f, "no tree dataset loaded"),
            SessionError::Dataset(e) => write!(f, "failed to load tree data: {e}"),
            SessionError::Config(e) => write!(f, "{e}"),
            SessionError::Batch(e) => write!(f, "batch update failed: {e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::NotLoaded => None,
            SessionError::Dataset(e) => Some(e),
            SessionError::Config(e) => Some(e),
            SessionError::Batch(e) => Some(e),
        }
    }
}

impl From<DatasetError> for SessionError {
    fn from(e: DatasetError) -> Self {
        SessionError::Dataset(e)
    }
}

impl From<ConfigError> for SessionError {
    fn from(e: ConfigError) -> Self {
        SessionError::Config(e)
    }
}

impl From<BatchError> for SessionError {
    fn from(e: BatchError) -> Self {
        SessionError::Batch(e)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
}

/// What the DOM surfaces should show.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Tooltip { text: String, at: Vec2 },
    TooltipHidden,
    InfoCard(InfoCard),
    InfoCardHidden,
    /// `neighborhood` is `None` after a clear.
    FilterChanged {
        neighborhood: Option<String>,
        matches: usize,
    },
    IntroFinished,
}

#[derive(Debug)]
pub struct ViewerSession {
    config: ViewerConfig,
    catalog: EntityCatalog,
    forest: ForestLayer,
    signposts: SignpostLayer,
    ground: RasterLayer,
    picker: ScenePicker,
    highlight: HighlightEngine,
    flights: FlightDirector,
    controls: OrbitControls,
    clicks: ClickDetector,
    pressed: Option<PointerButton>,
    camera: Camera3D,
    viewport_px: [f64; 2],
    hovered: Option<PickTarget>,
    intro_active: bool,
    frame: Frame,
    events: EventBus<UiEvent>,
}

impl ViewerSession {
    /// Parses a GeoJSON payload and starts a session. A payload that cannot be
    /// parsed is fatal; nothing is uploaded.
    pub fn from_payload<R: Rng + ?Sized>(
        payload: &str,
        config: ViewerConfig,
        backend: &mut dyn GpuBackend,
        rng: &mut R,
        now: Time,
    ) -> Result<Self, SessionError> {
        let records = parse_tree_dataset(payload)?;
        Self::start(records, config, backend, rng, now)
    }

    /// Builds the catalog and every layer, uploads the forest and starts the
    /// intro flight. Orbit input stays off until the intro lands.
    pub fn start<R: Rng + ?Sized>(
        records: Vec<TreeRecord>,
        config: ViewerConfig,
        backend: &mut dyn GpuBackend,
        rng: &mut R,
        now: Time,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let projection = config.projection();
        let catalog = EntityCatalog::load(records, &projection, rng);

        let mut forest = ForestLayer::build(FOREST_LAYER, &catalog, backend, rng)?;
        let uploaded = forest.commit(backend);
        let picker = ScenePicker::build(&forest);

        let signposts = SignpostLayer::build(
            SIGNPOST_LAYER,
            &catalog,
            &SignpostOptions {
                limit: config.signposts.limit,
                elevation: config.signposts.elevation,
                width: config.signposts.width,
                height: config.signposts.height,
                excluded: config.signposts.excluded.clone(),
            },
        );
        let ground = RasterLayer::new(
            GROUND_LAYER,
            projection,
            GroundOptions {
                zoom: config.tiles.zoom,
                grid: config.tiles.grid,
                elevation: config.tiles.elevation,
                opacity: config.tiles.opacity,
            },
        );

        let h = &config.highlight;
        let highlight = HighlightEngine::new(
            FilterStyle::new(h.dim_factor, h.trunk_match_opacity, h.trunk_dimmed_opacity),
            config.focus_offset(),
            CameraPose::new(config.overview_position(), config.overview_target()),
        );

        let start_pose = CameraPose::new(config.start_position(), Vec3::ZERO);
        let mut flights = FlightDirector::new(start_pose);
        flights.start(Flight {
            from: start_pose,
            to: CameraPose::new(INTRO_POSITION, INTRO_TARGET),
            start: now,
            duration_s: config.camera.intro_ms / 1000.0,
            easing: Easing::CubicInOut,
        });

        let mut controls = OrbitControls::new(&config.camera);
        controls.enabled = false;

        let cam = &config.camera;
        let camera = Camera3D::look_at(
            start_pose.position,
            start_pose.target,
            cam.fov_deg.to_radians(),
            cam.near,
            cam.far,
        );

        info!(
            trees = catalog.len(),
            buckets = catalog.buckets().len(),
            signposts = signposts.len(),
            uploaded,
            "viewer session started"
        );

        Ok(Self {
            clicks: ClickDetector::new(
                config.gestures.click_max_distance_px,
                config.gestures.click_max_ms,
            ),
            config,
            catalog,
            forest,
            signposts,
            ground,
            picker,
            highlight,
            flights,
            controls,
            camera,
            viewport_px: [1.0, 1.0],
            pressed: None,
            hovered: None,
            intro_active: true,
            frame: Frame::first(now),
            events: EventBus::new(),
        })
    }

    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera3D {
        &self.camera
    }

    pub fn forest(&self) -> &ForestLayer {
        &self.forest
    }

    pub fn signposts(&self) -> &SignpostLayer {
        &self.signposts
    }

    pub fn intro_active(&self) -> bool {
        self.intro_active
    }

    pub fn controls_enabled(&self) -> bool {
        self.controls.enabled
    }

    pub fn active_filter(&self) -> Option<&str> {
        self.highlight.active()
    }

    pub fn hovered(&self) -> Option<PickTarget> {
        self.hovered
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn resize(&mut self, width_px: f64, height_px: f64) {
        self.viewport_px = [width_px, height_px];
        self.camera.set_viewport(width_px, height_px);
    }

    /// Advances flights to `now` and moves the camera. Called once per
    /// animation frame.
    pub fn tick(&mut self, now: Time) -> CameraPose {
        self.frame = self.frame.advance(now);
        let pose = self.flights.tick(now);
        self.camera.set_pose(pose);
        if self.intro_active && !self.flights.is_active() {
            self.intro_active = false;
            self.controls.enabled = true;
            debug!(frame = self.frame.index, "intro finished");
            self.events.emit(self.frame, UiEvent::IntroFinished);
        }
        pose
    }

    /// Places the camera directly. An active flight still wins on the next tick.
    pub fn set_camera_pose(&mut self, pose: CameraPose) {
        self.flights.set_pose(pose);
        self.camera.set_pose(pose);
    }

    pub fn pick_at(&self, at: Vec2) -> Option<PickTarget> {
        let ndc = pixel_to_ndc(at.x, at.y, self.viewport_px[0], self.viewport_px[1]);
        self.picker
            .pick(ndc, &self.camera, &self.signposts, &self.catalog)
    }

    pub fn pointer_down(&mut self, at: Vec2, button: PointerButton, shift: bool, now: Time) {
        self.clicks.press(at, now);
        self.pressed = Some(button);
        let mode = match (button, shift) {
            (PointerButton::Secondary, _) | (PointerButton::Primary, true) => DragMode::Pan,
            (PointerButton::Primary, false) => DragMode::Orbit,
        };
        self.controls.begin_drag(mode, at);
    }

    /// Drags the camera when a drag is in progress; otherwise updates the
    /// hover tooltip.
    pub fn pointer_move(&mut self, at: Vec2) -> Option<PickTarget> {
        if let Some(pose) = self.controls.drag_to(self.flights.pose(), at) {
            self.set_camera_pose(pose);
            if self.hovered.take().is_some() {
                self.events.emit(self.frame, UiEvent::TooltipHidden);
            }
            return None;
        }

        let hit = self.pick_at(at);
        let text = match hit {
            Some(PickTarget::Signpost(i)) => self.signposts.get(i).map(|s| s.tooltip.clone()),
            Some(PickTarget::Tree(id)) => self.catalog.tree(id).map(|t| t.tooltip()),
            None => None,
        };
        match text {
            Some(text) => {
                let offset = Vec2::new(TOOLTIP_OFFSET_PX, TOOLTIP_OFFSET_PX);
                self.events.emit(self.frame, UiEvent::Tooltip { text, at: at + offset });
            }
            None if self.hovered.is_some() => {
                self.events.emit(self.frame, UiEvent::TooltipHidden);
            }
            None => {}
        }
        self.hovered = hit;
        hit
    }

    /// Ends a drag. A primary-button click opens a tree's card, filters by a
    /// signpost's neighborhood, or hides the card when it lands on nothing.
    pub fn pointer_up(
        &mut self,
        at: Vec2,
        now: Time,
        backend: &mut dyn GpuBackend,
    ) -> Result<Option<PickTarget>, SessionError> {
        self.controls.end_drag();
        let button = self.pressed.take();
        if self.clicks.release(at, now) == Gesture::Drag || button != Some(PointerButton::Primary) {
            return Ok(None);
        }

        let hit = self.pick_at(at);
        match hit {
            Some(PickTarget::Signpost(i)) => {
                if let Some(name) = self.signposts.get(i).map(|s| s.neighborhood.clone()) {
                    self.apply_filter(Some(&name), backend, now)?;
                }
            }
            Some(PickTarget::Tree(id)) => match self.catalog.tree(id) {
                Some(tree) => self.events.emit(self.frame, UiEvent::InfoCard(tree.info_card())),
                None => warn!(tree = id.0, "picked tree missing from catalog"),
            },
            None => self.events.emit(self.frame, UiEvent::InfoCardHidden),
        }
        Ok(hit)
    }

    pub fn wheel(&mut self, delta_y: f64) {
        if !self.controls.enabled {
            return;
        }
        let pose = self.controls.zoom(self.flights.pose(), delta_y);
        self.set_camera_pose(pose);
    }

    /// Highlights a neighborhood (or clears with `None`/empty), commits the
    /// recolored batches, and flies to the result.
    pub fn apply_filter(
        &mut self,
        neighborhood: Option<&str>,
        backend: &mut dyn GpuBackend,
        now: Time,
    ) -> Result<FilterOutcome, SessionError> {
        let outcome = self
            .highlight
            .apply_filter(neighborhood, &self.catalog, &mut self.forest)?;
        let written = self.forest.commit(backend);
        debug!(written, matches = outcome.matches, "filter committed");

        if let Some(to) = outcome.flight {
            self.fly_to(to, now);
        }
        self.events.emit(
            self.frame,
            UiEvent::FilterChanged {
                neighborhood: self.highlight.active().map(str::to_string),
                matches: outcome.matches,
            },
        );
        Ok(outcome)
    }

    /// Flies to face north over the current target, keeping height.
    pub fn reset_north(&mut self, now: Time) {
        let pose = self.flights.pose();
        let distance = pose.distance();
        let t = pose.target;
        let to = CameraPose::new(
            Vec3::new(t.x, pose.position.y, t.z - distance * 0.8),
            Vec3::new(t.x, 0.0, t.z),
        );
        self.fly_to(to, now);
    }

    pub fn compass_heading_deg(&self) -> f64 {
        self.camera.heading_deg()
    }

    fn fly_to(&mut self, to: CameraPose, now: Time) {
        self.flights.fly_to(
            to,
            now,
            self.config.camera.flight_ms / 1000.0,
            Easing::QuadInOut,
        );
    }

    /// Ground tile requests around the projection origin, for the host to fetch.
    pub fn request_tiles(&mut self) -> Vec<TileRequest> {
        let origin = self.config.projection().origin;
        let config = &self.config;
        self.ground.request_tiles(origin, |tile| config.tile_url(tile))
    }

    pub fn tile_loaded(
        &mut self,
        request: Request,
        result: Result<(), TileLoadError>,
    ) -> Option<GroundQuad> {
        self.ground.tile_loaded(request, result)
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot::from_catalog(&self.catalog)
    }

    pub fn neighborhood_options(&self) -> Vec<NeighborhoodOption> {
        neighborhood_options(&self.catalog)
    }

    /// Screen placement for the signpost pills this frame.
    pub fn signpost_labels(&self) -> Vec<PlacedLabel2D> {
        let projector = CameraProjector {
            camera: &self.camera,
            viewport_px: self.viewport_px,
        };
        layout_labels_2d(
            &self.signposts.label_anchors(),
            &projector,
            LabelLayoutConfig {
                viewport_px: [self.viewport_px[0] as f32, self.viewport_px[1] as f32],
                ..LabelLayoutConfig::default()
            },
        )
    }

    pub fn draw_frame(&self) -> RenderFrame {
        Renderer::collect(&self.camera, self.forest.draws(), self.ground.quads())
    }

    pub fn drain_events(&mut self) -> Vec<Stamped<UiEvent>> {
        self.events.drain()
    }

    /// Releases every batch and template and drops pending tile loads.
    pub fn teardown(mut self, backend: &mut dyn GpuBackend) {
        for layer in [&self.forest as &dyn Layer, &self.signposts, &self.ground] {
            debug!(id = layer.id().0, layer = layer.name(), "dropping layer");
        }
        let cancelled = self.ground.cancel();
        self.flights.cancel();
        self.forest.release(backend);
        info!(cancelled_tiles = cancelled, "viewer session torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::{PointerButton, SessionError, UiEvent, ViewerSession};
    use foundation::math::{Vec2, Vec3};
    use foundation::time::Time;
    use formats::ViewerConfig;
    use gpu::{RecordingBackend, RenderCommand};
    use layers::PickTarget;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use runtime::animation::CameraPose;
    use scene::tree::Tree;
    use streaming::TileLoadError;

    const PAYLOAD: &str = include_str!("../assets/trees-data.json");

    fn session(backend: &mut RecordingBackend) -> ViewerSession {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut s =
            ViewerSession::from_payload(PAYLOAD, ViewerConfig::default(), backend, &mut rng, Time(0.0))
                .expect("session");
        s.resize(800.0, 600.0);
        s
    }

    /// Past the intro, with the camera directly above `tree`.
    fn over(s: &mut ViewerSession, tree: &Tree) {
        s.tick(Time(4.0));
        let ground = tree.position.at_height(0.0);
        s.set_camera_pose(CameraPose::new(
            Vec3::new(ground.x, 300.0, ground.z + 1.0),
            ground,
        ));
    }

    fn events(s: &mut ViewerSession) -> Vec<UiEvent> {
        s.drain_events().into_iter().map(|e| e.event).collect()
    }

    fn canopy_colors(s: &ViewerSession, backend: &RecordingBackend) -> Vec<[f32; 3]> {
        s.forest()
            .groups()
            .iter()
            .flat_map(|g| {
                backend
                    .batch(g.canopy.handle())
                    .map(|b| b.instances.iter().map(|i| i.color).collect::<Vec<_>>())
                    .unwrap_or_default()
            })
            .collect()
    }

    #[test]
    fn start_uploads_every_bucket_and_plays_the_intro() {
        let mut backend = RecordingBackend::new();
        let mut s = session(&mut backend);
        let buckets = s.catalog().buckets().len();
        assert_eq!(s.catalog().len(), 10);
        assert_eq!(backend.live_batches(), buckets * 2);
        assert!(s.intro_active());
        assert!(!s.controls_enabled());

        s.wheel(-500.0);
        let mid = s.tick(Time(1.75));
        assert!(s.intro_active());
        assert_eq!(mid.position.x, 50.0);

        let end = s.tick(Time(3.5));
        assert_eq!(end.position, Vec3::new(100.0, 240.0, -710.0));
        assert_eq!(end.target, Vec3::new(100.0, 0.0, -350.0));
        assert!(!s.intro_active());
        assert!(s.controls_enabled());
        assert_eq!(events(&mut s), vec![UiEvent::IntroFinished]);
    }

    #[test]
    fn unparseable_payload_is_fatal() {
        let mut backend = RecordingBackend::new();
        let mut rng = SmallRng::seed_from_u64(1);
        let err = ViewerSession::from_payload(
            "{\"type\":\"Feature\"}",
            ViewerConfig::default(),
            &mut backend,
            &mut rng,
            Time(0.0),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::Dataset(_)));
        assert_eq!(backend.live_batches(), 0);
    }

    #[test]
    fn filter_then_clear_restores_uploaded_colors() {
        let mut backend = RecordingBackend::new();
        let mut s = session(&mut backend);
        let original = canopy_colors(&s, &backend);

        for _ in 0..3 {
            let outcome = s
                .apply_filter(Some("Trinity Park"), &mut backend, Time(1.0))
                .expect("filter");
            assert_eq!(outcome.matches, 3);
            assert!(outcome.flight.is_some());
            assert_ne!(canopy_colors(&s, &backend), original);

            s.apply_filter(None, &mut backend, Time(2.0)).expect("clear");
            assert_eq!(canopy_colors(&s, &backend), original);
        }
        assert_eq!(s.active_filter(), None);

        let last = events(&mut s).pop();
        assert_eq!(
            last,
            Some(UiEvent::FilterChanged {
                neighborhood: None,
                matches: 10
            })
        );
    }

    #[test]
    fn unknown_neighborhood_dims_without_flying() {
        let mut backend = RecordingBackend::new();
        let mut s = session(&mut backend);
        s.tick(Time(4.0));
        let pose = s.camera().pose();
        let outcome = s
            .apply_filter(Some("Nowhere"), &mut backend, Time(4.0))
            .expect("filter");
        assert_eq!(outcome.matches, 0);
        assert_eq!(outcome.flight, None);
        assert_eq!(s.tick(Time(5.0)), pose);
    }

    #[test]
    fn click_on_a_tree_opens_its_card() {
        let mut backend = RecordingBackend::new();
        let mut s = session(&mut backend);
        // "Other" has no signpost in front of it.
        let tree = s.catalog().trees()[7].clone();
        over(&mut s, &tree);
        events(&mut s);

        let center = Vec2::new(400.0, 300.0);
        assert_eq!(s.pointer_move(center), Some(PickTarget::Tree(tree.id)));
        s.pointer_down(center, PointerButton::Primary, false, Time(5.0));
        let hit = s.pointer_up(center, Time(5.1), &mut backend).expect("click");
        assert_eq!(hit, Some(PickTarget::Tree(tree.id)));

        let got = events(&mut s);
        assert_eq!(
            got,
            vec![
                UiEvent::Tooltip {
                    text: tree.tooltip(),
                    at: Vec2::new(414.0, 314.0)
                },
                UiEvent::InfoCard(tree.info_card()),
            ]
        );
    }

    #[test]
    fn click_on_empty_ground_hides_the_card() {
        let mut backend = RecordingBackend::new();
        let mut s = session(&mut backend);
        s.tick(Time(4.0));
        s.set_camera_pose(CameraPose::new(
            Vec3::new(20_000.0, 300.0, 20_001.0),
            Vec3::new(20_000.0, 0.0, 20_000.0),
        ));
        events(&mut s);

        let center = Vec2::new(400.0, 300.0);
        s.pointer_down(center, PointerButton::Primary, false, Time(5.0));
        assert_eq!(s.pointer_up(center, Time(5.2), &mut backend).expect("click"), None);
        assert_eq!(events(&mut s), vec![UiEvent::InfoCardHidden]);
    }

    #[test]
    fn drag_orbits_instead_of_clicking() {
        let mut backend = RecordingBackend::new();
        let mut s = session(&mut backend);
        s.tick(Time(4.0));
        let before = s.camera().pose();
        events(&mut s);

        s.pointer_down(Vec2::new(100.0, 100.0), PointerButton::Primary, false, Time(5.0));
        s.pointer_move(Vec2::new(200.0, 100.0));
        let hit = s
            .pointer_up(Vec2::new(200.0, 100.0), Time(5.1), &mut backend)
            .expect("release");
        assert_eq!(hit, None);
        let after = s.camera().pose();
        assert_ne!(after.position, before.position);
        assert_eq!(after.target, before.target);
        assert!(!events(&mut s).contains(&UiEvent::InfoCardHidden));
    }

    #[test]
    fn secondary_click_is_not_a_pick() {
        let mut backend = RecordingBackend::new();
        let mut s = session(&mut backend);
        let tree = s.catalog().trees()[7].clone();
        over(&mut s, &tree);
        events(&mut s);

        let center = Vec2::new(400.0, 300.0);
        s.pointer_down(center, PointerButton::Secondary, false, Time(5.0));
        assert_eq!(s.pointer_up(center, Time(5.1), &mut backend).expect("release"), None);
        assert_eq!(events(&mut s), Vec::new());

        // a release with no press on record is not a click either
        assert_eq!(s.pointer_up(center, Time(5.3), &mut backend).expect("release"), None);
        assert_eq!(events(&mut s), Vec::new());

        s.pointer_down(center, PointerButton::Primary, false, Time(6.0));
        assert_eq!(
            s.pointer_up(center, Time(6.1), &mut backend).expect("click"),
            Some(PickTarget::Tree(tree.id))
        );
    }

    #[test]
    fn dragging_hides_the_tooltip_and_skips_hover() {
        let mut backend = RecordingBackend::new();
        let mut s = session(&mut backend);
        let tree = s.catalog().trees()[7].clone();
        over(&mut s, &tree);
        events(&mut s);

        let center = Vec2::new(400.0, 300.0);
        assert_eq!(s.pointer_move(center), Some(PickTarget::Tree(tree.id)));
        s.pointer_down(center, PointerButton::Primary, false, Time(5.0));
        assert_eq!(s.pointer_move(Vec2::new(402.0, 300.0)), None);
        assert_eq!(s.pointer_move(Vec2::new(404.0, 300.0)), None);
        assert_eq!(s.hovered(), None);
        assert_eq!(
            events(&mut s),
            vec![
                UiEvent::Tooltip {
                    text: tree.tooltip(),
                    at: Vec2::new(414.0, 314.0)
                },
                UiEvent::TooltipHidden,
            ]
        );
    }

    #[test]
    fn reset_north_faces_north() {
        let mut backend = RecordingBackend::new();
        let mut s = session(&mut backend);
        s.tick(Time(4.0));
        s.reset_north(Time(4.0));
        s.tick(Time(6.0));
        assert!(s.compass_heading_deg().abs() < 1e-9);
        assert_eq!(s.camera().target, Vec3::new(100.0, 0.0, -350.0));
    }

    #[test]
    fn draw_frame_has_one_command_per_batch_and_tile() {
        let mut backend = RecordingBackend::new();
        let mut s = session(&mut backend);
        let requests = s.request_tiles();
        assert_eq!(requests.len(), 16);
        assert!(s.tile_loaded(requests[5].request, Ok(())).is_some());
        assert!(
            s.tile_loaded(requests[2].request, Err(TileLoadError::new("offline")))
                .is_none()
        );

        let frame = s.draw_frame();
        let buckets = s.catalog().buckets().len();
        assert_eq!(frame.draw_calls(), buckets * 2 + 1);
        assert!(matches!(frame.commands[0], RenderCommand::GroundTile { .. }));
        assert_eq!(frame.instance_count(), 20 + 1);
    }

    #[test]
    fn teardown_releases_everything() {
        let mut backend = RecordingBackend::new();
        let s = session(&mut backend);
        assert!(backend.live_meshes() > 0);
        s.teardown(&mut backend);
        assert_eq!(backend.live_batches(), 0);
        assert_eq!(backend.live_meshes(), 0);
    }
}
