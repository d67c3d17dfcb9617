use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use formats::{ConfigError, DatasetError, ViewerConfig, load_tree_dataset};
use gpu::{Camera3D, RecordingBackend, pixel_to_ndc};
use layers::{BatchError, ForestLayer, PickTarget, ScenePicker, SignpostLayer, SignpostOptions};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use scene::catalog::EntityCatalog;
use scene::classify;
use scene::stats::{StatsSnapshot, neighborhood_options};
use scene::tree::TreeRecord;
use serde_json::{Value, json};
use streaming::TilePipeline;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Size jitter is cosmetic; a fixed seed keeps headless picks repeatable.
const HEADLESS_SEED: u64 = 0x7ee5;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect a street-tree dataset the way the viewer sees it")]
struct Args {
    /// Viewer config JSON; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summary statistics for the stats panel
    Stats { dataset: PathBuf },
    /// Neighborhood filter options
    Neighborhoods { dataset: PathBuf },
    /// Signposts with their scene positions and tooltips
    Signposts { dataset: PathBuf },
    /// Ground tile plan with scene rectangles and URLs
    Tiles,
    /// Shape and colors for a genus
    Classify { genus: String },
    /// Pick from the overview camera pose
    Pick {
        dataset: PathBuf,
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long, default_value_t = 1280.0)]
        width: f64,
        #[arg(long, default_value_t = 720.0)]
        height: f64,
    },
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Dataset(DatasetError),
    Batch(BatchError),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "{e}"),
            CliError::Dataset(e) => write!(f, "{e}"),
            CliError::Batch(e) => write!(f, "{e}"),
            CliError::Json(e) => write!(f, "failed to encode output: {e}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<DatasetError> for CliError {
    fn from(e: DatasetError) -> Self {
        CliError::Dataset(e)
    }
}

impl From<BatchError> for CliError {
    fn from(e: BatchError) -> Self {
        CliError::Batch(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(out) => println!("{out}"),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<String, CliError> {
    let config = match &args.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };

    let report = match args.command {
        Command::Stats { dataset } => stats_report(&load_catalog(&dataset, &config)?)?,
        Command::Neighborhoods { dataset } => {
            serde_json::to_value(neighborhood_options(&load_catalog(&dataset, &config)?))?
        }
        Command::Signposts { dataset } => {
            let catalog = load_catalog(&dataset, &config)?;
            signpost_report(&SignpostLayer::build(0, &catalog, &signpost_options(&config)))
        }
        Command::Tiles => tile_plan(&config),
        Command::Classify { genus } => classify_report(&genus),
        Command::Pick {
            dataset,
            x,
            y,
            width,
            height,
        } => {
            let records = load_tree_dataset(&dataset)?;
            let scene = HeadlessScene::build(records, &config)?;
            info!(
                trees = scene.catalog.len(),
                batches = scene.forest.draws().len(),
                "headless scene ready"
            );
            let camera = scene.overview_camera(&config, width, height);
            pick_report(&scene, scene.pick(&camera, x, y, width, height))
        }
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn load_catalog(path: &Path, config: &ViewerConfig) -> Result<EntityCatalog, CliError> {
    let records = load_tree_dataset(path)?;
    let catalog = EntityCatalog::load(
        records,
        &config.projection(),
        &mut SmallRng::seed_from_u64(HEADLESS_SEED),
    );
    info!(trees = catalog.len(), path = %path.display(), "dataset loaded");
    Ok(catalog)
}

fn signpost_options(config: &ViewerConfig) -> SignpostOptions {
    SignpostOptions {
        limit: config.signposts.limit,
        elevation: config.signposts.elevation,
        width: config.signposts.width,
        height: config.signposts.height,
        excluded: config.signposts.excluded.clone(),
    }
}

fn stats_report(catalog: &EntityCatalog) -> Result<Value, CliError> {
    Ok(serde_json::to_value(StatsSnapshot::from_catalog(catalog))?)
}

fn signpost_report(layer: &SignpostLayer) -> Value {
    Value::Array(
        layer
            .signposts()
            .iter()
            .map(|s| {
                json!({
                    "neighborhood": s.neighborhood,
                    "count": s.count,
                    "position": [s.position.x, s.position.y, s.position.z],
                    "subtitle": s.subtitle(),
                    "tooltip": s.tooltip,
                })
            })
            .collect(),
    )
}

fn tile_plan(config: &ViewerConfig) -> Value {
    let projection = config.projection();
    let mut pipeline = TilePipeline::new(projection, config.tiles.elevation, config.tiles.opacity);
    let requests = pipeline.request_grid(
        projection.origin,
        config.tiles.zoom,
        config.tiles.grid,
        |tile| config.tile_url(tile),
    );
    Value::Array(
        requests
            .iter()
            .map(|r| {
                let rect = pipeline.placement(r.tile).rect;
                json!({
                    "z": r.tile.zoom,
                    "x": r.tile.x,
                    "y": r.tile.y,
                    "url": r.url,
                    "center": [rect.center.x, rect.center.z],
                    "width": rect.width,
                    "depth": rect.depth,
                })
            })
            .collect(),
    )
}

fn classify_report(genus: &str) -> Value {
    let archetype = classify(genus);
    json!({
        "genus": genus,
        "shape": archetype.shape.as_str(),
        "canopy": format!("#{:06x}", archetype.canopy),
        "seasonal": archetype.seasonal.map(|c| format!("#{c:06x}")),
    })
}

/// Catalog, batches and picker without a window; uploads go to a recorder.
struct HeadlessScene {
    catalog: EntityCatalog,
    forest: ForestLayer,
    signposts: SignpostLayer,
    picker: ScenePicker,
}

impl HeadlessScene {
    fn build(records: Vec<TreeRecord>, config: &ViewerConfig) -> Result<Self, CliError> {
        let mut rng = SmallRng::seed_from_u64(HEADLESS_SEED);
        let catalog = EntityCatalog::load(records, &config.projection(), &mut rng);
        let mut backend = RecordingBackend::new();
        let mut forest = ForestLayer::build(1, &catalog, &mut backend, &mut rng)?;
        forest.commit(&mut backend);
        let picker = ScenePicker::build(&forest);
        let signposts = SignpostLayer::build(2, &catalog, &signpost_options(config));
        Ok(Self {
            catalog,
            forest,
            signposts,
            picker,
        })
    }

    fn overview_camera(&self, config: &ViewerConfig, width: f64, height: f64) -> Camera3D {
        let cam = &config.camera;
        let mut camera = Camera3D::look_at(
            config.overview_position(),
            config.overview_target(),
            cam.fov_deg.to_radians(),
            cam.near,
            cam.far,
        );
        camera.set_viewport(width, height);
        camera
    }

    fn pick(&self, camera: &Camera3D, x: f64, y: f64, width: f64, height: f64) -> Option<PickTarget> {
        let ndc = pixel_to_ndc(x, y, width, height);
        self.picker
            .pick(ndc, camera, &self.signposts, &self.catalog)
    }
}

fn pick_report(scene: &HeadlessScene, target: Option<PickTarget>) -> Value {
    match target {
        Some(PickTarget::Signpost(index)) => match scene.signposts.get(index) {
            Some(sign) => json!({
                "kind": "signpost",
                "neighborhood": sign.neighborhood,
                "tooltip": sign.tooltip,
            }),
            None => json!({ "kind": "none" }),
        },
        Some(PickTarget::Tree(id)) => match scene.catalog.tree(id) {
            Some(tree) => json!({
                "kind": "tree",
                "id": id.0,
                "tooltip": tree.tooltip(),
                "card": tree.info_card(),
            }),
            None => json!({ "kind": "none" }),
        },
        None => json!({ "kind": "none" }),
    }
}
