use std::collections::BTreeMap;

use foundation::bounds::Aabb3;
use foundation::color::Rgb;
use foundation::math::{TileCoord, TileRect, Vec3};
use scene::archetype::Shape;

use crate::camera::{Camera3D, Mat4};

/// What a mesh template is used for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MeshKind {
    Canopy(Shape),
    Trunk,
}

/// Indexed triangle mesh in template (unit) space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounds(&self) -> Option<Aabb3> {
        Aabb3::from_points(
            self.positions
                .iter()
                .map(|p| Vec3::new(p[0] as f64, p[1] as f64, p[2] as f64)),
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchHandle(pub u32);

/// One instance as uploaded: model matrix and color.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InstanceData {
    pub model: Mat4,
    pub color: [f32; 3],
}

impl InstanceData {
    /// Translate * rotate-about-Y * scale.
    pub fn from_trs(position: Vec3, yaw_rad: f64, scale: Vec3, color: Rgb) -> Self {
        let (sin, cos) = yaw_rad.sin_cos();
        Self {
            model: [
                [(cos * scale.x) as f32, 0.0, (-sin * scale.x) as f32, 0.0],
                [0.0, scale.y as f32, 0.0, 0.0],
                [(sin * scale.z) as f32, 0.0, (cos * scale.z) as f32, 0.0],
                [position.x as f32, position.y as f32, position.z as f32, 1.0],
            ],
            color: color.to_array(),
        }
    }

    pub fn translation(&self) -> [f32; 3] {
        [self.model[3][0], self.model[3][1], self.model[3][2]]
    }
}

/// The seam between batch bookkeeping and whatever draws it.
///
/// Handles are only meaningful to the backend that issued them. Writes past a
/// batch's capacity are the caller's bug; backends may ignore them.
pub trait GpuBackend {
    fn create_mesh(&mut self, kind: MeshKind, mesh: &MeshData) -> MeshHandle;

    fn create_batch(&mut self, mesh: MeshHandle, capacity: usize) -> BatchHandle;

    /// Replaces instances `first..first + data.len()`.
    fn write_instances(&mut self, batch: BatchHandle, first: usize, data: &[InstanceData]);

    fn set_batch_opacity(&mut self, batch: BatchHandle, opacity: f32);

    fn release_batch(&mut self, batch: BatchHandle);

    fn release_mesh(&mut self, mesh: MeshHandle);
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BatchDraw {
    pub batch: BatchHandle,
    pub mesh: MeshHandle,
    pub instances: u32,
    pub opacity: f32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RenderCommand {
    Instanced(BatchDraw),
    GroundTile {
        tile: TileCoord,
        rect: TileRect,
        elevation: f64,
        opacity: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub view_proj: Mat4,
    pub commands: Vec<RenderCommand>,
}

impl RenderFrame {
    pub fn draw_calls(&self) -> usize {
        self.commands.len()
    }

    pub fn instance_count(&self) -> u64 {
        self.commands
            .iter()
            .map(|c| match c {
                RenderCommand::Instanced(draw) => draw.instances as u64,
                RenderCommand::GroundTile { .. } => 1,
            })
            .sum()
    }
}

/// Ground tile as handed to [`Renderer::collect`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GroundQuad {
    pub tile: TileCoord,
    pub rect: TileRect,
    pub elevation: f64,
    pub opacity: f32,
}

pub struct Renderer;

impl Renderer {
    /// Tiles first so translucent ground sits under the trees; then one
    /// command per batch. Fully transparent batches are skipped.
    pub fn collect(
        camera: &Camera3D,
        batches: impl IntoIterator<Item = BatchDraw>,
        tiles: impl IntoIterator<Item = GroundQuad>,
    ) -> RenderFrame {
        let mut commands: Vec<RenderCommand> = tiles
            .into_iter()
            .map(|q| RenderCommand::GroundTile {
                tile: q.tile,
                rect: q.rect,
                elevation: q.elevation,
                opacity: q.opacity,
            })
            .collect();
        commands.extend(
            batches
                .into_iter()
                .filter(|b| b.instances > 0 && b.opacity > 0.0)
                .map(RenderCommand::Instanced),
        );
        RenderFrame {
            view_proj: camera.view_proj(),
            commands,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMesh {
    pub kind: MeshKind,
    pub vertices: usize,
    pub triangles: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedBatch {
    pub mesh: MeshHandle,
    pub instances: Vec<InstanceData>,
    pub opacity: f32,
    /// Number of `write_instances` calls received.
    pub writes: usize,
}

/// In-memory backend: keeps the last written state of every live resource.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    meshes: BTreeMap<MeshHandle, RecordedMesh>,
    batches: BTreeMap<BatchHandle, RecordedBatch>,
    next_id: u32,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<&RecordedMesh> {
        self.meshes.get(&handle)
    }

    pub fn batch(&self, handle: BatchHandle) -> Option<&RecordedBatch> {
        self.batches.get(&handle)
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn live_batches(&self) -> usize {
        self.batches.len()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuBackend for RecordingBackend {
    fn create_mesh(&mut self, kind: MeshKind, mesh: &MeshData) -> MeshHandle {
        let handle = MeshHandle(self.next());
        self.meshes.insert(
            handle,
            RecordedMesh {
                kind,
                vertices: mesh.vertex_count(),
                triangles: mesh.triangle_count(),
            },
        );
        handle
    }

    fn create_batch(&mut self, mesh: MeshHandle, capacity: usize) -> BatchHandle {
        let handle = BatchHandle(self.next());
        let empty = InstanceData {
            model: [[0.0; 4]; 4],
            color: [0.0; 3],
        };
        self.batches.insert(
            handle,
            RecordedBatch {
                mesh,
                instances: vec![empty; capacity],
                opacity: 1.0,
                writes: 0,
            },
        );
        handle
    }

    fn write_instances(&mut self, batch: BatchHandle, first: usize, data: &[InstanceData]) {
        let Some(recorded) = self.batches.get_mut(&batch) else {
            return;
        };
        if let Some(dst) = recorded.instances.get_mut(first..first + data.len()) {
            dst.copy_from_slice(data);
            recorded.writes += 1;
        }
    }

    fn set_batch_opacity(&mut self, batch: BatchHandle, opacity: f32) {
        if let Some(recorded) = self.batches.get_mut(&batch) {
            recorded.opacity = opacity;
        }
    }

    fn release_batch(&mut self, batch: BatchHandle) {
        self.batches.remove(&batch);
    }

    fn release_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.remove(&mesh);
    }
}
