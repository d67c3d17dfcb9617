//! Instanced batches: per archetype bucket, one canopy and one trunk batch.
//!
//! Slot `i` of both batches is member `i` of the bucket. Mutations are
//! O(1) and only reach the backend on [`BatchedDrawable::commit`].

use std::f64::consts::TAU;

use foundation::bounds::Aabb3;
use foundation::color::Rgb;
use foundation::math::Vec3;
use gpu::{BatchDraw, BatchHandle, GpuBackend, InstanceData, MeshHandle, MeshKind};
use rand::Rng;
use scene::archetype::{Shape, TRUNK_COLOR};
use scene::catalog::{ArchetypeBucket, EntityCatalog};
use scene::picking::Ray;
use scene::tree::{Tree, TreeId};
use tracing::{debug, info};

use crate::layer::{Layer, LayerId};
use crate::templates::{canopy_bounds, canopy_template, trunk_template};

#[derive(Debug, Clone, PartialEq)]
pub enum BatchError {
    SlotOutOfRange { slot: u32, capacity: usize },
    CapacityMismatch { expected: usize, actual: usize },
    /// Trunk batches share one material color.
    NoInstanceColors,
    UnknownTree(TreeId),
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchError::SlotOutOfRange { slot, capacity } => {
                write!(f, "slot {slot} out of range for batch of {capacity}")
            }
            BatchError::CapacityMismatch { expected, actual } => {
                write!(f, "expected {expected} instances, got {actual}")
            }
            BatchError::NoInstanceColors => write!(f, "batch has no per-instance colors"),
            BatchError::UnknownTree(id) => write!(f, "tree {} is not in the catalog", id.0),
        }
    }
}

impl std::error::Error for BatchError {}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InstanceTransform {
    pub position: Vec3,
    pub yaw_rad: f64,
    pub scale: Vec3,
}

impl InstanceTransform {
    /// World bounds of `template` under this transform.
    pub fn world_bounds(&self, template: &Aabb3) -> Aabb3 {
        let (sin, cos) = self.yaw_rad.sin_cos();
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for c in template.corners() {
            let (x, y, z) = (c.x * self.scale.x, c.y * self.scale.y, c.z * self.scale.z);
            let p = [
                cos * x + sin * z + self.position.x,
                y + self.position.y,
                -sin * x + cos * z + self.position.z,
            ];
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        Aabb3::new(min, max)
    }

    /// `ray` in template space. Distances along the returned ray equal
    /// distances along `ray`; a zero scale axis has no local space.
    pub fn ray_to_local(&self, ray: &Ray) -> Option<Ray> {
        if self.scale.x == 0.0 || self.scale.y == 0.0 || self.scale.z == 0.0 {
            return None;
        }
        let (sin, cos) = self.yaw_rad.sin_cos();
        let undo = |v: Vec3| {
            Vec3::new(
                (cos * v.x - sin * v.z) / self.scale.x,
                v.y / self.scale.y,
                (sin * v.x + cos * v.z) / self.scale.z,
            )
        };
        Some(Ray::new(undo(ray.origin - self.position), undo(ray.dir)))
    }
}

/// Fixed-capacity instance array mirrored to one backend batch.
#[derive(Debug)]
pub struct BatchedDrawable {
    handle: BatchHandle,
    mesh: MeshHandle,
    transforms: Vec<InstanceTransform>,
    colors: Option<Vec<Rgb>>,
    material_color: Rgb,
    opacity: f32,
    /// Inclusive slot range awaiting upload.
    dirty: Option<(usize, usize)>,
    opacity_dirty: bool,
}

impl BatchedDrawable {
    pub fn new(
        backend: &mut dyn GpuBackend,
        mesh: MeshHandle,
        transforms: Vec<InstanceTransform>,
        colors: Option<Vec<Rgb>>,
        material_color: Rgb,
    ) -> Result<Self, BatchError> {
        if let Some(colors) = &colors
            && colors.len() != transforms.len()
        {
            return Err(BatchError::CapacityMismatch {
                expected: transforms.len(),
                actual: colors.len(),
            });
        }
        let handle = backend.create_batch(mesh, transforms.len());
        let dirty = (!transforms.is_empty()).then(|| (0, transforms.len() - 1));
        Ok(Self {
            handle,
            mesh,
            transforms,
            colors,
            material_color,
            opacity: 1.0,
            dirty,
            opacity_dirty: false,
        })
    }

    pub fn handle(&self) -> BatchHandle {
        self.handle
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some() || self.opacity_dirty
    }

    pub fn transform(&self, slot: u32) -> Option<&InstanceTransform> {
        self.transforms.get(slot as usize)
    }

    /// Per-instance color, or the shared material color for trunks.
    pub fn color(&self, slot: u32) -> Option<Rgb> {
        if slot as usize >= self.transforms.len() {
            return None;
        }
        match &self.colors {
            Some(colors) => colors.get(slot as usize).copied(),
            None => Some(self.material_color),
        }
    }

    pub fn set_instance_transform(
        &mut self,
        slot: u32,
        transform: InstanceTransform,
    ) -> Result<(), BatchError> {
        let index = self.check(slot)?;
        self.transforms[index] = transform;
        self.mark(index);
        Ok(())
    }

    pub fn set_instance_color(&mut self, slot: u32, color: Rgb) -> Result<(), BatchError> {
        let index = self.check(slot)?;
        let colors = self.colors.as_mut().ok_or(BatchError::NoInstanceColors)?;
        colors[index] = color;
        self.mark(index);
        Ok(())
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        if self.opacity != opacity {
            self.opacity = opacity;
            self.opacity_dirty = true;
        }
    }

    /// Uploads pending changes; returns the number of instances written.
    pub fn commit(&mut self, backend: &mut dyn GpuBackend) -> usize {
        if self.opacity_dirty {
            backend.set_batch_opacity(self.handle, self.opacity);
            self.opacity_dirty = false;
        }
        let Some((first, last)) = self.dirty.take() else {
            return 0;
        };
        let data: Vec<InstanceData> = (first..=last)
            .map(|i| {
                let t = &self.transforms[i];
                let color = match &self.colors {
                    Some(colors) => colors[i],
                    None => self.material_color,
                };
                InstanceData::from_trs(t.position, t.yaw_rad, t.scale, color)
            })
            .collect();
        backend.write_instances(self.handle, first, &data);
        data.len()
    }

    pub fn draw(&self) -> BatchDraw {
        BatchDraw {
            batch: self.handle,
            mesh: self.mesh,
            instances: self.transforms.len() as u32,
            opacity: self.opacity,
        }
    }

    pub fn release(self, backend: &mut dyn GpuBackend) {
        backend.release_batch(self.handle);
    }

    fn check(&self, slot: u32) -> Result<usize, BatchError> {
        let index = slot as usize;
        if index >= self.transforms.len() {
            return Err(BatchError::SlotOutOfRange {
                slot,
                capacity: self.transforms.len(),
            });
        }
        Ok(index)
    }

    fn mark(&mut self, index: usize) {
        self.dirty = Some(match self.dirty {
            Some((first, last)) => (first.min(index), last.max(index)),
            None => (index, index),
        });
    }
}

/// Trunk and canopy placement for one tree.
pub fn tree_transforms<R: Rng + ?Sized>(
    tree: &Tree,
    rng: &mut R,
) -> (InstanceTransform, InstanceTransform) {
    let s = tree.canopy_scale;
    let h = tree.height_scale;
    let trunk_h = h * 0.9;
    let trunk = InstanceTransform {
        position: tree.position.at_height(trunk_h * 0.5),
        yaw_rad: 0.0,
        scale: Vec3::new(s * 0.5, trunk_h, s * 0.5),
    };
    let canopy = InstanceTransform {
        position: tree.position.at_height(trunk_h + h * 0.35),
        yaw_rad: rng.gen_range(0.0..TAU),
        scale: Vec3::new(s, h, s),
    };
    (trunk, canopy)
}

/// The two batches of one archetype bucket.
#[derive(Debug)]
pub struct TreeBatches {
    pub shape: Shape,
    pub canopy: BatchedDrawable,
    pub trunk: BatchedDrawable,
    members: Vec<TreeId>,
}

impl TreeBatches {
    pub fn build<R: Rng + ?Sized>(
        bucket: &ArchetypeBucket,
        catalog: &EntityCatalog,
        canopy_mesh: MeshHandle,
        trunk_mesh: MeshHandle,
        backend: &mut dyn GpuBackend,
        rng: &mut R,
    ) -> Result<Self, BatchError> {
        let mut trunks = Vec::with_capacity(bucket.len());
        let mut canopies = Vec::with_capacity(bucket.len());
        let mut colors = Vec::with_capacity(bucket.len());
        for &id in bucket.members() {
            let tree = catalog.tree(id).ok_or(BatchError::UnknownTree(id))?;
            let (trunk, canopy) = tree_transforms(tree, rng);
            trunks.push(trunk);
            canopies.push(canopy);
            colors.push(tree.color);
        }

        let trunk_color = Rgb::from_hex(TRUNK_COLOR);
        let canopy = BatchedDrawable::new(backend, canopy_mesh, canopies, Some(colors), trunk_color)?;
        let trunk = BatchedDrawable::new(backend, trunk_mesh, trunks, None, trunk_color)?;
        debug!(shape = %bucket.shape(), instances = bucket.len(), "built tree batches");
        Ok(Self {
            shape: bucket.shape(),
            canopy,
            trunk,
            members: bucket.members().to_vec(),
        })
    }

    pub fn members(&self) -> &[TreeId] {
        &self.members
    }

    pub fn commit(&mut self, backend: &mut dyn GpuBackend) -> usize {
        self.canopy.commit(backend) + self.trunk.commit(backend)
    }
}

/// Every tree in the scene: shared templates plus per-bucket batches.
#[derive(Debug)]
pub struct ForestLayer {
    id: LayerId,
    trunk_mesh: MeshHandle,
    canopy_meshes: Vec<(Shape, MeshHandle)>,
    groups: Vec<TreeBatches>,
}

impl ForestLayer {
    /// Uploads one template per shape present and builds every bucket's batches
    /// in catalog bucket order.
    pub fn build<R: Rng + ?Sized>(
        id: u64,
        catalog: &EntityCatalog,
        backend: &mut dyn GpuBackend,
        rng: &mut R,
    ) -> Result<Self, BatchError> {
        let trunk_mesh = backend.create_mesh(MeshKind::Trunk, &trunk_template());
        let mut canopy_meshes = Vec::new();
        let mut groups = Vec::with_capacity(catalog.buckets().len());
        for bucket in catalog.buckets() {
            let shape = bucket.shape();
            let mesh = backend.create_mesh(MeshKind::Canopy(shape), &canopy_template(shape));
            canopy_meshes.push((shape, mesh));
            groups.push(TreeBatches::build(
                bucket, catalog, mesh, trunk_mesh, backend, rng,
            )?);
        }
        info!(
            batches = groups.len() * 2,
            instances = catalog.len(),
            "forest layer built"
        );
        Ok(Self {
            id: LayerId(id),
            trunk_mesh,
            canopy_meshes,
            groups,
        })
    }

    pub fn groups(&self) -> &[TreeBatches] {
        &self.groups
    }

    pub fn groups_mut(&mut self) -> &mut [TreeBatches] {
        &mut self.groups
    }

    pub fn group(&self, shape: Shape) -> Option<&TreeBatches> {
        self.groups.iter().find(|g| g.shape == shape)
    }

    pub fn is_dirty(&self) -> bool {
        self.groups
            .iter()
            .any(|g| g.canopy.is_dirty() || g.trunk.is_dirty())
    }

    pub fn commit(&mut self, backend: &mut dyn GpuBackend) -> usize {
        self.groups.iter_mut().map(|g| g.commit(backend)).sum()
    }

    /// Canopy then trunk, per bucket.
    pub fn draws(&self) -> Vec<BatchDraw> {
        self.groups
            .iter()
            .flat_map(|g| [g.canopy.draw(), g.trunk.draw()])
            .collect()
    }

    /// Every canopy transform, keyed by `(shape, slot)`.
    pub fn canopy_instances(&self) -> impl Iterator<Item = ((Shape, u32), InstanceTransform)> + '_ {
        self.groups.iter().flat_map(|g| {
            (0..g.canopy.len() as u32)
                .filter_map(move |slot| Some(((g.shape, slot), *g.canopy.transform(slot)?)))
        })
    }

    /// World bounds of every canopy instance, keyed by `(shape, slot)`.
    pub fn canopy_instance_bounds(&self) -> impl Iterator<Item = ((Shape, u32), Aabb3)> + '_ {
        self.canopy_instances()
            .map(|((shape, slot), t)| ((shape, slot), t.world_bounds(&canopy_bounds(shape))))
    }

    pub fn release(self, backend: &mut dyn GpuBackend) {
        for group in self.groups {
            group.canopy.release(backend);
            group.trunk.release(backend);
        }
        for (_, mesh) in self.canopy_meshes {
            backend.release_mesh(mesh);
        }
        backend.release_mesh(self.trunk_mesh);
    }
}

impl Layer for ForestLayer {
    fn id(&self) -> LayerId {
        self.id
    }

    fn name(&self) -> &'static str {
        "forest"
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchError, BatchedDrawable, ForestLayer, InstanceTransform};
    use crate::fixtures::{catalog, rng};
    use foundation::bounds::Aabb3;
    use foundation::color::Rgb;
    use foundation::math::Vec3;
    use gpu::{GpuBackend, MeshData, MeshKind, RecordingBackend};
    use scene::archetype::Shape;

    fn transform(x: f64) -> InstanceTransform {
        InstanceTransform {
            position: Vec3::new(x, 0.0, 0.0),
            yaw_rad: 0.0,
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }

    #[test]
    fn mutations_reach_the_backend_only_on_commit() {
        let mut backend = RecordingBackend::new();
        let mesh = backend.create_mesh(MeshKind::Trunk, &MeshData::default());
        let mut batch = BatchedDrawable::new(
            &mut backend,
            mesh,
            vec![transform(0.0), transform(1.0), transform(2.0)],
            Some(vec![Rgb::WHITE; 3]),
            Rgb::WHITE,
        )
        .expect("batch");
        assert_eq!(batch.commit(&mut backend), 3);
        assert!(!batch.is_dirty());

        let red = Rgb::new(1.0, 0.0, 0.0);
        batch.set_instance_color(1, red).expect("color");
        let before = backend.batch(batch.handle()).expect("recorded").instances[1];
        assert_eq!(before.color, [1.0, 1.0, 1.0]);

        assert_eq!(batch.commit(&mut backend), 1);
        let after = backend.batch(batch.handle()).expect("recorded").instances[1];
        assert_eq!(after.color, [1.0, 0.0, 0.0]);
        assert_eq!(batch.commit(&mut backend), 0);
    }

    #[test]
    fn out_of_range_and_colorless_writes_are_errors() {
        let mut backend = RecordingBackend::new();
        let mesh = backend.create_mesh(MeshKind::Trunk, &MeshData::default());
        let mut trunk =
            BatchedDrawable::new(&mut backend, mesh, vec![transform(0.0)], None, Rgb::WHITE)
                .expect("batch");
        assert_eq!(
            trunk.set_instance_transform(1, transform(3.0)),
            Err(BatchError::SlotOutOfRange {
                slot: 1,
                capacity: 1
            })
        );
        assert_eq!(
            trunk.set_instance_color(0, Rgb::WHITE),
            Err(BatchError::NoInstanceColors)
        );
        assert_eq!(trunk.color(0), Some(Rgb::WHITE));

        let mismatch = BatchedDrawable::new(
            &mut backend,
            mesh,
            vec![transform(0.0)],
            Some(vec![]),
            Rgb::WHITE,
        );
        assert!(matches!(
            mismatch,
            Err(BatchError::CapacityMismatch {
                expected: 1,
                actual: 0
            })
        ));
    }

    #[test]
    fn slots_follow_bucket_members() {
        let catalog = catalog();
        let mut backend = RecordingBackend::new();
        let mut forest = ForestLayer::build(1, &catalog, &mut backend, &mut rng()).expect("forest");
        forest.commit(&mut backend);

        for (bucket, group) in catalog.buckets().iter().zip(forest.groups()) {
            assert_eq!(bucket.shape(), group.shape);
            assert_eq!(group.canopy.len(), bucket.len());
            assert_eq!(group.trunk.len(), bucket.len());
            for (slot, &id) in bucket.members().iter().enumerate() {
                let tree = catalog.tree(id).expect("tree");
                let slot = slot as u32;
                assert_eq!(tree.slot, slot);
                assert_eq!(group.canopy.color(slot), Some(tree.color));

                let trunk = group.trunk.transform(slot).expect("trunk");
                let canopy = group.canopy.transform(slot).expect("canopy");
                let trunk_h = tree.height_scale * 0.9;
                assert_eq!(trunk.position.x, tree.position.x);
                assert_eq!(trunk.position.y, trunk_h * 0.5);
                assert_eq!(trunk.scale.y, trunk_h);
                assert_eq!(trunk.scale.x, tree.canopy_scale * 0.5);
                assert_eq!(canopy.position.y, trunk_h + tree.height_scale * 0.35);
                assert_eq!(canopy.scale, Vec3::new(tree.canopy_scale, tree.height_scale, tree.canopy_scale));

                let uploaded = backend.batch(group.canopy.handle()).expect("batch").instances
                    [slot as usize];
                assert_eq!(uploaded.color, tree.color.to_array());
            }
        }
        assert_eq!(forest.draws().len(), catalog.buckets().len() * 2);
    }

    #[test]
    fn release_frees_everything() {
        let catalog = catalog();
        let mut backend = RecordingBackend::new();
        let forest = ForestLayer::build(1, &catalog, &mut backend, &mut rng()).expect("forest");
        assert_eq!(backend.live_batches(), catalog.buckets().len() * 2);
        assert_eq!(backend.live_meshes(), catalog.buckets().len() + 1);
        forest.release(&mut backend);
        assert_eq!(backend.live_batches(), 0);
        assert_eq!(backend.live_meshes(), 0);
    }

    #[test]
    fn rotated_bounds_grow_to_cover_corners() {
        let unit = Aabb3::new([-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]);
        let t = InstanceTransform {
            position: Vec3::new(10.0, 5.0, 0.0),
            yaw_rad: std::f64::consts::FRAC_PI_4,
            scale: Vec3::new(2.0, 3.0, 2.0),
        };
        let b = t.world_bounds(&unit);
        let reach = 2.0 * std::f64::consts::SQRT_2;
        assert!((b.max[0] - (10.0 + reach)).abs() < 1e-9);
        assert!((b.min[2] + reach).abs() < 1e-9);
        assert_eq!(b.max[1], 8.0);
        assert_eq!(b.min[1], 2.0);
        assert!(ForestLayer::build(2, &catalog(), &mut RecordingBackend::new(), &mut rng())
            .expect("forest")
            .group(Shape::Broad)
            .is_some());
    }
}
