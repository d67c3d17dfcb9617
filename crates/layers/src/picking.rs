use std::collections::BTreeMap;

use foundation::math::Vec3;
use gpu::{Camera3D, MeshData};
use scene::archetype::Shape;
use scene::catalog::EntityCatalog;
use scene::picking::{PickHit, PickOptions, Ray, pick_ray_with};
use scene::spatial::{Bvh, Item};
use scene::tree::TreeId;

use crate::instancing::{ForestLayer, InstanceTransform};
use crate::signposts::SignpostLayer;
use crate::templates::{canopy_bounds, canopy_template};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PickTarget {
    /// Index into the signpost layer.
    Signpost(usize),
    Tree(TreeId),
}

/// Pointer picking over signposts and canopy instances.
///
/// Canopies are indexed by `(shape, slot)`; a hit resolves to a tree through
/// the bucket's slot order. Instance bounds only gate the search: a canopy is
/// hit when the ray crosses its template triangles.
#[derive(Debug, Default)]
pub struct ScenePicker {
    bvh: Bvh<(Shape, u32)>,
    instances: BTreeMap<(Shape, u32), InstanceTransform>,
    templates: BTreeMap<Shape, MeshData>,
}

impl ScenePicker {
    pub fn build(forest: &ForestLayer) -> Self {
        Self::from_instances(forest.canopy_instances())
    }

    pub fn from_instances(
        instances: impl IntoIterator<Item = ((Shape, u32), InstanceTransform)>,
    ) -> Self {
        let instances: BTreeMap<_, _> = instances.into_iter().collect();
        let items = instances
            .iter()
            .map(|(&key, t)| Item {
                key,
                bounds: t.world_bounds(&canopy_bounds(key.0)),
            })
            .collect();
        let mut templates = BTreeMap::new();
        for &(shape, _) in instances.keys() {
            templates.entry(shape).or_insert_with(|| canopy_template(shape));
        }
        Self {
            bvh: Bvh::build(items),
            instances,
            templates,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bvh.is_empty()
    }

    /// Nearest canopy mesh crossed by `ray` within `max_distance`.
    pub fn nearest_canopy(&self, ray: Ray, max_distance: f64) -> Option<PickHit<(Shape, u32)>> {
        let opts = PickOptions { max_distance };
        pick_ray_with(&self.bvh, ray, opts, |key, ray, _| {
            let local = self.instances.get(&key)?.ray_to_local(ray)?;
            nearest_triangle(self.templates.get(&key.0)?, &local)
        })
    }

    /// Signposts win outright; otherwise the nearest canopy along the ray.
    pub fn pick(
        &self,
        ndc: [f64; 2],
        camera: &Camera3D,
        signposts: &SignpostLayer,
        catalog: &EntityCatalog,
    ) -> Option<PickTarget> {
        let ray = camera.ray_from_ndc(ndc[0], ndc[1])?;
        if let Some((index, _)) = signposts.hit_test(&ray, camera) {
            return Some(PickTarget::Signpost(index));
        }
        let hit = self.nearest_canopy(ray, camera.far)?;
        let (shape, slot) = hit.key;
        catalog
            .tree_at_slot(shape, slot)
            .map(|tree| PickTarget::Tree(tree.id))
    }
}

fn nearest_triangle(mesh: &MeshData, ray: &Ray) -> Option<f64> {
    let vertex = |i: u32| {
        let [x, y, z] = *mesh.positions.get(i as usize)?;
        Some(Vec3::new(x as f64, y as f64, z as f64))
    };
    mesh.indices
        .chunks_exact(3)
        .filter_map(|tri| {
            let (a, b, c) = (vertex(tri[0])?, vertex(tri[1])?, vertex(tri[2])?);
            ray_triangle(ray, a, b, c)
        })
        .min_by(|x, y| x.total_cmp(y))
}

/// Two-sided Möller-Trumbore; `t` is in units of `ray.dir`.
fn ray_triangle(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<f64> {
    const EPS: f64 = 1e-12;
    let e1 = b - a;
    let e2 = c - a;
    let p = ray.dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < EPS {
        return None;
    }
    let inv = 1.0 / det;
    let s = ray.origin - a;
    let u = s.dot(p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = ray.dir.dot(q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv;
    (t >= 0.0).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::{PickTarget, ScenePicker, ray_triangle};
    use crate::fixtures::{catalog, rng};
    use crate::instancing::{ForestLayer, InstanceTransform};
    use crate::signposts::{SignpostLayer, SignpostOptions};
    use foundation::math::{LocalProjection, Vec3};
    use gpu::{Camera3D, RecordingBackend};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use pretty_assertions::assert_eq;
    use scene::archetype::Shape;
    use scene::catalog::EntityCatalog;
    use scene::picking::Ray;

    fn looking_down_at(target: Vec3) -> Camera3D {
        Camera3D::look_at(
            Vec3::new(target.x, 300.0, target.z + 1.0),
            target,
            55f64.to_radians(),
            0.1,
            3000.0,
        )
    }

    fn no_signposts(catalog: &EntityCatalog) -> SignpostLayer {
        let options = SignpostOptions {
            limit: 0,
            ..SignpostOptions::default()
        };
        SignpostLayer::build(3, catalog, &options)
    }

    #[test]
    fn empty_scene_picks_nothing() {
        let catalog =
            EntityCatalog::load(Vec::new(), &LocalProjection::default(), &mut SmallRng::seed_from_u64(1));
        let mut backend = RecordingBackend::new();
        let forest = ForestLayer::build(1, &catalog, &mut backend, &mut rng()).expect("forest");
        let picker = ScenePicker::build(&forest);
        assert!(picker.is_empty());

        let camera = looking_down_at(Vec3::ZERO);
        let signposts = no_signposts(&catalog);
        assert_eq!(picker.pick([0.0, 0.0], &camera, &signposts, &catalog), None);
    }

    #[test]
    fn center_of_view_picks_the_tree_below() {
        let catalog = catalog();
        let mut backend = RecordingBackend::new();
        let forest = ForestLayer::build(1, &catalog, &mut backend, &mut rng()).expect("forest");
        let picker = ScenePicker::build(&forest);
        let signposts = no_signposts(&catalog);

        for tree in catalog.trees() {
            let camera = looking_down_at(tree.position.at_height(0.0));
            assert_eq!(
                picker.pick([0.0, 0.0], &camera, &signposts, &catalog),
                Some(PickTarget::Tree(tree.id)),
                "tree {}",
                tree.id.0
            );
        }

        let camera = looking_down_at(Vec3::new(5000.0, 0.0, 5000.0));
        assert_eq!(picker.pick([0.0, 0.0], &camera, &signposts, &catalog), None);
    }

    #[test]
    fn signposts_take_precedence_over_trees() {
        let catalog = catalog();
        let mut backend = RecordingBackend::new();
        let forest = ForestLayer::build(1, &catalog, &mut backend, &mut rng()).expect("forest");
        let picker = ScenePicker::build(&forest);
        let options = SignpostOptions {
            width: 400.0,
            height: 400.0,
            ..SignpostOptions::default()
        };
        let signposts = SignpostLayer::build(3, &catalog, &options);

        let sign = &signposts.signposts()[0];
        let tree = catalog
            .trees()
            .iter()
            .find(|t| t.neighborhood == sign.neighborhood)
            .expect("member");
        let camera = looking_down_at(tree.position.at_height(0.0));
        assert_eq!(
            picker.pick([0.0, 0.0], &camera, &no_signposts(&catalog), &catalog),
            Some(PickTarget::Tree(tree.id))
        );
        assert_eq!(
            picker.pick([0.0, 0.0], &camera, &signposts, &catalog),
            Some(PickTarget::Signpost(0))
        );
    }

    fn canopy(position: Vec3, scale: f64) -> InstanceTransform {
        InstanceTransform {
            position,
            yaw_rad: 0.0,
            scale: Vec3::new(scale, scale, scale),
        }
    }

    fn down(x: f64, z: f64) -> Ray {
        Ray::new(Vec3::new(x, 500.0, z), Vec3::new(0.0, -1.0, 0.0))
    }

    #[test]
    fn triangle_hits_inside_and_misses_outside() {
        let (a, b, c) = (
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 2.0),
        );
        let hit = ray_triangle(&Ray::new(Vec3::new(0.5, 3.0, 0.5), Vec3::new(0.0, -1.0, 0.0)), a, b, c);
        assert_eq!(hit, Some(3.0));
        // back face counts too
        let below = ray_triangle(&Ray::new(Vec3::new(0.5, -1.0, 0.5), Vec3::new(0.0, 1.0, 0.0)), a, b, c);
        assert_eq!(below, Some(1.0));
        assert_eq!(
            ray_triangle(&Ray::new(Vec3::new(1.5, 3.0, 1.5), Vec3::new(0.0, -1.0, 0.0)), a, b, c),
            None
        );
        assert_eq!(
            ray_triangle(&Ray::new(Vec3::new(0.5, 3.0, 0.5), Vec3::new(1.0, 0.0, 0.0)), a, b, c),
            None
        );
    }

    #[test]
    fn box_corner_outside_the_canopy_is_a_miss() {
        let picker = ScenePicker::from_instances([((Shape::Round, 0), canopy(Vec3::ZERO, 10.0))]);
        // bounds reach 4 on each axis; the sphere does not reach (3.6, 3.6)
        assert_eq!(picker.nearest_canopy(down(3.6, 3.6), 1000.0), None);
        let hit = picker.nearest_canopy(down(0.3, 0.2), 1000.0).expect("center");
        assert_eq!(hit.key, (Shape::Round, 0));
        assert!((hit.distance - 496.0).abs() < 0.1, "{}", hit.distance);
    }

    #[test]
    fn forest_canopy_corner_misses_and_center_hits() {
        let catalog = catalog();
        let mut backend = RecordingBackend::new();
        let forest = ForestLayer::build(1, &catalog, &mut backend, &mut rng()).expect("forest");
        let picker = ScenePicker::build(&forest);
        let ((shape, slot), bounds) = forest
            .canopy_instance_bounds()
            .find(|((shape, _), _)| *shape == Shape::Round)
            .expect("round canopy");
        let center = bounds.center();
        let half = [
            (bounds.max[0] - bounds.min[0]) * 0.5,
            (bounds.max[2] - bounds.min[2]) * 0.5,
        ];

        let corner = down(center.x + 0.9 * half[0], center.z + 0.9 * half[1]);
        assert_eq!(picker.nearest_canopy(corner, 3000.0), None);

        let hit = picker.nearest_canopy(down(center.x, center.z), 3000.0).expect("center");
        assert_eq!(hit.key, (shape, slot));
        assert!(hit.distance > 500.0 - bounds.max[1]);
    }

    #[test]
    fn nearer_mesh_wins_over_nearer_bounds() {
        // the cone's bounds are entered first but its surface lies behind the sphere's
        let picker = ScenePicker::from_instances([
            ((Shape::Conifer, 0), canopy(Vec3::new(8.0, 10.0, 0.0), 10.0)),
            ((Shape::Round, 0), canopy(Vec3::new(6.5, 15.0, 0.0), 10.0)),
        ]);
        let ray = Ray::new(Vec3::new(100.0, 15.0, 0.3), Vec3::new(-1.0, 0.0, 0.0));
        let hit = picker.nearest_canopy(ray, 1000.0).expect("hit");
        assert_eq!(hit.key, (Shape::Round, 0));
        assert!(hit.point.x > 10.0 && hit.point.x < 10.51, "{:?}", hit.point);

        // inside the sphere's bounds, above and beside its surface
        let grazing = Ray::new(Vec3::new(100.0, 18.7, 3.0), Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(picker.nearest_canopy(grazing, 1000.0), None);
    }

    #[test]
    fn yaw_and_scale_are_undone_before_the_mesh_test() {
        let t = InstanceTransform {
            position: Vec3::new(5.0, 2.0, -3.0),
            yaw_rad: 0.7,
            scale: Vec3::new(4.0, 2.0, 4.0),
        };
        let ray = Ray::new(Vec3::new(9.0, 30.0, 1.0), Vec3::new(0.0, -1.0, 0.0));
        let local = t.ray_to_local(&ray).expect("local");
        assert!((local.origin.y - 14.0).abs() < 1e-12);
        assert!((local.dir.y + 0.5).abs() < 1e-12);
        // points map back onto the same world point at the same t
        let world = local.at(3.0);
        let (sin, cos) = 0.7f64.sin_cos();
        let back = Vec3::new(
            cos * 4.0 * world.x + sin * 4.0 * world.z + 5.0,
            2.0 * world.y + 2.0,
            -sin * 4.0 * world.x + cos * 4.0 * world.z - 3.0,
        );
        assert!(back.distance(ray.at(3.0)) < 1e-9, "{back:?}");
    }
}
