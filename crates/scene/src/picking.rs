use foundation::math::Vec3;

use crate::spatial::Bvh;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.dir.scale(t)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickHit<K> {
    pub key: K,
    pub distance: f64,
    pub point: Vec3,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickOptions {
    pub max_distance: f64,
}

impl Default for PickOptions {
    fn default() -> Self {
        Self {
            max_distance: 1.0e30,
        }
    }
}

/// Deterministic ray picking against a BVH of item bounds.
///
/// Ordering contract:
/// - The closest hit along the (normalized) ray wins.
/// - If multiple items are hit at the same distance, the lower key wins.
///
/// A zero-length direction or an empty BVH is a miss, not an error.
pub fn pick_ray<K: Copy + Ord>(bvh: &Bvh<K>, ray: Ray, opts: PickOptions) -> Option<PickHit<K>> {
    pick_ray_with(bvh, ray, opts, |_, _, entry| Some(entry))
}

/// [`pick_ray`] with a narrow phase: `exact(key, ray, box_entry)` gets the
/// normalized ray and returns the distance to the item's real surface.
pub fn pick_ray_with<K: Copy + Ord>(
    bvh: &Bvh<K>,
    ray: Ray,
    opts: PickOptions,
    mut exact: impl FnMut(K, &Ray, f64) -> Option<f64>,
) -> Option<PickHit<K>> {
    let ray = Ray::new(ray.origin, ray.dir.normalized()?);
    let (key, t) = bvh.nearest_ray_with(
        ray.origin.as_array(),
        ray.dir.as_array(),
        0.0,
        opts.max_distance,
        |key, entry| exact(key, &ray, entry),
    )?;
    Some(PickHit {
        key,
        distance: t,
        point: ray.at(t),
    })
}
