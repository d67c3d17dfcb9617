use crate::math::Vec3;

/// Axis-aligned bounding box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb3 {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb3 {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Aabb3 { min, max }
    }

    pub fn from_center_half_extents(center: Vec3, half: Vec3) -> Self {
        Aabb3::new(
            [center.x - half.x, center.y - half.y, center.z - half.z],
            [center.x + half.x, center.y + half.y, center.z + half.z],
        )
    }

    /// Smallest box containing every point, or `None` for an empty input.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut b = Aabb3::new(first.as_array(), first.as_array());
        for p in iter {
            b = b.union(&Aabb3::new(p.as_array(), p.as_array()));
        }
        Some(b)
    }

    pub fn union(&self, other: &Aabb3) -> Aabb3 {
        Aabb3::new(
            [
                self.min[0].min(other.min[0]),
                self.min[1].min(other.min[1]),
                self.min[2].min(other.min[2]),
            ],
            [
                self.max[0].max(other.max[0]),
                self.max[1].max(other.max[1]),
                self.max[2].max(other.max[2]),
            ],
        )
    }

    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        )
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a[0], a[1], a[2]),
            Vec3::new(b[0], a[1], a[2]),
            Vec3::new(a[0], b[1], a[2]),
            Vec3::new(b[0], b[1], a[2]),
            Vec3::new(a[0], a[1], b[2]),
            Vec3::new(b[0], a[1], b[2]),
            Vec3::new(a[0], b[1], b[2]),
            Vec3::new(b[0], b[1], b[2]),
        ]
    }

    /// Entry distance of a ray into this box, clamped to `t_min`.
    ///
    /// `dir` need not be normalized; the result is in units of `dir`.
    pub fn ray_entry(&self, origin: [f64; 3], dir: [f64; 3], mut t_min: f64, mut t_max: f64) -> Option<f64> {
        // Slabs intersection; deterministic math only.
        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            let min = self.min[axis];
            let max = self.max[axis];

            if d.abs() < 1e-12 {
                if o < min || o > max {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let mut t1 = (min - o) * inv;
            let mut t2 = (max - o) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }

            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_max < t_min {
                return None;
            }
        }

        Some(t_min)
    }
}

#[cfg(test)]
mod tests {
    use super::Aabb3;
    use crate::math::Vec3;

    #[test]
    fn center_and_corners() {
        let a = Aabb3::from_center_half_extents(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 1.0, 2.0));
        assert_eq!(a, Aabb3::new([0.0, 1.0, 1.0], [2.0, 3.0, 5.0]));
        assert_eq!(a.center(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(Aabb3::from_points(a.corners()), Some(a));
    }

    #[test]
    fn from_points_spans_inputs() {
        let b = Aabb3::from_points([Vec3::new(1.0, 5.0, -2.0), Vec3::new(-3.0, 0.0, 4.0)])
            .expect("bounds");
        assert_eq!(b, Aabb3::new([-3.0, 0.0, -2.0], [1.0, 5.0, 4.0]));
        assert!(Aabb3::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn ray_entry_reports_near_face() {
        let b = Aabb3::new([4.0, -1.0, -1.0], [6.0, 1.0, 1.0]);
        let t = b
            .ray_entry([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], 0.0, f64::INFINITY)
            .expect("hit");
        assert_eq!(t, 4.0);
        assert!(b
            .ray_entry([0.0, 5.0, 0.0], [1.0, 0.0, 0.0], 0.0, f64::INFINITY)
            .is_none());
    }
}
