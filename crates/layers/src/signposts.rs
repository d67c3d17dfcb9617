//! Neighborhood signposts: camera-facing pills floating above the canopy.

use foundation::math::Vec3;
use gpu::Camera3D;
use scene::catalog::EntityCatalog;
use scene::picking::Ray;
use tracing::debug;

use crate::labels::{LabelAnchor, LabelStyle};
use crate::layer::{Layer, LayerId};

#[derive(Debug, Clone, PartialEq)]
pub struct SignpostOptions {
    pub limit: usize,
    pub elevation: f64,
    pub width: f64,
    pub height: f64,
    pub excluded: Vec<String>,
}

impl Default for SignpostOptions {
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

#[derive(Debug, Clone, PartialEq)]
pub struct Signpost {
    pub neighborhood: String,
    pub count: usize,
    pub position: Vec3,
    pub tooltip: String,
}

impl Signpost {
    pub fn subtitle(&self) -> String {
        format!("{} trees", self.count)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignpostLayer {
    id: LayerId,
    width: f64,
    height: f64,
    signposts: Vec<Signpost>,
}

impl SignpostLayer {
    /// The largest neighborhoods (count desc, name asc) minus excluded and
    /// unnamed ones, each at its centroid.
    pub fn build(id: u64, catalog: &EntityCatalog, options: &SignpostOptions) -> Self {
        let signposts: Vec<Signpost> = catalog
            .neighborhoods()
            .iter()
            .filter(|n| !n.name.is_empty() && !options.excluded.iter().any(|e| e == &n.name))
            .take(options.limit)
            .map(|n| Signpost {
                neighborhood: n.name.clone(),
                count: n.count,
                position: n.centroid.at_height(options.elevation),
                tooltip: n.tooltip(),
            })
            .collect();
        debug!(signposts = signposts.len(), "signposts built");
        Self {
            id: LayerId(id),
            width: options.width,
            height: options.height,
            signposts,
        }
    }

    pub fn signposts(&self) -> &[Signpost] {
        &self.signposts
    }

    pub fn get(&self, index: usize) -> Option<&Signpost> {
        self.signposts.get(index)
    }

    pub fn len(&self) -> usize {
        self.signposts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signposts.is_empty()
    }

    /// Nearest signpost the ray passes through, with its ray distance.
    ///
    /// Billboards face the camera, so each is tested as a rectangle in the
    /// plane through its center perpendicular to the view direction.
    pub fn hit_test(&self, ray: &Ray, camera: &Camera3D) -> Option<(usize, f64)> {
        let (forward, right, up) = camera.basis()?;
        let dir = ray.dir.normalized()?;
        let facing = dir.dot(forward);
        if facing <= 0.0 {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        for (index, sign) in self.signposts.iter().enumerate() {
            let t = (sign.position - ray.origin).dot(forward) / facing;
            if t <= 0.0 {
                continue;
            }
            let offset = ray.origin + dir.scale(t) - sign.position;
            if offset.dot(right).abs() > self.width * 0.5 || offset.dot(up).abs() > self.height * 0.5 {
                continue;
            }
            if best.is_none_or(|(_, d)| t < d) {
                best = Some((index, t));
            }
        }
        best
    }

    pub fn label_anchors(&self) -> Vec<LabelAnchor> {
        self.signposts
            .iter()
            .map(|s| LabelAnchor {
                text: s.neighborhood.clone(),
                subtitle: Some(s.subtitle()),
                position: s.position,
                priority: s.count as f32,
                style: LabelStyle::default(),
            })
            .collect()
    }
}

impl Layer for SignpostLayer {
    fn id(&self) -> LayerId {
        self.id
    }

    fn name(&self) -> &'static str {
        "signposts"
    }
}

#[cfg(test)]
mod tests {
    use super::{SignpostLayer, SignpostOptions};
    use crate::fixtures::catalog;
    use foundation::math::Vec3;
    use gpu::Camera3D;
    use pretty_assertions::assert_eq;

    fn overhead(target: Vec3) -> Camera3D {
        Camera3D::look_at(
            Vec3::new(target.x, 720.0, target.z + 60.0),
            Vec3::new(target.x, 0.0, target.z),
            55f64.to_radians(),
            0.1,
            3000.0,
        )
    }

    #[test]
    fn builds_ranked_signposts_without_excluded_names() {
        let layer = SignpostLayer::build(3, &catalog(), &SignpostOptions::default());
        let names: Vec<&str> = layer
            .signposts()
            .iter()
            .map(|s| s.neighborhood.as_str())
            .collect();
        assert_eq!(names, vec!["Trinity Park", "Old West Durham"]);

        let tp = &layer.signposts()[0];
        assert_eq!(tp.count, 3);
        assert_eq!(tp.position.y, 40.0);
        assert_eq!(tp.subtitle(), "3 trees");
        assert!(tp.tooltip.starts_with("Trinity Park\n3 trees · 2 species · avg "));
    }

    #[test]
    fn limit_caps_the_count() {
        let options = SignpostOptions {
            limit: 1,
            ..SignpostOptions::default()
        };
        assert_eq!(SignpostLayer::build(3, &catalog(), &options).len(), 1);
    }

    #[test]
    fn ray_through_a_signpost_hits_it() {
        let layer = SignpostLayer::build(3, &catalog(), &SignpostOptions::default());
        let sign = layer.signposts()[1].position;
        let camera = overhead(sign);
        let toward = Vec3::new(sign.x + 20.0, sign.y, sign.z);
        let ray = scene::picking::Ray::new(camera.position, toward - camera.position);
        let (index, distance) = layer.hit_test(&ray, &camera).expect("hit");
        assert_eq!(index, 1);
        assert!(distance > 0.0);

        let wide = Vec3::new(sign.x + 400.0, sign.y, sign.z);
        let miss = scene::picking::Ray::new(camera.position, wide - camera.position);
        assert!(layer.hit_test(&miss, &camera).is_none_or(|(i, _)| i != 1));
    }

    #[test]
    fn anchors_rank_by_count() {
        let layer = SignpostLayer::build(3, &catalog(), &SignpostOptions::default());
        let anchors = layer.label_anchors();
        assert_eq!(anchors[0].priority, 3.0);
        assert_eq!(anchors[1].subtitle.as_deref(), Some("2 trees"));
    }
}
