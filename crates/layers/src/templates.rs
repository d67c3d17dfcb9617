//! Shared geometry templates: one canopy mesh per shape plus one trunk mesh.
//!
//! Templates are centered on the origin in unit space; instance transforms
//! place and size them.

use foundation::bounds::Aabb3;
use foundation::math::Vec3;
use gpu::MeshData;
use scene::archetype::Shape;

pub fn canopy_template(shape: Shape) -> MeshData {
    match shape {
        Shape::Conifer => cylinder(0.0, 0.35, 1.4, 6),
        Shape::Broad => scaled(sphere(0.5, 8, 6), [1.3, 0.7, 1.3]),
        Shape::Round => sphere(0.4, 8, 6),
        Shape::Columnar => cylinder(0.18, 0.22, 1.5, 6),
        Shape::Vase => scaled(cylinder(0.45, 0.2, 1.0, 7), [1.0, 0.8, 1.0]),
        Shape::Weeping => scaled(sphere(0.45, 8, 6), [1.2, 0.85, 1.2]),
        Shape::Small => scaled(sphere(0.3, 7, 5), [1.0, 0.85, 1.0]),
    }
}

pub fn trunk_template() -> MeshData {
    cylinder(0.06, 0.1, 1.0, 5)
}

/// Analytic bounds of [`canopy_template`]; covers the faceted mesh.
pub fn canopy_bounds(shape: Shape) -> Aabb3 {
    let (radius, half_height) = match shape {
        Shape::Conifer => (0.35, 0.7),
        Shape::Broad => (0.5 * 1.3, 0.5 * 0.7),
        Shape::Round => (0.4, 0.4),
        Shape::Columnar => (0.22, 0.75),
        Shape::Vase => (0.45, 0.5 * 0.8),
        Shape::Weeping => (0.45 * 1.2, 0.45 * 0.85),
        Shape::Small => (0.3, 0.3 * 0.85),
    };
    Aabb3::from_center_half_extents(Vec3::ZERO, Vec3::new(radius, half_height, radius))
}

pub fn trunk_bounds() -> Aabb3 {
    Aabb3::from_center_half_extents(Vec3::ZERO, Vec3::new(0.1, 0.5, 0.1))
}

/// UV sphere; `width_segments` around, `height_segments` pole to pole.
pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let mut mesh = MeshData::default();

    for lat in 0..=height_segments {
        let theta = lat as f32 / height_segments as f32 * std::f32::consts::PI;
        let (sin_t, cos_t) = theta.sin_cos();
        for lon in 0..=width_segments {
            let phi = lon as f32 / width_segments as f32 * std::f32::consts::TAU;
            let (sin_p, cos_p) = phi.sin_cos();
            let n = [sin_t * cos_p, cos_t, sin_t * sin_p];
            mesh.positions.push([n[0] * radius, n[1] * radius, n[2] * radius]);
            mesh.normals.push(n);
        }
    }

    let stride = width_segments + 1;
    for lat in 0..height_segments {
        for lon in 0..width_segments {
            let i0 = lat * stride + lon;
            let i1 = i0 + 1;
            let i2 = i0 + stride;
            let i3 = i2 + 1;
            if lat != 0 {
                mesh.indices.extend_from_slice(&[i0, i2, i1]);
            }
            if lat != height_segments - 1 {
                mesh.indices.extend_from_slice(&[i1, i2, i3]);
            }
        }
    }
    mesh
}

/// Capped cylinder along Y; a zero top radius makes a cone.
pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, radial_segments: u32) -> MeshData {
    let radial_segments = radial_segments.max(3);
    let half = height * 0.5;
    let slope = (radius_bottom - radius_top) / height;
    let mut mesh = MeshData::default();

    // side: a bottom and a top ring
    for (y, r) in [(-half, radius_bottom), (half, radius_top)] {
        for i in 0..=radial_segments {
            let phi = i as f32 / radial_segments as f32 * std::f32::consts::TAU;
            let (sin_p, cos_p) = phi.sin_cos();
            mesh.positions.push([r * sin_p, y, r * cos_p]);
            let n = [sin_p, slope, cos_p];
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            mesh.normals.push([n[0] / len, n[1] / len, n[2] / len]);
        }
    }
    let stride = radial_segments + 1;
    for i in 0..radial_segments {
        let (b0, b1) = (i, i + 1);
        let (t0, t1) = (i + stride, i + 1 + stride);
        mesh.indices.extend_from_slice(&[b0, b1, t0, t0, b1, t1]);
    }

    for (y, r, ny) in [(half, radius_top, 1.0f32), (-half, radius_bottom, -1.0)] {
        if r <= 0.0 {
            continue;
        }
        let center = mesh.positions.len() as u32;
        mesh.positions.push([0.0, y, 0.0]);
        mesh.normals.push([0.0, ny, 0.0]);
        for i in 0..=radial_segments {
            let phi = i as f32 / radial_segments as f32 * std::f32::consts::TAU;
            let (sin_p, cos_p) = phi.sin_cos();
            mesh.positions.push([r * sin_p, y, r * cos_p]);
            mesh.normals.push([0.0, ny, 0.0]);
        }
        for i in 0..radial_segments {
            let a = center + 1 + i;
            let b = a + 1;
            if ny > 0.0 {
                mesh.indices.extend_from_slice(&[center, a, b]);
            } else {
                mesh.indices.extend_from_slice(&[center, b, a]);
            }
        }
    }
    mesh
}

/// Non-uniform scale of positions; normals get the inverse scale.
pub fn scaled(mut mesh: MeshData, s: [f32; 3]) -> MeshData {
    for p in &mut mesh.positions {
        *p = [p[0] * s[0], p[1] * s[1], p[2] * s[2]];
    }
    for n in &mut mesh.normals {
        let v = [n[0] / s[0], n[1] / s[1], n[2] / s[2]];
        let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        if len > 0.0 {
            *n = [v[0] / len, v[1] / len, v[2] / len];
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::{canopy_bounds, canopy_template, cylinder, sphere, trunk_bounds, trunk_template};
    use scene::archetype::Shape;

    #[test]
    fn every_template_fits_its_bounds() {
        for shape in Shape::ALL {
            let mesh = canopy_template(shape);
            assert!(mesh.triangle_count() > 0, "{shape}");
            assert_eq!(mesh.positions.len(), mesh.normals.len());
            assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));

            let analytic = canopy_bounds(shape);
            let actual = mesh.bounds().expect("bounds");
            for axis in 0..3 {
                assert!(actual.min[axis] >= analytic.min[axis] - 1e-6, "{shape} axis {axis}");
                assert!(actual.max[axis] <= analytic.max[axis] + 1e-6, "{shape} axis {axis}");
            }
        }

        let trunk = trunk_template().bounds().expect("trunk");
        assert_eq!(trunk.max[1], trunk_bounds().max[1]);
    }

    #[test]
    fn cone_has_no_top_cap() {
        let cone = cylinder(0.0, 0.35, 1.4, 6);
        let capped = cylinder(0.2, 0.35, 1.4, 6);
        assert_eq!(capped.triangle_count() - cone.triangle_count(), 6);
    }

    #[test]
    fn sphere_skips_degenerate_pole_triangles() {
        let mesh = sphere(1.0, 8, 6);
        // 8 * 6 quads, minus one triangle per quad on each polar row
        assert_eq!(mesh.triangle_count(), 8 * 6 * 2 - 16);
    }
}
