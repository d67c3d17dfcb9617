use foundation::math::Vec3;
use runtime::animation::CameraPose;
use scene::picking::Ray;

/// Column-major 4x4 matrix as WGSL expects it.
pub type Mat4 = [[f32; 4]; 4];

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera3D {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_rad: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
}

impl Camera3D {
    pub fn look_at(position: Vec3, target: Vec3, fov_y_rad: f64, near: f64, far: f64) -> Self {
        Self {
            position,
            target,
            up: Vec3::UP,
            fov_y_rad,
            aspect: 1.0,
            near,
            far,
        }
    }

    pub fn with_aspect(mut self, aspect: f64) -> Self {
        self.set_viewport(aspect, 1.0);
        self
    }

    /// Aspect from a viewport size; a degenerate viewport keeps 1:1.
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.aspect = if height <= 0.0 || width <= 0.0 {
            1.0
        } else {
            (width / height).max(1e-6)
        };
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose::new(self.position, self.target)
    }

    pub fn set_pose(&mut self, pose: CameraPose) {
        self.position = pose.position;
        self.target = pose.target;
    }

    /// Forward, right and up unit vectors, or `None` when position == target.
    ///
    /// Looking straight along `up` falls back to a -Z reference so a camera
    /// directly above its target still has a basis.
    pub fn basis(&self) -> Option<(Vec3, Vec3, Vec3)> {
        let f = (self.target - self.position).normalized()?;
        let s = match f.cross(self.up).normalized() {
            Some(s) => s,
            None => f.cross(Vec3::new(0.0, 0.0, -1.0)).normalized()?,
        };
        let u = s.cross(f);
        Some((f, s, u))
    }

    pub fn view(&self) -> Mat4 {
        let Some((f, s, u)) = self.basis() else {
            return IDENTITY;
        };
        let eye = self.position;
        [
            [s.x as f32, u.x as f32, (-f.x) as f32, 0.0],
            [s.y as f32, u.y as f32, (-f.y) as f32, 0.0],
            [s.z as f32, u.z as f32, (-f.z) as f32, 0.0],
            [
                (-s.dot(eye)) as f32,
                (-u.dot(eye)) as f32,
                f.dot(eye) as f32,
                1.0,
            ],
        ]
    }

    pub fn projection(&self) -> Mat4 {
        mat4_perspective_rh_z0(self.fov_y_rad, self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        mat4_mul(self.projection(), self.view())
    }

    /// World-space ray from the eye through a point in normalized device
    /// coordinates (`x` right, `y` up, both in `[-1, 1]`).
    pub fn ray_from_ndc(&self, ndc_x: f64, ndc_y: f64) -> Option<Ray> {
        let (f, s, u) = self.basis()?;
        let tan_half = (0.5 * self.fov_y_rad).tan();
        let dir = f + s.scale(ndc_x * tan_half * self.aspect) + u.scale(ndc_y * tan_half);
        Some(Ray::new(self.position, dir.normalized()?))
    }

    /// NDC position of a world point, or `None` if it is not in front of the
    /// near plane.
    pub fn project_to_ndc(&self, point: Vec3) -> Option<[f64; 2]> {
        let (f, s, u) = self.basis()?;
        let d = point - self.position;
        let depth = d.dot(f);
        if depth < self.near {
            return None;
        }
        let tan_half = (0.5 * self.fov_y_rad).tan();
        Some([
            d.dot(s) / (depth * tan_half * self.aspect),
            d.dot(u) / (depth * tan_half),
        ])
    }

    /// Compass rotation in degrees for the current view direction.
    pub fn heading_deg(&self) -> f64 {
        let dir = self.target - self.position;
        -dir.x.atan2(dir.z).to_degrees()
    }
}

/// Pointer pixel (origin top-left) to normalized device coordinates.
pub fn pixel_to_ndc(x_px: f64, y_px: f64, width: f64, height: f64) -> [f64; 2] {
    let w = width.max(1.0);
    let h = height.max(1.0);
    [(x_px / w) * 2.0 - 1.0, -((y_px / h) * 2.0 - 1.0)]
}

/// NDC back to pixels; inverse of [`pixel_to_ndc`].
pub fn ndc_to_pixel(ndc: [f64; 2], width: f64, height: f64) -> [f64; 2] {
    [(ndc[0] + 1.0) * 0.5 * width, (1.0 - ndc[1]) * 0.5 * height]
}

pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

pub fn mat4_mul(a: Mat4, b: Mat4) -> Mat4 {
    // c = a * b, column-major
    let mut c = [[0.0f32; 4]; 4];
    for col in 0..4 {
        for row in 0..4 {
            c[col][row] = a[0][row] * b[col][0]
                + a[1][row] * b[col][1]
                + a[2][row] * b[col][2]
                + a[3][row] * b[col][3];
        }
    }
    c
}

/// Right-handed perspective with depth in `[0, 1]`.
pub fn mat4_perspective_rh_z0(fov_y_rad: f64, aspect: f64, near: f64, far: f64) -> Mat4 {
    let f = 1.0 / (0.5 * fov_y_rad).tan();
    let m00 = (f / aspect) as f32;
    let m11 = f as f32;
    let m22 = (far / (near - far)) as f32;
    let m23 = ((near * far) / (near - far)) as f32;
    [
        [m00, 0.0, 0.0, 0.0],
        [0.0, m11, 0.0, 0.0],
        [0.0, 0.0, m22, -1.0],
        [0.0, 0.0, m23, 0.0],
    ]
}

pub fn transform_point(m: &Mat4, p: Vec3) -> [f64; 4] {
    let v = [p.x as f32, p.y as f32, p.z as f32, 1.0];
    let mut out = [0.0f64; 4];
    for (row, slot) in out.iter_mut().enumerate() {
        *slot = (m[0][row] * v[0] + m[1][row] * v[1] + m[2][row] * v[2] + m[3][row] * v[3]) as f64;
    }
    out
}
