//! Orbit, pan and zoom around a ground target.
//!
//! Every operation maps a `CameraPose` to a new one; the session decides when
//! input is accepted and feeds the result to the flight director.

use foundation::math::{Vec2, Vec3};
use formats::CameraConfig;
use runtime::animation::CameraPose;

/// Radians of orbit per pixel of drag.
const ROTATE_SPEED: f64 = 0.005;
/// Wheel delta to dolly exponent.
const ZOOM_SPEED: f64 = 0.003;
const MIN_POLAR: f64 = 1e-4;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DragMode {
    Orbit,
    Pan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    pub min_distance: f64,
    pub max_distance: f64,
    /// Largest angle between the view offset and straight up.
    pub max_polar_angle: f64,
    /// Scene units per pixel, independent of zoom.
    pub pan_speed: f64,
    pub enabled: bool,
    drag: Option<(DragMode, Vec2)>,
}

impl OrbitControls {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            max_polar_angle: config.max_polar_angle,
            pan_speed: config.pan_speed,
            enabled: true,
            drag: None,
        }
    }

    pub fn dragging(&self) -> Option<DragMode> {
        self.drag.map(|(mode, _)| mode)
    }

    pub fn begin_drag(&mut self, mode: DragMode, at: Vec2) {
        if self.enabled {
            self.drag = Some((mode, at));
        }
    }

    /// Applies the movement since the last drag position; `None` when no drag
    /// is in progress.
    pub fn drag_to(&mut self, pose: CameraPose, at: Vec2) -> Option<CameraPose> {
        let (mode, last) = self.drag?;
        self.drag = Some((mode, at));
        let delta = at - last;
        Some(match mode {
            DragMode::Orbit => self.orbit(pose, delta.x, delta.y),
            DragMode::Pan => self.pan(pose, delta.x, delta.y),
        })
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// Rotates the eye around the target. Distance is preserved and the polar
    /// angle stays above the ground.
    pub fn orbit(&self, pose: CameraPose, dx_px: f64, dy_px: f64) -> CameraPose {
        let offset = pose.position - pose.target;
        let radius = offset.length();
        if radius <= 0.0 {
            return pose;
        }
        let theta = offset.x.atan2(offset.z) - dx_px * ROTATE_SPEED;
        let phi = ((offset.y / radius).clamp(-1.0, 1.0).acos() - dy_px * ROTATE_SPEED)
            .clamp(MIN_POLAR, self.max_polar_angle);
        let offset = Vec3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        CameraPose::new(pose.target + offset, pose.target)
    }

    /// Slides eye and target together across the ground plane.
    pub fn pan(&self, pose: CameraPose, dx_px: f64, dy_px: f64) -> CameraPose {
        let Some(forward) = (pose.target - pose.position).normalized() else {
            return pose;
        };
        let Some(right) = forward
            .cross(Vec3::UP)
            .normalized()
            .or_else(|| forward.cross(Vec3::new(0.0, 0.0, -1.0)).normalized())
        else {
            return pose;
        };
        let Some(ahead) = Vec3::UP.cross(right).normalized() else {
            return pose;
        };
        let shift = right.scale(-dx_px * self.pan_speed) + ahead.scale(dy_px * self.pan_speed);
        CameraPose::new(pose.position + shift, pose.target + shift)
    }

    /// Dollies along the view direction; positive wheel deltas move away.
    pub fn zoom(&self, pose: CameraPose, wheel_delta_y: f64) -> CameraPose {
        let offset = pose.position - pose.target;
        let radius = offset.length();
        let Some(dir) = offset.normalized() else {
            return pose;
        };
        let distance =
            (radius * (wheel_delta_y * ZOOM_SPEED).exp()).clamp(self.min_distance, self.max_distance);
        CameraPose::new(pose.target + dir.scale(distance), pose.target)
    }
}
