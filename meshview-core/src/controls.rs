/// Orbit controls: rotate, zoom and pan the camera around a target point
use nalgebra::{Point3, Vector3};

use crate::projection::Camera;

const MIN_POLAR: f32 = 1e-3;
/// Per-step dolly factor before `zoom_speed` is applied
const DOLLY_BASE: f32 = 0.95;

/// Accumulates user input and applies it to the camera once per frame.
///
/// The camera always ends an update looking at `target`, at a distance within
/// `[min_distance, max_distance]`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub min_distance: f32,
    pub max_distance: f32,
    pub zoom_speed: f32,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pending_theta: f32,
    pending_phi: f32,
    pending_log_scale: f32,
    pending_pan: Vector3<f32>,
}

impl OrbitControls {
    pub fn new(min_distance: f32, max_distance: f32, zoom_speed: f32) -> Self {
        Self {
            target: Point3::origin(),
            min_distance,
            max_distance,
            zoom_speed,
            enable_damping: false,
            damping_factor: 0.25,
            pending_theta: 0.0,
            pending_phi: 0.0,
            pending_log_scale: 0.0,
            pending_pan: Vector3::zeros(),
        }
    }

    pub fn with_damping(mut self, factor: f32) -> Self {
        self.enable_damping = true;
        self.damping_factor = factor.clamp(0.01, 1.0);
        self
    }

    /// Orbit around the vertical axis (radians)
    pub fn rotate_left(&mut self, angle: f32) {
        self.pending_theta -= angle;
    }

    /// Orbit over the target (radians)
    pub fn rotate_up(&mut self, angle: f32) {
        self.pending_phi -= angle;
    }

    /// Positive steps move the camera toward the target.
    pub fn zoom(&mut self, steps: f32) {
        self.pending_log_scale += steps * self.zoom_speed * DOLLY_BASE.ln();
    }

    /// Move the target in the camera's screen plane, in world units.
    pub fn pan(&mut self, camera: &Camera, dx: f32, dy: f32) {
        let forward = camera.forward();
        let right = forward
            .cross(&camera.up)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::x);
        let up = right.cross(&forward);
        self.pending_pan += right * dx + up * dy;
    }

    /// Point the controls at a new target, dropping pending input.
    pub fn reset(&mut self, target: Point3<f32>) {
        self.target = target;
        self.pending_theta = 0.0;
        self.pending_phi = 0.0;
        self.pending_log_scale = 0.0;
        self.pending_pan = Vector3::zeros();
    }

    fn is_idle(&self) -> bool {
        self.pending_theta.abs() < 1e-6
            && self.pending_phi.abs() < 1e-6
            && self.pending_log_scale.abs() < 1e-6
            && self.pending_pan.norm_squared() < 1e-12
    }

    /// Apply pending input to the camera. Returns true if the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let share = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };

        let theta_step = self.pending_theta * share;
        let phi_step = self.pending_phi * share;
        let scale_step = (self.pending_log_scale * share).exp();
        let pan_step = self.pending_pan * share;
        self.pending_theta -= theta_step;
        self.pending_phi -= phi_step;
        self.pending_log_scale -= self.pending_log_scale * share;
        self.pending_pan -= pan_step;
        if self.is_idle() {
            self.pending_theta = 0.0;
            self.pending_phi = 0.0;
            self.pending_log_scale = 0.0;
            self.pending_pan = Vector3::zeros();
        }

        self.target += pan_step;
        let offset = camera.position - (self.target - pan_step);
        let radius = offset.norm();
        if radius < f32::EPSILON {
            camera.target = self.target;
            return false;
        }

        let theta = offset.x.atan2(offset.z) + theta_step;
        let phi = ((offset.y / radius).clamp(-1.0, 1.0).acos() + phi_step)
            .clamp(MIN_POLAR, std::f32::consts::PI - MIN_POLAR);
        let radius = (radius * scale_step).clamp(self.min_distance, self.max_distance);

        let new_offset = Vector3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        let new_position = self.target + new_offset;
        let moved = (new_position - camera.position).norm() > 1e-5 || camera.target != self.target;
        camera.position = new_position;
        camera.target = self.target;
        moved
    }
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new(0.5, 200.0, 1.5)
    }
}
