/// Camera placement that keeps the whole scene in view
use nalgebra::{Point3, Vector3};

use crate::bounds::Aabb;
use crate::controls::OrbitControls;
use crate::projection::Camera;

/// Default headroom factor around the framed model
pub const DEFAULT_FRAMING_MARGIN: f32 = 1.5;

/// Camera distance at which an object of `max_extent` fits the vertical FOV
pub fn framing_distance(max_extent: f32, fov: f32, margin: f32) -> f32 {
    (max_extent / 2.0) / (fov / 2.0).tan() * margin
}

/// Camera and control target derived from scene bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    pub target: Point3<f32>,
    pub position: Point3<f32>,
    pub distance: f32,
}

/// Compute the framing for `bounds`, viewed along the (1, 1, 1) diagonal.
///
/// Returns `None` for an empty scene or one without extent.
pub fn compute_framing(bounds: &Aabb, fov: f32, margin: f32) -> Option<Framing> {
    if bounds.is_empty() {
        return None;
    }
    let max_extent = bounds.max_extent();
    if max_extent <= 0.0 || !max_extent.is_finite() {
        return None;
    }

    let target = bounds.center();
    let distance = framing_distance(max_extent, fov, margin);
    let direction = Vector3::new(1.0, 1.0, 1.0).normalize();
    Some(Framing {
        target,
        position: target + direction * distance,
        distance,
    })
}

/// Move camera and controls so the scene is fully visible.
///
/// Leaves both untouched when there is nothing to frame.
pub fn frame_scene(
    camera: &mut Camera,
    controls: &mut OrbitControls,
    bounds: &Aabb,
    margin: f32,
) -> Option<Framing> {
    let framing = compute_framing(bounds, camera.fov, margin)?;
    controls.reset(framing.target);
    camera.position = framing.position;
    camera.look_at(framing.target);
    tracing::debug!(
        distance = framing.distance,
        target = ?framing.target,
        "framed scene"
    );
    Some(framing)
}
