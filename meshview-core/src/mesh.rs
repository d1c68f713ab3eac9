/// The session's normalized, shaded model
use crate::bounds::Aabb;
use crate::geometry::{SceneNode, Surface};
use crate::material::{Color, DisplayMode, Material};
use crate::normalize::compute_normalization;
use crate::resources::{BufferHandle, MaterialHandle, ResourceTracker};
use crate::transform::NodeTransform;

/// Triangle count above which a model is reported as very large
pub const LARGE_MODEL_TRIANGLES: usize = 1_000_000;

/// One surface of the model together with its material and GPU slots
#[derive(Debug)]
pub struct MeshSurface {
    pub geometry: Surface,
    material: Material,
    material_slot: Option<MaterialHandle>,
    buffers: Vec<BufferHandle>,
}

impl MeshSurface {
    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn is_uploaded(&self) -> bool {
        !self.buffers.is_empty()
    }

    fn upload(&mut self, tracker: &ResourceTracker) {
        if self.is_uploaded() {
            return;
        }
        let vertex_bytes = self.geometry.vertex_count() * 2 * std::mem::size_of::<[f32; 3]>();
        self.buffers.push(tracker.alloc_buffer(vertex_bytes));
        if let Some(indices) = self.geometry.indices() {
            self.buffers
                .push(tracker.alloc_buffer(std::mem::size_of_val(indices)));
        }
        self.material_slot = Some(tracker.alloc_material());
    }
}

/// A loaded model, flattened to a list of surfaces under one transform.
///
/// Only the mesh itself changes its transform, through [`NormalizedMesh::normalize`].
#[derive(Debug)]
pub struct NormalizedMesh {
    surfaces: Vec<MeshSurface>,
    transform: NodeTransform,
    tracker: Option<ResourceTracker>,
}

impl NormalizedMesh {
    /// Flatten a loaded scene graph, filling in any missing normals.
    pub fn from_node(node: SceneNode, material: Material) -> Self {
        let surfaces = node
            .into_surfaces()
            .into_iter()
            .map(|mut geometry| {
                geometry.ensure_normals();
                MeshSurface {
                    geometry,
                    material,
                    material_slot: None,
                    buffers: Vec::new(),
                }
            })
            .collect();

        Self {
            surfaces,
            transform: NodeTransform::identity(),
            tracker: None,
        }
    }

    pub fn surfaces(&self) -> &[MeshSurface] {
        &self.surfaces
    }

    pub fn transform(&self) -> NodeTransform {
        self.transform
    }

    pub fn triangle_count(&self) -> usize {
        self.surfaces.iter().map(|s| s.geometry.triangle_count()).sum()
    }

    /// Union of the surfaces' object-space bounds
    pub fn local_bounds(&self) -> Aabb {
        self.surfaces
            .iter()
            .fold(Aabb::empty(), |acc, s| acc.union(&s.geometry.bounds()))
    }

    /// Bounds after the mesh transform is applied
    pub fn world_bounds(&self) -> Aabb {
        self.local_bounds().transformed(&self.transform.model_matrix())
    }

    /// Center the mesh on the origin and scale it to `canonical_size`.
    pub fn normalize(&mut self, canonical_size: f32) -> NodeTransform {
        self.transform = compute_normalization(&self.local_bounds(), canonical_size);
        self.transform
    }

    /// Allocate GPU buffers and material slots for every surface.
    pub fn upload(&mut self, tracker: &ResourceTracker) {
        for surface in &mut self.surfaces {
            surface.upload(tracker);
        }
        self.tracker = Some(tracker.clone());
    }

    /// Replace every surface's material for a new display mode.
    pub fn apply_display_mode(&mut self, mode: DisplayMode, color: Color) {
        for surface in &mut self.surfaces {
            surface.material = Material::for_mode(mode, color);
            if let Some(tracker) = &self.tracker {
                // New configuration first, then the old slot is released.
                let fresh = tracker.alloc_material();
                surface.material_slot = Some(fresh);
            }
        }
    }

    /// Update the color of the existing materials in place.
    pub fn set_color(&mut self, color: Color) {
        for surface in &mut self.surfaces {
            surface.material.set_color(color);
        }
    }

    /// Release every buffer and material slot.
    pub fn release(&mut self) {
        for surface in &mut self.surfaces {
            surface.buffers.clear();
            surface.material_slot = None;
        }
        self.tracker = None;
    }
}

impl Drop for NormalizedMesh {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    fn two_cubes() -> SceneNode {
        let far = Surface::new(
            Surface::cube(2.0)
                .positions()
                .iter()
                .map(|p| p + Vector3::new(10.0, 0.0, 0.0))
                .collect(),
        );
        SceneNode::group(
            None,
            vec![SceneNode::Surface(Surface::cube(2.0)), SceneNode::Surface(far)],
        )
    }

    #[test]
    fn test_normalize_multi_surface() {
        let material = Material::for_mode(DisplayMode::Normal, Color::new(1.0, 1.0, 1.0));
        let mut mesh = NormalizedMesh::from_node(two_cubes(), material);
        assert_eq!(mesh.surfaces().len(), 2);
        assert!(mesh.surfaces().iter().all(|s| s.geometry.has_usable_normals()));

        mesh.normalize(4.0);
        let world = mesh.world_bounds();
        assert_relative_eq!(world.center(), Point3::origin(), epsilon = 1e-5);
        assert_relative_eq!(world.max_extent(), 4.0, epsilon = 1e-5);

        let again = mesh.normalize(4.0);
        assert_eq!(again, mesh.transform());
    }

    #[test]
    fn test_mode_and_color_changes_keep_geometry() {
        let tracker = ResourceTracker::new();
        let material = Material::for_mode(DisplayMode::Normal, Color::new(1.0, 0.0, 0.0));
        let mut mesh = NormalizedMesh::from_node(two_cubes(), material);
        mesh.normalize(4.0);
        mesh.upload(&tracker);
        assert_eq!(tracker.live_buffers(), 2);
        assert_eq!(tracker.live_materials(), 2);

        let transform = mesh.transform();
        let bounds = mesh.local_bounds();
        mesh.apply_display_mode(DisplayMode::XRay, Color::new(0.0, 0.0, 1.0));
        assert!(mesh.surfaces().iter().all(|s| s.material().mode == DisplayMode::XRay));
        assert_eq!(tracker.live_materials(), 2);
        assert_eq!(mesh.transform(), transform);
        assert_eq!(mesh.local_bounds(), bounds);

        mesh.set_color(Color::new(0.0, 1.0, 0.0));
        assert!(mesh
            .surfaces()
            .iter()
            .all(|s| s.material().color == Color::new(0.0, 1.0, 0.0) && s.material().transparent));

        drop(mesh);
        assert_eq!(tracker.live_buffers(), 0);
        assert_eq!(tracker.live_materials(), 0);
    }
}
