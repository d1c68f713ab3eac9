/// Centering and uniform scaling of loaded geometry
use nalgebra::Vector3;

use crate::bounds::Aabb;
use crate::transform::NodeTransform;

/// Default length of a normalized mesh's largest dimension
pub const DEFAULT_CANONICAL_SIZE: f32 = 4.0;

/// Computes the transform that centers `bounds` on the origin and scales its
/// largest extent to `canonical_size`.
///
/// Empty bounds and bounds with zero largest extent (a single point) keep a
/// scale of 1; an empty box is not moved at all.
pub fn compute_normalization(bounds: &Aabb, canonical_size: f32) -> NodeTransform {
    if bounds.is_empty() {
        return NodeTransform::identity();
    }

    let offset: Vector3<f32> = -bounds.center().coords;
    let max_extent = bounds.max_extent();
    let scale = if max_extent > 0.0 && max_extent.is_finite() {
        canonical_size / max_extent
    } else {
        1.0
    };

    NodeTransform { offset, scale }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn test_box_is_centered_and_scaled() {
        let bounds = Aabb::new(Point3::new(10.0, 20.0, 30.0), Point3::new(12.0, 24.0, 38.0));
        let t = compute_normalization(&bounds, 4.0);
        assert_relative_eq!(t.offset, Vector3::new(-11.0, -22.0, -34.0));
        assert_relative_eq!(t.scale, 0.5);

        let world = bounds.transformed(&t.model_matrix());
        assert_relative_eq!(world.center(), Point3::origin(), epsilon = 1e-5);
        assert_relative_eq!(world.max_extent(), 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_single_point_keeps_unit_scale() {
        let bounds = Aabb::from_points([Point3::new(3.0, -1.0, 2.0)].iter());
        let t = compute_normalization(&bounds, 4.0);
        assert_eq!(t.scale, 1.0);
        assert_relative_eq!(t.offset, Vector3::new(-3.0, 1.0, -2.0));
    }

    #[test]
    fn test_empty_bounds_are_untouched() {
        assert_eq!(compute_normalization(&Aabb::empty(), 4.0), NodeTransform::identity());
    }

    #[test]
    fn test_flat_geometry_still_scales() {
        let bounds = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0));
        let t = compute_normalization(&bounds, 4.0);
        assert_relative_eq!(t.scale, 4.0);
    }

    #[test]
    fn test_tiny_model_is_scaled_up() {
        let bounds = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1e-8, 5e-9, 2e-9));
        let t = compute_normalization(&bounds, 4.0);
        assert_relative_eq!(t.scale, 4e8, max_relative = 1e-5);

        let world = bounds.transformed(&t.model_matrix());
        assert_relative_eq!(world.max_extent(), 4.0, max_relative = 1e-4);
    }

    #[test]
    fn test_renormalizing_is_a_no_op() {
        let bounds = Aabb::new(Point3::new(-7.0, 3.0, 0.5), Point3::new(1.0, 9.0, 2.0));
        let first = compute_normalization(&bounds, 4.0);
        let normalized = bounds.transformed(&first.model_matrix());
        let second = compute_normalization(&normalized, 4.0);
        assert_relative_eq!(second.offset, Vector3::zeros(), epsilon = 1e-5);
        assert_relative_eq!(second.scale, 1.0, epsilon = 1e-5);
    }
}
