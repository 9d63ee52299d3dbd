// Matrix helpers for the semantic vector types.
//
// glam already provides the storage and inversion; this adds the
// point/vector/normal distinction on top of Mat4.

use glam::{Mat3, Mat4, Vec4};

use crate::{Normal, Point, Vector};

pub type Matrix3 = Mat3;
pub type Matrix4 = Mat4;

/// Extension trait for Matrix4 transforms of Point, Vector and Normal.
pub trait Matrix4Ext {
    /// Transform a position (implicit w=1).
    fn transform_point(&self, point: Point) -> Point;

    /// Transform a direction (implicit w=0), translation is ignored.
    fn transform_vector(&self, vector: Vector) -> Vector;

    /// Transform a normal with the inverse transpose.
    ///
    /// The result is not renormalised.
    fn transform_normal(&self, normal: Normal) -> Normal;

    /// Inverse, or `None` when the matrix is singular.
    fn inverse_checked(&self) -> Option<Mat4>;
}

impl Matrix4Ext for Mat4 {
    fn transform_point(&self, point: Point) -> Point {
        Point(self.transform_point3(point.0))
    }

    fn transform_vector(&self, vector: Vector) -> Vector {
        let transformed = *self * Vec4::new(vector.x, vector.y, vector.z, 0.0);
        Vector(transformed.truncate())
    }

    fn transform_normal(&self, normal: Normal) -> Normal {
        let normal_matrix = Mat3::from_mat4(*self).inverse().transpose();
        Normal(normal_matrix * normal.0)
    }

    fn inverse_checked(&self) -> Option<Mat4> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        Some(self.inverse())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_transform_point_translation() {
        let mat = Mat4::from_translation(Vec3::new(10.0, 20.0, 30.0));
        let transformed = mat.transform_point(Point::new(1.0, 2.0, 3.0));

        assert_eq!(transformed, Point::new(11.0, 22.0, 33.0));
    }

    #[test]
    fn test_transform_vector_no_translation() {
        let mat = Mat4::from_translation(Vec3::new(10.0, 20.0, 30.0));
        let vector = Vector::new(1.0, 0.0, 0.0);

        // Translation should NOT affect vectors (w=0)
        assert_eq!(mat.transform_vector(vector), vector);
    }

    #[test]
    fn test_transform_vector_rotation() {
        use std::f32::consts::PI;

        let mat = Mat4::from_rotation_z(PI / 2.0);
        let transformed = mat.transform_vector(Vector::new(1.0, 0.0, 0.0));

        assert!((transformed.0 - Vec3::Y).length() < 0.001);
    }

    #[test]
    fn test_transform_normal_non_uniform_scale() {
        // Plane x = y has normal (1, -1, 0). Scaling x by 2 moves the plane to
        // x = 2y, whose normal is (1, -2, 0).
        let mat = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let n = mat.transform_normal(Normal::new(1.0, -1.0, 0.0));

        let tangent = mat.transform_vector(Vector::new(1.0, 1.0, 0.0));
        assert!(n.dot(tangent).abs() < 1e-5);

        // Scaling denormalises; the caller has to renormalise.
        let n = n.normalised();
        assert!((n.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_inverse_checked() {
        let mat = Mat4::from_rotation_y(std::f32::consts::PI / 4.0)
            * Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let inv = mat.inverse_checked().expect("rotation is invertible");

        let point = Point::new(5.0, 3.0, 2.0);
        let back = inv.transform_point(mat.transform_point(point));
        assert!((back - point).length() < 0.001);

        let singular = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        assert!(singular.inverse_checked().is_none());
    }
}
