//! Triangle primitive and meshes.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use imagine_math::{Aabb, Matrix4, Matrix4Ext, Normal, Point, Vec2, Vector, UV};

use crate::{HitResult, Ray};

/// A triangle with per-vertex shading data, flattened out of a mesh.
#[derive(Debug, Clone)]
pub struct Triangle {
    vertices: [Point; 3],
    /// Per-vertex shading normals, `None` for flat shading
    normals: Option<[Normal; 3]>,
    uvs: [UV; 3],
    pub object_id: u32,
    pub material_id: u32,
    pub double_sided: bool,
    bbox: Aabb,
}

impl Triangle {
    /// Create a flat shaded triangle with the default UV layout
    /// `(0,0), (1,0), (1,1)`.
    pub fn new(v0: Point, v1: Point, v2: Point) -> Self {
        Self {
            vertices: [v0, v1, v2],
            normals: None,
            uvs: [UV::new(0.0, 0.0), UV::new(1.0, 0.0), UV::new(1.0, 1.0)],
            object_id: 0,
            material_id: 0,
            double_sided: true,
            bbox: Aabb::from_triangle(v0, v1, v2),
        }
    }

    pub fn with_normals(mut self, normals: [Normal; 3]) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_uvs(mut self, uvs: [UV; 3]) -> Self {
        self.uvs = uvs;
        self
    }

    pub fn vertices(&self) -> &[Point; 3] {
        &self.vertices
    }

    pub fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    /// Möller-Trumbore ray-triangle intersection.
    ///
    /// Returns `(t, b1, b2)` for a hit strictly inside the ray's bounds.
    pub fn intersect(&self, ray: &Ray) -> Option<(f32, f32, f32)> {
        let [v0, v1, v2] = self.vertices;
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let h = ray.direction.cross(edge2);
        let a = edge1.dot(h);

        // Ray is parallel to triangle
        if a.abs() < 1e-8 {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.start_position - v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(q);
        if !ray.in_range(t) {
            return None;
        }

        if !self.double_sided && a < 0.0 {
            return None;
        }

        Some((t, u, v))
    }

    /// Fill in the geometric part of a hit: position, normals, UVs and the
    /// edge deltas the derivative calculations need.
    pub fn fill_hit(&self, ray: &Ray, t: f32, b1: f32, b2: f32, triangle_id: u32, hit: &mut HitResult<'_>) {
        let [v0, v1, v2] = self.vertices;
        let [uv0, uv1, uv2] = self.uvs;

        hit.t = t;
        hit.object_id = self.object_id;
        hit.triangle_id = triangle_id;
        hit.material_id = self.material_id;
        hit.double_sided = self.double_sided;
        hit.barycentric = Vec2::new(b1, b2);
        hit.hit_point = Point::barycentric(v0, v1, v2, b1, b2);
        hit.uv = UV::barycentric(uv0, uv1, uv2, b1, b2);

        hit.dp10 = v1 - v0;
        hit.dp20 = v2 - v0;
        hit.duv10 = uv1 - uv0;
        hit.duv20 = uv2 - uv0;

        let face_normal = Normal::from(hit.dp10.cross(hit.dp20).normalised());
        match self.normals {
            Some([n0, n1, n2]) => {
                hit.shading_normal = Normal::barycentric(n0, n1, n2, b1, b2).normalised();
                hit.dn1 = n1 - n0;
                hit.dn2 = n2 - n0;
                hit.geometry_normal = if face_normal.dot(hit.shading_normal) < 0.0 {
                    -face_normal
                } else {
                    face_normal
                };
            }
            None => {
                hit.shading_normal = face_normal;
                hit.geometry_normal = face_normal;
                hit.dn1 = Normal::ZERO;
                hit.dn2 = Normal::ZERO;
            }
        }

        hit.backfacing = hit.geometry_normal.dot(ray.direction) > 0.0;

        // Absolute float error grows with the magnitude of the coordinates
        hit.intersection_error = hit.hit_point.abs().max_element().max(t).max(1.0);
    }
}

/// Indexed triangle mesh in object space.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub positions: Vec<Point>,
    pub normals: Option<Vec<Normal>>,
    pub uvs: Option<Vec<UV>>,
    pub indices: Vec<[u32; 3]>,
    pub material_id: u32,
    pub double_sided: bool,
}

impl Mesh {
    pub fn new(positions: Vec<Point>, indices: Vec<[u32; 3]>) -> Self {
        Self {
            positions,
            normals: None,
            uvs: None,
            indices,
            material_id: 0,
            double_sided: true,
        }
    }

    /// Quad from a corner and two edges, as two triangles.
    pub fn quad(corner: Point, edge_u: Vector, edge_v: Vector) -> Self {
        let positions = vec![
            corner,
            corner + edge_u,
            corner + edge_u + edge_v,
            corner + edge_v,
        ];
        let uvs = vec![
            UV::new(0.0, 0.0),
            UV::new(1.0, 0.0),
            UV::new(1.0, 1.0),
            UV::new(0.0, 1.0),
        ];
        Self {
            uvs: Some(uvs),
            ..Self::new(positions, vec![[0, 1, 2], [0, 2, 3]])
        }
    }

    pub fn with_material(mut self, material_id: u32) -> Self {
        self.material_id = material_id;
        self
    }

    pub fn with_normals(mut self, normals: Vec<Normal>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn single_sided(mut self) -> Self {
        self.double_sided = false;
        self
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Flatten into world-space triangles tagged with `object_id`.
    ///
    /// Faces with an out-of-range vertex index are skipped.
    pub fn to_triangles(&self, transform: &Matrix4, object_id: u32) -> Vec<Triangle> {
        let position = |i: u32| {
            self.positions
                .get(i as usize)
                .map(|p| transform.transform_point(*p))
        };
        let normal = |i: u32| {
            self.normals
                .as_ref()
                .and_then(|normals| normals.get(i as usize))
                .map(|n| transform.transform_normal(*n).normalised())
        };
        let uv = |i: u32| self.uvs.as_ref().and_then(|uvs| uvs.get(i as usize)).copied();

        let mut triangles = Vec::with_capacity(self.indices.len());
        for &[i0, i1, i2] in &self.indices {
            let (Some(p0), Some(p1), Some(p2)) = (position(i0), position(i1), position(i2)) else {
                log::warn!("Skipping face with out of range index in object {}", object_id);
                continue;
            };

            let mut triangle = Triangle::new(p0, p1, p2);
            if let (Some(n0), Some(n1), Some(n2)) = (normal(i0), normal(i1), normal(i2)) {
                triangle = triangle.with_normals([n0, n1, n2]);
            }
            if let (Some(uv0), Some(uv1), Some(uv2)) = (uv(i0), uv(i1), uv(i2)) {
                triangle = triangle.with_uvs([uv0, uv1, uv2]);
            }
            triangle.object_id = object_id;
            triangle.material_id = self.material_id;
            triangle.double_sided = self.double_sided;
            triangles.push(triangle);
        }
        triangles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RayType;
    use imagine_math::Vec3;

    fn test_triangle() -> Triangle {
        // Triangle in XY plane at z=-1
        Triangle::new(
            Point::new(-1.0, -1.0, -1.0),
            Point::new(1.0, -1.0, -1.0),
            Point::new(0.0, 1.0, -1.0),
        )
    }

    #[test]
    fn test_triangle_hit() {
        let tri = test_triangle();
        let ray = Ray::new(Point::ZERO, Vector::new(0.0, 0.0, -1.0), RayType::CAMERA);

        let (t, b1, b2) = tri.intersect(&ray).expect("ray hits triangle");
        assert!((t - 1.0).abs() < 0.001);

        let mut hit = HitResult::default();
        tri.fill_hit(&ray, t, b1, b2, 7, &mut hit);
        assert_eq!(hit.triangle_id, 7);
        assert!((hit.hit_point - ray.point_at(t)).length() < 1e-5);
        assert_eq!(hit.geometry_normal, Normal::new(0.0, 0.0, 1.0));
        assert!(!hit.backfacing);
    }

    #[test]
    fn test_triangle_miss() {
        let tri = test_triangle();

        // Ray pointing away
        let ray = Ray::new(Point::ZERO, Vector::new(0.0, 0.0, 1.0), RayType::CAMERA);
        assert!(tri.intersect(&ray).is_none());

        // Hit lies beyond t_max
        let ray = Ray::new(Point::ZERO, Vector::new(0.0, 0.0, -1.0), RayType::SHADOW)
            .with_bounds(0.0, 0.5);
        assert!(tri.intersect(&ray).is_none());
    }

    #[test]
    fn test_backfacing_and_single_sided() {
        let mut tri = test_triangle();
        let from_behind = Ray::new(Point::new(0.0, 0.0, -2.0), Vector::new(0.0, 0.0, 1.0), RayType::CAMERA);

        let (t, b1, b2) = tri.intersect(&from_behind).unwrap();
        let mut hit = HitResult::default();
        tri.fill_hit(&from_behind, t, b1, b2, 0, &mut hit);
        assert!(hit.backfacing);
        assert_eq!(hit.facing_shading_normal(), Normal::new(0.0, 0.0, -1.0));

        tri.double_sided = false;
        assert!(tri.intersect(&from_behind).is_none());
    }

    #[test]
    fn test_intersection_error_grows_with_magnitude() {
        let offset = Vec3::new(5000.0, 0.0, 0.0);
        let tri = Triangle::new(
            Point(Vec3::new(-1.0, -1.0, -1.0) + offset),
            Point(Vec3::new(1.0, -1.0, -1.0) + offset),
            Point(Vec3::new(0.0, 1.0, -1.0) + offset),
        );
        let ray = Ray::new(Point(offset), Vector::new(0.0, 0.0, -1.0), RayType::CAMERA);

        let (t, b1, b2) = tri.intersect(&ray).unwrap();
        let mut hit = HitResult::default();
        tri.fill_hit(&ray, t, b1, b2, 0, &mut hit);
        assert!(hit.intersection_error > 4999.0);
    }

    #[test]
    fn test_mesh_to_triangles_applies_transform() {
        let mesh = Mesh::quad(Point::ZERO, Vector::new(1.0, 0.0, 0.0), Vector::new(0.0, 1.0, 0.0))
            .with_material(3);
        let transform = Matrix4::from_translation(Vec3::new(0.0, 0.0, -4.0));
        let triangles = mesh.to_triangles(&transform, 9);

        assert_eq!(triangles.len(), 2);
        assert!(triangles.iter().all(|t| t.object_id == 9 && t.material_id == 3));
        assert_eq!(triangles[0].vertices()[1], Point::new(1.0, 0.0, -4.0));
    }

    #[test]
    fn test_mesh_skips_bad_indices() {
        let mesh = Mesh::new(
            vec![Point::ZERO, Point::new(1.0, 0.0, 0.0), Point::new(0.0, 1.0, 0.0)],
            vec![[0, 1, 2], [0, 1, 5]],
        );
        assert_eq!(mesh.to_triangles(&Matrix4::IDENTITY, 0).len(), 1);
    }
}
