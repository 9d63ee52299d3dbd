//! Per-intersection shading record.
//!
//! A `HitResult` is filled in by the raytracer's nearest-hit query and then
//! completed by the derivative calculations below. It is reused between
//! hits on the same thread: `reset()` clears every per-hit field but keeps
//! the association with the thread's `ShadingContext`.

use imagine_math::{coordinate_system, DVec3, Normal, Point, PointDouble, Vec2, Vector, UV};

use crate::{Ray, ShadingContext};

/// Intersection and surface data for one ray hit.
#[derive(Debug, Clone)]
pub struct HitResult<'ctx> {
    /// Ray parameter of the hit
    pub t: f32,
    pub object_id: u32,
    pub triangle_id: u32,
    pub material_id: u32,

    /// Barycentric coordinates (b1, b2) of the hit in its triangle
    pub barycentric: Vec2,
    pub hit_point: Point,
    /// Face normal of the triangle, on the same side as the shading normal
    pub geometry_normal: Normal,
    /// Interpolated (possibly perturbed) normal used for shading
    pub shading_normal: Normal,
    pub uv: UV,

    // Triangle edges and their parametric/normal deltas
    pub dp10: Vector,
    pub dp20: Vector,
    pub duv10: UV,
    pub duv20: UV,
    pub dn1: Normal,
    pub dn2: Normal,

    // Surface partial derivatives
    pub dpdu: Vector,
    pub dpdv: Vector,
    pub dndu: Normal,
    pub dndv: Normal,

    // Ray differential projections
    pub dudx: f32,
    pub dudy: f32,
    pub dvdx: f32,
    pub dvdy: f32,
    pub dpdx: Vector,
    pub dpdy: Vector,

    /// The ray hit the back of the surface
    pub backfacing: bool,
    pub double_sided: bool,

    /// Magnitude of the floating point error in `hit_point`, in units of the
    /// raytracer's ray epsilon
    pub intersection_error: f32,

    shading_context: Option<&'ctx ShadingContext<'ctx>>,
}

impl Default for HitResult<'_> {
    fn default() -> Self {
        Self {
            t: f32::INFINITY,
            object_id: 0,
            triangle_id: 0,
            material_id: 0,
            barycentric: Vec2::ZERO,
            hit_point: Point::ZERO,
            geometry_normal: Normal::ZERO,
            shading_normal: Normal::ZERO,
            uv: UV::ZERO,
            dp10: Vector::ZERO,
            dp20: Vector::ZERO,
            duv10: UV::ZERO,
            duv20: UV::ZERO,
            dn1: Normal::ZERO,
            dn2: Normal::ZERO,
            dpdu: Vector::ZERO,
            dpdv: Vector::ZERO,
            dndu: Normal::ZERO,
            dndv: Normal::ZERO,
            dudx: 0.0,
            dudy: 0.0,
            dvdx: 0.0,
            dvdy: 0.0,
            dpdx: Vector::ZERO,
            dpdy: Vector::ZERO,
            backfacing: false,
            double_sided: true,
            intersection_error: 1.0,
            shading_context: None,
        }
    }
}

impl<'ctx> HitResult<'ctx> {
    /// Create an empty hit bound to a thread's shading context.
    pub fn new(context: &'ctx ShadingContext<'ctx>) -> Self {
        Self {
            shading_context: Some(context),
            ..Self::default()
        }
    }

    pub fn shading_context(&self) -> Option<&'ctx ShadingContext<'ctx>> {
        self.shading_context
    }

    pub fn set_shading_context(&mut self, context: &'ctx ShadingContext<'ctx>) {
        self.shading_context = Some(context);
    }

    /// Clear all per-hit state. The shading context is kept.
    pub fn reset(&mut self) {
        *self = Self {
            shading_context: self.shading_context,
            ..Self::default()
        };
    }

    /// Solve for dpdu/dpdv and dndu/dndv from the triangle edges and their
    /// UV deltas.
    ///
    /// A UV mapping with an exactly zero determinant falls back to an
    /// arbitrary tangent frame around the geometry normal, with zero normal
    /// derivatives.
    pub fn calculate_initial_derivatives(&mut self) {
        let (du1, dv1) = (self.duv10.u(), self.duv10.v());
        let (du2, dv2) = (self.duv20.u(), self.duv20.v());

        let determinant = du1 * dv2 - du2 * dv1;
        if determinant == 0.0 {
            let (dpdu, dpdv) = coordinate_system(self.geometry_normal);
            self.dpdu = dpdu;
            self.dpdv = dpdv;
            self.dndu = Normal::ZERO;
            self.dndv = Normal::ZERO;
            return;
        }

        let inv_determinant = 1.0 / determinant;
        self.dpdu = (self.dp10 * dv2 - self.dp20 * dv1) * inv_determinant;
        self.dpdv = (self.dp20 * du1 - self.dp10 * du2) * inv_determinant;
        self.dndu = (self.dn1 * dv2 - self.dn2 * dv1) * inv_determinant;
        self.dndv = (self.dn2 * du1 - self.dn1 * du2) * inv_determinant;
    }

    /// Project the ray's differentials onto the tangent plane at the hit and
    /// derive the screen-space position and UV derivatives.
    ///
    /// Rays without differentials (and grazing offset rays) leave all
    /// derivatives at zero.
    pub fn calculate_ray_differentials(&mut self, ray: &Ray) {
        self.clear_ray_differentials();

        let Some(differentials) = ray.differentials() else {
            return;
        };

        let normal = self.geometry_normal.0.as_dvec3();
        let hit = PointDouble::from(self.hit_point);
        let plane_distance = normal.dot(hit.0);

        let project = |origin: Point, direction: Vector| -> Option<DVec3> {
            let origin = PointDouble::from(origin);
            let direction = direction.0.as_dvec3();
            let denominator = normal.dot(direction);
            if denominator == 0.0 {
                return None;
            }
            let t = (plane_distance - normal.dot(origin.0)) / denominator;
            t.is_finite().then(|| (origin.0 + direction * t) - hit.0)
        };

        let (Some(dpdx), Some(dpdy)) = (
            project(differentials.x_origin, differentials.x_direction),
            project(differentials.y_origin, differentials.y_direction),
        ) else {
            return;
        };

        self.dpdx = Vector(dpdx.as_vec3());
        self.dpdy = Vector(dpdy.as_vec3());

        // Drop the axis the normal is most aligned with and solve the
        // remaining 2x2 system in a least-squares sense.
        let n = self.geometry_normal.abs();
        let (a0, a1) = if n.x > n.y && n.x > n.z {
            (1, 2)
        } else if n.y > n.z {
            (0, 2)
        } else {
            (0, 1)
        };

        let a = [[self.dpdu[a0], self.dpdv[a0]], [self.dpdu[a1], self.dpdv[a1]]];

        if let Some((dudx, dvdx)) = solve_linear_2x2(a, [self.dpdx[a0], self.dpdx[a1]]) {
            self.dudx = dudx;
            self.dvdx = dvdx;
        }
        if let Some((dudy, dvdy)) = solve_linear_2x2(a, [self.dpdy[a0], self.dpdy[a1]]) {
            self.dudy = dudy;
            self.dvdy = dvdy;
        }
    }

    fn clear_ray_differentials(&mut self) {
        self.dudx = 0.0;
        self.dudy = 0.0;
        self.dvdx = 0.0;
        self.dvdy = 0.0;
        self.dpdx = Vector::ZERO;
        self.dpdy = Vector::ZERO;
    }

    /// Minimum `t` for rays spawned from this hit.
    #[inline]
    pub fn spawn_epsilon(&self, ray_epsilon: f32) -> f32 {
        self.intersection_error * ray_epsilon
    }

    /// Shading normal oriented towards the side the ray arrived from.
    #[inline]
    pub fn facing_shading_normal(&self) -> Normal {
        if self.backfacing {
            -self.shading_normal
        } else {
            self.shading_normal
        }
    }
}

fn solve_linear_2x2(a: [[f32; 2]; 2], b: [f32; 2]) -> Option<(f32, f32)> {
    let det = a[0][0] * a[1][1] - a[0][1] * a[1][0];
    if det.abs() < 1e-10 {
        return None;
    }
    let x0 = (a[1][1] * b[0] - a[0][1] * b[1]) / det;
    let x1 = (a[0][0] * b[1] - a[1][0] * b[0]) / det;
    if !x0.is_finite() || !x1.is_finite() {
        return None;
    }
    Some((x0, x1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RayType;

    fn approx_eq(a: Vector, b: Vector) -> bool {
        (a - b).length() < 1e-4
    }

    fn hit_with_edges(dp10: Vector, dp20: Vector, duv10: UV, duv20: UV) -> HitResult<'static> {
        HitResult {
            dp10,
            dp20,
            duv10,
            duv20,
            geometry_normal: Normal::from(dp10.cross(dp20).normalised()),
            ..Default::default()
        }
    }

    #[test]
    fn test_initial_derivatives_round_trip() {
        let cases = [
            (
                Vector::new(1.0, 0.0, 0.0),
                Vector::new(0.0, 1.0, 0.0),
                UV::new(1.0, 0.0),
                UV::new(0.0, 1.0),
            ),
            (
                Vector::new(2.0, 0.5, -1.0),
                Vector::new(-0.5, 3.0, 0.25),
                UV::new(0.3, 0.1),
                UV::new(-0.2, 0.7),
            ),
            (
                Vector::new(0.0, 0.0, 4.0),
                Vector::new(1.0, 1.0, 1.0),
                UV::new(0.0, 1.0),
                UV::new(1.0, 0.5),
            ),
        ];

        for (dp10, dp20, duv10, duv20) in cases {
            let mut hit = hit_with_edges(dp10, dp20, duv10, duv20);
            hit.calculate_initial_derivatives();

            let rebuilt10 = hit.dpdu * duv10.u() + hit.dpdv * duv10.v();
            let rebuilt20 = hit.dpdu * duv20.u() + hit.dpdv * duv20.v();
            assert!(approx_eq(rebuilt10, dp10), "{rebuilt10:?} != {dp10:?}");
            assert!(approx_eq(rebuilt20, dp20), "{rebuilt20:?} != {dp20:?}");
        }
    }

    #[test]
    fn test_normal_derivatives_round_trip() {
        let mut hit = hit_with_edges(
            Vector::new(1.0, 0.0, 0.0),
            Vector::new(0.0, 1.0, 0.0),
            UV::new(0.5, 0.25),
            UV::new(-0.25, 1.0),
        );
        hit.dn1 = Normal::new(0.1, 0.0, 0.0);
        hit.dn2 = Normal::new(0.0, -0.2, 0.05);
        hit.calculate_initial_derivatives();

        let rebuilt1 = hit.dndu * 0.5 + hit.dndv * 0.25;
        let rebuilt2 = hit.dndu * -0.25 + hit.dndv * 1.0;
        assert!((rebuilt1 - hit.dn1).length() < 1e-5);
        assert!((rebuilt2 - hit.dn2).length() < 1e-5);
    }

    #[test]
    fn test_degenerate_uvs_fall_back_to_orthonormal_frame() {
        // All three vertices share the same UV
        let mut hit = hit_with_edges(
            Vector::new(1.0, 0.0, 0.0),
            Vector::new(0.0, 0.0, 1.0),
            UV::ZERO,
            UV::ZERO,
        );
        hit.dn1 = Normal::new(1.0, 1.0, 1.0);
        hit.calculate_initial_derivatives();

        let n = hit.geometry_normal;
        assert!((hit.dpdu.length() - 1.0).abs() < 1e-5);
        assert!((hit.dpdv.length() - 1.0).abs() < 1e-5);
        assert!(hit.dpdu.dot(hit.dpdv).abs() < 1e-5);
        assert!(hit.dpdu.dot(n).abs() < 1e-5);
        assert!(hit.dpdv.dot(n).abs() < 1e-5);
        assert_eq!(hit.dndu, Normal::ZERO);
        assert_eq!(hit.dndv, Normal::ZERO);
    }

    #[test]
    fn test_tiny_determinant_is_not_degenerate() {
        // Only an exactly zero determinant takes the fallback path
        let mut hit = hit_with_edges(
            Vector::new(1.0, 0.0, 0.0),
            Vector::new(0.0, 1.0, 0.0),
            UV::new(1e-4, 0.0),
            UV::new(0.0, 1e-4),
        );
        hit.calculate_initial_derivatives();

        assert!((hit.dpdu.x - 1e4).abs() < 1.0);
        assert!((hit.dpdv.y - 1e4).abs() < 1.0);
    }

    #[test]
    fn test_ray_differentials_on_plane() {
        // z = 0 plane with uv == xy
        let mut hit = hit_with_edges(
            Vector::new(1.0, 0.0, 0.0),
            Vector::new(0.0, 1.0, 0.0),
            UV::new(1.0, 0.0),
            UV::new(0.0, 1.0),
        );
        hit.hit_point = Point::ZERO;
        hit.calculate_initial_derivatives();

        let start = Point::new(0.0, 0.0, 1.0);
        let mut ray = Ray::new(start, Vector::new(0.0, 0.0, -1.0), RayType::CAMERA);
        ray.set_ray_differentials(
            start,
            Vector::new(0.1, 0.0, -1.0),
            start,
            Vector::new(0.0, 0.2, -1.0),
        );
        hit.calculate_ray_differentials(&ray);

        assert!(approx_eq(hit.dpdx, Vector::new(0.1, 0.0, 0.0)));
        assert!(approx_eq(hit.dpdy, Vector::new(0.0, 0.2, 0.0)));
        assert!((hit.dudx - 0.1).abs() < 1e-5);
        assert!(hit.dvdx.abs() < 1e-5);
        assert!(hit.dudy.abs() < 1e-5);
        assert!((hit.dvdy - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_ray_without_differentials_clears_derivatives() {
        let mut hit = HitResult {
            dudx: 3.0,
            dpdy: Vector::new(1.0, 1.0, 1.0),
            geometry_normal: Normal::new(0.0, 0.0, 1.0),
            ..Default::default()
        };
        let ray = Ray::new(Point::ZERO, Vector::new(0.0, 0.0, -1.0), RayType::CAMERA);
        hit.calculate_ray_differentials(&ray);

        assert_eq!(hit.dudx, 0.0);
        assert_eq!(hit.dpdy, Vector::ZERO);
    }

    #[test]
    fn test_spawn_epsilon_scales_with_error() {
        let hit = HitResult {
            intersection_error: 250.0,
            ..Default::default()
        };
        assert!((hit.spawn_epsilon(0.0001) - 0.025).abs() < 1e-7);
    }
}
