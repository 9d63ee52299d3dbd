//! Camera for ray generation.

use imagine_math::{Point, Vec2, Vector};

use crate::sampling::uniform_sample_disk;
use crate::{Ray, RayType};

/// Thin lens camera generating primary rays with ray differentials.
#[derive(Debug, Clone)]
pub struct Camera {
    pub image_width: u32,
    pub image_height: u32,

    look_from: Point,
    look_at: Point,
    vup: Vector,

    /// Degrees
    vfov: f32,
    /// Degrees; zero for a pinhole
    defocus_angle: f32,
    focus_dist: f32,

    center: Point,
    /// Top left corner of the image on the focus plane
    pixel00_loc: Point,
    pixel_delta_u: Vector,
    pixel_delta_v: Vector,
    w: Vector,
    defocus_disk_u: Vector,
    defocus_disk_v: Vector,
}

impl Camera {
    /// 512x512 camera at the origin looking down -z with a 90 degree FOV.
    pub fn new() -> Self {
        Self {
            image_width: 512,
            image_height: 512,
            look_from: Point::new(0.0, 0.0, 0.0),
            look_at: Point::new(0.0, 0.0, -1.0),
            vup: Vector::new(0.0, 1.0, 0.0),
            vfov: 90.0,
            defocus_angle: 0.0,
            focus_dist: 1.0,
            // Derived in initialize()
            center: Point::ZERO,
            pixel00_loc: Point::ZERO,
            pixel_delta_u: Vector::ZERO,
            pixel_delta_v: Vector::ZERO,
            w: Vector::new(0.0, 0.0, 1.0),
            defocus_disk_u: Vector::ZERO,
            defocus_disk_v: Vector::ZERO,
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.image_width = width;
        self.image_height = height;
        self
    }

    pub fn with_position(mut self, look_from: Point, look_at: Point, vup: Vector) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self
    }

    /// Vertical FOV and defocus cone angle in degrees; `focus_dist` is the
    /// distance to the plane in perfect focus.
    pub fn with_lens(mut self, vfov: f32, defocus_angle: f32, focus_dist: f32) -> Self {
        self.vfov = vfov;
        self.defocus_angle = defocus_angle;
        self.focus_dist = focus_dist;
        self
    }

    /// Derive the viewport and lens basis. Call again after changing any
    /// parameter.
    pub fn initialize(&mut self) {
        self.center = self.look_from;

        let theta = self.vfov.to_radians();
        let h = (theta / 2.0).tan();
        let viewport_height = 2.0 * h * self.focus_dist;
        let viewport_width = viewport_height * (self.image_width as f32 / self.image_height as f32);

        // Right-handed basis, w points backwards
        self.w = (self.look_from - self.look_at).normalised();
        let u = self.vup.cross(self.w).normalised();
        let v = self.w.cross(u);

        let viewport_u = u * viewport_width;
        let viewport_v = v * -viewport_height;

        self.pixel_delta_u = viewport_u / self.image_width as f32;
        self.pixel_delta_v = viewport_v / self.image_height as f32;

        let viewport_upper_left =
            self.center - self.w * self.focus_dist - viewport_u / 2.0 - viewport_v / 2.0;
        self.pixel00_loc = viewport_upper_left;

        let defocus_radius = self.focus_dist * (self.defocus_angle / 2.0).to_radians().tan();
        self.defocus_disk_u = u * defocus_radius;
        self.defocus_disk_v = v * defocus_radius;
    }

    /// Generate a camera ray through raster position `(px, py)`, where
    /// `(0, 0)` is the top left corner of the image and pixel centres sit
    /// at half-integer positions.
    ///
    /// `lens_sample` in `[0, 1)²` picks the point on the lens. The x and y
    /// differentials are the rays one pixel to the right and one pixel
    /// down, through the same lens point.
    pub fn create_camera_ray(&self, px: f32, py: f32, lens_sample: Vec2) -> Ray {
        let origin = if self.defocus_angle <= 0.0 {
            self.center
        } else {
            let p = uniform_sample_disk(lens_sample.x, lens_sample.y);
            self.center + self.defocus_disk_u * p.x + self.defocus_disk_v * p.y
        };

        let target = self.pixel00_loc + self.pixel_delta_u * px + self.pixel_delta_v * py;
        let direction = (target - origin).normalised();

        let mut ray = Ray::new(origin, direction, RayType::CAMERA);
        ray.set_ray_differentials(
            origin,
            (target + self.pixel_delta_u - origin).normalised(),
            origin,
            (target + self.pixel_delta_v - origin).normalised(),
        );
        ray.calculate_inverse_direction();
        ray
    }

    /// Direction the camera looks along.
    pub fn forward(&self) -> Vector {
        -self.w
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_camera() -> Camera {
        let mut camera = Camera::new()
            .with_resolution(100, 100)
            .with_position(Point::ZERO, Point::new(0.0, 0.0, -1.0), Vector::new(0.0, 1.0, 0.0))
            .with_lens(90.0, 0.0, 1.0);
        camera.initialize();
        camera
    }

    #[test]
    fn test_camera_initialize() {
        let camera = test_camera();
        assert_eq!(camera.center, Point::ZERO);
        assert!((camera.forward() - Vector::new(0.0, 0.0, -1.0)).length() < 0.001);
    }

    #[test]
    fn test_centre_ray_points_forward() {
        let camera = test_camera();
        let ray = camera.create_camera_ray(50.0, 50.0, Vec2::splat(0.5));

        assert_eq!(ray.ray_type, RayType::CAMERA);
        assert!((ray.direction - Vector::new(0.0, 0.0, -1.0)).length() < 1e-5);
        assert!((ray.inverse_direction.z + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_corner_rays() {
        let camera = test_camera();

        // 90 degree FOV: the top left corner is at 45 degrees on both axes
        let ray = camera.create_camera_ray(0.0, 0.0, Vec2::ZERO);
        let expected = Vector::new(-1.0, 1.0, -1.0).normalised();
        assert!((ray.direction - expected).length() < 1e-5);
    }

    #[test]
    fn test_camera_ray_differentials() {
        let camera = test_camera();
        let ray = camera.create_camera_ray(50.0, 50.0, Vec2::ZERO);
        let differentials = ray.differentials().expect("camera rays carry differentials");

        let next_right = camera.create_camera_ray(51.0, 50.0, Vec2::ZERO);
        let next_down = camera.create_camera_ray(50.0, 51.0, Vec2::ZERO);
        assert!((differentials.x_direction - next_right.direction).length() < 1e-5);
        assert!((differentials.y_direction - next_down.direction).length() < 1e-5);
        assert!(differentials.x_direction.x > ray.direction.x);
        assert!(differentials.y_direction.y < ray.direction.y);
    }

    #[test]
    fn test_defocus_moves_origin() {
        let mut camera = Camera::new()
            .with_resolution(64, 64)
            .with_lens(40.0, 10.0, 5.0);
        camera.initialize();

        let centre = camera.create_camera_ray(32.0, 32.0, Vec2::splat(0.5));
        let edge = camera.create_camera_ray(32.0, 32.0, Vec2::new(0.99, 0.5));
        assert_eq!(centre.start_position, Point::ZERO);
        assert!(edge.start_position.distance(Point::ZERO) > 0.1);

        // Both rays converge on the focus plane
        let a = centre.point_at(5.0 / -centre.direction.z);
        let b = edge.point_at(5.0 / -edge.direction.z);
        assert!(a.distance(b) < 1e-3);
    }
}
