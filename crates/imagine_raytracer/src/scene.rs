//! Reference scene: triangle meshes in a BVH, plus lights and materials.
//!
//! `TriangleScene` implements both sides the integrator consumes, the
//! traversal queries (`Raytracer`) and the shading data (`SceneInterface`).
//! It is immutable once built and shared by reference between workers.

use imagine_math::{Aabb, Matrix4};

use crate::{
    BvhNode, Colour, HitResult, Light, Material, Mesh, Ray, RayPayload, Raytracer,
    SceneInterface, Triangle,
};

/// Collects meshes, lights and materials, then builds the scene.
pub struct SceneBuilder {
    triangles: Vec<Triangle>,
    lights: Vec<Box<dyn Light>>,
    materials: Vec<Box<dyn Material>>,
    background: Colour,
    ray_epsilon: f32,
    next_object_id: u32,
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self {
            triangles: Vec::new(),
            lights: Vec::new(),
            materials: Vec::new(),
            background: Colour::ZERO,
            ray_epsilon: 0.0001,
            next_object_id: 0,
        }
    }

    /// Register a material and return its ID.
    pub fn add_material(&mut self, material: impl Material + 'static) -> u32 {
        self.materials.push(Box::new(material));
        (self.materials.len() - 1) as u32
    }

    /// Add a mesh placed by `transform`. Returns the new object's ID.
    pub fn add_mesh(&mut self, mesh: &Mesh, transform: Matrix4) -> u32 {
        let object_id = self.next_object_id;
        self.next_object_id += 1;
        self.triangles.extend(mesh.to_triangles(&transform, object_id));
        object_id
    }

    pub fn add_light(&mut self, light: impl Light + 'static) {
        self.lights.push(Box::new(light));
    }

    pub fn set_background(&mut self, colour: Colour) {
        self.background = colour;
    }

    pub fn set_ray_epsilon(&mut self, ray_epsilon: f32) {
        self.ray_epsilon = ray_epsilon;
    }

    pub fn build(self) -> TriangleScene {
        let bounds: Vec<Aabb> = self.triangles.iter().map(|t| t.bounding_box()).collect();
        let bvh = BvhNode::new(&bounds);

        log::info!(
            "Scene built: {} objects, {} triangles, {} BVH nodes, {} lights, {} materials",
            self.next_object_id,
            self.triangles.len(),
            bvh.node_count(),
            self.lights.len(),
            self.materials.len()
        );

        TriangleScene {
            triangles: self.triangles,
            bvh,
            lights: self.lights,
            materials: self.materials,
            background: self.background,
            ray_epsilon: self.ray_epsilon,
        }
    }
}

/// An immutable triangle scene.
pub struct TriangleScene {
    triangles: Vec<Triangle>,
    bvh: BvhNode,
    lights: Vec<Box<dyn Light>>,
    materials: Vec<Box<dyn Material>>,
    background: Colour,
    ray_epsilon: f32,
}

impl TriangleScene {
    pub fn builder() -> SceneBuilder {
        SceneBuilder::new()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn bounding_box(&self) -> Aabb {
        self.bvh.bounding_box()
    }

    #[inline]
    fn ignored(triangle: &Triangle, ray: &Ray) -> bool {
        matches!(ray.payload, RayPayload::IgnoreObject(id) if id == triangle.object_id)
    }
}

impl Raytracer for TriangleScene {
    fn does_occlude(&self, ray: &Ray) -> bool {
        self.bvh.occluded(ray, |index| {
            let triangle = &self.triangles[index as usize];
            !Self::ignored(triangle, ray) && triangle.intersect(ray).is_some()
        })
    }

    fn intersect(&self, ray: &Ray, hit: &mut HitResult<'_>) -> bool {
        let mut nearest = None;
        let found = self.bvh.intersect(ray, |index, t_max| {
            let triangle = &self.triangles[index as usize];
            if Self::ignored(triangle, ray) {
                return None;
            }
            let bounded = ray.with_bounds(ray.t_min, t_max);
            let (t, b1, b2) = triangle.intersect(&bounded)?;
            nearest = Some((index, b1, b2));
            Some(t)
        });

        match (found, nearest) {
            (Some(t), Some((index, b1, b2))) => {
                self.triangles[index as usize].fill_hit(ray, t, b1, b2, index, hit);
                true
            }
            _ => false,
        }
    }

    fn ray_epsilon(&self) -> f32 {
        self.ray_epsilon
    }
}

impl SceneInterface for TriangleScene {
    fn lights(&self) -> &[Box<dyn Light>] {
        &self.lights
    }

    fn material(&self, material_id: u32) -> Option<&dyn Material> {
        self.materials.get(material_id as usize).map(|m| m.as_ref())
    }

    fn background_colour(&self) -> Colour {
        self.background
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Lambertian, PointLight, RayType};
    use imagine_math::{Point, Vec3, Vector};

    fn two_quads() -> (TriangleScene, u32, u32) {
        let mut builder = TriangleScene::builder();
        let grey = builder.add_material(Lambertian::new(Colour::splat(0.5)));
        let quad = Mesh::quad(
            Point::new(-1.0, -1.0, 0.0),
            Vector::new(2.0, 0.0, 0.0),
            Vector::new(0.0, 2.0, 0.0),
        )
        .with_material(grey);

        let near = builder.add_mesh(&quad, Matrix4::from_translation(Vec3::new(0.0, 0.0, -2.0)));
        let far = builder.add_mesh(&quad, Matrix4::from_translation(Vec3::new(0.0, 0.0, -4.0)));
        builder.add_light(PointLight::new(Point::new(0.0, 5.0, 0.0), Colour::ONE, 10.0));
        (builder.build(), near, far)
    }

    fn forward_ray() -> Ray {
        let mut ray = Ray::new(Point::ZERO, Vector::new(0.0, 0.0, -1.0), RayType::CAMERA);
        ray.calculate_inverse_direction();
        ray
    }

    #[test]
    fn test_intersect_nearest_object() {
        let (scene, near, _) = two_quads();
        assert_eq!(scene.triangle_count(), 4);

        let mut hit = HitResult::default();
        assert!(scene.intersect(&forward_ray(), &mut hit));
        assert_eq!(hit.object_id, near);
        assert!((hit.t - 2.0).abs() < 1e-5);
        assert_eq!(hit.material_id, 0);
    }

    #[test]
    fn test_ignore_object_payload() {
        let (scene, near, far) = two_quads();
        let ray = forward_ray().with_payload(RayPayload::IgnoreObject(near));

        let mut hit = HitResult::default();
        assert!(scene.intersect(&ray, &mut hit));
        assert_eq!(hit.object_id, far);

        let occluder_ignored = ray.with_bounds(0.0, 3.0);
        assert!(!scene.does_occlude(&occluder_ignored));
        assert!(scene.does_occlude(&forward_ray().with_bounds(0.0, 3.0)));
    }

    #[test]
    fn test_miss_and_scene_data() {
        let (scene, _, _) = two_quads();
        let mut ray = Ray::new(Point::ZERO, Vector::new(0.0, 0.0, 1.0), RayType::CAMERA);
        ray.calculate_inverse_direction();

        let mut hit = HitResult::default();
        assert!(!scene.intersect(&ray, &mut hit));
        assert!(!scene.does_occlude(&ray));

        assert_eq!(scene.lights().len(), 1);
        assert!(scene.material(0).is_some());
        assert!(scene.material(1).is_none());
    }
}
