//! Ambient occlusion estimator.
//!
//! Estimates the fraction of the hemisphere above a shading point that is
//! blocked by scene geometry, by casting `n * n` stratified occlusion rays.

use imagine_math::{Vec2, Vector};
use rand::RngCore;

use crate::sampling::{stratified_samples, uniform_sample_hemisphere_n, SampleBundle, SampleGenerator2D};
use crate::{HitResult, Ray, RayType, Raytracer, RenderError, RenderResult};

/// Hemisphere occlusion estimator.
///
/// Configure it once with `set_sample_count`, then query it for many hits.
/// The sample count must not change while a render is using it.
#[derive(Clone)]
pub struct RaytracerAmbientOcclusion<'a> {
    raytracer: Option<&'a dyn Raytracer>,
    sample_generator: SampleGenerator2D,

    num_samples: u32,
    total_samples: u32,
    inv_total_samples: f32,
    /// Jitter cell size, 1 / num_samples
    delta: f32,
    /// Occlusion rays only see geometry closer than this, 0 = unbounded
    distance: f32,
}

impl<'a> RaytracerAmbientOcclusion<'a> {
    /// Create an estimator that queries `raytracer` directly.
    pub fn new(raytracer: &'a dyn Raytracer) -> Self {
        Self {
            raytracer: Some(raytracer),
            ..Self::unbound()
        }
    }

    /// Create an estimator without a raytracer of its own. Queries resolve
    /// the raytracer through each hit's shading context, so one estimator
    /// can be shared between threads.
    pub fn unbound() -> Self {
        Self {
            raytracer: None,
            sample_generator: SampleGenerator2D::new(1),
            num_samples: 1,
            total_samples: 1,
            inv_total_samples: 1.0,
            delta: 1.0,
            distance: 0.0,
        }
    }

    /// Use an `n x n` stratified grid of occlusion rays. Rejects zero and
    /// counts whose square does not fit in a `u32`.
    pub fn set_sample_count(&mut self, samples_per_axis: u32) -> RenderResult<()> {
        let total_samples = match samples_per_axis.checked_mul(samples_per_axis) {
            Some(total) if total > 0 => total,
            _ => {
                return Err(RenderError::InvalidSampleCount {
                    name: "ambient_occlusion_samples",
                    value: samples_per_axis,
                })
            }
        };

        self.num_samples = samples_per_axis;
        self.total_samples = total_samples;
        self.inv_total_samples = 1.0 / self.total_samples as f32;
        self.delta = 1.0 / samples_per_axis as f32;
        self.sample_generator.set_samples_per_axis(samples_per_axis);
        Ok(())
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance.max(0.0);
    }

    pub fn num_samples(&self) -> u32 {
        self.num_samples
    }

    pub fn total_samples(&self) -> u32 {
        self.total_samples
    }

    pub fn inv_total_samples(&self) -> f32 {
        self.inv_total_samples
    }

    /// Width of one stratum of the sample grid.
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Occlusion at the hit using a fresh stratified sample set.
    pub fn get_occlusion_at_point(&mut self, hit: &HitResult<'_>, rng: &mut dyn RngCore) -> f32 {
        let Some(raytracer) = self.raytracer.or_else(|| context_raytracer(hit)) else {
            return 0.0;
        };

        let distance = self.distance;
        let samples = self.sample_generator.generate(rng);
        let obstructed = count_obstructed(raytracer, hit, distance, samples.iter().copied());
        self.occlusion_from_count(obstructed)
    }

    /// Occlusion at the hit using the `sample_index`-th set of samples in a
    /// shared bundle, so several estimators can draw from one decorrelated
    /// per-pixel sample set.
    pub fn get_occlusion_at_point_existing_samples(
        &self,
        hit: &HitResult<'_>,
        samples: &SampleBundle,
        sample_index: usize,
    ) -> f32 {
        let Some(raytracer) = self.raytracer.or_else(|| context_raytracer(hit)) else {
            return 0.0;
        };

        let total = self.total_samples as usize;
        let slice = samples.slice(sample_index * total, total);
        let obstructed = count_obstructed(raytracer, hit, self.distance, slice.iter().copied());
        self.occlusion_from_count(obstructed)
    }

    /// Occlusion at the hit, always resolving the raytracer through the
    /// hit's shading context and never touching the estimator's own state.
    pub fn get_occlusion_at_point_stand_alone(
        &self,
        hit: &HitResult<'_>,
        rng: &mut dyn RngCore,
    ) -> f32 {
        let Some(raytracer) = context_raytracer(hit) else {
            return 0.0;
        };

        let mut samples = Vec::with_capacity(self.total_samples as usize);
        stratified_samples(self.num_samples, rng, &mut samples);
        let obstructed = count_obstructed(raytracer, hit, self.distance, samples.into_iter());
        self.occlusion_from_count(obstructed)
    }

    #[inline]
    fn occlusion_from_count(&self, obstructed: u32) -> f32 {
        if obstructed == 0 {
            return 0.0;
        }
        if obstructed == self.total_samples {
            return 1.0;
        }
        obstructed as f32 * self.inv_total_samples
    }
}

fn context_raytracer<'h>(hit: &HitResult<'h>) -> Option<&'h dyn Raytracer> {
    hit.shading_context().map(|context| context.raytracer())
}

fn count_obstructed(
    raytracer: &dyn Raytracer,
    hit: &HitResult<'_>,
    distance: f32,
    samples: impl Iterator<Item = Vec2>,
) -> u32 {
    let normal = hit.facing_shading_normal();
    let t_min = hit.spawn_epsilon(raytracer.ray_epsilon());
    let t_max = if distance > 0.0 { distance } else { f32::INFINITY };

    let mut obstructed = 0;
    for sample in samples {
        let direction = uniform_sample_hemisphere_n(sample.x, sample.y, normal);

        let mut ray = Ray::new(hit.hit_point, Vector::from(direction), RayType::RAY_ALL)
            .with_bounds(t_min, t_max);
        ray.calculate_inverse_direction();

        if raytracer.does_occlude(&ray) {
            obstructed += 1;
        }
    }
    obstructed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Light, Material, RenderSettings, SceneInterface, ShadingContext};
    use imagine_math::{Normal, Point};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports the first `occluding` queries as blocked and counts all calls.
    struct CountingRaytracer {
        occluding: usize,
        calls: AtomicUsize,
        last_t_min: Mutex<f32>,
        last_t_max: Mutex<f32>,
    }

    impl CountingRaytracer {
        fn new(occluding: usize) -> Self {
            Self {
                occluding,
                calls: AtomicUsize::new(0),
                last_t_min: Mutex::new(0.0),
                last_t_max: Mutex::new(0.0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Raytracer for CountingRaytracer {
        fn does_occlude(&self, ray: &Ray) -> bool {
            assert_eq!(ray.ray_type, RayType::RAY_ALL);
            *self.last_t_min.lock() = ray.t_min;
            *self.last_t_max.lock() = ray.t_max;
            self.calls.fetch_add(1, Ordering::SeqCst) < self.occluding
        }

        fn intersect(&self, _ray: &Ray, _hit: &mut HitResult<'_>) -> bool {
            false
        }

        fn ray_epsilon(&self) -> f32 {
            0.001
        }
    }

    impl SceneInterface for CountingRaytracer {
        fn lights(&self) -> &[Box<dyn Light>] {
            &[]
        }

        fn material(&self, _material_id: u32) -> Option<&dyn Material> {
            None
        }
    }

    fn upward_hit<'a>() -> HitResult<'a> {
        let mut hit = HitResult::default();
        hit.hit_point = Point::new(0.0, 0.0, 0.0);
        hit.geometry_normal = Normal::new(0.0, 1.0, 0.0);
        hit.shading_normal = Normal::new(0.0, 1.0, 0.0);
        hit
    }

    #[test]
    fn test_set_sample_count_derived_values() {
        let raytracer = CountingRaytracer::new(0);
        let mut ao = RaytracerAmbientOcclusion::new(&raytracer);
        ao.set_sample_count(8).unwrap();

        assert_eq!(ao.num_samples(), 8);
        assert_eq!(ao.total_samples(), 64);
        assert!((ao.inv_total_samples() - 0.015625).abs() < 1e-9);
        assert_eq!(ao.delta(), 0.125);
    }

    #[test]
    fn test_zero_sample_count_rejected() {
        let mut ao = RaytracerAmbientOcclusion::unbound();
        assert!(matches!(
            ao.set_sample_count(0),
            Err(RenderError::InvalidSampleCount { value: 0, .. })
        ));
        assert_eq!(ao.total_samples(), 1);
    }

    #[test]
    fn test_overflowing_sample_count_rejected() {
        let mut ao = RaytracerAmbientOcclusion::unbound();
        assert!(matches!(
            ao.set_sample_count(70_000),
            Err(RenderError::InvalidSampleCount { value: 70_000, .. })
        ));
        assert_eq!(ao.num_samples(), 1);

        ao.set_sample_count(1_000).unwrap();
        assert_eq!(ao.total_samples(), 1_000_000);
    }

    #[test]
    fn test_distance_limits_rays() {
        let mut rng = StdRng::seed_from_u64(8);
        let raytracer = CountingRaytracer::new(0);
        let mut ao = RaytracerAmbientOcclusion::new(&raytracer);
        ao.set_sample_count(2).unwrap();

        ao.get_occlusion_at_point(&upward_hit(), &mut rng);
        assert_eq!(*raytracer.last_t_max.lock(), f32::INFINITY);

        ao.set_distance(2.5);
        ao.get_occlusion_at_point(&upward_hit(), &mut rng);
        assert_eq!(*raytracer.last_t_max.lock(), 2.5);

        // Negative distances clamp to unbounded
        ao.set_distance(-1.0);
        ao.get_occlusion_at_point(&upward_hit(), &mut rng);
        assert_eq!(*raytracer.last_t_max.lock(), f32::INFINITY);
    }

    #[test]
    fn test_unoccluded_scene_is_exactly_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        for n in 1..=6 {
            let raytracer = CountingRaytracer::new(0);
            let mut ao = RaytracerAmbientOcclusion::new(&raytracer);
            ao.set_sample_count(n).unwrap();

            assert_eq!(ao.get_occlusion_at_point(&upward_hit(), &mut rng), 0.0);
        }
    }

    #[test]
    fn test_fully_occluded_scene_is_exactly_one() {
        let mut rng = StdRng::seed_from_u64(2);
        for n in 1..=6 {
            let raytracer = CountingRaytracer::new(usize::MAX);
            let mut ao = RaytracerAmbientOcclusion::new(&raytracer);
            ao.set_sample_count(n).unwrap();

            assert_eq!(ao.get_occlusion_at_point(&upward_hit(), &mut rng), 1.0);
        }
    }

    #[test]
    fn test_issues_n_squared_rays() {
        let mut rng = StdRng::seed_from_u64(3);
        let raytracer = CountingRaytracer::new(0);
        let mut ao = RaytracerAmbientOcclusion::new(&raytracer);
        ao.set_sample_count(5).unwrap();

        ao.get_occlusion_at_point(&upward_hit(), &mut rng);
        assert_eq!(raytracer.calls(), 25);

        ao.get_occlusion_at_point(&upward_hit(), &mut rng);
        assert_eq!(raytracer.calls(), 50);
    }

    #[test]
    fn test_half_occluded_scenario() {
        let mut rng = StdRng::seed_from_u64(4);
        let raytracer = CountingRaytracer::new(32);
        let mut ao = RaytracerAmbientOcclusion::new(&raytracer);
        ao.set_sample_count(8).unwrap();

        assert_eq!(ao.get_occlusion_at_point(&upward_hit(), &mut rng), 0.5);
        assert_eq!(raytracer.calls(), 64);
    }

    #[test]
    fn test_t_min_scales_with_intersection_error() {
        let mut rng = StdRng::seed_from_u64(5);
        let raytracer = CountingRaytracer::new(0);
        let mut ao = RaytracerAmbientOcclusion::new(&raytracer);
        ao.set_sample_count(1).unwrap();

        let mut hit = upward_hit();
        hit.intersection_error = 500.0;
        ao.get_occlusion_at_point(&hit, &mut rng);

        let t_min = *raytracer.last_t_min.lock();
        assert!((t_min - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_existing_samples_offset() {
        let mut rng = StdRng::seed_from_u64(6);
        let raytracer = CountingRaytracer::new(4);
        let mut ao = RaytracerAmbientOcclusion::new(&raytracer);
        ao.set_sample_count(2).unwrap();

        let mut bundle = SampleBundle::new();
        bundle.generate(2, 3, &mut rng);

        // First set: all four rays are blocked
        assert_eq!(ao.get_occlusion_at_point_existing_samples(&upward_hit(), &bundle, 0), 1.0);
        // Last set (offset 8): nothing left to block
        assert_eq!(ao.get_occlusion_at_point_existing_samples(&upward_hit(), &bundle, 2), 0.0);
        assert_eq!(raytracer.calls(), 8);
    }

    #[test]
    fn test_stand_alone_uses_shading_context() {
        let mut rng = StdRng::seed_from_u64(7);
        let raytracer = CountingRaytracer::new(3);
        let settings = RenderSettings::default();
        let context = ShadingContext::new(&raytracer, &raytracer, &settings, 0);

        let mut ao = RaytracerAmbientOcclusion::unbound();
        ao.set_sample_count(3).unwrap();

        let mut hit = upward_hit();
        hit.set_shading_context(&context);

        let occlusion = ao.get_occlusion_at_point_stand_alone(&hit, &mut rng);
        assert!((occlusion - 3.0 / 9.0).abs() < 1e-6);
        assert_eq!(raytracer.calls(), 9);

        // Without a context there is nothing to query
        assert_eq!(ao.get_occlusion_at_point_stand_alone(&upward_hit(), &mut rng), 0.0);
        assert_eq!(raytracer.calls(), 9);
    }
}
