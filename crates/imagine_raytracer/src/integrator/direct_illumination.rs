//! Direct illumination integrator.
//!
//! Shades camera rays with direct lighting from the scene's lights, an
//! ambient term optionally attenuated by ambient occlusion, optional
//! diffuse reflection rays, and recursive specular reflection and
//! refraction.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};

use imagine_math::{Vec2, Vector};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::accumulator::Accumulator;
use crate::material::{luminance, MaterialFlags};
use crate::sampling::{
    build_cdf, cosine_sample_hemisphere_n, gen_f32, sample_cdf, stratified_samples, SampleBundle,
    ONE_MINUS_EPSILON,
};
use crate::tile::generate_tiles;
use crate::{
    Camera, Colour, HitResult, Integrator, Light, LightSamplingType, LightsAndSamples, Material,
    OutputImage, PathState, Ray, RayPayload, RayType, Raytracer, RaytracerAmbientOcclusion,
    RenderError, RenderPass, RenderResult, RenderSettings, RenderTask, SceneInterface,
    ShadingContext, TileInfo, TileResult, TileState,
};

/// Edge length of the pixel blocks sampled once in the Initial pass.
const INITIAL_BLOCK_SIZE: u32 = 4;

/// Where the occlusion term of a shading point comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occlusion {
    /// No occlusion, the ambient term is unattenuated
    Off,
    /// Fresh samples from the task's estimator
    Fresh,
    /// The given set of the pixel's pre-generated sample bundle
    Bundle(usize),
}

/// Per-task mutable state, owned by the thread running the task.
struct TaskScratch<'a> {
    rng: StdRng,
    samples: SampleBundle,
    occlusion: RaytracerAmbientOcclusion<'a>,
}

/// Direct illumination integrator, generic over how samples are
/// accumulated.
pub struct DirectIllumination<'a, A: Accumulator> {
    raytracer: &'a dyn Raytracer,
    scene: &'a dyn SceneInterface,
    camera: &'a Camera,
    settings: RenderSettings,
    accumulator: A,

    initialised: bool,
    /// Antialiasing samples per axis
    samples_per_axis: u32,
    total_samples: u32,
    /// Width of one antialiasing stratum
    sample_increment: f32,
    /// Stratified sub-pixel offsets shared by every pixel, rotated per pixel
    camera_samples: Vec<Vec2>,

    light_table: Vec<LightsAndSamples>,
    light_cdf: Option<Vec<f32>>,

    /// Bound estimator each task clones for primary hits
    primary_occlusion: RaytracerAmbientOcclusion<'a>,
    /// Shared estimator for secondary hits, resolves the raytracer through
    /// the hit's shading context
    secondary_occlusion: RaytracerAmbientOcclusion<'a>,

    tiles: Vec<TileInfo>,
    passes: Vec<RenderPass>,
    total_tasks: usize,
    tasks_done: AtomicUsize,
}

impl<'a, A: Accumulator> DirectIllumination<'a, A> {
    pub fn new(
        raytracer: &'a dyn Raytracer,
        scene: &'a dyn SceneInterface,
        camera: &'a Camera,
        settings: RenderSettings,
        accumulator: A,
    ) -> Self {
        Self {
            raytracer,
            scene,
            camera,
            settings,
            accumulator,
            initialised: false,
            samples_per_axis: 1,
            total_samples: 1,
            sample_increment: 1.0,
            camera_samples: Vec::new(),
            light_table: Vec::new(),
            light_cdf: None,
            primary_occlusion: RaytracerAmbientOcclusion::new(raytracer),
            secondary_occlusion: RaytracerAmbientOcclusion::unbound(),
            tiles: Vec::new(),
            passes: Vec::new(),
            total_tasks: 0,
            tasks_done: AtomicUsize::new(0),
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn accumulator(&self) -> &A {
        &self.accumulator
    }

    pub fn sample_increment(&self) -> f32 {
        self.sample_increment
    }

    fn uses_occlusion(&self) -> bool {
        self.settings.ambient_only || self.settings.ambient_occlusion
    }

    /// Passes for this render. Final renders run one full quality pass;
    /// progressive renders preview first and then repeat the highest
    /// quality pass.
    fn plan_passes(&self) -> Vec<RenderPass> {
        let quality = if self.settings.ambient_occlusion {
            TileState::AAAO
        } else {
            TileState::AA
        };

        if !self.settings.progressive {
            return vec![RenderPass::new(quality, 0)];
        }

        let mut passes = Vec::new();
        let mut state = TileState::Blank.next();
        while state < quality {
            passes.push(RenderPass::new(state, 0));
            state = state.next();
        }
        for iteration in 0..self.settings.progressive_iterations {
            passes.push(RenderPass::new(quality, iteration));
        }
        passes
    }

    fn light_sample_count(light: &dyn Light) -> u32 {
        if light.is_delta() {
            1
        } else {
            light.sample_count()
        }
    }

    /// Lights and sample counts for the strategies that visit every light.
    fn build_light_table(&self) -> Vec<LightsAndSamples> {
        let lights = self.scene.lights();
        let split = (self.settings.light_samples / lights.len().max(1) as u32).max(1);

        lights
            .iter()
            .enumerate()
            .map(|(index, light)| {
                let count = match self.settings.light_sampling {
                    LightSamplingType::FullSplit if !light.is_delta() => split,
                    _ => Self::light_sample_count(light.as_ref()),
                };
                LightsAndSamples::new(index, count, 1.0)
            })
            .collect()
    }

    /// Render a preview pass: one sample per 4x4 block (Initial) or one
    /// sample at each pixel centre (Draft).
    pub fn do_progressive_task(&self, task: &RenderTask, context: &ShadingContext<'_>) -> TileResult {
        let mut scratch = self.task_scratch(task);
        let mut result = TileResult::new(task);
        let tile = task.tile;
        let occlusion = if self.settings.ambient_only {
            Occlusion::Fresh
        } else {
            Occlusion::Off
        };

        let block = if task.state == TileState::Initial {
            INITIAL_BLOCK_SIZE
        } else {
            1
        };

        for by in (0..tile.height).step_by(block as usize) {
            for bx in (0..tile.width).step_by(block as usize) {
                let bw = block.min(tile.width - bx);
                let bh = block.min(tile.height - by);

                let px = (tile.x + bx) as f32 + bw as f32 * 0.5;
                let py = (tile.y + by) as f32 + bh as f32 * 0.5;
                let ray = self.camera.create_camera_ray(px, py, Vec2::splat(0.5));
                let (colour, alpha) =
                    self.process_ray_recurse(&ray, context, PathState::default(), &mut scratch, occlusion);

                for ly in by..by + bh {
                    for lx in bx..bx + bw {
                        self.accumulator
                            .accumulate(result.pixel_mut(lx, ly), colour, alpha, Vec2::ZERO);
                    }
                }
            }
        }
        result
    }

    /// Render a full quality pass with the whole antialiasing budget.
    pub fn do_full_task(&self, task: &RenderTask, context: &ShadingContext<'_>) -> TileResult {
        let mut scratch = self.task_scratch(task);
        let mut result = TileResult::new(task);
        let tile = task.tile;
        let with_occlusion = self.settings.ambient_only
            || (task.state == TileState::AAAO && self.settings.ambient_occlusion);

        for ly in 0..tile.height {
            for lx in 0..tile.width {
                let (x, y) = ((tile.x + lx) as f32, (tile.y + ly) as f32);

                if with_occlusion {
                    scratch.samples.generate(
                        self.settings.ambient_occlusion_samples,
                        self.total_samples,
                        &mut scratch.rng,
                    );
                }

                // Rotate the shared packet so neighbouring pixels decorrelate
                let shift = Vec2::new(gen_f32(&mut scratch.rng), gen_f32(&mut scratch.rng));

                for (index, packet) in self.camera_samples.iter().enumerate() {
                    let offset = (*packet + shift).fract().min(Vec2::splat(ONE_MINUS_EPSILON));
                    let lens = Vec2::new(gen_f32(&mut scratch.rng), gen_f32(&mut scratch.rng));
                    let ray = self.camera.create_camera_ray(x + offset.x, y + offset.y, lens);

                    let occlusion = if with_occlusion {
                        Occlusion::Bundle(index)
                    } else {
                        Occlusion::Off
                    };
                    let (colour, alpha) = self.process_ray_recurse(
                        &ray,
                        context,
                        PathState::default(),
                        &mut scratch,
                        occlusion,
                    );
                    self.accumulator.accumulate(
                        result.pixel_mut(lx, ly),
                        colour,
                        alpha,
                        offset - Vec2::splat(0.5),
                    );
                }
            }
        }
        result
    }

    fn task_scratch(&self, task: &RenderTask) -> TaskScratch<'a> {
        TaskScratch {
            rng: StdRng::seed_from_u64(task.seed(self.settings.seed)),
            samples: SampleBundle::new(),
            occlusion: self.primary_occlusion.clone(),
        }
    }

    /// Trace a ray and shade what it hits. Returns colour and alpha.
    fn process_ray_recurse(
        &self,
        ray: &Ray,
        context: &ShadingContext<'_>,
        path: PathState,
        scratch: &mut TaskScratch<'_>,
        occlusion: Occlusion,
    ) -> (Colour, f32) {
        let raytracer = context.raytracer();
        let scene = context.scene();
        let settings = context.settings();

        let mut hit = context.new_hit_result();
        if !raytracer.intersect(ray, &mut hit) {
            let alpha = if ray.ray_type.contains(RayType::CAMERA) { 0.0 } else { 1.0 };
            return (scene.background_colour(), alpha);
        }
        hit.calculate_initial_derivatives();
        hit.calculate_ray_differentials(ray);

        if settings.ambient_only {
            let occluded = self.occlusion_at(&hit, path, scratch, occlusion);
            return (Colour::splat(1.0 - occluded), 1.0);
        }

        let Some(material) = scene.material(hit.material_id) else {
            return (Colour::ZERO, 1.0);
        };

        let wo = (-ray.direction).normalised();
        let flags = material.flags();
        let mut colour = material.emission(&hit);

        if flags.intersects(MaterialFlags::DIFFUSE | MaterialFlags::GLOSSY) {
            colour += self.direct_lighting(&hit, wo, material, context, &mut scratch.rng);
        }

        if flags.contains(MaterialFlags::DIFFUSE) {
            let albedo = material.albedo(&hit);
            let visibility = match occlusion {
                Occlusion::Off => 1.0,
                _ => 1.0 - self.occlusion_at(&hit, path, scratch, occlusion),
            };
            colour += settings.ambient_colour() * albedo * visibility;

            if settings.diffuse_reflection_samples > 0 && path.can_bounce(RayType::DIFFUSE, settings) {
                let next = path.bounced(RayType::DIFFUSE, luminance(albedo));
                colour += self.diffuse_reflection(&hit, wo, material, context, next, scratch, occlusion);
            }
        }

        let bsdf_sample = Vec2::new(gen_f32(&mut scratch.rng), gen_f32(&mut scratch.rng));
        if let Some(bsdf) = material.sample(&hit, wo, bsdf_sample) {
            if path.can_bounce(bsdf.ray_type, settings) {
                let next = path.bounced(bsdf.ray_type, luminance(bsdf.weight));
                let secondary = Self::spawn_ray(&hit, bsdf.direction, bsdf.ray_type, raytracer);
                let (incoming, _) = self.process_ray_recurse(&secondary, context, next, scratch, occlusion);
                colour += bsdf.weight * incoming;
            }
        }

        (colour, 1.0)
    }

    fn occlusion_at(
        &self,
        hit: &HitResult<'_>,
        path: PathState,
        scratch: &mut TaskScratch<'_>,
        occlusion: Occlusion,
    ) -> f32 {
        if path.depth > 0 {
            return self
                .secondary_occlusion
                .get_occlusion_at_point_stand_alone(hit, &mut scratch.rng);
        }
        match occlusion {
            Occlusion::Off => 0.0,
            Occlusion::Fresh => scratch.occlusion.get_occlusion_at_point(hit, &mut scratch.rng),
            Occlusion::Bundle(index) => {
                scratch
                    .occlusion
                    .get_occlusion_at_point_existing_samples(hit, &scratch.samples, index)
            }
        }
    }

    fn spawn_ray(hit: &HitResult<'_>, direction: Vector, ray_type: RayType, raytracer: &dyn Raytracer) -> Ray {
        let t_min = hit.spawn_epsilon(raytracer.ray_epsilon());
        let mut ray = Ray::new(hit.hit_point, direction, ray_type).with_bounds(t_min, f32::INFINITY);
        ray.calculate_inverse_direction();
        ray
    }

    /// Direct lighting at a hit with the configured light sampling strategy.
    fn direct_lighting(
        &self,
        hit: &HitResult<'_>,
        wo: Vector,
        material: &dyn Material,
        context: &ShadingContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Colour {
        let lights = context.scene().lights();
        if lights.is_empty() {
            return Colour::ZERO;
        }
        let light_count = lights.len();
        let raytracer = context.raytracer();

        match self.settings.light_sampling {
            LightSamplingType::Full | LightSamplingType::FullSplit => {
                let mut sum = Colour::ZERO;
                for entry in &self.light_table {
                    sum += self.sample_light(entry, hit, wo, material, raytracer, lights, rng);
                }
                sum
            }

            LightSamplingType::UniformSingle => {
                let index = pick_uniform(light_count, rng);
                let count = Self::light_sample_count(lights[index].as_ref());
                let entry = LightsAndSamples::new(index, count, light_count as f32);
                self.sample_light(&entry, hit, wo, material, raytracer, lights, rng)
            }

            LightSamplingType::UniformMultiple => {
                let picks = self.settings.light_samples;
                let multiplier = light_count as f32 / picks as f32;
                let mut sum = Colour::ZERO;
                for _ in 0..picks {
                    let entry = LightsAndSamples::new(pick_uniform(light_count, rng), 1, multiplier);
                    sum += self.sample_light(&entry, hit, wo, material, raytracer, lights, rng);
                }
                sum
            }

            LightSamplingType::Weighted => {
                let Some(cdf) = &self.light_cdf else {
                    return Colour::ZERO;
                };
                let (index, pdf) = sample_cdf(cdf, gen_f32(rng));
                let count = Self::light_sample_count(lights[index].as_ref());
                let entry = LightsAndSamples::new(index, count, 1.0 / pdf);
                self.sample_light(&entry, hit, wo, material, raytracer, lights, rng)
            }

            LightSamplingType::RadianceWeighted => {
                let normal = hit.facing_shading_normal();
                let weights = lights
                    .iter()
                    .map(|light| light.estimate_contribution(hit.hit_point, normal));
                let Some(cdf) = build_cdf(weights) else {
                    return Colour::ZERO;
                };
                let (index, pdf) = sample_cdf(&cdf, gen_f32(rng));
                let count = Self::light_sample_count(lights[index].as_ref());
                let entry = LightsAndSamples::new(index, count, 1.0 / pdf);
                self.sample_light(&entry, hit, wo, material, raytracer, lights, rng)
            }
        }
    }

    /// Shadowed contribution of one light, averaged over its samples and
    /// scaled by the entry's multiplier.
    #[allow(clippy::too_many_arguments)]
    fn sample_light(
        &self,
        entry: &LightsAndSamples,
        hit: &HitResult<'_>,
        wo: Vector,
        material: &dyn Material,
        raytracer: &dyn Raytracer,
        lights: &[Box<dyn Light>],
        rng: &mut dyn RngCore,
    ) -> Colour {
        let Some(light) = lights.get(entry.light_index) else {
            return Colour::ZERO;
        };
        let normal = hit.facing_shading_normal();
        let epsilon = hit.spawn_epsilon(raytracer.ray_epsilon());

        let mut sum = Colour::ZERO;
        for _ in 0..entry.sample_count {
            let u = Vec2::new(gen_f32(rng), gen_f32(rng));
            let Some(light_sample) = light.sample(hit.hit_point, u) else {
                continue;
            };
            let cos_theta = normal.dot(light_sample.direction);
            if cos_theta <= 0.0 || !(light_sample.pdf > 0.0) {
                continue;
            }
            let f = material.evaluate(hit, wo, light_sample.direction);
            if f == Colour::ZERO {
                continue;
            }

            let mut shadow = Ray::new(hit.hit_point, light_sample.direction, RayType::SHADOW)
                .with_bounds(epsilon, light_sample.distance - epsilon);
            if let Some(object_id) = light.object_id() {
                shadow = shadow.with_payload(RayPayload::IgnoreObject(object_id));
            }
            shadow.calculate_inverse_direction();
            if raytracer.does_occlude(&shadow) {
                continue;
            }

            sum += f * light_sample.radiance * (cos_theta / light_sample.pdf);
        }
        sum * (entry.inv_sample_count() * entry.sample_multiplier)
    }

    /// Cosine-weighted diffuse reflection rays.
    #[allow(clippy::too_many_arguments)]
    fn diffuse_reflection(
        &self,
        hit: &HitResult<'_>,
        wo: Vector,
        material: &dyn Material,
        context: &ShadingContext<'_>,
        next: PathState,
        scratch: &mut TaskScratch<'_>,
        occlusion: Occlusion,
    ) -> Colour {
        let count = self.settings.diffuse_reflection_samples;
        let normal = hit.facing_shading_normal();

        let mut sum = Colour::ZERO;
        for _ in 0..count {
            let (u, v) = (gen_f32(&mut scratch.rng), gen_f32(&mut scratch.rng));
            let wi = Vector::from(cosine_sample_hemisphere_n(u, v, normal));
            if normal.dot(wi) <= 0.0 {
                continue;
            }
            let f = material.evaluate(hit, wo, wi);
            if f == Colour::ZERO {
                continue;
            }

            let ray = Self::spawn_ray(hit, wi, RayType::DIFFUSE, context.raytracer());
            let (incoming, _) = self.process_ray_recurse(&ray, context, next, scratch, occlusion);
            // pdf is cos / PI, so f * cos / pdf = f * PI
            sum += f * PI * incoming;
        }
        sum / count as f32
    }
}

fn pick_uniform(count: usize, rng: &mut dyn RngCore) -> usize {
    ((gen_f32(rng) * count as f32) as usize).min(count - 1)
}

impl<A: Accumulator> Integrator for DirectIllumination<'_, A> {
    fn initialise(&mut self) -> RenderResult<()> {
        self.settings.validate()?;
        if self.camera.image_width != self.settings.width || self.camera.image_height != self.settings.height {
            return Err(RenderError::InvalidSetting(format!(
                "camera resolution {}x{} does not match image size {}x{}",
                self.camera.image_width, self.camera.image_height, self.settings.width, self.settings.height
            )));
        }

        self.samples_per_axis = self.settings.antialiasing_samples;
        self.total_samples = self.samples_per_axis * self.samples_per_axis;
        self.sample_increment = 1.0 / self.samples_per_axis as f32;

        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        self.camera_samples.clear();
        stratified_samples(self.samples_per_axis, &mut rng, &mut self.camera_samples);

        self.light_table = self.build_light_table();
        self.light_cdf = build_cdf(self.scene.lights().iter().map(|light| light.intensity()));

        if self.uses_occlusion() {
            self.primary_occlusion
                .set_sample_count(self.settings.ambient_occlusion_samples)?;
            self.secondary_occlusion
                .set_sample_count(self.settings.ambient_occlusion_samples)?;
        }
        self.primary_occlusion
            .set_distance(self.settings.ambient_occlusion_distance);
        self.secondary_occlusion
            .set_distance(self.settings.ambient_occlusion_distance);

        self.tiles = generate_tiles(self.settings.width, self.settings.height, self.settings.tile_size);
        self.passes = self.plan_passes();
        self.total_tasks = self.tiles.len() * self.passes.len();
        self.tasks_done.store(0, Ordering::Relaxed);
        self.initialised = true;

        log::info!(
            "Direct illumination: {}x{} px, {} tiles x {} passes, {} AA samples, {} lights ({:?})",
            self.settings.width,
            self.settings.height,
            self.tiles.len(),
            self.passes.len(),
            self.total_samples,
            self.light_table.len(),
            self.settings.light_sampling
        );
        Ok(())
    }

    fn tiles(&self) -> &[TileInfo] {
        &self.tiles
    }

    fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    fn total_tasks(&self) -> usize {
        self.total_tasks
    }

    fn process_task(&self, task: &RenderTask, thread_id: usize) -> TileResult {
        if !self.initialised {
            log::warn!("Task for tile {} submitted before initialise()", task.tile.index);
            return TileResult::empty(task);
        }

        let context = ShadingContext::new(self.raytracer, self.scene, &self.settings, thread_id);
        let result = match task.state {
            TileState::Initial | TileState::Draft => self.do_progressive_task(task, &context),
            TileState::AA | TileState::AAAO => self.do_full_task(task, &context),
            TileState::Blank | TileState::Done => TileResult::empty(task),
        };

        self.tasks_done.fetch_add(1, Ordering::Relaxed);
        result
    }

    fn merge_tile(&self, image: &mut OutputImage, result: &TileResult) {
        image.merge_tile(result, &self.accumulator);
    }

    fn calculate_progress(&self) -> f32 {
        if self.total_tasks == 0 {
            return 0.0;
        }
        let done = self.tasks_done.load(Ordering::Relaxed).min(self.total_tasks);
        done as f32 / self.total_tasks as f32
    }

    fn reset_progress(&self) {
        self.tasks_done.store(0, Ordering::Relaxed);
    }
}
