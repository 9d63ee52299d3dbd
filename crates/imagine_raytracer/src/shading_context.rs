//! Thread-local shading state.
//!
//! Each worker builds one `ShadingContext` per task. Hit results borrow it
//! for their whole lifetime, so anything reached through a hit (the
//! raytracer, the scene, the settings) is resolved without global state.

use std::fmt;

use crate::{HitResult, Raytracer, RayType, RenderSettings, SceneInterface};

/// Handles to the render's shared, read-only collaborators plus the
/// identity of the owning thread.
#[derive(Clone, Copy)]
pub struct ShadingContext<'a> {
    raytracer: &'a dyn Raytracer,
    scene: &'a dyn SceneInterface,
    settings: &'a RenderSettings,
    thread_id: usize,
}

impl<'a> ShadingContext<'a> {
    pub fn new(
        raytracer: &'a dyn Raytracer,
        scene: &'a dyn SceneInterface,
        settings: &'a RenderSettings,
        thread_id: usize,
    ) -> Self {
        Self {
            raytracer,
            scene,
            settings,
            thread_id,
        }
    }

    pub fn raytracer(&self) -> &'a dyn Raytracer {
        self.raytracer
    }

    pub fn scene(&self) -> &'a dyn SceneInterface {
        self.scene
    }

    pub fn settings(&self) -> &'a RenderSettings {
        self.settings
    }

    pub fn thread_id(&self) -> usize {
        self.thread_id
    }

    /// A blank hit result bound to this context.
    pub fn new_hit_result(&self) -> HitResult<'_> {
        HitResult::new(self)
    }
}

impl fmt::Debug for ShadingContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadingContext")
            .field("thread_id", &self.thread_id)
            .field("ray_epsilon", &self.raytracer.ray_epsilon())
            .finish_non_exhaustive()
    }
}

/// Bounce bookkeeping for one path through the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathState {
    pub depth: u32,
    pub diffuse_depth: u32,
    pub reflection_depth: u32,
    pub refraction_depth: u32,
    /// Product of the throughput scales along the path so far
    pub importance: f32,
}

impl Default for PathState {
    fn default() -> Self {
        Self {
            depth: 0,
            diffuse_depth: 0,
            reflection_depth: 0,
            refraction_depth: 0,
            importance: 1.0,
        }
    }
}

impl PathState {
    /// Whether another bounce of the given type is allowed.
    pub fn can_bounce(&self, ray_type: RayType, settings: &RenderSettings) -> bool {
        if self.depth >= settings.max_depth_overall || self.importance < settings.min_importance {
            return false;
        }

        if ray_type.contains(RayType::DIFFUSE) {
            self.diffuse_depth < settings.max_depth_diffuse
        } else if ray_type.contains(RayType::REFRACTION) {
            self.refraction_depth < settings.max_depth_refraction
        } else if ray_type.contains(RayType::REFLECTION) || ray_type.contains(RayType::GLOSSY) {
            self.reflection_depth < settings.max_depth_reflection
        } else {
            true
        }
    }

    /// State after bouncing with the given ray type and throughput scale.
    pub fn bounced(&self, ray_type: RayType, importance_scale: f32) -> PathState {
        let mut next = PathState {
            depth: self.depth + 1,
            importance: self.importance * importance_scale,
            ..*self
        };

        if ray_type.contains(RayType::DIFFUSE) {
            next.diffuse_depth += 1;
        } else if ray_type.contains(RayType::REFRACTION) {
            next.refraction_depth += 1;
        } else if ray_type.contains(RayType::REFLECTION) || ray_type.contains(RayType::GLOSSY) {
            next.reflection_depth += 1;
        }
        next
    }
}
