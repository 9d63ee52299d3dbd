//! Interfaces at the boundary of the raytracing core.
//!
//! `Raytracer` and `SceneInterface` are consumed: the acceleration
//! structure and the scene database live elsewhere (`TriangleScene` is the
//! in-crate reference implementation). `RaytracerHost` is exposed: the
//! scheduler calls it as tiles complete.

use crate::{Colour, HitResult, Light, Material, Ray, TileInfo};

/// Traversal queries against the scene's acceleration structure.
///
/// Implementations are read-only during rendering and are queried from
/// every worker thread at once.
pub trait Raytracer: Send + Sync {
    /// True if anything blocks the ray within `[t_min, t_max]`.
    ///
    /// The ray's inverse direction must already be calculated.
    fn does_occlude(&self, ray: &Ray) -> bool;

    /// Find the nearest hit within `[t_min, t_max]` and fill in `hit`.
    ///
    /// The ray's inverse direction must already be calculated.
    fn intersect(&self, ray: &Ray, hit: &mut HitResult<'_>) -> bool;

    /// Base epsilon for secondary rays, scaled per hit by its intersection error.
    fn ray_epsilon(&self) -> f32;
}

/// Scene data the integrator reads while shading.
pub trait SceneInterface: Send + Sync {
    fn lights(&self) -> &[Box<dyn Light>];

    fn material(&self, material_id: u32) -> Option<&dyn Material>;

    /// Colour returned by rays that escape the scene.
    fn background_colour(&self) -> Colour {
        Colour::ZERO
    }
}

/// Callbacks from the render scheduler to whatever is hosting the render
/// (a GUI, a batch job).
pub trait RaytracerHost: Sync {
    /// Overall progress in `[0, 1]`.
    fn progress_changed(&self, progress: f32);

    /// The render ran to completion.
    fn finished(&self);

    /// A tile finished one pass on the given worker thread.
    fn tile_done(&self, tile: &TileInfo, thread_id: usize);
}

/// Host that forwards events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHost;

impl RaytracerHost for LogHost {
    fn progress_changed(&self, progress: f32) {
        log::debug!("Render progress: {:.1}%", progress * 100.0);
    }

    fn finished(&self) {
        log::info!("Render finished");
    }

    fn tile_done(&self, tile: &TileInfo, thread_id: usize) {
        log::trace!(
            "Tile {} ({}, {}) done on thread {}",
            tile.index,
            tile.x,
            tile.y,
            thread_id
        );
    }
}
