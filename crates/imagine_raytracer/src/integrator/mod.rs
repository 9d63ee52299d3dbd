//! Render strategies driven by the scheduler.

mod direct_illumination;

pub use direct_illumination::DirectIllumination;

use crate::{OutputImage, RenderPass, RenderResult, RenderTask, TileInfo, TileResult};

/// A render strategy: turns render tasks into tile samples.
///
/// The scheduler calls `initialise` once, then `process_task` for every
/// tile of every pass from many threads at once.
pub trait Integrator: Sync {
    /// Derive everything that does not change per pixel. Configuration
    /// errors surface here, before any task runs.
    fn initialise(&mut self) -> RenderResult<()>;

    fn tiles(&self) -> &[TileInfo];

    /// The sequence of passes every tile goes through.
    fn passes(&self) -> &[RenderPass];

    fn total_tasks(&self) -> usize;

    fn process_task(&self, task: &RenderTask, thread_id: usize) -> TileResult;

    /// Merge a finished task into the image with this integrator's
    /// accumulation policy.
    fn merge_tile(&self, image: &mut OutputImage, result: &TileResult);

    /// Fraction of tasks done, in `[0, 1]`.
    fn calculate_progress(&self) -> f32;

    /// Start counting tasks from zero again.
    fn reset_progress(&self);
}
