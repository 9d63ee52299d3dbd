//! Tile scheduler and output image.
//!
//! Every pass of a render is a batch of one task per tile. A batch runs on
//! a fixed-size rayon pool, each task on exactly one worker. Finished tiles
//! are merged into the shared [`OutputImage`] under a lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::{
    Accumulator, Colour, Integrator, PixelSample, RaytracerHost, RenderResult, RenderSettings,
    RenderTask, TileResult,
};

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

#[inline]
fn clamp_01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

/// Convert a linear colour and alpha to 8-bit gamma-corrected RGBA.
pub fn colour_to_rgba(colour: Colour, alpha: f32) -> [u8; 4] {
    let r = (255.0 * clamp_01(linear_to_gamma(colour.x))) as u8;
    let g = (255.0 * clamp_01(linear_to_gamma(colour.y))) as u8;
    let b = (255.0 * clamp_01(linear_to_gamma(colour.z))) as u8;
    let a = (255.0 * clamp_01(alpha)) as u8;
    [r, g, b, a]
}

/// Accumulated samples for the whole image.
#[derive(Debug, Clone)]
pub struct OutputImage {
    width: u32,
    height: u32,
    pixels: Vec<PixelSample>,
}

impl OutputImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![PixelSample::default(); (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> &PixelSample {
        &self.pixels[(y * self.width + x) as usize]
    }

    /// Drop everything accumulated so far.
    pub fn clear(&mut self) {
        self.pixels.fill(PixelSample::default());
    }

    /// Merge a tile's samples with the accumulator's policy. Pixels outside
    /// the image are ignored.
    pub fn merge_tile<A: Accumulator + ?Sized>(&mut self, result: &TileResult, accumulator: &A) {
        if result.is_empty() {
            return;
        }
        let tile = result.tile;

        for ly in 0..tile.height {
            let y = tile.y + ly;
            if y >= self.height {
                break;
            }
            for lx in 0..tile.width {
                let x = tile.x + lx;
                if x >= self.width {
                    break;
                }
                let target = &mut self.pixels[(y * self.width + x) as usize];
                accumulator.merge(target, result.pixel(lx, ly), result.state, result.iteration);
            }
        }
    }

    /// Final colour and alpha of a pixel.
    pub fn resolve(&self, x: u32, y: u32) -> (Colour, f32) {
        self.pixel(x, y).resolve()
    }

    pub fn to_rgba8(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let (colour, alpha) = self.resolve(x, y);
            Rgba(colour_to_rgba(colour, alpha))
        })
    }
}

/// How a call to [`RenderScheduler::render`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Completed,
    /// Stopped between tasks. Tiles already merged stay in the image;
    /// render again from scratch to finish.
    Cancelled,
}

/// Runs an integrator's passes over a thread pool.
pub struct RenderScheduler {
    pool: rayon::ThreadPool,
    cancelled: Arc<AtomicBool>,
}

impl RenderScheduler {
    /// Pool with `threads` workers, or one per core when `threads` is 0.
    pub fn new(threads: usize) -> RenderResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("imagine-render-{i}"))
            .build()?;

        log::debug!("Render pool started with {} threads", pool.current_num_threads());
        Ok(Self {
            pool,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn from_settings(settings: &RenderSettings) -> RenderResult<Self> {
        Self::new(settings.threads)
    }

    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Flag shared with whoever needs to stop the render from another
    /// thread. Setting it to `true` cancels.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Initialise the integrator and run all of its passes into `image`.
    ///
    /// Clears any earlier cancellation first. A cancellation raised while
    /// rendering is seen before the next task starts; tasks already running
    /// finish and are merged.
    ///
    /// Host callbacks for a tile run while its samples are merged, one tile
    /// at a time, so `progress_changed` never reports a smaller value than
    /// the call before it.
    pub fn render<I: Integrator + ?Sized>(
        &self,
        integrator: &mut I,
        image: &mut OutputImage,
        host: &dyn RaytracerHost,
    ) -> RenderResult<RenderOutcome> {
        self.cancelled.store(false, Ordering::Relaxed);
        integrator.initialise()?;
        integrator.reset_progress();

        let integrator: &I = integrator;
        let passes = integrator.passes().to_vec();
        let image = Mutex::new(image);

        for pass in passes {
            log::info!("Pass {:?} #{} started", pass.state, pass.iteration);

            let tasks: Vec<RenderTask> = integrator
                .tiles()
                .iter()
                .map(|tile| {
                    let mut task = RenderTask::new(*tile);
                    task.begin_pass(pass);
                    task
                })
                .collect();

            self.pool.install(|| {
                tasks.par_iter().for_each(|task| {
                    if self.is_cancelled() {
                        return;
                    }
                    let thread_id = rayon::current_thread_index().unwrap_or(0);
                    let result = integrator.process_task(task, thread_id);

                    // Report under the image lock so progress arrives in order
                    let mut image = image.lock();
                    integrator.merge_tile(&mut image, &result);
                    host.tile_done(&task.tile, thread_id);
                    host.progress_changed(integrator.calculate_progress());
                });
            });

            if self.is_cancelled() {
                log::warn!(
                    "Render cancelled during pass {:?} at {:.1}%",
                    pass.state,
                    integrator.calculate_progress() * 100.0
                );
                return Ok(RenderOutcome::Cancelled);
            }
            log::info!("Pass {:?} #{} finished", pass.state, pass.iteration);
        }

        host.finished();
        Ok(RenderOutcome::Completed)
    }
}
