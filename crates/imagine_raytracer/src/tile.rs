//! Tiles and render tasks.
//!
//! The image is divided into tiles that are rendered independently and in
//! parallel. Each tile goes through a sequence of successively higher
//! quality passes, tracked by its `TileState`.

use crate::accumulator::PixelSample;

/// A rectangular region of the image to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileInfo {
    /// X coordinate of tile's top-left corner
    pub x: u32,
    /// Y coordinate of tile's top-left corner
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Index of this tile in the render order
    pub index: usize,
}

impl TileInfo {
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            index,
        }
    }

    /// Get the total number of pixels in this tile.
    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }
}

/// Generate tiles for an image, sorted in spiral order from center.
///
/// Tiles closer to the center are rendered first, so the most important
/// part of the image appears early.
pub fn generate_tiles(width: u32, height: u32, tile_size: u32) -> Vec<TileInfo> {
    let mut tiles = Vec::new();
    if tile_size == 0 {
        return tiles;
    }

    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let tw = tile_size.min(width - x);
            let th = tile_size.min(height - y);
            tiles.push(TileInfo::new(x, y, tw, th, tiles.len()));
            x += tile_size;
        }
        y += tile_size;
    }

    sort_spiral(&mut tiles, width, height);

    // Update indices after sorting
    for (i, tile) in tiles.iter_mut().enumerate() {
        tile.index = i;
    }

    tiles
}

/// Sort tiles by distance from image center.
fn sort_spiral(tiles: &mut [TileInfo], width: u32, height: u32) {
    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;

    let distance = |t: &TileInfo| {
        let tx = t.x as f32 + t.width as f32 / 2.0;
        let ty = t.y as f32 + t.height as f32 / 2.0;
        (tx - center_x).powi(2) + (ty - center_y).powi(2)
    };

    tiles.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
}

/// Quality level of a tile pass.
///
/// Tiles advance `Blank -> Initial -> Draft -> AA -> AAAO -> Done`; a
/// render may skip states it does not need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TileState {
    /// Nothing rendered yet
    #[default]
    Blank,
    /// One sample per 4x4 pixel block
    Initial,
    /// One sample per pixel
    Draft,
    /// Full antialiasing, no ambient occlusion
    AA,
    /// Full antialiasing with ambient occlusion
    AAAO,
    Done,
}

impl TileState {
    pub fn next(self) -> TileState {
        match self {
            TileState::Blank => TileState::Initial,
            TileState::Initial => TileState::Draft,
            TileState::Draft => TileState::AA,
            TileState::AA => TileState::AAAO,
            TileState::AAAO | TileState::Done => TileState::Done,
        }
    }

    /// Cheap preview passes
    pub fn is_progressive(self) -> bool {
        matches!(self, TileState::Initial | TileState::Draft)
    }

    /// Full sample budget passes
    pub fn is_full(self) -> bool {
        matches!(self, TileState::AA | TileState::AAAO)
    }
}

/// One pass of the render: which quality to render at, and how many
/// times that quality has already been rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPass {
    pub state: TileState,
    pub iteration: u32,
}

impl RenderPass {
    pub fn new(state: TileState, iteration: u32) -> Self {
        Self { state, iteration }
    }
}

/// A tile together with the pass it is to be rendered at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTask {
    pub tile: TileInfo,
    pub state: TileState,
    pub iteration: u32,
}

impl RenderTask {
    pub fn new(tile: TileInfo) -> Self {
        Self {
            tile,
            state: TileState::Blank,
            iteration: 0,
        }
    }

    /// Set up the task for the given pass.
    pub fn begin_pass(&mut self, pass: RenderPass) {
        self.state = pass.state;
        self.iteration = pass.iteration;
    }

    /// Back to `Blank`, so the tile renders from scratch when resubmitted.
    pub fn reset(&mut self) {
        self.state = TileState::Blank;
        self.iteration = 0;
    }

    /// Seed for this task's random number generator.
    ///
    /// Distinct per tile and pass, so repeated passes draw new samples and
    /// results do not depend on which thread ran the task.
    pub fn seed(&self, base: u64) -> u64 {
        let mut h = base ^ 0x9E37_79B9_7F4A_7C15;
        for v in [self.tile.index as u64, self.state as u64, self.iteration as u64] {
            h = (h ^ v).wrapping_mul(0x0100_0000_01B3);
            h ^= h >> 29;
        }
        h
    }
}

/// Samples produced by one task, in row-major order within the tile.
#[derive(Debug, Clone)]
pub struct TileResult {
    pub tile: TileInfo,
    pub state: TileState,
    pub iteration: u32,
    pub samples: Vec<PixelSample>,
}

impl TileResult {
    pub fn new(task: &RenderTask) -> Self {
        Self {
            tile: task.tile,
            state: task.state,
            iteration: task.iteration,
            samples: vec![PixelSample::default(); task.tile.pixel_count() as usize],
        }
    }

    /// A result carrying no samples, for tasks with nothing to render.
    pub fn empty(task: &RenderTask) -> Self {
        Self {
            tile: task.tile,
            state: task.state,
            iteration: task.iteration,
            samples: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample at tile-local coordinates.
    #[inline]
    pub fn pixel_mut(&mut self, local_x: u32, local_y: u32) -> &mut PixelSample {
        &mut self.samples[(local_y * self.tile.width + local_x) as usize]
    }

    #[inline]
    pub fn pixel(&self, local_x: u32, local_y: u32) -> &PixelSample {
        &self.samples[(local_y * self.tile.width + local_x) as usize]
    }
}
