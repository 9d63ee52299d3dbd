//! Sample generation and warping.
//!
//! Stratified 2D samples in `[0, 1)²` and the mappings from the unit square
//! onto hemispheres and disks.

use std::f32::consts::PI;

use imagine_math::{coordinate_system, Normal, Vec2};
use rand::{Rng, RngCore};

/// Largest f32 below one.
pub const ONE_MINUS_EPSILON: f32 = 1.0 - f32::EPSILON / 2.0;

/// Uniform float in `[0, 1)`.
#[inline]
pub fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    rng.gen::<f32>()
}

/// Append an `n x n` jittered grid to `out`.
pub fn stratified_samples(samples_per_axis: u32, rng: &mut dyn RngCore, out: &mut Vec<Vec2>) {
    let delta = 1.0 / samples_per_axis as f32;
    for y in 0..samples_per_axis {
        for x in 0..samples_per_axis {
            let sx = (x as f32 + gen_f32(rng)) * delta;
            let sy = (y as f32 + gen_f32(rng)) * delta;
            out.push(Vec2::new(sx.min(ONE_MINUS_EPSILON), sy.min(ONE_MINUS_EPSILON)));
        }
    }
}

/// Stratified sample generator with a reusable buffer.
#[derive(Debug, Clone, Default)]
pub struct SampleGenerator2D {
    samples_per_axis: u32,
    samples: Vec<Vec2>,
}

impl SampleGenerator2D {
    pub fn new(samples_per_axis: u32) -> Self {
        let count = (samples_per_axis as usize).pow(2);
        Self {
            samples_per_axis,
            samples: Vec::with_capacity(count),
        }
    }

    /// Change the grid size, reallocating the cache if needed.
    pub fn set_samples_per_axis(&mut self, samples_per_axis: u32) {
        self.samples_per_axis = samples_per_axis;
        let count = (samples_per_axis as usize).pow(2);
        self.samples.clear();
        self.samples.reserve(count);
    }

    pub fn samples_per_axis(&self) -> u32 {
        self.samples_per_axis
    }

    /// Regenerate the cached samples and return them.
    pub fn generate(&mut self, rng: &mut dyn RngCore) -> &[Vec2] {
        self.samples.clear();
        stratified_samples(self.samples_per_axis, rng, &mut self.samples);
        &self.samples
    }

    /// The samples from the last `generate` call.
    pub fn samples(&self) -> &[Vec2] {
        &self.samples
    }
}

/// Pre-generated samples for one pixel, shared between estimators.
///
/// Holds `groups` independent stratified sets of `samples_per_axis²`
/// samples back to back; a consumer reads set `i` at offset
/// `i * samples_per_axis²`.
#[derive(Debug, Clone, Default)]
pub struct SampleBundle {
    samples: Vec<Vec2>,
}

impl SampleBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&mut self, samples_per_axis: u32, groups: u32, rng: &mut dyn RngCore) {
        self.samples.clear();
        for _ in 0..groups {
            stratified_samples(samples_per_axis, rng, &mut self.samples);
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Vec2 {
        self.samples[index]
    }

    /// `count` samples starting at `offset`.
    #[inline]
    pub fn slice(&self, offset: usize, count: usize) -> &[Vec2] {
        &self.samples[offset..offset + count]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Map `(u, v)` to a uniformly distributed direction on the hemisphere
/// around `normal`.
///
/// `normal` must be non-zero; no validation happens here.
#[inline]
pub fn uniform_sample_hemisphere_n(u: f32, v: f32, normal: Normal) -> Normal {
    let z = u;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * v;
    local_to_world(r * phi.cos(), r * phi.sin(), z, normal)
}

/// Map `(u, v)` to a cosine-weighted direction on the hemisphere around
/// `normal`. The pdf is `cos(theta) / PI`.
#[inline]
pub fn cosine_sample_hemisphere_n(u: f32, v: f32, normal: Normal) -> Normal {
    let disk = uniform_sample_disk(u, v);
    let z = (1.0 - disk.length_squared()).max(0.0).sqrt();
    local_to_world(disk.x, disk.y, z, normal)
}

/// Map `(u, v)` onto the unit disk (concentric mapping).
#[inline]
pub fn uniform_sample_disk(u: f32, v: f32) -> Vec2 {
    let offset = Vec2::new(2.0 * u - 1.0, 2.0 * v - 1.0);
    if offset.x == 0.0 && offset.y == 0.0 {
        return Vec2::ZERO;
    }

    let (r, theta) = if offset.x.abs() > offset.y.abs() {
        (offset.x, (PI / 4.0) * (offset.y / offset.x))
    } else {
        (offset.y, (PI / 2.0) - (PI / 4.0) * (offset.x / offset.y))
    };
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Normalised cumulative distribution over non-negative weights.
///
/// `None` when the weights sum to zero (or are not finite).
pub fn build_cdf(weights: impl IntoIterator<Item = f32>) -> Option<Vec<f32>> {
    let mut cdf = Vec::new();
    let mut total = 0.0;
    for weight in weights {
        total += weight.max(0.0);
        cdf.push(total);
    }
    if !(total > 0.0) || !total.is_finite() {
        return None;
    }
    for value in &mut cdf {
        *value /= total;
    }
    Some(cdf)
}

/// Pick an index from a normalised CDF with `u` in `[0, 1)`.
///
/// Returns the index and its probability.
pub fn sample_cdf(cdf: &[f32], u: f32) -> (usize, f32) {
    let last = cdf.len().saturating_sub(1);
    let index = cdf.partition_point(|&c| c <= u).min(last);
    let below = if index == 0 { 0.0 } else { cdf[index - 1] };
    (index, cdf[index] - below)
}

#[inline]
fn local_to_world(x: f32, y: f32, z: f32, normal: Normal) -> Normal {
    let (tangent, bitangent) = coordinate_system(normal);
    let n = normal.0.normalize();
    Normal(tangent.0 * x + bitangent.0 * y + n * z)
}
