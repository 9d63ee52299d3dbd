//! Sample accumulation policies.
//!
//! An accumulator decides how each camera sample is weighted into its pixel
//! and how a finished pass is merged into the output image. The integrator
//! is generic over it, so the policy costs no dynamic dispatch per sample.

use imagine_math::Vec2;

use crate::{Colour, TileState};

/// Weighted sums for one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelSample {
    pub colour: Colour,
    pub alpha: f32,
    pub weight: f32,
}

impl PixelSample {
    /// Normalised colour and alpha. Pixels with no weight resolve to
    /// transparent black.
    pub fn resolve(&self) -> (Colour, f32) {
        if self.weight > 0.0 {
            let inv_weight = 1.0 / self.weight;
            (self.colour * inv_weight, self.alpha * inv_weight)
        } else {
            (Colour::ZERO, 0.0)
        }
    }

    #[inline]
    pub fn add(&mut self, other: &PixelSample) {
        self.colour += other.colour;
        self.alpha += other.alpha;
        self.weight += other.weight;
    }
}

pub trait Accumulator: Send + Sync {
    /// Add one sample to a pixel. `offset` is the sample position relative
    /// to the pixel centre, in `[-0.5, 0.5]²`.
    fn accumulate(&self, pixel: &mut PixelSample, colour: Colour, alpha: f32, offset: Vec2);

    /// Merge a pixel from a finished pass into the image. `iteration`
    /// counts earlier passes at the same state.
    fn merge(&self, target: &mut PixelSample, pass: &PixelSample, state: TileState, iteration: u32);
}

/// Final quality accumulation: Gaussian filtered samples, and every pass
/// replaces what the image held before.
#[derive(Debug, Clone, Copy)]
pub struct FinalAccumulator {
    alpha: f32,
    /// Filter value at the radius, subtracted so the weight reaches zero there
    exp_radius: f32,
}

impl FinalAccumulator {
    pub const DEFAULT_RADIUS: f32 = 1.0;
    pub const DEFAULT_FALLOFF: f32 = 2.0;

    pub fn new(radius: f32, falloff: f32) -> Self {
        Self {
            alpha: falloff,
            exp_radius: (-falloff * radius * radius).exp(),
        }
    }

    #[inline]
    fn gaussian(&self, offset: Vec2) -> f32 {
        ((-self.alpha * offset.length_squared()).exp() - self.exp_radius).max(0.0)
    }
}

impl Default for FinalAccumulator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RADIUS, Self::DEFAULT_FALLOFF)
    }
}

impl Accumulator for FinalAccumulator {
    fn accumulate(&self, pixel: &mut PixelSample, colour: Colour, alpha: f32, offset: Vec2) {
        let weight = self.gaussian(offset);
        pixel.colour += colour * weight;
        pixel.alpha += alpha * weight;
        pixel.weight += weight;
    }

    fn merge(&self, target: &mut PixelSample, pass: &PixelSample, _state: TileState, _iteration: u32) {
        *target = *pass;
    }
}

/// Progressive accumulation: box filtered samples. Preview passes and the
/// first pass at each quality replace the image; repeats of a quality pass
/// add to the running sums.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressiveAccumulator;

impl Accumulator for ProgressiveAccumulator {
    fn accumulate(&self, pixel: &mut PixelSample, colour: Colour, alpha: f32, _offset: Vec2) {
        pixel.colour += colour;
        pixel.alpha += alpha;
        pixel.weight += 1.0;
    }

    fn merge(&self, target: &mut PixelSample, pass: &PixelSample, state: TileState, iteration: u32) {
        if state.is_full() && iteration > 0 {
            target.add(pass);
        } else {
            *target = *pass;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_normalises() {
        let sample = PixelSample {
            colour: Colour::new(2.0, 4.0, 6.0),
            alpha: 2.0,
            weight: 2.0,
        };
        assert_eq!(sample.resolve(), (Colour::new(1.0, 2.0, 3.0), 1.0));
        assert_eq!(PixelSample::default().resolve(), (Colour::ZERO, 0.0));
    }

    #[test]
    fn test_gaussian_weights_centre_most() {
        let accumulator = FinalAccumulator::default();
        let centre = accumulator.gaussian(Vec2::ZERO);
        let corner = accumulator.gaussian(Vec2::splat(0.5));

        assert!(centre > corner);
        assert!(corner > 0.0);
        assert_eq!(accumulator.gaussian(Vec2::new(1.0, 0.0)), 0.0);
    }

    #[test]
    fn test_constant_colour_resolves_exactly() {
        let accumulator = FinalAccumulator::default();
        let mut pixel = PixelSample::default();
        let colour = Colour::new(0.25, 0.5, 0.75);
        for offset in [Vec2::ZERO, Vec2::new(0.4, -0.1), Vec2::new(-0.3, 0.45)] {
            accumulator.accumulate(&mut pixel, colour, 1.0, offset);
        }

        let (resolved, alpha) = pixel.resolve();
        assert!((resolved - colour).length() < 1e-6);
        assert!((alpha - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_final_merge_replaces() {
        let accumulator = FinalAccumulator::default();
        let mut target = PixelSample {
            colour: Colour::ONE,
            alpha: 1.0,
            weight: 1.0,
        };
        let pass = PixelSample {
            colour: Colour::splat(3.0),
            alpha: 3.0,
            weight: 3.0,
        };
        accumulator.merge(&mut target, &pass, TileState::AA, 1);
        assert_eq!(target, pass);
    }

    #[test]
    fn test_progressive_merge() {
        let accumulator = ProgressiveAccumulator;
        let mut target = PixelSample::default();
        let mut pass = PixelSample::default();
        accumulator.accumulate(&mut pass, Colour::ONE, 1.0, Vec2::ZERO);

        // Draft replaces, then the first quality pass replaces the draft
        accumulator.merge(&mut target, &pass, TileState::Draft, 0);
        accumulator.merge(&mut target, &pass, TileState::AA, 0);
        assert_eq!(target.weight, 1.0);

        // Repeats add
        accumulator.merge(&mut target, &pass, TileState::AA, 1);
        accumulator.merge(&mut target, &pass, TileState::AA, 2);
        assert_eq!(target.weight, 3.0);
        assert_eq!(target.resolve().0, Colour::ONE);

        // A new quality level starts over
        accumulator.merge(&mut target, &pass, TileState::AAAO, 0);
        assert_eq!(target.weight, 1.0);
    }
}
