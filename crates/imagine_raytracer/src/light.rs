//! Lights and light sample bookkeeping.

use imagine_math::{Normal, Point, Vec2, Vector};

use crate::material::luminance;
use crate::Colour;

/// One sample on a light as seen from a shading point.
#[derive(Debug, Clone, Copy)]
pub struct LightSample {
    /// Unit direction from the shading point towards the light
    pub direction: Vector,
    /// Distance to the sampled point on the light
    pub distance: f32,
    /// Incident radiance along `direction`, before shadowing
    pub radiance: Colour,
    /// Solid angle pdf of the sample, 1 for delta lights
    pub pdf: f32,
}

pub trait Light: Send + Sync {
    /// Sample the light from `point`. `None` if the light cannot
    /// illuminate the point.
    fn sample(&self, point: Point, sample: Vec2) -> Option<LightSample>;

    /// Samples this light asks for per shading point.
    fn sample_count(&self) -> u32 {
        1
    }

    /// Scalar power used to choose between lights.
    fn intensity(&self) -> f32;

    /// Point-like lights need only one sample.
    fn is_delta(&self) -> bool {
        false
    }

    /// Scene object that represents the emitter, if any.
    fn object_id(&self) -> Option<u32> {
        None
    }

    /// Cheap unshadowed estimate of this light's contribution at a point.
    fn estimate_contribution(&self, point: Point, normal: Normal) -> f32 {
        match self.sample(point, Vec2::splat(0.5)) {
            Some(s) if s.pdf > 0.0 => {
                let cos = normal.dot(s.direction).max(0.0);
                luminance(s.radiance) * cos / s.pdf
            }
            _ => 0.0,
        }
    }
}

/// Omnidirectional point light with inverse-square falloff.
#[derive(Debug, Clone)]
pub struct PointLight {
    position: Point,
    colour: Colour,
    intensity: f32,
}

impl PointLight {
    pub fn new(position: Point, colour: Colour, intensity: f32) -> Self {
        Self {
            position,
            colour,
            intensity,
        }
    }
}

impl Light for PointLight {
    fn sample(&self, point: Point, _sample: Vec2) -> Option<LightSample> {
        let to_light = self.position - point;
        let distance_squared = to_light.length_squared();
        if distance_squared == 0.0 {
            return None;
        }
        let distance = distance_squared.sqrt();

        Some(LightSample {
            direction: to_light / distance,
            distance,
            radiance: self.colour * (self.intensity / distance_squared),
            pdf: 1.0,
        })
    }

    fn intensity(&self) -> f32 {
        self.intensity * luminance(self.colour)
    }

    fn is_delta(&self) -> bool {
        true
    }
}

/// One-sided rectangular area light spanned by two edges from a corner.
///
/// Emits on the side of `edge_u x edge_v`.
#[derive(Debug, Clone)]
pub struct AreaLight {
    corner: Point,
    edge_u: Vector,
    edge_v: Vector,
    normal: Normal,
    area: f32,
    colour: Colour,
    intensity: f32,
    samples: u32,
    object_id: Option<u32>,
}

impl AreaLight {
    pub fn new(corner: Point, edge_u: Vector, edge_v: Vector, colour: Colour, intensity: f32) -> Self {
        let cross = edge_u.cross(edge_v);
        Self {
            corner,
            edge_u,
            edge_v,
            normal: Normal::from(cross.normalised()),
            area: cross.length(),
            colour,
            intensity,
            samples: 1,
            object_id: None,
        }
    }

    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples.max(1);
        self
    }

    /// Tie the light to the scene geometry that represents it, so its
    /// shadow rays ignore that geometry.
    pub fn with_object_id(mut self, object_id: u32) -> Self {
        self.object_id = Some(object_id);
        self
    }
}

impl Light for AreaLight {
    fn sample(&self, point: Point, sample: Vec2) -> Option<LightSample> {
        let on_light = self.corner + self.edge_u * sample.x + self.edge_v * sample.y;
        let to_light = on_light - point;
        let distance_squared = to_light.length_squared();
        if distance_squared == 0.0 {
            return None;
        }
        let distance = distance_squared.sqrt();
        let direction = to_light / distance;

        let cos_light = -self.normal.dot(direction);
        if cos_light <= 0.0 {
            return None;
        }

        Some(LightSample {
            direction,
            distance,
            radiance: self.colour * self.intensity,
            pdf: distance_squared / (cos_light * self.area),
        })
    }

    fn sample_count(&self) -> u32 {
        self.samples
    }

    fn intensity(&self) -> f32 {
        self.intensity * self.area * luminance(self.colour)
    }

    fn object_id(&self) -> Option<u32> {
        self.object_id
    }
}

/// A light paired with how many samples it gets and how its contribution
/// is weighted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightsAndSamples {
    pub light_index: usize,
    pub sample_count: u32,
    /// Scale applied to the light's averaged contribution
    pub sample_multiplier: f32,
    inv_sample_count: f32,
}

impl LightsAndSamples {
    pub fn new(light_index: usize, sample_count: u32, sample_multiplier: f32) -> Self {
        let sample_count = sample_count.max(1);
        Self {
            light_index,
            sample_count,
            sample_multiplier,
            inv_sample_count: 1.0 / sample_count as f32,
        }
    }

    #[inline]
    pub fn inv_sample_count(&self) -> f32 {
        self.inv_sample_count
    }
}
