//! Material contract and reference materials.
//!
//! The material system proper lives outside the raytracing core; the core
//! only needs the `Material` trait. `Lambertian`, `Metal` and `Dielectric`
//! are small reference implementations used by the example scene and tests.

use bitflags::bitflags;
use imagine_math::{Vec2, Vec3, Vector};

use crate::{sampling::uniform_sample_disk, HitResult, RayType};

/// Color type alias (linear RGB)
pub type Colour = Vec3;

/// Rec. 709 luminance of a linear colour.
#[inline]
pub fn luminance(colour: Colour) -> f32 {
    colour.dot(Vec3::new(0.2126, 0.7152, 0.0722))
}

bitflags! {
    /// Which kinds of scattering a material performs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MaterialFlags: u32 {
        const DIFFUSE = 1 << 0;
        const GLOSSY = 1 << 1;
        const SPECULAR_REFLECTION = 1 << 2;
        const REFRACTION = 1 << 3;
    }
}

/// A sampled scattering direction.
#[derive(Debug, Clone, Copy)]
pub struct BsdfSample {
    /// Outgoing direction (unit length)
    pub direction: Vector,
    /// BSDF * cos / pdf for the sampled direction
    pub weight: Colour,
    pub ray_type: RayType,
}

/// Trait for materials that describe how light interacts with surfaces.
///
/// `wo` always points away from the surface towards the viewer; `wi`
/// points away from the surface towards the light.
pub trait Material: Send + Sync {
    fn flags(&self) -> MaterialFlags;

    /// Diffuse reflectance, used for ambient and diffuse bounce terms.
    fn albedo(&self, hit: &HitResult<'_>) -> Colour;

    /// Emitted radiance. Most materials return black.
    fn emission(&self, _hit: &HitResult<'_>) -> Colour {
        Colour::ZERO
    }

    /// BSDF value for light arriving from `wi` and leaving along `wo`.
    /// Delta lobes are not included.
    fn evaluate(&self, hit: &HitResult<'_>, wo: Vector, wi: Vector) -> Colour;

    /// Sample a specular, glossy or refracted direction.
    fn sample(&self, _hit: &HitResult<'_>, _wo: Vector, _sample: Vec2) -> Option<BsdfSample> {
        None
    }
}

/// Lambertian (diffuse) material.
#[derive(Debug, Clone)]
pub struct Lambertian {
    albedo: Colour,
    emission: Colour,
}

impl Lambertian {
    pub fn new(albedo: Colour) -> Self {
        Self {
            albedo,
            emission: Colour::ZERO,
        }
    }

    /// Diffuse surface that also emits light (seen directly, not sampled).
    pub fn emissive(albedo: Colour, emission: Colour) -> Self {
        Self { albedo, emission }
    }
}

impl Material for Lambertian {
    fn flags(&self) -> MaterialFlags {
        MaterialFlags::DIFFUSE
    }

    fn albedo(&self, _hit: &HitResult<'_>) -> Colour {
        self.albedo
    }

    fn emission(&self, _hit: &HitResult<'_>) -> Colour {
        self.emission
    }

    fn evaluate(&self, hit: &HitResult<'_>, wo: Vector, wi: Vector) -> Colour {
        let n = hit.facing_shading_normal();
        if n.dot(wi) <= 0.0 || n.dot(wo) <= 0.0 {
            return Colour::ZERO;
        }
        self.albedo * std::f32::consts::FRAC_1_PI
    }
}

/// Metal (specular) material.
#[derive(Debug, Clone)]
pub struct Metal {
    albedo: Colour,
    fuzz: f32,
}

impl Metal {
    /// - `albedo`: The color of the metal
    /// - `fuzz`: Roughness, 0.0 = perfect mirror, 1.0 = very rough
    pub fn new(albedo: Colour, fuzz: f32) -> Self {
        Self {
            albedo,
            fuzz: fuzz.clamp(0.0, 1.0),
        }
    }
}

impl Material for Metal {
    fn flags(&self) -> MaterialFlags {
        if self.fuzz > 0.0 {
            MaterialFlags::GLOSSY
        } else {
            MaterialFlags::SPECULAR_REFLECTION
        }
    }

    fn albedo(&self, _hit: &HitResult<'_>) -> Colour {
        Colour::ZERO
    }

    fn evaluate(&self, _hit: &HitResult<'_>, _wo: Vector, _wi: Vector) -> Colour {
        Colour::ZERO
    }

    fn sample(&self, hit: &HitResult<'_>, wo: Vector, sample: Vec2) -> Option<BsdfSample> {
        let n = Vector::from(hit.facing_shading_normal());
        let mut direction = reflect(-wo, n);
        let mut ray_type = RayType::REFLECTION;

        if self.fuzz > 0.0 {
            let disk = uniform_sample_disk(sample.x, sample.y);
            let (t, b) = imagine_math::coordinate_system(direction.into());
            direction = (direction + (t * disk.x + b * disk.y) * self.fuzz).normalised();
            ray_type |= RayType::GLOSSY;
        }

        // Only scatter if the reflected ray is in the same hemisphere as the normal
        if direction.dot(n) <= 0.0 {
            return None;
        }

        Some(BsdfSample {
            direction,
            weight: self.albedo,
            ray_type,
        })
    }
}

/// Dielectric (glass) material.
#[derive(Debug, Clone)]
pub struct Dielectric {
    /// Index of refraction
    ior: f32,
    tint: Colour,
}

impl Dielectric {
    /// - `ior`: Index of refraction (1.0 = air, 1.5 = glass, 2.4 = diamond)
    pub fn new(ior: f32) -> Self {
        Self {
            ior,
            tint: Colour::ONE,
        }
    }

    pub fn with_tint(mut self, tint: Colour) -> Self {
        self.tint = tint;
        self
    }

    /// Schlick's approximation for reflectance
    fn reflectance(cosine: f32, ior: f32) -> f32 {
        let r0 = ((1.0 - ior) / (1.0 + ior)).powi(2);
        r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
    }
}

impl Material for Dielectric {
    fn flags(&self) -> MaterialFlags {
        MaterialFlags::SPECULAR_REFLECTION | MaterialFlags::REFRACTION
    }

    fn albedo(&self, _hit: &HitResult<'_>) -> Colour {
        Colour::ZERO
    }

    fn evaluate(&self, _hit: &HitResult<'_>, _wo: Vector, _wi: Vector) -> Colour {
        Colour::ZERO
    }

    fn sample(&self, hit: &HitResult<'_>, wo: Vector, sample: Vec2) -> Option<BsdfSample> {
        let n = Vector::from(hit.facing_shading_normal());
        let refraction_ratio = if hit.backfacing { self.ior } else { 1.0 / self.ior };

        let unit_direction = -wo;
        let cos_theta = wo.dot(n).min(1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

        // Check for total internal reflection
        let cannot_refract = refraction_ratio * sin_theta > 1.0;

        let (direction, ray_type) =
            if cannot_refract || Self::reflectance(cos_theta, refraction_ratio) > sample.x {
                (reflect(unit_direction, n), RayType::REFLECTION)
            } else {
                (refract(unit_direction, n, refraction_ratio), RayType::REFRACTION)
            };

        Some(BsdfSample {
            direction: direction.normalised(),
            weight: self.tint,
            ray_type,
        })
    }
}

/// Reflect a vector about a normal.
#[inline]
pub fn reflect(v: Vector, n: Vector) -> Vector {
    v - n * (2.0 * v.dot(n))
}

/// Refract a unit vector through a surface.
#[inline]
pub fn refract(uv: Vector, n: Vector, etai_over_etat: f32) -> Vector {
    let cos_theta = (-uv).dot(n).min(1.0);
    let r_out_perp = (uv + n * cos_theta) * etai_over_etat;
    let r_out_parallel = n * -(1.0 - r_out_perp.length_squared()).abs().sqrt();
    r_out_perp + r_out_parallel
}

#[cfg(test)]
mod tests {
    use super::*;
    use imagine_math::Normal;

    fn facing_up<'a>() -> HitResult<'a> {
        let mut hit = HitResult::default();
        hit.shading_normal = Normal::new(0.0, 1.0, 0.0);
        hit.geometry_normal = Normal::new(0.0, 1.0, 0.0);
        hit
    }

    #[test]
    fn test_lambertian_evaluate() {
        let material = Lambertian::new(Colour::new(0.5, 0.5, 0.5));
        let hit = facing_up();
        let up = Vector::new(0.0, 1.0, 0.0);

        let f = material.evaluate(&hit, up, Vector::new(0.6, 0.8, 0.0));
        assert!((f.x - 0.5 / std::f32::consts::PI).abs() < 1e-6);

        // Light from below the surface contributes nothing
        let f = material.evaluate(&hit, up, Vector::new(0.0, -1.0, 0.0));
        assert_eq!(f, Colour::ZERO);
    }

    #[test]
    fn test_mirror_reflection() {
        let material = Metal::new(Colour::ONE, 0.0);
        let wo = Vector::new(-1.0, 1.0, 0.0).normalised();
        let sample = material
            .sample(&facing_up(), wo, Vec2::new(0.5, 0.5))
            .expect("mirror reflects");

        assert!((sample.direction - Vector::new(1.0, 1.0, 0.0).normalised()).length() < 1e-5);
        assert_eq!(sample.ray_type, RayType::REFLECTION);
        assert_eq!(material.flags(), MaterialFlags::SPECULAR_REFLECTION);
    }

    #[test]
    fn test_dielectric_refracts_straight_through_at_normal_incidence() {
        let material = Dielectric::new(1.5);
        let wo = Vector::new(0.0, 1.0, 0.0);

        // Schlick reflectance at normal incidence is 0.04
        let sample = material.sample(&facing_up(), wo, Vec2::new(0.5, 0.5)).unwrap();
        assert_eq!(sample.ray_type, RayType::REFRACTION);
        assert!((sample.direction - Vector::new(0.0, -1.0, 0.0)).length() < 1e-5);

        let sample = material.sample(&facing_up(), wo, Vec2::new(0.01, 0.5)).unwrap();
        assert_eq!(sample.ray_type, RayType::REFLECTION);
    }

    #[test]
    fn test_dielectric_total_internal_reflection() {
        let material = Dielectric::new(1.5);
        let mut hit = facing_up();
        hit.backfacing = true;
        // Inside the glass the facing normal is -Y; a grazing ray cannot leave
        let wo = Vector::new(0.9, -0.1, 0.0).normalised();
        let sample = material.sample(&hit, wo, Vec2::new(0.99, 0.5)).unwrap();
        assert_eq!(sample.ray_type, RayType::REFLECTION);
    }

    #[test]
    fn test_luminance_of_white() {
        assert!((luminance(Colour::ONE) - 1.0).abs() < 1e-6);
    }
}
