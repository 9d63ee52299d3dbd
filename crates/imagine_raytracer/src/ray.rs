//! Rays for tracing.
//!
//! A ray is a directed segment `[t_min, t_max]` from `start_position` along
//! `direction`. It also carries its type, the inverse direction used by
//! bounding box tests, optional ray differentials and a payload slot for
//! traversal-specific data.

use bitflags::bitflags;
use imagine_math::{Point, Vector};

bitflags! {
    /// What a ray is being traced for. Flags combine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RayType: u32 {
        const CAMERA = 1 << 0;
        const SHADOW = 1 << 1;
        const REFLECTION = 1 << 2;
        const REFRACTION = 1 << 3;
        const DIFFUSE = 1 << 4;
        const GLOSSY = 1 << 5;

        /// Matches every ray type, used for occlusion queries that must see
        /// all geometry.
        const RAY_ALL = Self::CAMERA.bits()
            | Self::SHADOW.bits()
            | Self::REFLECTION.bits()
            | Self::REFRACTION.bits()
            | Self::DIFFUSE.bits()
            | Self::GLOSSY.bits();
    }
}

/// Origins and directions of the two rays offset by one pixel (or sample)
/// in x and y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayDifferentials {
    pub x_origin: Point,
    pub x_direction: Vector,
    pub y_origin: Point,
    pub y_direction: Vector,
}

/// Algorithm-specific data attached to a ray for the duration of one
/// traversal.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RayPayload {
    #[default]
    None,
    /// Skip all geometry belonging to this object ID (e.g. a light's own
    /// emitter when testing its shadow ray).
    IgnoreObject(u32),
    /// Free scratch space.
    Scratch([f32; 4]),
}

/// A ray with bounds, type and traversal data.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub start_position: Point,
    pub direction: Vector,
    /// `1 / direction`, only valid after `calculate_inverse_direction()`
    pub inverse_direction: Vector,
    pub t_min: f32,
    pub t_max: f32,
    /// Time value for motion blur
    pub time: f32,
    pub ray_type: RayType,
    pub payload: RayPayload,
    differentials: Option<RayDifferentials>,
}

impl Ray {
    /// Create a ray spanning `[0, inf)`.
    ///
    /// The inverse direction is left at zero: call
    /// `calculate_inverse_direction()` before traversal.
    #[inline]
    pub fn new(start_position: Point, direction: Vector, ray_type: RayType) -> Self {
        Self {
            start_position,
            direction,
            inverse_direction: Vector::ZERO,
            t_min: 0.0,
            t_max: f32::INFINITY,
            time: 0.0,
            ray_type,
            payload: RayPayload::None,
            differentials: None,
        }
    }

    /// Set the parametric bounds.
    #[inline]
    pub fn with_bounds(mut self, t_min: f32, t_max: f32) -> Self {
        self.t_min = t_min;
        self.t_max = t_max;
        self
    }

    #[inline]
    pub fn with_payload(mut self, payload: RayPayload) -> Self {
        self.payload = payload;
        self
    }

    /// Recompute `inverse_direction` from `direction`.
    ///
    /// Zero components deliberately produce `±inf` (the sign of the zero is
    /// kept), which is what the branch-free slab test expects for
    /// axis-aligned rays.
    #[inline]
    pub fn calculate_inverse_direction(&mut self) {
        self.inverse_direction = Vector::new(
            1.0 / self.direction.x,
            1.0 / self.direction.y,
            1.0 / self.direction.z,
        );
    }

    /// Store the x and y offset rays.
    pub fn set_ray_differentials(
        &mut self,
        x_origin: Point,
        x_direction: Vector,
        y_origin: Point,
        y_direction: Vector,
    ) {
        self.differentials = Some(RayDifferentials {
            x_origin,
            x_direction,
            y_origin,
            y_direction,
        });
    }

    #[inline]
    pub fn has_differentials(&self) -> bool {
        self.differentials.is_some()
    }

    #[inline]
    pub fn differentials(&self) -> Option<&RayDifferentials> {
        self.differentials.as_ref()
    }

    #[inline]
    pub fn clear_differentials(&mut self) {
        self.differentials = None;
    }

    /// `start_position + direction * t`
    #[inline]
    pub fn point_at(&self, t: f32) -> Point {
        self.start_position + self.direction * t
    }

    /// True if `t` lies strictly inside the ray's bounds.
    #[inline]
    pub fn in_range(&self, t: f32) -> bool {
        t > self.t_min && t < self.t_max
    }
}
