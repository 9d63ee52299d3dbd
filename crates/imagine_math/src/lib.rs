//! Imagine math - geometric value types for the raytracing core.
//!
//! Re-exports glam and layers semantic types on top of it: `Point`,
//! `Vector`, `Normal` and `UV` are distinct types with explicit conversions,
//! and `Matrix4Ext` transforms each of them correctly.

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod interval;
mod matrix;
mod vector;

pub use aabb::Aabb;
pub use interval::Interval;
pub use matrix::{Matrix3, Matrix4, Matrix4Ext};
pub use vector::{coordinate_system, pack_normals, pack_points, Normal, Point, PointDouble, Vector, UV};
