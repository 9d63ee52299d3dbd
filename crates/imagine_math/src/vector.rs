//! Semantic vector types.
//!
//! `Point`, `Vector` and `Normal` share the same storage but mean different
//! things: a position, a direction or offset, and a surface orientation.
//! Converting between them is always explicit (`From`), so a position can
//! never silently be used as a direction.
//!
//! Normals are never renormalised implicitly. After a transform or an
//! interpolation the caller must call [`Normal::normalise`].

use std::ops::{Add, AddAssign, Deref, DerefMut, Div, Mul, MulAssign, Neg, Sub, SubAssign};

use bytemuck::{Pod, Zeroable};
use glam::{DVec3, Vec2, Vec3};

macro_rules! vec3_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
        #[repr(transparent)]
        pub struct $name(pub Vec3);

        impl $name {
            pub const ZERO: Self = Self(Vec3::ZERO);

            #[inline]
            pub const fn new(x: f32, y: f32, z: f32) -> Self {
                Self(Vec3::new(x, y, z))
            }

            #[inline]
            pub fn splat(v: f32) -> Self {
                Self(Vec3::splat(v))
            }

            /// Dot product against anything with vector storage.
            #[inline]
            pub fn dot<V: Into<Vec3>>(self, rhs: V) -> f32 {
                self.0.dot(rhs.into())
            }

            /// Linear interpolation, `self` at `t = 0`.
            #[inline]
            pub fn lerp(self, other: Self, t: f32) -> Self {
                Self(self.0.lerp(other.0, t))
            }

            #[inline]
            pub fn to_array(self) -> [f32; 3] {
                self.0.to_array()
            }
        }

        impl Deref for $name {
            type Target = Vec3;

            #[inline]
            fn deref(&self) -> &Vec3 {
                &self.0
            }
        }

        impl DerefMut for $name {
            #[inline]
            fn deref_mut(&mut self) -> &mut Vec3 {
                &mut self.0
            }
        }

        impl From<$name> for Vec3 {
            #[inline]
            fn from(v: $name) -> Vec3 {
                v.0
            }
        }

        impl From<Vec3> for $name {
            #[inline]
            fn from(v: Vec3) -> Self {
                Self(v)
            }
        }

        impl From<[f32; 3]> for $name {
            #[inline]
            fn from(v: [f32; 3]) -> Self {
                Self(Vec3::from_array(v))
            }
        }

        impl Mul<f32> for $name {
            type Output = Self;

            #[inline]
            fn mul(self, rhs: f32) -> Self {
                Self(self.0 * rhs)
            }
        }

        impl Div<f32> for $name {
            type Output = Self;

            #[inline]
            fn div(self, rhs: f32) -> Self {
                Self(self.0 / rhs)
            }
        }

        impl MulAssign<f32> for $name {
            #[inline]
            fn mul_assign(&mut self, rhs: f32) {
                self.0 *= rhs;
            }
        }

        impl Neg for $name {
            type Output = Self;

            #[inline]
            fn neg(self) -> Self {
                Self(-self.0)
            }
        }
    };
}

vec3_newtype!(
    /// A position in space.
    Point
);

vec3_newtype!(
    /// A direction or an offset between two points.
    Vector
);

vec3_newtype!(
    /// A surface orientation. Not guaranteed to be unit length.
    Normal
);

// Point arithmetic

impl Sub for Point {
    type Output = Vector;

    #[inline]
    fn sub(self, rhs: Point) -> Vector {
        Vector(self.0 - rhs.0)
    }
}

impl Add<Vector> for Point {
    type Output = Point;

    #[inline]
    fn add(self, rhs: Vector) -> Point {
        Point(self.0 + rhs.0)
    }
}

impl Sub<Vector> for Point {
    type Output = Point;

    #[inline]
    fn sub(self, rhs: Vector) -> Point {
        Point(self.0 - rhs.0)
    }
}

impl AddAssign<Vector> for Point {
    #[inline]
    fn add_assign(&mut self, rhs: Vector) {
        self.0 += rhs.0;
    }
}

// Weighted sums of points (barycentric interpolation).
impl Add for Point {
    type Output = Point;

    #[inline]
    fn add(self, rhs: Point) -> Point {
        Point(self.0 + rhs.0)
    }
}

impl Point {
    /// Interpolate three points with barycentric coordinates `(1 - b1 - b2, b1, b2)`.
    #[inline]
    pub fn barycentric(p0: Point, p1: Point, p2: Point, b1: f32, b2: f32) -> Point {
        let b0 = 1.0 - b1 - b2;
        p0 * b0 + p1 * b1 + p2 * b2
    }

    #[inline]
    pub fn distance(self, other: Point) -> f32 {
        (self - other).length()
    }
}

// Vector arithmetic

impl Add for Vector {
    type Output = Vector;

    #[inline]
    fn add(self, rhs: Vector) -> Vector {
        Vector(self.0 + rhs.0)
    }
}

impl Sub for Vector {
    type Output = Vector;

    #[inline]
    fn sub(self, rhs: Vector) -> Vector {
        Vector(self.0 - rhs.0)
    }
}

impl AddAssign for Vector {
    #[inline]
    fn add_assign(&mut self, rhs: Vector) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Vector {
    #[inline]
    fn sub_assign(&mut self, rhs: Vector) {
        self.0 -= rhs.0;
    }
}

impl Vector {
    #[inline]
    pub fn cross(self, rhs: Vector) -> Vector {
        Vector(self.0.cross(rhs.0))
    }

    /// Unit-length copy. Zero vectors produce NaNs, like glam.
    #[inline]
    pub fn normalised(self) -> Vector {
        Vector(self.0.normalize())
    }
}

// Normal arithmetic

impl Add for Normal {
    type Output = Normal;

    #[inline]
    fn add(self, rhs: Normal) -> Normal {
        Normal(self.0 + rhs.0)
    }
}

impl Sub for Normal {
    type Output = Normal;

    #[inline]
    fn sub(self, rhs: Normal) -> Normal {
        Normal(self.0 - rhs.0)
    }
}

impl Normal {
    /// Rescale to unit length in place.
    #[inline]
    pub fn normalise(&mut self) {
        self.0 = self.0.normalize();
    }

    #[inline]
    pub fn normalised(mut self) -> Normal {
        self.normalise();
        self
    }

    /// Interpolate three normals with barycentric coordinates.
    ///
    /// The result is not renormalised.
    #[inline]
    pub fn barycentric(n0: Normal, n1: Normal, n2: Normal, b1: f32, b2: f32) -> Normal {
        let b0 = 1.0 - b1 - b2;
        n0 * b0 + n1 * b1 + n2 * b2
    }

    /// Flip the normal so it lies in the same hemisphere as `v`.
    #[inline]
    pub fn face_forward(self, v: Vector) -> Normal {
        if self.dot(v) < 0.0 {
            -self
        } else {
            self
        }
    }
}

// Explicit conversions between roles

impl From<Normal> for Vector {
    #[inline]
    fn from(n: Normal) -> Vector {
        Vector(n.0)
    }
}

impl From<Vector> for Normal {
    #[inline]
    fn from(v: Vector) -> Normal {
        Normal(v.0)
    }
}

impl From<Point> for Vector {
    #[inline]
    fn from(p: Point) -> Vector {
        Vector(p.0)
    }
}

impl From<Vector> for Point {
    #[inline]
    fn from(v: Vector) -> Point {
        Point(v.0)
    }
}

/// Build an orthonormal tangent frame around `normal`.
///
/// Returns two unit vectors perpendicular to `normal` and to each other.
pub fn coordinate_system(normal: Normal) -> (Vector, Vector) {
    let n = normal.0.normalize();
    let tangent = if n.x.abs() > n.y.abs() {
        Vec3::new(-n.z, 0.0, n.x) / (n.x * n.x + n.z * n.z).sqrt()
    } else {
        Vec3::new(0.0, n.z, -n.y) / (n.y * n.y + n.z * n.z).sqrt()
    };
    let bitangent = n.cross(tangent);
    (Vector(tangent), Vector(bitangent))
}

/// A parametric surface coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(transparent)]
pub struct UV(pub Vec2);

impl UV {
    pub const ZERO: UV = UV(Vec2::ZERO);

    #[inline]
    pub const fn new(u: f32, v: f32) -> Self {
        Self(Vec2::new(u, v))
    }

    #[inline]
    pub fn u(self) -> f32 {
        self.0.x
    }

    #[inline]
    pub fn v(self) -> f32 {
        self.0.y
    }

    #[inline]
    pub fn barycentric(uv0: UV, uv1: UV, uv2: UV, b1: f32, b2: f32) -> UV {
        let b0 = 1.0 - b1 - b2;
        UV(uv0.0 * b0 + uv1.0 * b1 + uv2.0 * b2)
    }
}

impl Add for UV {
    type Output = UV;

    #[inline]
    fn add(self, rhs: UV) -> UV {
        UV(self.0 + rhs.0)
    }
}

impl Sub for UV {
    type Output = UV;

    #[inline]
    fn sub(self, rhs: UV) -> UV {
        UV(self.0 - rhs.0)
    }
}

impl Mul<f32> for UV {
    type Output = UV;

    #[inline]
    fn mul(self, rhs: f32) -> UV {
        UV(self.0 * rhs)
    }
}

/// Double precision point, used where single precision plane math
/// suffers from cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointDouble(pub DVec3);

impl PointDouble {
    #[inline]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self(DVec3::new(x, y, z))
    }

    #[inline]
    pub fn to_point(self) -> Point {
        Point(self.0.as_vec3())
    }
}

impl From<Point> for PointDouble {
    #[inline]
    fn from(p: Point) -> Self {
        Self(p.0.as_dvec3())
    }
}

impl Sub for PointDouble {
    type Output = DVec3;

    #[inline]
    fn sub(self, rhs: PointDouble) -> DVec3 {
        self.0 - rhs.0
    }
}

/// View a slice of points as tightly packed floats.
pub fn pack_points(points: &[Point]) -> &[f32] {
    bytemuck::cast_slice(points)
}

/// View a slice of normals as tightly packed floats.
pub fn pack_normals(normals: &[Normal]) -> &[f32] {
    bytemuck::cast_slice(normals)
}
