use crate::{Interval, Point, Vector};

/// Axis-aligned bounding box used by the BVH.
///
/// Defined by one interval per axis.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    /// Create a box from two corner points, in any order.
    pub fn from_points(a: Point, b: Point) -> Self {
        let mut aabb = Self {
            x: Interval::new(a.x.min(b.x), a.x.max(b.x)),
            y: Interval::new(a.y.min(b.y), a.y.max(b.y)),
            z: Interval::new(a.z.min(b.z), a.z.max(b.z)),
        };
        aabb.pad_to_minimums();
        aabb
    }

    /// Create a box enclosing three triangle vertices.
    pub fn from_triangle(p0: Point, p1: Point, p2: Point) -> Self {
        let min = p0.min(p1.0).min(p2.0);
        let max = p0.max(p1.0).max(p2.0);
        Self::from_points(Point(min), Point(max))
    }

    /// Create a box that surrounds two other boxes.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            x: Interval::surrounding(&box0.x, &box1.x),
            y: Interval::surrounding(&box0.y, &box1.y),
            z: Interval::surrounding(&box0.z, &box1.z),
        }
    }

    pub fn min_point(&self) -> Point {
        Point::new(self.x.min, self.y.min, self.z.min)
    }

    pub fn max_point(&self) -> Point {
        Point::new(self.x.max, self.y.max, self.z.max)
    }

    /// Slab test against a ray given by its origin and precomputed inverse
    /// direction.
    ///
    /// Zero direction components must arrive as `±inf` in `inverse_direction`:
    /// the slab for that axis then spans everything or nothing, which is the
    /// correct answer for an axis-aligned ray and needs no branch.
    #[inline]
    pub fn hit(&self, origin: Point, inverse_direction: Vector, ray_t: Interval) -> bool {
        let t0 = (self.min_point() - origin).0 * inverse_direction.0;
        let t1 = (self.max_point() - origin).0 * inverse_direction.0;

        let t_near = t0.min(t1);
        let t_far = t0.max(t1);

        let t_enter = t_near.max_element().max(ray_t.min);
        let t_exit = t_far.min_element().min(ray_t.max);
        t_enter <= t_exit
    }

    /// Pad intervals to avoid zero-width boxes from axis-aligned triangles.
    fn pad_to_minimums(&mut self) {
        let delta = 0.0001;
        if self.x.size() < delta {
            self.x = self.x.expand(delta);
        }
        if self.y.size() < delta {
            self.y = self.y.expand(delta);
        }
        if self.z.size() < delta {
            self.z = self.z.expand(delta);
        }
    }

    /// Returns the index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    pub fn longest_axis(&self) -> usize {
        let x_size = self.x.size();
        let y_size = self.y.size();
        let z_size = self.z.size();

        if x_size > y_size && x_size > z_size {
            0
        } else if y_size > z_size {
            1
        } else {
            2
        }
    }

    pub fn centroid(&self) -> Point {
        self.min_point().lerp(self.max_point(), 0.5)
    }

    pub const EMPTY: Aabb = Aabb {
        x: Interval::EMPTY,
        y: Interval::EMPTY,
        z: Interval::EMPTY,
    };
}
