//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! A binary tree over primitive indices. The tree only knows bounding
//! boxes; the caller supplies the primitive test during traversal, so the
//! same tree serves nearest-hit and any-hit queries.

use imagine_math::{Aabb, Interval, Point, Vector};

use crate::Ray;

/// Maximum primitives per leaf node before splitting.
const LEAF_MAX_SIZE: usize = 4;

/// BVH node - either a branch with two children or a leaf with primitives.
#[derive(Debug)]
pub enum BvhNode {
    /// Internal node with two children.
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    /// Leaf node with a small number of primitive indices.
    Leaf { primitives: Vec<u32>, bbox: Aabb },
    /// Empty node (for edge cases).
    Empty,
}

impl BvhNode {
    /// Build a BVH over primitives given by their bounding boxes. Leaf
    /// entries are indices into `bounds`.
    pub fn new(bounds: &[Aabb]) -> Self {
        if bounds.is_empty() {
            return BvhNode::Empty;
        }
        let indices = (0..bounds.len() as u32).collect();
        Self::build(bounds, indices)
    }

    /// Recursive BVH construction.
    ///
    /// Simple median-split approach: sort primitives by centroid on the
    /// longest axis of the centroid bounds, split in half, recurse.
    fn build(bounds: &[Aabb], mut indices: Vec<u32>) -> Self {
        let n = indices.len();

        let bbox = indices
            .iter()
            .map(|&i| bounds[i as usize])
            .fold(Aabb::EMPTY, |acc, b| Aabb::surrounding(&acc, &b));

        // Create leaf for small sets
        if n <= LEAF_MAX_SIZE {
            return BvhNode::Leaf {
                primitives: indices,
                bbox,
            };
        }

        // Choose split axis based on centroid spread
        let centroid_bounds = indices.iter().fold(Aabb::EMPTY, |acc, &i| {
            let c = bounds[i as usize].centroid();
            Aabb::surrounding(&acc, &Aabb::from_points(c, c))
        });
        let axis = centroid_bounds.longest_axis();

        indices.sort_unstable_by(|&a, &b| {
            let a_val = bounds[a as usize].centroid()[axis];
            let b_val = bounds[b as usize].centroid()[axis];
            a_val.total_cmp(&b_val)
        });

        let right_indices = indices.split_off(n / 2);
        let left = Self::build(bounds, indices);
        let right = Self::build(bounds, right_indices);

        BvhNode::Branch {
            left: Box::new(left),
            right: Box::new(right),
            bbox,
        }
    }

    pub fn bounding_box(&self) -> Aabb {
        match self {
            BvhNode::Empty => Aabb::EMPTY,
            BvhNode::Leaf { bbox, .. } => *bbox,
            BvhNode::Branch { bbox, .. } => *bbox,
        }
    }

    /// Nearest-hit traversal.
    ///
    /// `test(index, t_max)` intersects one primitive and returns the hit
    /// distance if it is closer than `t_max`. Returns the closest distance
    /// found. The ray's inverse direction must be calculated.
    pub fn intersect<F>(&self, ray: &Ray, mut test: F) -> Option<f32>
    where
        F: FnMut(u32, f32) -> Option<f32>,
    {
        let mut closest = ray.t_max;
        let hit = self.intersect_node(
            ray.start_position,
            ray.inverse_direction,
            ray.t_min,
            &mut closest,
            &mut test,
        );
        hit.then_some(closest)
    }

    fn intersect_node<F>(
        &self,
        origin: Point,
        inverse_direction: Vector,
        t_min: f32,
        closest: &mut f32,
        test: &mut F,
    ) -> bool
    where
        F: FnMut(u32, f32) -> Option<f32>,
    {
        match self {
            BvhNode::Empty => false,

            BvhNode::Leaf { primitives, bbox } => {
                if !bbox.hit(origin, inverse_direction, Interval::new(t_min, *closest)) {
                    return false;
                }

                let mut hit_anything = false;
                for &index in primitives {
                    if let Some(t) = test(index, *closest) {
                        hit_anything = true;
                        *closest = t;
                    }
                }
                hit_anything
            }

            BvhNode::Branch { left, right, bbox } => {
                if !bbox.hit(origin, inverse_direction, Interval::new(t_min, *closest)) {
                    return false;
                }

                // Right child is only searched up to the closest hit so far
                let hit_left = left.intersect_node(origin, inverse_direction, t_min, closest, test);
                let hit_right = right.intersect_node(origin, inverse_direction, t_min, closest, test);
                hit_left || hit_right
            }
        }
    }

    /// Any-hit traversal: stops at the first primitive `test` accepts.
    pub fn occluded<F>(&self, ray: &Ray, mut test: F) -> bool
    where
        F: FnMut(u32) -> bool,
    {
        let ray_t = Interval::new(ray.t_min, ray.t_max);
        self.occluded_node(ray.start_position, ray.inverse_direction, ray_t, &mut test)
    }

    fn occluded_node<F>(&self, origin: Point, inverse_direction: Vector, ray_t: Interval, test: &mut F) -> bool
    where
        F: FnMut(u32) -> bool,
    {
        match self {
            BvhNode::Empty => false,
            BvhNode::Leaf { primitives, bbox } => {
                bbox.hit(origin, inverse_direction, ray_t) && primitives.iter().any(|&i| test(i))
            }
            BvhNode::Branch { left, right, bbox } => {
                bbox.hit(origin, inverse_direction, ray_t)
                    && (left.occluded_node(origin, inverse_direction, ray_t, test)
                        || right.occluded_node(origin, inverse_direction, ray_t, test))
            }
        }
    }

    /// Number of nodes in the tree, for build statistics.
    pub fn node_count(&self) -> usize {
        match self {
            BvhNode::Empty => 0,
            BvhNode::Leaf { .. } => 1,
            BvhNode::Branch { left, right, .. } => 1 + left.node_count() + right.node_count(),
        }
    }
}
