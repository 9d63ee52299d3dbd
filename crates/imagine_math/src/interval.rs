/// A closed parametric range `[min, max]`, used for ray `t` bounds and
/// bounding box slabs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn size(&self) -> f32 {
        self.max - self.min
    }

    /// Inclusive at both ends.
    pub fn contains(&self, x: f32) -> bool {
        self.min <= x && x <= self.max
    }

    /// True when the range contains nothing.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Grow to `size() + delta`, keeping the centre.
    pub fn expand(&self, delta: f32) -> Interval {
        let half = 0.5 * delta;
        Interval::new(self.min - half, self.max + half)
    }

    /// Smallest interval enclosing both.
    pub fn surrounding(a: &Interval, b: &Interval) -> Interval {
        Interval::new(a.min.min(b.min), a.max.max(b.max))
    }

    /// Overlap of both, possibly empty.
    pub fn intersection(&self, other: &Interval) -> Interval {
        Interval::new(self.min.max(other.min), self.max.min(other.max))
    }

    pub const EMPTY: Interval = Interval {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };

    pub const UNIVERSE: Interval = Interval {
        min: f32::NEG_INFINITY,
        max: f32::INFINITY,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_contains_endpoints() {
        let interval = Interval::new(0.0, 10.0);

        assert!(interval.contains(0.0));
        assert!(interval.contains(10.0));
        assert!(!interval.contains(10.1));
        assert_eq!(interval.size(), 10.0);
    }

    #[test]
    fn test_interval_expand() {
        let expanded = Interval::new(0.0, 10.0).expand(4.0);

        assert_eq!(expanded.min, -2.0);
        assert_eq!(expanded.max, 12.0);
    }

    #[test]
    fn test_interval_intersection() {
        let a = Interval::new(0.0, 5.0);
        let b = Interval::new(3.0, 8.0);
        assert_eq!(a.intersection(&b), Interval::new(3.0, 5.0));

        let c = Interval::new(6.0, 8.0);
        assert!(a.intersection(&c).is_empty());
    }

    #[test]
    fn test_interval_empty_and_universe() {
        assert!(Interval::EMPTY.is_empty());
        assert!(!Interval::EMPTY.contains(0.0));
        assert!(Interval::UNIVERSE.contains(1e10));
        assert!(Interval::UNIVERSE.contains(-1e10));
    }
}
