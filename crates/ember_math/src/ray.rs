use crate::Vec3;

/// A ray with a cached reciprocal direction for slab tests.
///
/// `direction` is expected to be unit length; the renderer relies on ray
/// parameters being distances.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub inv_direction: Vec3,
}

impl Ray {
    /// Create a new ray. Zero direction components give infinite reciprocals,
    /// which the slab test handles.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            inv_direction: direction.recip(),
        }
    }

    /// Get the point along the ray at parameter t.
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}
