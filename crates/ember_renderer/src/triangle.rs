//! Triangle primitive for ray tracing.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use crate::primitive::{FaceCulling, HitRecord, Primitive, SurfacePoint};
use crate::sampling::gen_f32;
use crate::Material;
use ember_math::{Aabb, Interval, Ray, Vec3};
use rand::RngCore;

/// A single-sided triangle. The geometric normal follows the winding
/// `v0 -> v1 -> v2` (counter-clockwise seen from the front).
pub struct Triangle {
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    /// Pre-computed face normal (unit length)
    normal: Vec3,
    area: f32,
    material: Material,
    bbox: Aabb,
}

impl Triangle {
    /// Create a new triangle from three vertices.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, material: Material) -> Self {
        let cross = (v1 - v0).cross(v2 - v0);
        let length = cross.length();
        let normal = if length > 0.0 { cross / length } else { Vec3::Z };

        Self {
            v0,
            v1,
            v2,
            normal,
            area: 0.5 * length,
            material,
            bbox: Aabb::from_points(&[v0, v1, v2]),
        }
    }

    /// Split the planar quad `a b c d` (listed around its boundary) into two
    /// triangles whose normals point to the same side as `facing`.
    pub fn quad(corners: [Vec3; 4], facing: Vec3, material: Material) -> [Triangle; 2] {
        let [a, b, c, d] = corners;
        let winding = (b - a).cross(c - a);
        let (b, d) = if winding.dot(facing) < 0.0 { (d, b) } else { (b, d) };

        [
            Triangle::new(a, b, c, material.clone()),
            Triangle::new(a, c, d, material),
        ]
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }
}

impl Primitive for Triangle {
    /// Möller-Trumbore ray-triangle intersection algorithm.
    fn hit<'a>(
        &'a self,
        ray: &Ray,
        ray_t: Interval,
        culling: FaceCulling,
        rec: &mut HitRecord<'a>,
    ) -> bool {
        if !culling.accepts(self.normal, ray.direction) {
            return false;
        }

        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = ray.direction.cross(edge2);
        let a = edge1.dot(h);

        // Ray is parallel to triangle
        if a.abs() < 1e-12 {
            return false;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return false;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return false;
        }

        let t = f * edge2.dot(q);
        if !ray_t.surrounds(t) {
            return false;
        }

        rec.set(ray, t, self.normal, self);
        true
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    fn area(&self) -> f32 {
        self.area
    }

    fn sample_point(&self, rng: &mut dyn RngCore) -> SurfacePoint {
        let x = gen_f32(rng).sqrt();
        let y = gen_f32(rng);
        SurfacePoint {
            position: self.v0 * (1.0 - x) + self.v1 * (x * (1.0 - y)) + self.v2 * (x * y),
            normal: self.normal,
        }
    }

    fn material(&self) -> &Material {
        &self.material
    }
}
