//! Sphere primitive for ray tracing.

use crate::primitive::{FaceCulling, HitRecord, Primitive, SurfacePoint};
use crate::sampling::gen_f32;
use crate::Material;
use ember_math::{Aabb, Interval, Ray, Vec3};
use rand::RngCore;
use std::f32::consts::PI;

/// A sphere primitive. The outward normal points away from the center.
pub struct Sphere {
    center: Vec3,
    radius: f32,
    material: Material,
    bbox: Aabb,
}

impl Sphere {
    /// Create a new sphere.
    pub fn new(center: Vec3, radius: f32, material: Material) -> Self {
        let radius = radius.max(0.0);
        let rvec = Vec3::splat(radius);
        let bbox = Aabb::from_points(&[center - rvec, center + rvec]);

        Self {
            center,
            radius,
            material,
            bbox,
        }
    }
}

impl Primitive for Sphere {
    fn hit<'a>(
        &'a self,
        ray: &Ray,
        ray_t: Interval,
        culling: FaceCulling,
        rec: &mut HitRecord<'a>,
    ) -> bool {
        let oc = self.center - ray.origin;
        let a = ray.direction.length_squared();
        let h = ray.direction.dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 {
            return false;
        }
        let sqrtd = discriminant.sqrt();

        // Nearest root first; the far root is the other face
        for root in [(h - sqrtd) / a, (h + sqrtd) / a] {
            if !ray_t.surrounds(root) {
                continue;
            }
            let outward_normal = (ray.at(root) - self.center) / self.radius;
            if !culling.accepts(outward_normal, ray.direction) {
                continue;
            }
            rec.set(ray, root, outward_normal, self);
            return true;
        }

        false
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    fn area(&self) -> f32 {
        4.0 * PI * self.radius * self.radius
    }

    fn sample_point(&self, rng: &mut dyn RngCore) -> SurfacePoint {
        let z = 1.0 - 2.0 * gen_f32(rng);
        let r = (1.0 - z * z).max(0.0).sqrt();
        let phi = 2.0 * PI * gen_f32(rng);
        let normal = Vec3::new(r * phi.cos(), r * phi.sin(), z);

        SurfacePoint {
            position: self.center + self.radius * normal,
            normal,
        }
    }

    fn material(&self) -> &Material {
        &self.material
    }
}
