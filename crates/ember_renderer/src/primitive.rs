//! Primitive trait and HitRecord for ray-surface intersection.

use crate::Material;
use ember_math::{Aabb, Interval, Ray, Vec3};
use rand::RngCore;

/// Which side of a surface an intersection query ignores.
///
/// A hit is back-facing when the geometric normal points along the ray.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceCulling {
    /// Ignore back-facing hits.
    Back,
    /// Ignore front-facing hits.
    Front,
    /// Accept both sides.
    None,
}

impl FaceCulling {
    /// Culling for a ray leaving a surface with normal `n` in direction `dir`:
    /// rays leaving through the front skip back faces and vice versa.
    pub fn for_direction(n: Vec3, dir: Vec3) -> Self {
        if n.dot(dir) > 0.0 {
            FaceCulling::Back
        } else {
            FaceCulling::Front
        }
    }

    /// Whether a hit with outward normal `n` along `dir` survives this rule.
    #[inline]
    pub fn accepts(self, n: Vec3, dir: Vec3) -> bool {
        let facing = dir.dot(n);
        match self {
            FaceCulling::Back => facing < 0.0,
            FaceCulling::Front => facing > 0.0,
            FaceCulling::None => true,
        }
    }
}

/// Record of a ray-surface intersection.
#[derive(Clone, Copy)]
pub struct HitRecord<'a> {
    /// Point of intersection
    pub p: Vec3,
    /// Geometric normal, outward, independent of the ray
    pub normal: Vec3,
    /// Ray parameter of the hit
    pub t: f32,
    /// Whether the ray arrived against the outward normal
    pub front_face: bool,
    /// The surface that was hit
    pub primitive: Option<&'a dyn Primitive>,
}

impl<'a> Default for HitRecord<'a> {
    fn default() -> Self {
        Self {
            p: Vec3::ZERO,
            normal: Vec3::ZERO,
            t: f32::INFINITY,
            front_face: false,
            primitive: None,
        }
    }
}

impl<'a> HitRecord<'a> {
    pub fn set(&mut self, ray: &Ray, t: f32, outward_normal: Vec3, primitive: &'a dyn Primitive) {
        self.t = t;
        self.p = ray.at(t);
        self.normal = outward_normal;
        self.front_face = ray.direction.dot(outward_normal) < 0.0;
        self.primitive = Some(primitive);
    }
}

/// A point on a surface with its outward geometric normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub position: Vec3,
    pub normal: Vec3,
}

/// Geometry that can be intersected, bounded and sampled by area.
pub trait Primitive: Send + Sync {
    /// Closest hit strictly inside `ray_t` that passes `culling`.
    fn hit<'a>(
        &'a self,
        ray: &Ray,
        ray_t: Interval,
        culling: FaceCulling,
        rec: &mut HitRecord<'a>,
    ) -> bool;

    fn bounding_box(&self) -> Aabb;

    /// Surface area.
    fn area(&self) -> f32;

    /// Uniformly distributed point over the surface area.
    fn sample_point(&self, rng: &mut dyn RngCore) -> SurfacePoint;

    fn material(&self) -> &Material;
}
