//! Surface reflectance models.
//!
//! Every model answers three questions about a pair of directions at a
//! surface point with geometric normal `n`, both directions pointing away
//! from the surface: `wo` toward the previous path vertex and `wi` toward
//! the next one.
//!
//! - `sample` draws `wi` given `wo` and reports its solid-angle density.
//! - `evaluate` returns the BSDF value, optionally multiplied by `|n·wi|`.
//! - `pdf` recomputes the density `sample` would report for `wi`.
//!
//! Degenerate configurations report a zero density rather than failing.

use crate::{Dielectric, Metal, Transparent};
use ember_math::Vec3;
use rand::RngCore;

/// Color type alias (linear RGB)
pub type Color = Vec3;

/// A sampled direction and its solid-angle density. A zero density marks
/// an invalid sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BsdfSample {
    pub direction: Vec3,
    pub pdf: f32,
}

impl BsdfSample {
    pub fn invalid(direction: Vec3) -> Self {
        Self { direction, pdf: 0.0 }
    }
}

/// The three operations every reflectance model provides.
pub trait Reflectance {
    fn sample(&self, wo: Vec3, n: Vec3, rng: &mut dyn RngCore) -> BsdfSample;

    fn evaluate(&self, wo: Vec3, wi: Vec3, n: Vec3, with_cosine: bool) -> Color;

    fn pdf(&self, wo: Vec3, n: Vec3, wi: Vec3) -> f32;
}

/// Closed set of reflectance models.
#[derive(Debug, Clone, PartialEq)]
pub enum Bsdf {
    Dielectric(Dielectric),
    Metal(Metal),
    Transparent(Transparent),
}

impl Bsdf {
    /// Opaque models never scatter light to the far side of the surface.
    pub fn is_opaque(&self) -> bool {
        !matches!(self, Bsdf::Transparent(_))
    }
}

impl Reflectance for Bsdf {
    fn sample(&self, wo: Vec3, n: Vec3, rng: &mut dyn RngCore) -> BsdfSample {
        match self {
            Bsdf::Dielectric(m) => m.sample(wo, n, rng),
            Bsdf::Metal(m) => m.sample(wo, n, rng),
            Bsdf::Transparent(m) => m.sample(wo, n, rng),
        }
    }

    fn evaluate(&self, wo: Vec3, wi: Vec3, n: Vec3, with_cosine: bool) -> Color {
        match self {
            Bsdf::Dielectric(m) => m.evaluate(wo, wi, n, with_cosine),
            Bsdf::Metal(m) => m.evaluate(wo, wi, n, with_cosine),
            Bsdf::Transparent(m) => m.evaluate(wo, wi, n, with_cosine),
        }
    }

    fn pdf(&self, wo: Vec3, n: Vec3, wi: Vec3) -> f32 {
        match self {
            Bsdf::Dielectric(m) => m.pdf(wo, n, wi),
            Bsdf::Metal(m) => m.pdf(wo, n, wi),
            Bsdf::Transparent(m) => m.pdf(wo, n, wi),
        }
    }
}

/// Surface appearance: a reflectance model plus constant emitted radiance.
///
/// Emission leaves the front side (along the geometric normal) only.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub bsdf: Bsdf,
    pub emission: Color,
}

impl Material {
    pub fn new(bsdf: Bsdf) -> Self {
        Self {
            bsdf,
            emission: Color::ZERO,
        }
    }

    /// Rough diffuse-looking dielectric with the given albedo.
    pub fn diffuse(albedo: Color) -> Self {
        Self::new(Bsdf::Dielectric(Dielectric::new(albedo, 1.5, 1.0)))
    }

    /// An emitter with a diffuse base underneath.
    pub fn emissive(emission: Color, albedo: Color) -> Self {
        Self::diffuse(albedo).with_emission(emission)
    }

    pub fn with_emission(mut self, emission: Color) -> Self {
        self.emission = emission;
        self
    }

    pub fn is_emissive(&self) -> bool {
        self.emission.max_element() > 0.0
    }

    /// Radiance leaving the surface toward `dir`.
    pub fn emitted(&self, n: Vec3, dir: Vec3) -> Color {
        if n.dot(dir) > 0.0 {
            self.emission
        } else {
            Color::ZERO
        }
    }
}

impl From<Dielectric> for Material {
    fn from(m: Dielectric) -> Self {
        Material::new(Bsdf::Dielectric(m))
    }
}

impl From<Metal> for Material {
    fn from(m: Metal) -> Self {
        Material::new(Bsdf::Metal(m))
    }
}

impl From<Transparent> for Material {
    fn from(m: Transparent) -> Self {
        Material::new(Bsdf::Transparent(m))
    }
}

/// `n` flipped to the side of `wo`, for models that treat both faces alike.
#[inline]
pub(crate) fn facing_normal(n: Vec3, wo: Vec3) -> Vec3 {
    if n.dot(wo) < 0.0 {
        -n
    } else {
        n
    }
}

/// Normalised half vector of a reflection pair, oriented along `n`.
#[inline]
pub(crate) fn reflection_half(wo: Vec3, wi: Vec3, n: Vec3) -> Option<Vec3> {
    let h = wo + wi;
    if h.length_squared() == 0.0 {
        return None;
    }
    let h = h.normalize();
    Some(if h.dot(n) < 0.0 { -h } else { h })
}
