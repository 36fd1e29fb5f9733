//! Opaque dielectric: a Lambertian base under a GGX specular coat.

use crate::material::{facing_normal, reflection_half, BsdfSample, Color, Reflectance};
use crate::microfacet::{
    fresnel_dielectric, ggx_d, ggx_half_pdf, sample_ggx_half, smith_g, MIN_ROUGHNESS,
};
use crate::sampling::{cosine_hemisphere_pdf, cosine_sample_hemisphere, gen_f32, reflect, safe_div};
use ember_math::Vec3;
use rand::RngCore;
use std::f32::consts::FRAC_1_PI;

/// Plastic-like surface. Both faces behave the same.
///
/// The diffuse lobe is scaled by the Fresnel transmittance so the sum of
/// both lobes does not exceed the albedo at grazing angles.
#[derive(Debug, Clone, PartialEq)]
pub struct Dielectric {
    pub albedo: Color,
    pub ior: f32,
    pub roughness: f32,
}

impl Dielectric {
    pub fn new(albedo: Color, ior: f32, roughness: f32) -> Self {
        Self {
            albedo,
            ior,
            roughness: roughness.max(MIN_ROUGHNESS),
        }
    }

    fn specular_pdf(&self, wo: Vec3, wi: Vec3, n: Vec3) -> f32 {
        match reflection_half(wo, wi, n) {
            Some(h) => safe_div(ggx_half_pdf(n.dot(h), self.roughness), 4.0 * wo.dot(h).abs()),
            None => 0.0,
        }
    }
}

impl Default for Dielectric {
    fn default() -> Self {
        Self::new(Color::splat(0.5), 1.5, 0.2)
    }
}

impl Reflectance for Dielectric {
    fn sample(&self, wo: Vec3, n: Vec3, rng: &mut dyn RngCore) -> BsdfSample {
        let ns = facing_normal(n, wo);

        // Pick one lobe with equal probability
        let wi = if gen_f32(rng) < 0.5 {
            cosine_sample_hemisphere(ns, rng)
        } else {
            let h = sample_ggx_half(ns, self.roughness, rng);
            reflect(wo, h)
        };

        if wi.dot(ns) <= 0.0 {
            return BsdfSample::invalid(wi);
        }
        BsdfSample {
            direction: wi,
            pdf: self.pdf(wo, n, wi),
        }
    }

    fn evaluate(&self, wo: Vec3, wi: Vec3, n: Vec3, with_cosine: bool) -> Color {
        let ns = facing_normal(n, wo);
        let cos_o = wo.dot(ns);
        let cos_i = wi.dot(ns);
        if cos_o <= 0.0 || cos_i <= 0.0 {
            return Color::ZERO;
        }
        let Some(h) = reflection_half(wo, wi, ns) else {
            return Color::ZERO;
        };

        let fresnel = fresnel_dielectric(wi.dot(h), self.ior);
        let diffuse = self.albedo * ((1.0 - fresnel) * FRAC_1_PI);
        let specular = ggx_d(ns.dot(h), self.roughness)
            * smith_g(wo, wi, h, ns, self.roughness)
            * fresnel
            / (4.0 * cos_o * cos_i);

        let f = diffuse + Color::splat(specular);
        if with_cosine {
            f * cos_i
        } else {
            f
        }
    }

    fn pdf(&self, wo: Vec3, n: Vec3, wi: Vec3) -> f32 {
        let ns = facing_normal(n, wo);
        if wi.dot(ns) <= 0.0 {
            return 0.0;
        }
        0.5 * (cosine_hemisphere_pdf(ns, wi) + self.specular_pdf(wo, wi, ns))
    }
}
