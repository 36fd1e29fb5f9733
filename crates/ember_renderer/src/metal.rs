//! Conductor with a GGX specular lobe and complex-index Fresnel.

use crate::material::{facing_normal, reflection_half, BsdfSample, Color, Reflectance};
use crate::microfacet::{
    fresnel_conductor, ggx_d, ggx_half_pdf, sample_ggx_half, smith_g, MIN_ROUGHNESS,
};
use crate::sampling::{reflect, safe_div};
use ember_math::Vec3;
use rand::RngCore;

#[derive(Debug, Clone, PartialEq)]
pub struct Metal {
    /// Real part of the complex index of refraction, per channel
    pub eta: Color,
    /// Absorption coefficient, per channel
    pub k: Color,
    pub roughness: f32,
}

impl Metal {
    pub fn new(eta: Color, k: Color, roughness: f32) -> Self {
        Self {
            eta,
            k,
            roughness: roughness.max(MIN_ROUGHNESS),
        }
    }

    pub fn silver(roughness: f32) -> Self {
        Self::new(
            Color::new(0.041, 0.53285, 0.049317),
            Color::new(4.8025, 3.4101, 2.8545),
            roughness,
        )
    }

    pub fn copper(roughness: f32) -> Self {
        Self::new(
            Color::new(0.211, 1.2174, 1.2493),
            Color::new(4.1592, 2.5978, 2.4771),
            roughness,
        )
    }

    pub fn steel(roughness: f32) -> Self {
        Self::new(
            Color::new(2.8653, 2.8889, 2.4006),
            Color::new(3.1820, 2.9164, 2.6773),
            roughness,
        )
    }
}

impl Default for Metal {
    fn default() -> Self {
        Self::new(
            Color::new(0.131, 0.55758, 1.4561),
            Color::new(4.0624, 2.2039, 1.9541),
            0.2,
        )
    }
}

impl Reflectance for Metal {
    fn sample(&self, wo: Vec3, n: Vec3, rng: &mut dyn RngCore) -> BsdfSample {
        let ns = facing_normal(n, wo);
        let h = sample_ggx_half(ns, self.roughness, rng);
        let wi = reflect(wo, h);

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

        let fresnel = fresnel_conductor(wi.dot(h), self.eta, self.k);
        let d = ggx_d(ns.dot(h), self.roughness);
        let g = smith_g(wo, wi, h, ns, self.roughness);

        let f = fresnel * (d * g / (4.0 * cos_o * cos_i));
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
        match reflection_half(wo, wi, ns) {
            Some(h) => safe_div(ggx_half_pdf(ns.dot(h), self.roughness), 4.0 * wo.dot(h).abs()),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::tests::check_sample_pdf_consistency;
    use crate::Bsdf;

    #[test]
    fn test_sample_pdf_consistency() {
        check_sample_pdf_consistency(&Bsdf::Metal(Metal::default()), 21);
        check_sample_pdf_consistency(&Bsdf::Metal(Metal::copper(0.6)), 22);
    }

    #[test]
    fn test_smooth_metal_peaks_at_mirror_direction() {
        let m = Metal::silver(0.05);
        let n = Vec3::Y;
        let wo = Vec3::new(0.5, 1.0, 0.0).normalize();
        let mirror = reflect(wo, n);
        let off = Vec3::new(-0.1, 1.0, 0.3).normalize();

        let at_mirror = m.evaluate(wo, mirror, n, false).max_element();
        let away = m.evaluate(wo, off, n, false).max_element();
        assert!(at_mirror > 10.0 * away);
        assert!(m.pdf(wo, n, mirror) > m.pdf(wo, n, off));
    }

    #[test]
    fn test_no_transmission() {
        let m = Metal::steel(0.3);
        let n = Vec3::Y;
        let wo = Vec3::new(0.2, 1.0, 0.0).normalize();
        let below = Vec3::new(0.1, -1.0, 0.0).normalize();
        assert_eq!(m.evaluate(wo, below, n, true), Color::ZERO);
        assert_eq!(m.pdf(wo, n, below), 0.0);
    }
}
