//! Rough glass: GGX reflection and transmission through a dielectric boundary.
//!
//! The geometric normal points from the inside medium (index `ior`) to the
//! outside medium (index 1). Transmission follows Walter et al. 2007,
//! "Microfacet Models for Refraction through Rough Surfaces".

use crate::material::{reflection_half, BsdfSample, Color, Reflectance};
use crate::microfacet::{
    fresnel_dielectric, ggx_d, ggx_half_pdf, sample_ggx_half, smith_g, MIN_ROUGHNESS,
};
use crate::sampling::{gen_f32, reflect, refract, safe_div};
use ember_math::Vec3;
use rand::RngCore;

#[derive(Debug, Clone, PartialEq)]
pub struct Transparent {
    pub ior: f32,
    pub roughness: f32,
}

/// Refraction geometry for a direction pair on opposite sides of the surface.
struct Transmission {
    h: Vec3,
    /// Index on the `wo` side
    eta_o: f32,
    /// Index on the `wi` side
    eta_i: f32,
}

impl Transparent {
    pub fn new(ior: f32, roughness: f32) -> Self {
        Self {
            ior,
            roughness: roughness.max(MIN_ROUGHNESS),
        }
    }

    /// Indices of refraction on the `wo` and `wi` sides.
    fn indices(&self, cos_o: f32) -> (f32, f32) {
        if cos_o > 0.0 {
            (1.0, self.ior)
        } else {
            (self.ior, 1.0)
        }
    }

    fn transmission(&self, wo: Vec3, wi: Vec3, n: Vec3) -> Option<Transmission> {
        let (eta_o, eta_i) = self.indices(wo.dot(n));
        let h = -(eta_o * wo + eta_i * wi);
        if h.length_squared() == 0.0 {
            return None;
        }
        let h = h.normalize();
        let h = if h.dot(n) < 0.0 { -h } else { h };
        Some(Transmission { h, eta_o, eta_i })
    }
}

impl Default for Transparent {
    fn default() -> Self {
        Self::new(1.5, 0.01)
    }
}

impl Reflectance for Transparent {
    fn sample(&self, wo: Vec3, n: Vec3, rng: &mut dyn RngCore) -> BsdfSample {
        let h = sample_ggx_half(n, self.roughness, rng);
        let cos_oh = wo.dot(h);
        let fresnel = fresnel_dielectric(cos_oh, self.ior);

        let reflected = gen_f32(rng) < fresnel;
        let wi = if reflected {
            reflect(wo, h)
        } else {
            let (m, eta) = if cos_oh >= 0.0 {
                (h, self.ior)
            } else {
                (-h, 1.0 / self.ior)
            };
            match refract(wo, m, eta) {
                Some(t) => t,
                None => return BsdfSample::invalid(wo),
            }
        };

        let same_side = wo.dot(n) * wi.dot(n) > 0.0;
        if same_side != reflected {
            return BsdfSample::invalid(wi);
        }
        BsdfSample {
            direction: wi,
            pdf: self.pdf(wo, n, wi),
        }
    }

    fn evaluate(&self, wo: Vec3, wi: Vec3, n: Vec3, with_cosine: bool) -> Color {
        let cos_o = wo.dot(n);
        let cos_i = wi.dot(n);
        if cos_o == 0.0 || cos_i == 0.0 {
            return Color::ZERO;
        }
        let alpha = self.roughness;

        let f = if cos_o * cos_i > 0.0 {
            let Some(h) = reflection_half(wo, wi, n) else {
                return Color::ZERO;
            };
            let fresnel = fresnel_dielectric(wo.dot(h), self.ior);
            ggx_d(n.dot(h), alpha) * smith_g(wo, wi, h, n, alpha) * fresnel
                / (4.0 * cos_o.abs() * cos_i.abs())
        } else {
            let Some(Transmission { h, eta_o, eta_i }) = self.transmission(wo, wi, n) else {
                return Color::ZERO;
            };
            let cos_oh = wo.dot(h);
            let cos_ih = wi.dot(h);
            let denom = eta_o * cos_oh + eta_i * cos_ih;
            let fresnel = fresnel_dielectric(cos_oh, self.ior);

            let numerator = cos_oh.abs()
                * cos_ih.abs()
                * eta_i
                * eta_i
                * (1.0 - fresnel)
                * ggx_d(n.dot(h), alpha)
                * smith_g(wo, wi, h, n, alpha);
            safe_div(numerator, cos_o.abs() * cos_i.abs() * denom * denom)
        };

        let f = if with_cosine { f * cos_i.abs() } else { f };
        Color::splat(f)
    }

    fn pdf(&self, wo: Vec3, n: Vec3, wi: Vec3) -> f32 {
        let cos_o = wo.dot(n);
        let cos_i = wi.dot(n);
        if cos_o == 0.0 || cos_i == 0.0 {
            return 0.0;
        }
        let alpha = self.roughness;

        if cos_o * cos_i > 0.0 {
            let Some(h) = reflection_half(wo, wi, n) else {
                return 0.0;
            };
            let fresnel = fresnel_dielectric(wo.dot(h), self.ior);
            safe_div(ggx_half_pdf(n.dot(h), alpha) * fresnel, 4.0 * wo.dot(h).abs())
        } else {
            let Some(Transmission { h, eta_o, eta_i }) = self.transmission(wo, wi, n) else {
                return 0.0;
            };
            let cos_oh = wo.dot(h);
            let cos_ih = wi.dot(h);
            // Both directions must sit on their own side of the microfacet
            if cos_oh * cos_o <= 0.0 || cos_ih * cos_i <= 0.0 {
                return 0.0;
            }
            let denom = eta_o * cos_oh + eta_i * cos_ih;
            let jacobian = safe_div(eta_i * eta_i * cos_ih.abs(), denom * denom);
            let fresnel = fresnel_dielectric(cos_oh, self.ior);
            ggx_half_pdf(n.dot(h), alpha) * (1.0 - fresnel) * jacobian
        }
    }
}
