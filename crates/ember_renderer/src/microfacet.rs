//! GGX microfacet distribution, Smith masking and Fresnel terms.

use crate::sampling::{gen_f32, to_world};
use crate::Color;
use ember_math::Vec3;
use rand::RngCore;
use std::f32::consts::PI;

/// Smallest GGX alpha; sharper lobes lose precision in `ggx_d`.
pub const MIN_ROUGHNESS: f32 = 0.002;

/// Map an artist smoothness in [0, 1] to GGX alpha.
pub fn smoothness_to_roughness(smoothness: f32) -> f32 {
    let r = 1.0 - smoothness.clamp(0.0, 1.0);
    (r * r).max(MIN_ROUGHNESS)
}

/// GGX / Trowbridge-Reitz normal distribution.
#[inline]
pub fn ggx_d(n_dot_h: f32, alpha: f32) -> f32 {
    if n_dot_h <= 0.0 {
        return 0.0;
    }
    let a2 = alpha * alpha;
    let denom = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (PI * denom * denom)
}

/// Smith masking for one direction `v` against microfacet normal `h`.
pub fn smith_g1(v: Vec3, h: Vec3, n: Vec3, alpha: f32) -> f32 {
    let v_dot_n = v.dot(n);
    let v_dot_h = v.dot(h);
    if v_dot_n == 0.0 || v_dot_h * v_dot_n <= 0.0 {
        return 0.0;
    }
    let cos2 = v_dot_n * v_dot_n;
    let tan2 = (1.0 - cos2).max(0.0) / cos2;
    2.0 / (1.0 + (1.0 + alpha * alpha * tan2).sqrt())
}

/// Separable Smith shadowing-masking.
#[inline]
pub fn smith_g(wo: Vec3, wi: Vec3, h: Vec3, n: Vec3, alpha: f32) -> f32 {
    smith_g1(wo, h, n, alpha) * smith_g1(wi, h, n, alpha)
}

/// Sample a microfacet normal around `n` proportionally to `D(h) |n·h|`.
pub fn sample_ggx_half(n: Vec3, alpha: f32, rng: &mut dyn RngCore) -> Vec3 {
    let u1 = gen_f32(rng);
    let u2 = gen_f32(rng);

    let theta = (alpha * u1.sqrt()).atan2((1.0 - u1).sqrt());
    let phi = 2.0 * PI * u2;
    let (sin_theta, cos_theta) = theta.sin_cos();
    let local = Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta);

    to_world(local, n).normalize()
}

/// Density of [`sample_ggx_half`] over microfacet normals.
#[inline]
pub fn ggx_half_pdf(n_dot_h: f32, alpha: f32) -> f32 {
    ggx_d(n_dot_h, alpha) * n_dot_h.abs()
}

/// Unpolarised Fresnel reflectance of a dielectric boundary.
///
/// `cos_i` is measured on the side the light arrives from; a negative value
/// means that side is the denser medium. `eta` is the index of the medium the
/// normal points away from, relative to the medium it points into.
pub fn fresnel_dielectric(cos_i: f32, eta: f32) -> f32 {
    let (cos_i, eta) = if cos_i < 0.0 {
        (-cos_i, 1.0 / eta)
    } else {
        (cos_i, eta)
    };
    let cos_i = cos_i.min(1.0);

    let sin2_t = (1.0 - cos_i * cos_i) / (eta * eta);
    if sin2_t >= 1.0 {
        return 1.0;
    }
    let cos_t = (1.0 - sin2_t).sqrt();

    let r_parallel = (eta * cos_i - cos_t) / (eta * cos_i + cos_t);
    let r_perpendicular = (cos_i - eta * cos_t) / (cos_i + eta * cos_t);
    0.5 * (r_parallel * r_parallel + r_perpendicular * r_perpendicular)
}

/// Fresnel reflectance of a conductor with complex index `eta + i k`, per channel.
pub fn fresnel_conductor(cos_i: f32, eta: Color, k: Color) -> Color {
    let cos_i = cos_i.abs().min(1.0);
    Color::new(
        conductor_channel(cos_i, eta.x, k.x),
        conductor_channel(cos_i, eta.y, k.y),
        conductor_channel(cos_i, eta.z, k.z),
    )
}

fn conductor_channel(cos_i: f32, eta: f32, k: f32) -> f32 {
    let cos2 = cos_i * cos_i;
    let sin2 = 1.0 - cos2;
    let eta2 = eta * eta;
    let k2 = k * k;

    let t0 = eta2 - k2 - sin2;
    let a2_plus_b2 = (t0 * t0 + 4.0 * eta2 * k2).sqrt();
    let t1 = a2_plus_b2 + cos2;
    let a = (0.5 * (a2_plus_b2 + t0)).max(0.0).sqrt();
    let t2 = 2.0 * cos_i * a;
    let rs = (t1 - t2) / (t1 + t2);

    let t3 = cos2 * a2_plus_b2 + sin2 * sin2;
    let t4 = t2 * sin2;
    let rp = rs * (t3 - t4) / (t3 + t4);

    0.5 * (rp + rs)
}
