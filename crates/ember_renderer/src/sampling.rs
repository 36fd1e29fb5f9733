//! Random sampling and small numeric helpers shared by the estimator.

use crate::Color;
use ember_math::Vec3;
use rand::{Rng, RngCore};
use std::f32::consts::{FRAC_1_PI, PI};

/// Uniform float in [0, 1).
#[inline]
pub fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    rng.gen::<f32>()
}

/// Division that yields zero instead of a non-number when the denominator vanishes.
#[inline]
pub fn safe_div(num: f32, den: f32) -> f32 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Per-channel [`safe_div`].
#[inline]
pub fn safe_div_color(num: Color, den: f32) -> Color {
    if den == 0.0 {
        Color::ZERO
    } else {
        num / den
    }
}

/// Build an orthonormal basis from a unit normal (Duff et al. 2017).
pub fn build_orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
    let sign = if n.z >= 0.0 { 1.0 } else { -1.0 };
    let a = -1.0 / (sign + n.z);
    let b = n.x * n.y * a;

    let tangent = Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x);
    let bitangent = Vec3::new(b, sign + n.y * n.y * a, -n.y);

    (tangent, bitangent)
}

/// Map a direction given in the local frame (z along `n`) to world space.
#[inline]
pub fn to_world(local: Vec3, n: Vec3) -> Vec3 {
    let (tangent, bitangent) = build_orthonormal_basis(n);
    local.x * tangent + local.y * bitangent + local.z * n
}

/// Cosine-weighted direction in the hemisphere around `n`.
///
/// Solid-angle density is `cos θ / π`, so the projected-solid-angle density is `1 / π`.
pub fn cosine_sample_hemisphere(n: Vec3, rng: &mut dyn RngCore) -> Vec3 {
    let u1 = gen_f32(rng);
    let u2 = gen_f32(rng);

    let r = u1.sqrt();
    let phi = 2.0 * PI * u2;
    let local = Vec3::new(r * phi.cos(), r * phi.sin(), (1.0 - u1).max(0.0).sqrt());

    to_world(local, n).normalize()
}

/// Solid-angle density of [`cosine_sample_hemisphere`].
#[inline]
pub fn cosine_hemisphere_pdf(n: Vec3, dir: Vec3) -> f32 {
    n.dot(dir).max(0.0) * FRAC_1_PI
}

/// Mirror `v` about `n`. Both point away from the surface.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    2.0 * v.dot(n) * n - v
}

/// Refract `v` (pointing away from the surface, on the side `n` faces)
/// through a boundary with relative index `eta = η_transmitted / η_incident`.
///
/// Returns `None` on total internal reflection.
pub fn refract(v: Vec3, n: Vec3, eta: f32) -> Option<Vec3> {
    let cos_i = v.dot(n);
    let sin2_t = (1.0 - cos_i * cos_i).max(0.0) / (eta * eta);
    if sin2_t >= 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    Some((-v / eta + (cos_i / eta - cos_t) * n).normalize())
}
