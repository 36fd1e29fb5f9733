//! The Cornell box, in its classic millimetre coordinates.

use clap::ValueEnum;
use ember_math::Vec3;
use ember_renderer::microfacet::smoothness_to_roughness;
use ember_renderer::{
    Camera, Color, Dielectric, Material, Metal, Primitive, Sphere, Transparent, Triangle,
};
use std::sync::Arc;

/// What the ball in front of the blocks is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Ball {
    Glass,
    Silver,
    Copper,
    Steel,
}

impl Ball {
    fn material(self) -> Material {
        match self {
            Ball::Glass => Transparent::new(1.5, smoothness_to_roughness(0.9)).into(),
            Ball::Silver => Metal::silver(smoothness_to_roughness(0.9)).into(),
            Ball::Copper => Metal::copper(smoothness_to_roughness(0.7)).into(),
            Ball::Steel => Metal::steel(smoothness_to_roughness(0.7)).into(),
        }
    }
}

pub const BACKGROUND: Color = Color::new(0.1, 0.1, 0.2);

/// Camera looking into the open side of the box.
pub fn camera(width: u32, height: u32) -> Camera {
    Camera::new()
        .with_resolution(width, height)
        .with_position(
            Vec3::new(278.0, 278.0, -800.0),
            Vec3::new(278.0, 278.0, 0.0),
            Vec3::Y,
        )
        .with_fov(40.0)
}

fn push_quad(out: &mut Vec<Arc<dyn Primitive>>, corners: [Vec3; 4], facing: Vec3, material: &Material) {
    for t in Triangle::quad(corners, facing, material.clone()) {
        out.push(Arc::new(t));
    }
}

/// A block standing on the floor, given the corners of its top face.
fn block(out: &mut Vec<Arc<dyn Primitive>>, top: [Vec3; 4], material: &Material) {
    let center = top.iter().copied().sum::<Vec3>() / 4.0;
    push_quad(out, top, Vec3::Y, material);

    for i in 0..4 {
        let a = top[i];
        let b = top[(i + 1) % 4];
        let floor_a = Vec3::new(a.x, 0.0, a.z);
        let floor_b = Vec3::new(b.x, 0.0, b.z);
        let mut outward = 0.5 * (a + b) - center;
        outward.y = 0.0;
        push_quad(out, [floor_a, floor_b, b, a], outward, material);
    }
}

pub fn primitives(ball: Ball) -> Vec<Arc<dyn Primitive>> {
    let white = Material::from(Dielectric::new(
        Color::new(0.725, 0.71, 0.68),
        1.5,
        smoothness_to_roughness(0.1),
    ));
    let red = Material::from(Dielectric {
        albedo: Color::new(0.63, 0.065, 0.05),
        ..Default::default()
    });
    let green = Material::from(Dielectric {
        albedo: Color::new(0.14, 0.45, 0.091),
        ..Default::default()
    });
    let emission = 8.0 * Color::new(0.747 + 0.058, 0.747 + 0.258, 0.747)
        + 15.6 * Color::new(0.740 + 0.287, 0.740 + 0.160, 0.740)
        + 18.4 * Color::new(0.737 + 0.642, 0.737 + 0.159, 0.737);
    let light = Material::from(Dielectric {
        albedo: Color::splat(0.65),
        ..Default::default()
    })
    .with_emission(emission);

    let (w, h, d) = (556.0, 548.8, 559.2);
    let mut out: Vec<Arc<dyn Primitive>> = Vec::new();

    // Floor, ceiling, back wall
    push_quad(
        &mut out,
        [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(w, 0.0, 0.0),
            Vec3::new(w, 0.0, d),
            Vec3::new(0.0, 0.0, d),
        ],
        Vec3::Y,
        &white,
    );
    push_quad(
        &mut out,
        [
            Vec3::new(0.0, h, 0.0),
            Vec3::new(w, h, 0.0),
            Vec3::new(w, h, d),
            Vec3::new(0.0, h, d),
        ],
        Vec3::NEG_Y,
        &white,
    );
    push_quad(
        &mut out,
        [
            Vec3::new(0.0, 0.0, d),
            Vec3::new(w, 0.0, d),
            Vec3::new(w, h, d),
            Vec3::new(0.0, h, d),
        ],
        Vec3::NEG_Z,
        &white,
    );

    // Red on the camera's left (+x), green on its right
    push_quad(
        &mut out,
        [
            Vec3::new(w, 0.0, 0.0),
            Vec3::new(w, 0.0, d),
            Vec3::new(w, h, d),
            Vec3::new(w, h, 0.0),
        ],
        Vec3::NEG_X,
        &red,
    );
    push_quad(
        &mut out,
        [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, d),
            Vec3::new(0.0, h, d),
            Vec3::new(0.0, h, 0.0),
        ],
        Vec3::X,
        &green,
    );

    // Just below the ceiling so the two never coincide
    let light_y = 548.7;
    push_quad(
        &mut out,
        [
            Vec3::new(213.0, light_y, 227.0),
            Vec3::new(343.0, light_y, 227.0),
            Vec3::new(343.0, light_y, 332.0),
            Vec3::new(213.0, light_y, 332.0),
        ],
        Vec3::NEG_Y,
        &light,
    );

    block(
        &mut out,
        [
            Vec3::new(130.0, 165.0, 65.0),
            Vec3::new(82.0, 165.0, 225.0),
            Vec3::new(240.0, 165.0, 272.0),
            Vec3::new(290.0, 165.0, 114.0),
        ],
        &white,
    );
    block(
        &mut out,
        [
            Vec3::new(423.0, 330.0, 247.0),
            Vec3::new(265.0, 330.0, 296.0),
            Vec3::new(314.0, 330.0, 456.0),
            Vec3::new(472.0, 330.0, 406.0),
        ],
        &white,
    );

    out.push(Arc::new(Sphere::new(
        Vec3::new(270.0, 278.0, 200.0),
        50.0,
        ball.material(),
    )));

    out
}
