//! Unidirectional path tracing with next-event estimation.
//!
//! At every surface the walk reaches an emitter two ways: an explicit
//! connection to a sampled emitter point, and the BSDF-sampled continuation
//! happening to land on one. Both are weighted with the power heuristic on
//! their solid-angle densities. Russian roulette and the bounce limit follow
//! the camera walk of the bidirectional estimator, so both integrators
//! converge to the same image.

use crate::bdpt::Estimate;
use crate::path::{survival_probability, PathVertex, VertexKind, MAX_WALK_VERTICES};
use crate::primitive::FaceCulling;
use crate::sampling::{gen_f32, safe_div};
use crate::{Camera, Color, Reflectance, Scene};
use ember_math::{Ray, Vec3};
use rand::RngCore;

/// Path tracer over a shared scene and camera.
#[derive(Clone, Copy)]
pub struct PathTracer<'a> {
    scene: &'a Scene,
    camera: &'a Camera,
}

impl<'a> PathTracer<'a> {
    pub fn new(scene: &'a Scene, camera: &'a Camera) -> Self {
        Self { scene, camera }
    }

    pub fn scene(&self) -> &'a Scene {
        self.scene
    }

    pub fn camera(&self) -> &'a Camera {
        self.camera
    }

    /// Estimate the radiance arriving at the camera along `ray`.
    pub fn estimate(&self, ray: &Ray, rng: &mut dyn RngCore) -> Estimate {
        let mut radiance = Color::ZERO;
        let mut throughput = Color::ONE;
        let mut ray = *ray;
        let mut culling = FaceCulling::Back;
        // Solid-angle density of the BSDF sample that produced `ray`
        let mut scatter_pdf: Option<f32> = None;
        let mut origin = self.camera.position();
        let mut vertices = 1;

        for index in 1..MAX_WALK_VERTICES {
            let vertex = self.scene.intersect(&ray, culling);
            if vertex.kind == VertexKind::Background {
                radiance += throughput * self.scene.background();
                break;
            }
            vertices += 1;
            let wo = -ray.direction;

            let emitted = vertex.emitted_toward(wo);
            if emitted != Color::ZERO {
                let weight = match scatter_pdf {
                    Some(pdf) => power_heuristic(pdf, self.emitter_solid_angle_pdf(origin, &vertex)),
                    None => 1.0,
                };
                radiance += throughput * emitted * weight;
            }

            let Some(material) = vertex.material() else {
                break;
            };
            radiance += throughput * self.direct_light(&vertex, wo, rng);

            if index + 1 == MAX_WALK_VERTICES {
                break;
            }

            let n = vertex.normal;
            let sample = material.bsdf.sample(wo, n, rng);
            if sample.pdf == 0.0 {
                break;
            }
            let wi = sample.direction;
            let increment = material.bsdf.evaluate(wo, wi, n, true) / sample.pdf;

            let survival = survival_probability(index, increment);
            if survival <= 0.0 || gen_f32(rng) >= survival {
                break;
            }
            throughput *= increment / survival;

            scatter_pdf = Some(sample.pdf);
            origin = vertex.position;
            culling = FaceCulling::for_direction(n, wi);
            ray = Ray::new(vertex.position, wi);
        }

        let radiance = radiance.max(Color::ZERO);
        Estimate {
            radiance: if radiance.is_finite() { radiance } else { Color::ZERO },
            vertices,
        }
    }

    /// Radiance scattered at `vertex` toward `wo` from one sampled emitter
    /// point, MIS-weighted against BSDF sampling.
    fn direct_light(&self, vertex: &PathVertex<'a>, wo: Vec3, rng: &mut dyn RngCore) -> Color {
        let Some(material) = vertex.material() else {
            return Color::ZERO;
        };
        let Some(sample) = self.scene.sample_emitter(rng) else {
            return Color::ZERO;
        };
        let light = sample.vertex;

        let delta = light.position - vertex.position;
        let dist2 = delta.length_squared();
        if dist2 == 0.0 {
            return Color::ZERO;
        }
        let wi = delta / dist2.sqrt();

        let emitted = light.emitted_toward(-wi);
        let light_pdf = safe_div(sample.pdf * dist2, light.normal.dot(wi).abs());
        if emitted == Color::ZERO || light_pdf == 0.0 {
            return Color::ZERO;
        }

        let n = vertex.normal;
        let f = material.bsdf.evaluate(wo, wi, n, true);
        if f == Color::ZERO || self.scene.occluded(vertex, &light) {
            return Color::ZERO;
        }

        let weight = power_heuristic(light_pdf, material.bsdf.pdf(wo, n, wi));
        f * emitted * (weight / light_pdf)
    }

    /// Solid-angle density with which [`Self::direct_light`] picks `emitter`
    /// as seen from `origin`.
    fn emitter_solid_angle_pdf(&self, origin: Vec3, emitter: &PathVertex<'_>) -> f32 {
        let delta = emitter.position - origin;
        let dist2 = delta.length_squared();
        if dist2 == 0.0 {
            return 0.0;
        }
        let cos = emitter.normal.dot(delta / dist2.sqrt()).abs();
        safe_div(self.scene.emitter_pdf(emitter) * dist2, cos)
    }
}

/// Power heuristic with exponent two for the strategy with density `a`.
fn power_heuristic(a: f32, b: f32) -> f32 {
    let (a2, b2) = (a * a, b * b);
    if !a2.is_finite() {
        return 1.0;
    }
    safe_div(a2, a2 + b2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bdpt::Bdpt;
    use crate::film::SplatBuffer;
    use crate::primitive::Primitive;
    use crate::scene::tests::floor_and_light;
    use crate::{Material, Triangle};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn stage() -> (Scene, Camera) {
        let mut primitives = floor_and_light(1.5, 5.0);
        let wall = Triangle::quad(
            [
                Vec3::new(-1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(1.0, 2.0, -1.0),
                Vec3::new(-1.0, 2.0, -1.0),
            ],
            Vec3::Z,
            Material::diffuse(Color::new(0.6, 0.3, 0.2)),
        );
        primitives.extend(wall.into_iter().map(|t| Arc::new(t) as Arc<dyn Primitive>));
        let scene = Scene::new(primitives, Color::new(0.1, 0.1, 0.2));
        let camera = Camera::new()
            .with_resolution(16, 16)
            .with_position(Vec3::new(0.0, 1.0, 3.0), Vec3::new(0.0, 0.5, 0.0), Vec3::Y)
            .with_fov(60.0);
        (scene, camera)
    }

    #[test]
    fn test_power_heuristic() {
        assert_eq!(power_heuristic(1.0, 0.0), 1.0);
        assert_eq!(power_heuristic(0.0, 1.0), 0.0);
        assert_eq!(power_heuristic(0.0, 0.0), 0.0);
        assert!((power_heuristic(1.0, 1.0) - 0.5).abs() < 1e-6);
        assert!((power_heuristic(2.0, 1.0) + power_heuristic(1.0, 2.0) - 1.0).abs() < 1e-6);
        assert_eq!(power_heuristic(f32::INFINITY, 3.0), 1.0);
    }

    #[test]
    fn test_emitter_seen_directly_has_full_radiance() {
        let (scene, camera) = stage();
        let tracer = PathTracer::new(&scene, &camera);
        let mut rng = StdRng::seed_from_u64(1);

        // Obliquely from below the lamp: no cosine falloff
        let from = Vec3::new(0.0, 0.5, 2.0);
        let ray = Ray::new(from, (Vec3::new(0.1, 1.5, 0.0) - from).normalize());
        let e = tracer.estimate(&ray, &mut rng);
        assert!(e.radiance.min_element() >= 5.0);
        assert!(e.vertices >= 2);

        // Straight up from above the lamp only the background is seen
        let up = Ray::new(Vec3::new(0.0, 1.8, 0.0), Vec3::Y);
        let e = tracer.estimate(&up, &mut rng);
        assert_eq!(e.radiance, scene.background());
        assert_eq!(e.vertices, 1);
    }

    #[test]
    fn test_direct_light_respects_occlusion() {
        let (scene, camera) = stage();
        let tracer = PathTracer::new(&scene, &camera);
        let mut rng = StdRng::seed_from_u64(2);

        let down = Ray::new(Vec3::new(0.2, 1.0, 0.2), Vec3::NEG_Y);
        let floor = scene.intersect(&down, FaceCulling::Back);
        assert_eq!(floor.kind, VertexKind::Intermediate);
        for _ in 0..20 {
            let c = tracer.direct_light(&floor, Vec3::Y, &mut rng);
            assert!(c.min_element() > 0.0 && c.is_finite());
        }

        // Under the floor nothing is lit directly
        let mut below = floor;
        below.position = Vec3::new(0.2, -0.5, 0.2);
        below.normal = Vec3::NEG_Y;
        for _ in 0..20 {
            assert_eq!(tracer.direct_light(&below, Vec3::NEG_Y, &mut rng), Color::ZERO);
        }
    }

    #[test]
    fn test_converges_to_bidirectional_estimate() {
        let (scene, camera) = stage();
        let tracer = PathTracer::new(&scene, &camera);
        let bdpt = Bdpt::new(&scene, &camera);
        let mut rng = StdRng::seed_from_u64(3);
        let mut splats = SplatBuffer::new(16, 16);

        let samples = 48;
        let mut traced = Color::ZERO;
        let mut bidirectional = Color::ZERO;
        for j in 0..16 {
            for i in 0..16 {
                for _ in 0..samples {
                    let ray = camera.get_ray(i, j, &mut rng);
                    traced += tracer.estimate(&ray, &mut rng).radiance;
                    bidirectional += bdpt.estimate(&ray, &mut rng, &mut splats).radiance;
                }
            }
        }
        let splatted = (0..16)
            .flat_map(|y| (0..16).map(move |x| (x, y)))
            .fold(Color::ZERO, |acc, (x, y)| acc + splats.get(x, y));
        bidirectional += splatted;

        let relative = (traced - bidirectional).abs() / bidirectional;
        assert!(
            relative.max_element() < 0.05,
            "path tracing {traced:?} vs bidirectional {bidirectional:?}"
        );
    }
}
