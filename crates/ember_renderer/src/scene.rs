//! Scene: primitives, emitters and background radiance.

use crate::bvh::Bvh;
use crate::path::{PathVertex, VertexKind};
use crate::primitive::{FaceCulling, Primitive};
use crate::Color;
use ember_math::{Interval, Ray};
use rand::RngCore;
use std::sync::Arc;

/// Smallest ray parameter accepted by intersection queries.
pub const RAY_EPSILON: f32 = 0.001;

/// Relative shrink applied to both ends of a shadow segment.
const SHADOW_EPSILON: f32 = 1e-4;

/// Geometry plus the acceleration structures the estimator queries.
///
/// Both indices are built once in [`Scene::new`] and only read afterwards,
/// so a scene can be shared by every render worker.
pub struct Scene {
    geometry: Bvh,
    emitters: Bvh,
    background: Color,
}

impl Scene {
    pub fn new(primitives: Vec<Arc<dyn Primitive>>, background: Color) -> Self {
        let emissive: Vec<Arc<dyn Primitive>> = primitives
            .iter()
            .filter(|p| p.material().is_emissive())
            .cloned()
            .collect();

        let geometry = Bvh::new(primitives);
        let emitters = Bvh::new(emissive);

        log::info!(
            "Scene: {} primitives ({} BVH nodes), {} emitters with total area {:.3}",
            geometry.len(),
            geometry.nodes().len(),
            emitters.len(),
            emitters.total_area()
        );
        if emitters.is_empty() {
            log::warn!("Scene has no emissive primitives; only the background lights it");
        }

        Self {
            geometry,
            emitters,
            background,
        }
    }

    /// Radiance arriving along rays that leave the scene.
    pub fn background(&self) -> Color {
        self.background
    }

    pub fn has_emitters(&self) -> bool {
        !self.emitters.is_empty()
    }

    /// Closest surface along `ray`, or a background vertex on a miss.
    pub fn intersect(&self, ray: &Ray, culling: FaceCulling) -> PathVertex<'_> {
        let ray_t = Interval::new(RAY_EPSILON, f32::INFINITY);
        match self.geometry.intersect(ray, ray_t, culling) {
            Some(rec) => match rec.primitive {
                Some(primitive) => PathVertex::surface(rec.p, rec.normal, primitive),
                None => PathVertex::background(ray.direction),
            },
            None => PathVertex::background(ray.direction),
        }
    }

    /// Whether the straight segment between two vertices is blocked.
    ///
    /// Symmetric in its arguments. Two opaque surfaces whose normals both
    /// face away from each other are reported blocked without tracing.
    pub fn occluded(&self, a: &PathVertex<'_>, b: &PathVertex<'_>) -> bool {
        debug_assert!(a.kind != VertexKind::Background && b.kind != VertexKind::Background);

        let delta = b.position - a.position;
        let distance = delta.length();
        if distance == 0.0 {
            return false;
        }
        let dir = delta / distance;

        if a.is_opaque_surface()
            && b.is_opaque_surface()
            && a.normal.dot(dir) < 0.0
            && b.normal.dot(-dir) < 0.0
        {
            return true;
        }

        let eps = SHADOW_EPSILON * distance.max(1.0);
        let ray = Ray::new(a.position, dir);
        self.geometry
            .occluded(&ray, Interval::new(eps, distance - eps))
    }

    /// Area-proportional point on an emitter, or `None` when nothing emits.
    pub fn sample_emitter(&self, rng: &mut dyn RngCore) -> Option<EmitterSample<'_>> {
        let sample = self.emitters.sample(rng)?;
        Some(EmitterSample {
            vertex: PathVertex::light(sample.point.position, sample.point.normal, sample.primitive),
            pdf: sample.pdf,
        })
    }

    /// Area density with which [`Scene::sample_emitter`] produces a point on
    /// the surface of `vertex`; zero for surfaces that do not emit.
    pub fn emitter_pdf(&self, vertex: &PathVertex<'_>) -> f32 {
        match vertex.primitive {
            Some(p) if p.material().is_emissive() => {
                let total = self.emitters.total_area();
                if total > 0.0 {
                    1.0 / total
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }
}

/// An emitter point drawn by [`Scene::sample_emitter`].
#[derive(Clone, Copy)]
pub struct EmitterSample<'a> {
    pub vertex: PathVertex<'a>,
    pub pdf: f32,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{Material, Triangle};
    use ember_math::Vec3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Unit-sized test stage: a white floor at y = 0 spanning [-1, 1]², and a
    /// downward-facing square light of side 0.6 at y = `light_height`.
    pub(crate) fn floor_and_light(light_height: f32, radiance: f32) -> Vec<Arc<dyn Primitive>> {
        let floor = Triangle::quad(
            [
                Vec3::new(-1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(-1.0, 0.0, 1.0),
            ],
            Vec3::Y,
            Material::diffuse(Color::splat(0.7)),
        );
        let h = light_height;
        let light = Triangle::quad(
            [
                Vec3::new(-0.3, h, -0.3),
                Vec3::new(0.3, h, -0.3),
                Vec3::new(0.3, h, 0.3),
                Vec3::new(-0.3, h, 0.3),
            ],
            Vec3::NEG_Y,
            Material::emissive(Color::splat(radiance), Color::splat(0.5)),
        );

        floor
            .into_iter()
            .chain(light)
            .map(|t| Arc::new(t) as Arc<dyn Primitive>)
            .collect()
    }

    #[test]
    fn test_intersect_and_background() {
        let scene = Scene::new(floor_and_light(1.5, 5.0), Color::splat(0.25));

        let down = Ray::new(Vec3::new(0.5, 1.0, 0.5), Vec3::NEG_Y);
        let v = scene.intersect(&down, FaceCulling::Back);
        assert_eq!(v.kind, VertexKind::Intermediate);
        assert!((v.position.y).abs() < 1e-5);
        assert_eq!(v.normal, Vec3::Y);

        let up = Ray::new(Vec3::new(0.9, 1.0, 0.9), Vec3::Y);
        let v = scene.intersect(&up, FaceCulling::Back);
        assert_eq!(v.kind, VertexKind::Background);
        assert_eq!(scene.background(), Color::splat(0.25));
    }

    #[test]
    fn test_emitter_sampling() {
        let scene = Scene::new(floor_and_light(1.5, 5.0), Color::ZERO);
        assert!(scene.has_emitters());

        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..100 {
            let s = scene.sample_emitter(&mut rng).unwrap();
            assert_eq!(s.vertex.kind, VertexKind::Light);
            assert!((s.vertex.position.y - 1.5).abs() < 1e-5);
            assert!(s.vertex.position.x.abs() <= 0.3 + 1e-5);
            assert!((s.pdf - 1.0 / 0.36).abs() < 1e-3);
            assert_eq!(scene.emitter_pdf(&s.vertex), s.pdf);
        }

        let floor_point = scene.intersect(&Ray::new(Vec3::new(0.5, 1.0, 0.5), Vec3::NEG_Y), FaceCulling::Back);
        assert_eq!(scene.emitter_pdf(&floor_point), 0.0);

        let dark = Scene::new(Vec::new(), Color::ZERO);
        assert!(dark.sample_emitter(&mut rng).is_none());
    }

    #[test]
    fn test_occlusion_is_symmetric() {
        let mut primitives = floor_and_light(1.5, 5.0);
        // A small blocker hovering over the floor center, facing up
        let blocker = Triangle::quad(
            [
                Vec3::new(-0.2, 0.7, -0.2),
                Vec3::new(0.2, 0.7, -0.2),
                Vec3::new(0.2, 0.7, 0.2),
                Vec3::new(-0.2, 0.7, 0.2),
            ],
            Vec3::Y,
            Material::diffuse(Color::ONE),
        );
        primitives.extend(blocker.into_iter().map(|t| Arc::new(t) as Arc<dyn Primitive>));
        let scene = Scene::new(primitives, Color::ZERO);

        let floor_at = |x: f32, z: f32| {
            scene.intersect(&Ray::new(Vec3::new(x, 0.5, z), Vec3::NEG_Y), FaceCulling::Back)
        };
        let light_at = |x: f32, z: f32| {
            scene.intersect(&Ray::new(Vec3::new(x, 1.0, z), Vec3::Y), FaceCulling::Back)
        };

        let hidden = floor_at(0.0, 0.0);
        let visible = floor_at(0.9, 0.9);
        let lamp = light_at(0.0, 0.0);
        assert_eq!(lamp.kind, VertexKind::Intermediate);

        assert!(scene.occluded(&hidden, &lamp));
        assert!(scene.occluded(&lamp, &hidden));
        assert!(!scene.occluded(&visible, &lamp));
        assert!(!scene.occluded(&lamp, &visible));
    }

    #[test]
    fn test_back_facing_pair_is_rejected() {
        let scene = Scene::new(floor_and_light(1.5, 5.0), Color::ZERO);
        let floor_point =
            scene.intersect(&Ray::new(Vec3::new(0.0, 0.5, 0.0), Vec3::NEG_Y), FaceCulling::Back);
        // Same position, normal flipped: the pair faces away from each other
        let mut below = floor_point;
        below.position = Vec3::new(0.0, -1.0, 0.0);
        below.normal = Vec3::NEG_Y;
        let mut above = floor_point;
        above.position = Vec3::new(0.0, 3.0, 0.0);
        assert!(scene.occluded(&below, &above));
        assert!(scene.occluded(&above, &below));
    }
}
