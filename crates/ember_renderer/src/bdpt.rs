//! Bidirectional path tracing estimator.
//!
//! Every sample traces one camera walk and one light walk, then connects
//! each camera prefix of length `t >= 1` with each light prefix of length
//! `s >= 0` (`s + t >= 2`). Contributions are combined with the balance
//! heuristic, computed on squared density ratios between neighbouring
//! strategies. Strategies with `t = 1` land on an arbitrary pixel and go
//! to the splat buffer instead of the pixel being estimated.

use crate::film::SplatBuffer;
use crate::path::{Path, PathView, VertexKind};
use crate::sampling::safe_div;
use crate::{Camera, Color, Scene};
use ember_math::Ray;
use rand::RngCore;

/// Result of one estimator sample for one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Radiance for the pixel the camera ray went through.
    pub radiance: Color,
    /// Vertices generated by both walks.
    pub vertices: usize,
}

/// Bidirectional estimator over a shared scene and camera.
#[derive(Clone, Copy)]
pub struct Bdpt<'a> {
    scene: &'a Scene,
    camera: &'a Camera,
}

impl<'a> Bdpt<'a> {
    pub fn new(scene: &'a Scene, camera: &'a Camera) -> Self {
        Self { scene, camera }
    }

    pub fn scene(&self) -> &'a Scene {
        self.scene
    }

    pub fn camera(&self) -> &'a Camera {
        self.camera
    }

    /// Estimate the radiance arriving along `ray` and splat light-tracing
    /// contributions into `splats`.
    pub fn estimate(&self, ray: &Ray, rng: &mut dyn RngCore, splats: &mut SplatBuffer) -> Estimate {
        let camera_path = Path::camera_walk(self.scene, self.camera, ray, rng);
        let light_path = Path::light_walk(self.scene, self.camera, rng);

        let mut radiance = Color::ZERO;
        for t in 1..=camera_path.len() {
            for s in 0..=light_path.len() {
                if s + t < 2 {
                    continue;
                }
                let camera_view = camera_path.view(t);
                let light_view = light_path.view(s);

                let value = weighted_contribution(light_view, camera_view);
                if value == Color::ZERO {
                    continue;
                }

                if t == 1 {
                    let Some(y) = light_view.last() else {
                        continue;
                    };
                    let dir = (y.vertex.position - self.camera.position()).normalize();
                    if let Some(raster) = self.camera.raster_position(dir) {
                        splats.splat(raster, value);
                    }
                } else {
                    radiance += value;
                }
            }
        }

        Estimate {
            radiance,
            vertices: camera_path.len() + light_path.len(),
        }
    }
}

/// MIS-weighted contribution of one strategy, clamped to be non-negative.
/// Non-finite results are discarded.
pub fn weighted_contribution(light: PathView<'_, '_>, camera: PathView<'_, '_>) -> Color {
    let unweighted = connect(light, camera);
    if unweighted.max_element() <= 0.0 {
        return Color::ZERO;
    }
    let value = (unweighted * mis_weight(light, camera)).max(Color::ZERO);
    if value.is_finite() {
        value
    } else {
        Color::ZERO
    }
}

/// Unweighted contribution of joining a light prefix to a camera prefix.
pub fn connect(light: PathView<'_, '_>, camera: PathView<'_, '_>) -> Color {
    let s = light.len();
    let t = camera.len();
    let Some(z) = camera.last() else {
        return Color::ZERO;
    };
    let scene = camera.path().scene();

    if z.vertex.kind == VertexKind::Background {
        // Escaped rays can only be explained by the camera walk itself
        return if s == 0 {
            scene.background() * z.throughput
        } else {
            Color::ZERO
        };
    }

    if s == 0 {
        if t < 2 {
            return Color::ZERO;
        }
        let toward_previous = camera.path().direction_to_previous(t - 1);
        return z.vertex.emitted_toward(toward_previous) * z.throughput;
    }

    let Some(y) = light.last() else {
        return Color::ZERO;
    };
    if y.vertex.kind == VertexKind::Background {
        return Color::ZERO;
    }

    let delta = z.vertex.position - y.vertex.position;
    let dist2 = delta.length_squared();
    if dist2 == 0.0 {
        return Color::ZERO;
    }
    let dir = delta / dist2.sqrt();

    let f_light = light.path().response(s - 1, dir);
    let f_camera = camera.path().response(t - 1, -dir);
    if f_light == Color::ZERO || f_camera == Color::ZERO {
        return Color::ZERO;
    }

    let cos_light = y.vertex.normal.dot(dir).abs();
    let cos_camera = match z.vertex.kind {
        VertexKind::Camera => 1.0,
        _ => z.vertex.normal.dot(dir).abs(),
    };
    let geometry = cos_light * cos_camera / dist2;
    if geometry == 0.0 || scene.occluded(&y.vertex, &z.vertex) {
        return Color::ZERO;
    }

    y.throughput * f_light * f_camera * z.throughput * geometry
}

/// Balance-heuristic weight of the strategy that produced this split.
///
/// The denominator is `1 + Σ ratio²` over every other split of the same
/// full path. Ratios are accumulated by moving vertices one at a time from
/// one prefix onto a copy of the other and comparing the density the copy
/// assigns them with the density of their own walk.
pub fn mis_weight(light: PathView<'_, '_>, camera: PathView<'_, '_>) -> f32 {
    let s = light.len();
    let t = camera.len();
    match camera.last() {
        Some(z) if z.vertex.kind != VertexKind::Background => {}
        _ => return 1.0,
    }

    let mut denominator = 1.0;

    // Shift light vertices to the camera side: strategies (s - k, t + k)
    let mut spliced = camera.to_path();
    let mut ratio = 1.0;
    for i in (0..s).rev() {
        let original = light.entry(i);
        spliced.append(original.vertex, false);
        let Some(appended) = spliced.last() else {
            break;
        };
        ratio *= safe_div(appended.pdf, original.pdf);
        if ratio == 0.0 {
            break;
        }
        denominator += ratio * ratio;
    }

    // Shift camera vertices to the light side: strategies (s + k, t - k)
    let mut spliced = light.to_path();
    let mut ratio = 1.0;
    for i in (0..t).rev() {
        let original = camera.entry(i);
        let mut vertex = original.vertex;
        if spliced.is_empty() {
            // The camera walk ended on this emitter; as the first vertex of
            // a light prefix it is an emitter sample
            vertex.kind = VertexKind::Light;
        }
        spliced.append(vertex, false);
        let Some(appended) = spliced.last() else {
            break;
        };
        ratio *= safe_div(appended.pdf, original.pdf);
        if ratio == 0.0 {
            break;
        }
        denominator += ratio * ratio;
    }

    1.0 / denominator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{PathVertex, ROULETTE_START};
    use crate::primitive::{FaceCulling, Primitive};
    use crate::scene::tests::floor_and_light;
    use crate::{Material, Metal, Sphere, Transparent, Triangle};
    use ember_math::Vec3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    /// Floor, ceiling light and a back wall at z = -1 facing the camera.
    fn room() -> (Scene, Camera) {
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

        let scene = Scene::new(primitives, Color::ZERO);
        let camera = Camera::new()
            .with_resolution(32, 32)
            .with_position(Vec3::new(0.0, 1.0, 3.0), Vec3::new(0.0, 0.5, 0.0), Vec3::Y)
            .with_fov(60.0);
        (scene, camera)
    }

    /// Surface point reached by a ray from `from` toward `to`.
    fn point_on<'a>(scene: &'a Scene, from: Vec3, to: Vec3) -> PathVertex<'a> {
        let v = scene.intersect(&Ray::new(from, (to - from).normalize()), FaceCulling::Back);
        assert_eq!(v.kind, VertexKind::Intermediate);
        assert!((v.position - to).length() < 1e-3);
        v
    }

    /// A glass ball beside a lamp over a floor of the given material.
    fn gallery(floor: Material) -> (Scene, Camera) {
        let mut primitives: Vec<Arc<dyn Primitive>> = Vec::new();
        let ground = Triangle::quad(
            [
                Vec3::new(-1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(-1.0, 0.0, 1.0),
            ],
            Vec3::Y,
            floor,
        );
        let lamp = Triangle::quad(
            [
                Vec3::new(-0.3, 1.5, -0.3),
                Vec3::new(0.3, 1.5, -0.3),
                Vec3::new(0.3, 1.5, 0.3),
                Vec3::new(-0.3, 1.5, 0.3),
            ],
            Vec3::NEG_Y,
            Material::emissive(Color::splat(5.0), Color::splat(0.5)),
        );
        for t in ground.into_iter().chain(lamp) {
            primitives.push(Arc::new(t));
        }
        primitives.push(Arc::new(Sphere::new(
            Vec3::new(0.6, 0.5, 0.0),
            0.2,
            Transparent::new(1.5, 0.3).into(),
        )));

        let scene = Scene::new(primitives, Color::ZERO);
        let camera = Camera::new()
            .with_resolution(32, 32)
            .with_position(Vec3::new(0.6, 0.5, 3.0), Vec3::new(0.6, 0.5, 0.0), Vec3::Y)
            .with_fov(40.0);
        (scene, camera)
    }

    /// Build the full path `camera, ..., emitter` from both ends and check
    /// that the weights of all its splits sum to one.
    fn assert_weights_sum_to_one(scene: &Scene, camera: &Camera, surfaces: &[PathVertex<'_>]) {
        let eye = PathVertex::camera(camera.position(), camera.forward());
        let Some((lamp, bounces)) = surfaces.split_last() else {
            panic!("path needs an emitter");
        };

        let mut camera_side = Path::new(scene, camera);
        camera_side.append(eye, true);
        for v in surfaces {
            camera_side.append(*v, true);
        }
        let mut light_side = Path::new(scene, camera);
        light_side.append(PathVertex { kind: VertexKind::Light, ..*lamp }, true);
        for v in bounces.iter().rev() {
            light_side.append(*v, true);
        }

        for (i, e) in camera_side.entries().iter().chain(light_side.entries()).enumerate() {
            assert!(e.pdf > 0.0 && !e.occluded, "entry {i} has density {}", e.pdf);
        }

        let k = camera_side.len();
        let mut total = 0.0;
        for t in 1..=k {
            let s = k - t;
            let w = mis_weight(light_side.view(s), camera_side.view(t));
            assert!(w.is_finite() && (0.0..=1.0).contains(&w), "weight {w} for s={s} t={t}");
            total += w;
        }
        assert!((total - 1.0).abs() < 1e-4, "weights sum to {total} over {k} vertices");
    }

    #[test]
    fn test_mis_weights_sum_to_one() {
        let (scene, camera) = room();

        // camera -> wall -> floor -> light
        let wall = point_on(&scene, camera.position(), Vec3::new(0.2, 1.0, -1.0));
        let floor = point_on(&scene, Vec3::new(0.3, 1.0, -0.5), Vec3::new(0.3, 0.0, -0.5));
        let lamp = point_on(&scene, Vec3::new(0.1, 1.0, 0.1), Vec3::new(0.1, 1.5, 0.1));
        assert_weights_sum_to_one(&scene, &camera, &[wall, floor, lamp]);
    }

    #[test]
    fn test_mis_weights_sum_to_one_past_roulette_start() {
        let (scene, camera) = room();
        let on_wall = |x: f32, y: f32| point_on(&scene, Vec3::new(x, y, 0.0), Vec3::new(x, y, -1.0));
        let on_floor = |x: f32, z: f32| point_on(&scene, Vec3::new(x, 1.0, z), Vec3::new(x, 0.0, z));

        // Eight vertices: both walks extend past index 4 at a fixed survival
        let surfaces = [
            point_on(&scene, camera.position(), Vec3::new(0.2, 1.0, -1.0)),
            on_floor(0.3, -0.5),
            on_wall(-0.4, 0.8),
            on_floor(-0.2, 0.4),
            on_wall(0.5, 1.2),
            on_floor(0.1, 0.6),
            point_on(&scene, Vec3::new(0.1, 1.0, 0.1), Vec3::new(0.1, 1.5, 0.1)),
        ];
        assert!(surfaces.len() + 1 > ROULETTE_START + 2);
        assert_weights_sum_to_one(&scene, &camera, &surfaces);
    }

    #[test]
    fn test_mis_weights_sum_to_one_through_glass_and_metal() {
        let center = Vec3::new(0.6, 0.5, 0.0);
        for floor in [Material::diffuse(Color::splat(0.7)), Metal::steel(0.3).into()] {
            let (scene, camera) = gallery(floor);

            // In through the front of the ball, out through its lower back
            let front = point_on(&scene, camera.position(), center + Vec3::new(0.0, 0.0, 0.2));
            let exit_normal = Vec3::new(0.0, -0.5, -0.866_025_4).normalize();
            let exit_at = center + 0.2 * exit_normal;
            let exit = point_on(&scene, exit_at + 0.1 * exit_normal, exit_at);
            let ground_at = exit_at + Vec3::new(0.0, -0.6, -0.8) * (exit_at.y / 0.6);
            let ground = point_on(&scene, ground_at + Vec3::Y, ground_at);
            let lamp = point_on(&scene, Vec3::new(0.2, 1.0, -0.2), Vec3::new(0.2, 1.5, -0.2));

            assert!(!front.is_opaque_surface() && !exit.is_opaque_surface());
            assert_weights_sum_to_one(&scene, &camera, &[front, exit, ground, lamp]);
        }
    }

    #[test]
    fn test_emitter_hit_value_has_no_cosine() {
        let (scene, camera) = room();
        let eye = PathVertex::camera(camera.position(), camera.forward());
        // Seen at a grazing angle from the camera
        let lamp = point_on(&scene, camera.position(), Vec3::new(0.0, 1.5, 0.1));
        let cos = lamp.normal.dot((camera.position() - lamp.position).normalize());
        assert!(cos > 0.0 && cos < 0.3);

        let mut path = Path::new(&scene, &camera);
        path.append(eye, false);
        path.append(lamp, false);
        assert_eq!(path.entry(1).throughput, Color::ONE);

        let empty = Path::new(&scene, &camera);
        assert_eq!(connect(empty.view(0), path.view(2)), Color::splat(5.0));
    }

    #[test]
    fn test_background_escape_has_full_weight() {
        let (scene, camera) = room();
        let mut rng = StdRng::seed_from_u64(1);
        let light_path = Path::light_walk(&scene, &camera, &mut rng);

        // Straight up past the light: escapes
        let ray = Ray::new(camera.position(), Vec3::new(0.0, 1.0, -0.2).normalize());
        let mut camera_path = Path::new(&scene, &camera);
        camera_path.append(PathVertex::camera(camera.position(), camera.forward()), false);
        camera_path.append(scene.intersect(&ray, FaceCulling::Back), false);
        assert_eq!(camera_path.entry(1).vertex.kind, VertexKind::Background);

        assert_eq!(mis_weight(light_path.view(0), camera_path.view(2)), 1.0);
        assert_eq!(connect(light_path.view(1), camera_path.view(2)), Color::ZERO);
    }

    #[test]
    fn test_direct_hit_on_emitter_front_only() {
        let (scene, camera) = room();
        let eye = PathVertex::camera(camera.position(), camera.forward());
        let floor = point_on(&scene, Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO);
        let lamp = point_on(&scene, Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.5, 0.0));

        let mut path = Path::new(&scene, &camera);
        for v in [eye, floor, lamp] {
            path.append(v, false);
        }
        let empty = Path::new(&scene, &camera);
        let value = connect(empty.view(0), path.view(3));
        assert!(value.x > 0.0);
        assert_eq!(value, Color::splat(5.0) * path.entry(2).throughput);

        // Seen from above, the light's back side is dark
        let mut over = point_on(&scene, camera.position(), Vec3::new(0.2, 1.0, -1.0));
        over.position = Vec3::new(0.0, 2.0, -1.0);
        let mut high = Path::new(&scene, &camera);
        for v in [eye, over, lamp] {
            high.append(v, false);
        }
        assert_eq!(connect(empty.view(0), high.view(3)), Color::ZERO);
    }

    #[test]
    fn test_connection_respects_visibility() {
        let (scene, camera) = room();
        let mut rng = StdRng::seed_from_u64(3);
        let eye = PathVertex::camera(camera.position(), camera.forward());
        let floor = point_on(&scene, Vec3::new(0.4, 1.0, 0.4), Vec3::new(0.4, 0.0, 0.4));

        let mut camera_path = Path::new(&scene, &camera);
        camera_path.append(eye, false);
        camera_path.append(floor, false);

        let mut lit = 0;
        for _ in 0..50 {
            let light_path = Path::light_walk(&scene, &camera, &mut rng);
            let value = connect(light_path.view(1), camera_path.view(2));
            assert!(value.is_finite() && value.min_element() >= 0.0);
            if value.x > 0.0 {
                lit += 1;
            }
        }
        assert_eq!(lit, 50);

        // A floor point seen from below the floor cannot reach the light
        let mut hidden = floor;
        hidden.position = Vec3::new(0.4, -0.1, 0.4);
        hidden.normal = Vec3::NEG_Y;
        let mut under = Path::new(&scene, &camera);
        under.append(PathVertex::camera(Vec3::new(0.4, -1.0, 0.4), Vec3::Y), false);
        under.append(hidden, false);
        let light_path = Path::light_walk(&scene, &camera, &mut rng);
        assert_eq!(connect(light_path.view(1), under.view(2)), Color::ZERO);
    }

    #[test]
    fn test_estimate_is_finite_and_splats_land_on_film() {
        let (scene, camera) = room();
        let bdpt = Bdpt::new(&scene, &camera);
        let mut splats = SplatBuffer::new(32, 32);
        let mut rng = StdRng::seed_from_u64(4);

        let mut total = Color::ZERO;
        for j in 0..32 {
            for i in 0..32 {
                let ray = camera.get_ray(i, j, &mut rng);
                let e = bdpt.estimate(&ray, &mut rng, &mut splats);
                assert!(e.radiance.is_finite());
                assert!(e.radiance.min_element() >= 0.0);
                assert!(e.vertices >= 2);
                total += e.radiance;
            }
        }
        assert!(total.x > 0.0);

        let splatted: f32 = (0..32)
            .flat_map(|y| (0..32).map(move |x| (x, y)))
            .map(|(x, y)| splats.get(x, y).x)
            .sum();
        assert!(splatted > 0.0);
    }
}
