//! Path vertices and the fixed-capacity path container.
//!
//! A path stores, for every vertex, the area-measure density with which the
//! vertex was generated from its predecessor and the accumulated throughput
//! up to it. Camera and light subpaths are grown by random walks; the
//! estimator also grows temporary copies one vertex at a time with
//! [`Path::append`] to evaluate the densities that competing strategies
//! would have assigned to the same vertices.

use crate::primitive::{FaceCulling, Primitive};
use crate::sampling::{cosine_sample_hemisphere, gen_f32, safe_div, safe_div_color};
use crate::{Camera, Color, Material, Reflectance, Scene};
use ember_math::{Ray, Vec3};
use rand::RngCore;
use std::f32::consts::FRAC_1_PI;

/// Capacity of a path, large enough for a camera and a light walk spliced together.
pub const MAX_PATH_VERTICES: usize = 32;

/// Longest subpath a single random walk may produce.
pub const MAX_WALK_VERTICES: usize = 16;

/// Vertex index after which Russian roulette switches to a fixed survival rate.
pub const ROULETTE_START: usize = 4;

/// Survival probability used once roulette is fixed.
pub const ROULETTE_SURVIVAL: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    /// The pinhole.
    Camera,
    /// A point sampled on an emitter as the start of a light walk.
    Light,
    /// A scattering surface point.
    Intermediate,
    /// A ray that left the scene.
    Background,
}

/// One vertex of a path.
#[derive(Clone, Copy)]
pub struct PathVertex<'a> {
    pub kind: VertexKind,
    /// Unused for background vertices.
    pub position: Vec3,
    /// Outward geometric normal for surfaces, the viewing direction for the
    /// camera and the escape direction for background vertices.
    pub normal: Vec3,
    pub primitive: Option<&'a dyn Primitive>,
}

impl<'a> PathVertex<'a> {
    pub fn camera(position: Vec3, forward: Vec3) -> Self {
        Self {
            kind: VertexKind::Camera,
            position,
            normal: forward,
            primitive: None,
        }
    }

    pub fn light(position: Vec3, normal: Vec3, primitive: &'a dyn Primitive) -> Self {
        Self {
            kind: VertexKind::Light,
            position,
            normal,
            primitive: Some(primitive),
        }
    }

    pub fn surface(position: Vec3, normal: Vec3, primitive: &'a dyn Primitive) -> Self {
        Self {
            kind: VertexKind::Intermediate,
            position,
            normal,
            primitive: Some(primitive),
        }
    }

    pub fn background(direction: Vec3) -> Self {
        Self {
            kind: VertexKind::Background,
            position: Vec3::ZERO,
            normal: direction,
            primitive: None,
        }
    }

    pub fn material(&self) -> Option<&'a Material> {
        self.primitive.map(|p| p.material())
    }

    /// Constant radiance of the surface's emitter, zero if it does not emit.
    pub fn emission(&self) -> Color {
        self.material().map_or(Color::ZERO, |m| m.emission)
    }

    /// Radiance leaving this surface toward `dir`.
    pub fn emitted_toward(&self, dir: Vec3) -> Color {
        self.material()
            .map_or(Color::ZERO, |m| m.emitted(self.normal, dir))
    }

    pub fn is_surface(&self) -> bool {
        matches!(self.kind, VertexKind::Light | VertexKind::Intermediate)
    }

    pub fn is_opaque_surface(&self) -> bool {
        self.is_surface() && self.material().is_some_and(|m| m.bsdf.is_opaque())
    }
}

/// A vertex plus the bookkeeping the estimator needs.
#[derive(Clone, Copy)]
pub struct PathEntry<'a> {
    pub vertex: PathVertex<'a>,
    /// Area-measure density of generating this vertex from its predecessor.
    pub pdf: f32,
    /// Product of scattering weights from the path origin up to this vertex.
    pub throughput: Color,
    /// Set when an explicit append found the segment to the predecessor blocked.
    pub occluded: bool,
}

impl<'a> PathEntry<'a> {
    const EMPTY: PathEntry<'static> = PathEntry {
        vertex: PathVertex {
            kind: VertexKind::Background,
            position: Vec3::ZERO,
            normal: Vec3::ZERO,
            primitive: None,
        },
        pdf: 0.0,
        throughput: Color::ZERO,
        occluded: false,
    };
}

/// Russian roulette survival probability for extending a walk from vertex `index`.
pub fn survival_probability(index: usize, increment: Color) -> f32 {
    if index > ROULETTE_START {
        ROULETTE_SURVIVAL
    } else {
        increment.max_element().min(1.0)
    }
}

/// Convert a density at `from` into an area density at `to`.
///
/// Surfaces report projected-solid-angle densities and pick up both cosines;
/// the pinhole reports a plain solid-angle density and only the receiving
/// cosine applies. Densities toward the background are returned unchanged.
pub fn area_density(pdf: f32, from: &PathVertex<'_>, to: &PathVertex<'_>) -> f32 {
    if to.kind == VertexKind::Background {
        return pdf;
    }
    let delta = to.position - from.position;
    let dist2 = delta.length_squared();
    if dist2 == 0.0 {
        return 0.0;
    }
    let dir = delta / dist2.sqrt();

    let cos_to = to.normal.dot(dir).abs();
    let cos_from = match from.kind {
        VertexKind::Camera => 1.0,
        _ => from.normal.dot(dir).abs(),
    };
    pdf * cos_from * cos_to / dist2
}

/// Outcome of scattering from one vertex to the next surface.
struct Step<'a> {
    vertex: PathVertex<'a>,
    /// Area density of `vertex`.
    pdf: f32,
    /// BSDF value over projected density.
    increment: Color,
}

/// A camera or light subpath of at most [`MAX_PATH_VERTICES`] vertices.
#[derive(Clone)]
pub struct Path<'a> {
    scene: &'a Scene,
    camera: &'a Camera,
    entries: [PathEntry<'a>; MAX_PATH_VERTICES],
    len: usize,
}

impl<'a> Path<'a> {
    pub fn new(scene: &'a Scene, camera: &'a Camera) -> Self {
        Self {
            scene,
            camera,
            entries: [PathEntry::EMPTY; MAX_PATH_VERTICES],
            len: 0,
        }
    }

    /// Walk from the camera along `ray`, extending with BSDF sampling and
    /// Russian roulette until absorption, escape or the walk limit.
    pub fn camera_walk(
        scene: &'a Scene,
        camera: &'a Camera,
        ray: &Ray,
        rng: &mut dyn RngCore,
    ) -> Self {
        let mut path = Self::new(scene, camera);
        let origin = PathVertex::camera(camera.position(), camera.forward());
        path.push(PathEntry {
            vertex: origin,
            pdf: 1.0,
            throughput: Color::ONE,
            occluded: false,
        });

        let first = scene.intersect(ray, FaceCulling::Back);
        path.push(PathEntry {
            vertex: first,
            pdf: area_density(camera.direction_pdf(ray.direction), &origin, &first),
            throughput: Color::ONE,
            occluded: false,
        });

        path.extend(rng);
        path
    }

    /// Walk from a point sampled on an emitter, leaving in a cosine-weighted
    /// direction. Empty when the scene has no emitters.
    pub fn light_walk(scene: &'a Scene, camera: &'a Camera, rng: &mut dyn RngCore) -> Self {
        let mut path = Self::new(scene, camera);
        let Some(sample) = scene.sample_emitter(rng) else {
            return path;
        };

        let light = sample.vertex;
        path.push(PathEntry {
            vertex: light,
            pdf: sample.pdf,
            throughput: safe_div_color(light.emission(), sample.pdf),
            occluded: false,
        });

        let dir = cosine_sample_hemisphere(light.normal, rng);
        let projected = path.direction_pdf(0, dir);
        let next = scene.intersect(
            &Ray::new(light.position, dir),
            FaceCulling::for_direction(light.normal, dir),
        );

        if projected == 0.0 && next.kind != VertexKind::Background {
            return path;
        }

        let increment = safe_div_color(path.response(0, dir), projected);
        path.push(PathEntry {
            vertex: next,
            pdf: area_density(projected, &light, &next),
            throughput: path.entries[0].throughput * increment,
            occluded: false,
        });

        path.extend(rng);
        path
    }

    fn push(&mut self, entry: PathEntry<'a>) {
        debug_assert!(self.len < MAX_PATH_VERTICES, "path capacity exceeded");
        if self.len < MAX_PATH_VERTICES {
            self.entries[self.len] = entry;
            self.len += 1;
        }
    }

    /// Continue the walk from the last vertex.
    fn extend(&mut self, rng: &mut dyn RngCore) {
        while self.len < MAX_WALK_VERTICES {
            let index = self.len - 1;
            let current = self.entries[index];
            if current.vertex.kind == VertexKind::Background {
                break;
            }
            let Some(step) = self.scatter(index, rng) else {
                break;
            };

            let survival = survival_probability(index, step.increment);
            if survival <= 0.0 || gen_f32(rng) >= survival {
                break;
            }
            if step.pdf == 0.0 {
                break;
            }

            self.push(PathEntry {
                vertex: step.vertex,
                pdf: step.pdf * survival,
                throughput: current.throughput * step.increment / survival,
                occluded: false,
            });
        }
    }

    /// Sample the BSDF at vertex `index` and trace to the next surface.
    fn scatter(&self, index: usize, rng: &mut dyn RngCore) -> Option<Step<'a>> {
        let vertex = self.entries[index].vertex;
        let material = vertex.material()?;
        let n = vertex.normal;
        let wo = self.direction_to_previous(index);

        let sample = material.bsdf.sample(wo, n, rng);
        let wi = sample.direction;
        let projected = safe_div(sample.pdf, n.dot(wi).abs());

        let next = self.scene.intersect(
            &Ray::new(vertex.position, wi),
            FaceCulling::for_direction(n, wi),
        );
        let f = material.bsdf.evaluate(wo, wi, n, false);

        Some(Step {
            pdf: area_density(projected, &vertex, &next),
            vertex: next,
            increment: safe_div_color(f, projected),
        })
    }

    /// Append `vertex`, computing its density and throughput as if this
    /// path's walk had produced it, including the roulette factor.
    ///
    /// The camera cannot be reached from a surface, so appending it yields a
    /// zero density. With `check_occlusion`, a blocked segment also yields a
    /// zero density and marks the entry occluded.
    pub fn append(&mut self, vertex: PathVertex<'a>, check_occlusion: bool) {
        if self.len == 0 {
            let (pdf, throughput) = match vertex.kind {
                VertexKind::Camera => (1.0, Color::ONE),
                VertexKind::Light => {
                    let pdf = self.scene.emitter_pdf(&vertex);
                    (pdf, safe_div_color(vertex.emission(), pdf))
                }
                _ => {
                    debug_assert!(false, "a path must start at the camera or a light");
                    (0.0, Color::ZERO)
                }
            };
            self.push(PathEntry {
                vertex,
                pdf,
                throughput,
                occluded: false,
            });
            return;
        }

        let index = self.len - 1;
        let last = self.entries[index];

        let unreachable = vertex.kind == VertexKind::Camera
            || vertex.kind == VertexKind::Background
            || last.vertex.kind == VertexKind::Background;
        let occluded =
            !unreachable && check_occlusion && self.scene.occluded(&last.vertex, &vertex);

        let entry = if unreachable || occluded {
            PathEntry {
                vertex,
                pdf: 0.0,
                throughput: Color::ZERO,
                occluded,
            }
        } else {
            let dir = (vertex.position - last.vertex.position).normalize();
            let projected = self.direction_pdf(index, dir);
            let increment = safe_div_color(self.response(index, dir), projected);
            let survival = if index >= 1 {
                survival_probability(index, increment)
            } else {
                1.0
            };
            PathEntry {
                vertex,
                pdf: area_density(projected, &last.vertex, &vertex) * survival,
                throughput: last.throughput * safe_div_color(increment, survival),
                occluded: false,
            }
        };
        self.push(entry);
    }

    /// Unit direction from vertex `index` toward its predecessor.
    pub fn direction_to_previous(&self, index: usize) -> Vec3 {
        debug_assert!(index >= 1);
        (self.entries[index - 1].vertex.position - self.entries[index].vertex.position).normalize()
    }

    /// How vertex `index` responds to a connection leaving it along `dir`:
    /// importance for the camera, the one-sided emission profile for a
    /// light, the BSDF value for a surface.
    pub fn response(&self, index: usize, dir: Vec3) -> Color {
        let vertex = &self.entries[index].vertex;
        match vertex.kind {
            VertexKind::Camera => Color::splat(self.camera.importance(dir)),
            VertexKind::Light => {
                if vertex.normal.dot(dir) > 0.0 {
                    Color::ONE
                } else {
                    Color::ZERO
                }
            }
            VertexKind::Intermediate => match vertex.material() {
                Some(m) => {
                    let wo = self.direction_to_previous(index);
                    m.bsdf.evaluate(wo, dir, vertex.normal, false)
                }
                None => Color::ZERO,
            },
            VertexKind::Background => Color::ZERO,
        }
    }

    /// Density of leaving vertex `index` along `dir`, in the measure
    /// [`area_density`] expects for that vertex kind.
    pub fn direction_pdf(&self, index: usize, dir: Vec3) -> f32 {
        let vertex = &self.entries[index].vertex;
        match vertex.kind {
            VertexKind::Camera => self.camera.direction_pdf(dir),
            VertexKind::Light => {
                if vertex.normal.dot(dir) > 0.0 {
                    FRAC_1_PI
                } else {
                    0.0
                }
            }
            VertexKind::Intermediate => match vertex.material() {
                Some(m) => {
                    let wo = self.direction_to_previous(index);
                    safe_div(m.bsdf.pdf(wo, vertex.normal, dir), vertex.normal.dot(dir).abs())
                }
                None => 0.0,
            },
            VertexKind::Background => 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn entry(&self, index: usize) -> &PathEntry<'a> {
        &self.entries[..self.len][index]
    }

    pub fn last(&self) -> Option<&PathEntry<'a>> {
        self.entries[..self.len].last()
    }

    pub fn entries(&self) -> &[PathEntry<'a>] {
        &self.entries[..self.len]
    }

    pub fn scene(&self) -> &'a Scene {
        self.scene
    }

    pub fn camera(&self) -> &'a Camera {
        self.camera
    }

    /// The first `len` vertices, without copying.
    pub fn view(&self, len: usize) -> PathView<'_, 'a> {
        debug_assert!(len <= self.len);
        PathView {
            path: self,
            len: len.min(self.len),
        }
    }
}

/// A read-only prefix of a [`Path`].
#[derive(Clone, Copy)]
pub struct PathView<'p, 'a> {
    path: &'p Path<'a>,
    len: usize,
}

impl<'p, 'a> PathView<'p, 'a> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn entry(&self, index: usize) -> &'p PathEntry<'a> {
        &self.path.entries[..self.len][index]
    }

    pub fn last(&self) -> Option<&'p PathEntry<'a>> {
        self.path.entries[..self.len].last()
    }

    /// The underlying path, for vertex queries that look at predecessors.
    pub fn path(&self) -> &'p Path<'a> {
        self.path
    }

    /// An owned copy of the prefix that can be appended to.
    pub fn to_path(&self) -> Path<'a> {
        let mut copy = self.path.clone();
        copy.len = self.len;
        copy
    }
}
