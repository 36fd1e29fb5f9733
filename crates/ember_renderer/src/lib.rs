//! Ember - CPU bidirectional path tracing
//!
//! Unbiased offline rendering of surface light transport. Every pixel
//! sample traces a camera walk and a light walk and combines all ways of
//! joining them with multiple importance sampling. A unidirectional path
//! tracer with next-event estimation renders the same scenes for
//! comparison.

mod bdpt;
mod bvh;
mod camera;
mod dielectric;
mod error;
mod film;
mod integrator;
mod material;
mod metal;
pub mod microfacet;
mod path;
mod path_tracer;
mod primitive;
mod renderer;
pub mod sampling;
mod scene;
mod sphere;
mod transparent;
mod triangle;
mod worker;

pub use bdpt::{connect, mis_weight, weighted_contribution, Bdpt, Estimate};
pub use bvh::{AreaSample, Bvh, BvhNode, BVH_STACK_SIZE};
pub use camera::Camera;
pub use dielectric::Dielectric;
pub use error::{RenderError, RenderResult};
pub use film::{color_to_rgba, linear_to_gamma, ImageBuffer, SplatBuffer};
pub use integrator::{Estimator, Integrator};
pub use material::{Bsdf, BsdfSample, Color, Material, Reflectance};
pub use metal::Metal;
pub use path::{
    area_density, survival_probability, Path, PathEntry, PathVertex, PathView, VertexKind,
    MAX_PATH_VERTICES, MAX_WALK_VERTICES,
};
pub use path_tracer::PathTracer;
pub use primitive::{FaceCulling, HitRecord, Primitive, SurfacePoint};
pub use renderer::{pixel_seed, render, render_pixel, RenderConfig, RenderOutput, RenderStats};
pub use scene::{EmitterSample, Scene, RAY_EPSILON};
pub use sphere::Sphere;
pub use transparent::Transparent;
pub use triangle::Triangle;
pub use worker::{partition, render_partition, WorkerPartition, WorkerResult};

/// Re-export Vec3 and common math types from ember_math
pub use ember_math::{Aabb, Interval, Ray, Vec2, Vec3};
