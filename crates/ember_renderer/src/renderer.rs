//! Multi-threaded image rendering.
//!
//! Implements the frame loop around a per-ray estimator:
//! - Strided pixel partitions rendered in parallel on a rayon pool
//! - A generator per pixel, seeded from the pixel index
//! - Per-worker splat buffers merged once all workers finish

use crate::bdpt::Bdpt;
use crate::error::{RenderError, RenderResult};
use crate::film::{pixel_count, ImageBuffer, SplatBuffer};
use crate::integrator::{Estimator, Integrator};
use crate::path_tracer::PathTracer;
use crate::worker::{partition, render_partition, WorkerResult};
use crate::{Camera, Color, Scene};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Render configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Estimator samples per pixel
    pub samples_per_pixel: u32,
    /// Worker threads; 0 uses the available parallelism
    pub threads: usize,
    /// Base seed mixed with each pixel index
    pub seed: u64,
    pub integrator: Integrator,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            samples_per_pixel: 4,
            threads: 0,
            seed: 0,
            integrator: Integrator::Bdpt,
        }
    }
}

impl RenderConfig {
    /// Reject configurations that cannot produce an image.
    pub fn validate(&self, camera: &Camera) -> RenderResult<()> {
        if camera.image_width == 0 || camera.image_height == 0 {
            return Err(RenderError::InvalidResolution {
                width: camera.image_width,
                height: camera.image_height,
            });
        }
        if self.samples_per_pixel == 0 {
            return Err(RenderError::ZeroSamples);
        }
        Ok(())
    }

    /// Number of workers to run.
    pub fn thread_count(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

/// Counters gathered while rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Path vertices generated by camera and light walks
    pub vertices: u64,
    /// Estimator samples taken
    pub samples: u64,
    pub elapsed: Duration,
}

impl RenderStats {
    pub fn merge(&mut self, other: &RenderStats) {
        self.vertices += other.vertices;
        self.samples += other.samples;
    }

    /// Path vertices per second, in millions.
    pub fn mega_vertices_per_second(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.vertices as f64 / seconds / 1e6
        } else {
            0.0
        }
    }
}

/// Everything a finished render produced.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    /// Per-pixel averages of the camera-side strategies
    pub framebuffer: ImageBuffer,
    /// Summed light-tracing contributions, not yet divided by the sample count
    pub splats: SplatBuffer,
    pub samples_per_pixel: u32,
    pub stats: RenderStats,
}

impl RenderOutput {
    /// Final linear image: `framebuffer + splats / spp`.
    pub fn resolve(&self) -> ImageBuffer {
        let scale = 1.0 / self.samples_per_pixel.max(1) as f32;
        let mut image = self.splats.to_image(scale);
        for (out, color) in image.pixels.iter_mut().zip(&self.framebuffer.pixels) {
            *out += *color;
        }
        image
    }
}

/// Seed for the generator of one pixel.
pub fn pixel_seed(seed: u64, pixel: u64) -> u64 {
    // SplitMix64 finalizer over the combined key
    let mut z = seed
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(pixel)
        .wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Render a single pixel with multi-sampling.
///
/// Returns the averaged estimate and the number of path vertices generated.
pub fn render_pixel(
    estimator: &dyn Estimator,
    x: u32,
    y: u32,
    config: &RenderConfig,
    splats: &mut SplatBuffer,
) -> (Color, u64) {
    let camera = estimator.camera();
    let index = y as u64 * camera.image_width as u64 + x as u64;
    let mut rng = StdRng::seed_from_u64(pixel_seed(config.seed, index));

    let mut pixel_color = Color::ZERO;
    let mut vertices = 0;
    for _ in 0..config.samples_per_pixel {
        let ray = camera.get_ray(x, y, &mut rng);
        let estimate = estimator.estimate(&ray, &mut rng, splats);
        pixel_color += estimate.radiance;
        vertices += estimate.vertices as u64;
    }

    (pixel_color / config.samples_per_pixel as f32, vertices)
}

/// Render the scene as seen by `camera`.
///
/// The result is identical for every thread count.
pub fn render(scene: &Scene, camera: &Camera, config: &RenderConfig) -> RenderResult<RenderOutput> {
    config.validate(camera)?;

    let threads = config.thread_count();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()?;

    let (width, height) = (camera.image_width, camera.image_height);
    log::info!(
        "Rendering {}x{} at {} spp on {} threads ({:?})",
        width,
        height,
        config.samples_per_pixel,
        threads,
        config.integrator
    );

    let start = Instant::now();
    let bdpt = Bdpt::new(scene, camera);
    let path_tracer = PathTracer::new(scene, camera);
    let estimator: &dyn Estimator = match config.integrator {
        Integrator::Bdpt => &bdpt,
        Integrator::PathTracer => &path_tracer,
    };
    let partitions = partition(pixel_count(width, height), threads);
    let results: Vec<WorkerResult> = pool.install(|| {
        partitions
            .par_iter()
            .map(|p| render_partition(estimator, *p, config))
            .collect()
    });

    let mut framebuffer = ImageBuffer::new(width, height);
    let mut splats = SplatBuffer::new(width, height);
    let mut stats = RenderStats::default();
    for result in &results {
        for (index, color) in result.partition.pixels().zip(&result.pixels) {
            framebuffer.pixels[index] = *color;
        }
        splats.merge(&result.splats);
        stats.merge(&result.stats);
    }
    stats.elapsed = start.elapsed();

    log::info!(
        "Rendered in {:.2?}: {} vertices ({:.2} M/s)",
        stats.elapsed,
        stats.vertices,
        stats.mega_vertices_per_second()
    );

    Ok(RenderOutput {
        framebuffer,
        splats,
        samples_per_pixel: config.samples_per_pixel,
        stats,
    })
}
