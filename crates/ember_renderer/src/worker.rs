//! Strided pixel partitions for parallel rendering.
//!
//! Worker `w` of `N` owns pixels `w, w + N, w + 2N, ...` in row-major
//! order. Interleaving spreads expensive regions of the image evenly over
//! the workers, and since every pixel draws from its own generator the
//! partitioning never changes the result.

use crate::film::SplatBuffer;
use crate::integrator::Estimator;
use crate::renderer::{render_pixel, RenderConfig, RenderStats};
use crate::Color;
use std::time::Instant;

/// The pixels one worker is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPartition {
    /// Index of this worker
    pub worker: usize,
    /// Total number of workers
    pub workers: usize,
    /// Pixels in the whole image
    pub pixel_count: usize,
}

impl WorkerPartition {
    pub fn new(worker: usize, workers: usize, pixel_count: usize) -> Self {
        debug_assert!(worker < workers);
        Self {
            worker,
            workers,
            pixel_count,
        }
    }

    /// Row-major indices of the pixels in this partition, ascending.
    pub fn pixels(&self) -> impl Iterator<Item = usize> {
        (self.worker..self.pixel_count).step_by(self.workers.max(1))
    }

    /// Number of pixels in this partition.
    pub fn len(&self) -> usize {
        if self.worker >= self.pixel_count {
            0
        } else {
            (self.pixel_count - self.worker).div_ceil(self.workers.max(1))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split an image of `pixel_count` pixels among `workers` workers.
pub fn partition(pixel_count: usize, workers: usize) -> Vec<WorkerPartition> {
    let workers = workers.max(1);
    (0..workers)
        .map(|w| WorkerPartition::new(w, workers, pixel_count))
        .collect()
}

/// Result of rendering a partition.
#[derive(Debug, Clone)]
pub struct WorkerResult {
    /// The partition that was rendered
    pub partition: WorkerPartition,
    /// Pixel estimates in the order of [`WorkerPartition::pixels`]
    pub pixels: Vec<Color>,
    /// Light-tracing contributions landing anywhere on the film
    pub splats: SplatBuffer,
    pub stats: RenderStats,
}

/// Render every pixel of a partition.
pub fn render_partition(
    estimator: &dyn Estimator,
    partition: WorkerPartition,
    config: &RenderConfig,
) -> WorkerResult {
    let camera = estimator.camera();
    let width = camera.image_width;
    let mut splats = SplatBuffer::new(camera.image_width, camera.image_height);
    let mut pixels = Vec::with_capacity(partition.len());
    let mut stats = RenderStats::default();
    let start = Instant::now();

    for index in partition.pixels() {
        let x = (index % width as usize) as u32;
        let y = (index / width as usize) as u32;
        let (color, vertices) = render_pixel(estimator, x, y, config, &mut splats);
        pixels.push(color);
        stats.vertices += vertices;
        stats.samples += config.samples_per_pixel as u64;
    }

    stats.elapsed = start.elapsed();
    log::debug!(
        "Worker {}/{}: {} pixels, {} vertices in {:.2?}",
        partition.worker + 1,
        partition.workers,
        pixels.len(),
        stats.vertices,
        stats.elapsed
    );

    WorkerResult {
        partition,
        pixels,
        splats,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_covers_every_pixel_once() {
        let parts = partition(103, 8);
        assert_eq!(parts.len(), 8);

        let mut seen = vec![0; 103];
        for p in &parts {
            let pixels: Vec<usize> = p.pixels().collect();
            assert_eq!(pixels.len(), p.len());
            for i in pixels {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_partition_is_strided() {
        let parts = partition(10, 3);
        assert_eq!(parts[0].pixels().collect::<Vec<_>>(), vec![0, 3, 6, 9]);
        assert_eq!(parts[1].pixels().collect::<Vec<_>>(), vec![1, 4, 7]);
        assert_eq!(parts[2].pixels().collect::<Vec<_>>(), vec![2, 5, 8]);
    }

    #[test]
    fn test_more_workers_than_pixels() {
        let parts = partition(2, 4);
        assert_eq!(parts[1].len(), 1);
        assert!(parts[2].is_empty());
        assert_eq!(parts[3].pixels().count(), 0);
        assert_eq!(partition(5, 0).len(), 1);
    }
}
