//! Pinhole camera for ray generation and light-path reprojection.
//!
//! The image plane sits at unit distance in front of the pinhole. Its area
//! `A` defines the camera's directional density `1 / (A cos³θ)`, which is
//! also the importance it assigns to a direction, so that primary rays
//! carry unit weight.

use crate::sampling::gen_f32;
use ember_math::{Ray, Vec2, Vec3};
use rand::RngCore;

/// Camera for generating rays into the scene.
#[derive(Clone)]
pub struct Camera {
    // Image settings
    pub image_width: u32,
    pub image_height: u32,

    // Camera positioning
    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,

    /// Vertical field of view in degrees
    vfov: f32,

    // Cached computed values (set by initialize())
    center: Vec3,
    pixel00_loc: Vec3,
    pixel_delta_u: Vec3,
    pixel_delta_v: Vec3,
    viewport_width: f32,
    viewport_height: f32,
    u: Vec3,
    v: Vec3,
    w: Vec3,
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        let mut camera = Self {
            image_width: 800,
            image_height: 450,
            look_from: Vec3::ZERO,
            look_at: Vec3::NEG_Z,
            vup: Vec3::Y,
            vfov: 90.0,
            center: Vec3::ZERO,
            pixel00_loc: Vec3::ZERO,
            pixel_delta_u: Vec3::ZERO,
            pixel_delta_v: Vec3::ZERO,
            viewport_width: 0.0,
            viewport_height: 0.0,
            u: Vec3::X,
            v: Vec3::Y,
            w: Vec3::Z,
        };
        camera.initialize();
        camera
    }

    /// Set image resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.image_width = width;
        self.image_height = height;
        self.initialize();
        self
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self.initialize();
        self
    }

    /// Set the vertical field of view in degrees.
    pub fn with_fov(mut self, vfov: f32) -> Self {
        self.vfov = vfov;
        self.initialize();
        self
    }

    fn initialize(&mut self) {
        self.center = self.look_from;

        // Viewport on the plane at unit distance
        let theta = self.vfov.to_radians();
        self.viewport_height = 2.0 * (theta / 2.0).tan();
        self.viewport_width =
            self.viewport_height * (self.image_width as f32 / self.image_height.max(1) as f32);

        // Calculate camera basis vectors
        self.w = (self.look_from - self.look_at).normalize();
        self.u = self.vup.cross(self.w).normalize();
        self.v = self.w.cross(self.u);

        // Calculate viewport vectors
        let viewport_u = self.viewport_width * self.u;
        let viewport_v = -self.viewport_height * self.v;

        self.pixel_delta_u = viewport_u / self.image_width.max(1) as f32;
        self.pixel_delta_v = viewport_v / self.image_height.max(1) as f32;

        let viewport_upper_left = self.center - self.w - viewport_u / 2.0 - viewport_v / 2.0;
        self.pixel00_loc = viewport_upper_left + 0.5 * (self.pixel_delta_u + self.pixel_delta_v);
    }

    /// Generate a ray through a uniformly jittered point of pixel (i, j).
    pub fn get_ray(&self, i: u32, j: u32, rng: &mut dyn RngCore) -> Ray {
        let offset = sample_square(rng);
        self.ray_through(i as f32 + offset.x, j as f32 + offset.y)
    }

    /// Ray through continuous pixel coordinates measured from the center of pixel (0, 0).
    pub fn ray_through(&self, x: f32, y: f32) -> Ray {
        let pixel_sample = self.pixel00_loc + x * self.pixel_delta_u + y * self.pixel_delta_v;
        Ray::new(self.center, (pixel_sample - self.center).normalize())
    }

    pub fn position(&self) -> Vec3 {
        self.center
    }

    /// Viewing direction.
    pub fn forward(&self) -> Vec3 {
        -self.w
    }

    /// Area of the image plane at unit distance.
    pub fn film_area(&self) -> f32 {
        self.viewport_width * self.viewport_height
    }

    /// Where a unit direction from the pinhole crosses the unit-distance
    /// plane, in (u, v) plane coordinates. `None` behind the camera.
    fn plane_coords(&self, dir: Vec3) -> Option<(Vec2, f32)> {
        let cos_theta = dir.dot(self.forward());
        if cos_theta <= 0.0 {
            return None;
        }
        let on_plane = dir / cos_theta;
        Some((Vec2::new(on_plane.dot(self.u), on_plane.dot(self.v)), cos_theta))
    }

    /// Solid-angle density of a primary ray direction; zero outside the frustum.
    pub fn direction_pdf(&self, dir: Vec3) -> f32 {
        let Some((p, cos_theta)) = self.plane_coords(dir) else {
            return 0.0;
        };
        if p.x.abs() > 0.5 * self.viewport_width || p.y.abs() > 0.5 * self.viewport_height {
            return 0.0;
        }
        1.0 / (self.film_area() * cos_theta * cos_theta * cos_theta)
    }

    /// Importance emitted along `dir`; equal to the directional density.
    pub fn importance(&self, dir: Vec3) -> f32 {
        self.direction_pdf(dir)
    }

    /// Continuous raster coordinates (x right, y down, pixel (i, j) covering
    /// `[i, i+1) x [j, j+1)`) of the direction `dir` from the pinhole.
    pub fn raster_position(&self, dir: Vec3) -> Option<Vec2> {
        let (p, _) = self.plane_coords(dir)?;
        let x = (p.x / self.viewport_width + 0.5) * self.image_width as f32;
        let y = (0.5 - p.y / self.viewport_height) * self.image_height as f32;

        let inside = (0.0..self.image_width as f32).contains(&x)
            && (0.0..self.image_height as f32).contains(&y);
        inside.then_some(Vec2::new(x, y))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample a random point in the unit square [-0.5, 0.5] x [-0.5, 0.5].
fn sample_square(rng: &mut dyn RngCore) -> Vec2 {
    Vec2::new(gen_f32(rng) - 0.5, gen_f32(rng) - 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn test_camera() -> Camera {
        Camera::new()
            .with_resolution(64, 48)
            .with_position(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 2.0, 0.0), Vec3::Y)
            .with_fov(60.0)
    }

    #[test]
    fn test_camera_basis() {
        let camera = test_camera();
        assert_eq!(camera.position(), Vec3::new(1.0, 2.0, 3.0));
        assert!((camera.forward() - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn test_raster_round_trip() {
        let camera = test_camera();
        let mut rng = StdRng::seed_from_u64(42);
        for (i, j) in [(0, 0), (10, 20), (63, 47), (32, 24)] {
            let ray = camera.get_ray(i, j, &mut rng);
            let raster = camera.raster_position(ray.direction).unwrap();
            assert_eq!((raster.x.floor() as u32, raster.y.floor() as u32), (i, j));
        }
        assert!(camera.raster_position(Vec3::Z).is_none());
    }

    #[test]
    fn test_direction_pdf_integrates_to_one() {
        // Summing pdf * solid angle over pixel centers covers the film once
        let camera = test_camera();
        let mut total = 0.0;
        let pixel_area = camera.film_area() / (64.0 * 48.0);
        for j in 0..48 {
            for i in 0..64 {
                let ray = camera.ray_through(i as f32, j as f32);
                let cos = ray.direction.dot(camera.forward());
                let solid_angle = pixel_area * cos * cos * cos;
                total += camera.direction_pdf(ray.direction) * solid_angle;
            }
        }
        assert!((total - 1.0).abs() < 1e-3, "total {total}");
    }

    #[test]
    fn test_direction_pdf_outside_frustum() {
        let camera = test_camera();
        assert_eq!(camera.direction_pdf(Vec3::Z), 0.0);
        assert_eq!(camera.direction_pdf(Vec3::new(5.0, 0.0, -1.0).normalize()), 0.0);
        let center = camera.direction_pdf(Vec3::NEG_Z);
        assert!((center - 1.0 / camera.film_area()).abs() < 1e-6);
        assert_eq!(camera.importance(Vec3::NEG_Z), center);
    }
}
