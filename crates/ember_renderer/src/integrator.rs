//! Integrator selection and the interface the render loop drives.

use crate::bdpt::{Bdpt, Estimate};
use crate::film::SplatBuffer;
use crate::path_tracer::PathTracer;
use crate::Camera;
use ember_math::Ray;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Light transport algorithm used for a render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integrator {
    /// Bidirectional path tracing, including light-tracing splats
    #[default]
    Bdpt,
    /// Unidirectional path tracing with next-event estimation
    PathTracer,
}

/// Per-ray radiance estimation shared by every worker.
pub trait Estimator: Sync {
    fn camera(&self) -> &Camera;

    /// Radiance arriving along `ray`. Contributions that belong to some other
    /// pixel are added to `splats` instead.
    fn estimate(&self, ray: &Ray, rng: &mut dyn RngCore, splats: &mut SplatBuffer) -> Estimate;
}

impl Estimator for Bdpt<'_> {
    fn camera(&self) -> &Camera {
        Bdpt::camera(self)
    }

    fn estimate(&self, ray: &Ray, rng: &mut dyn RngCore, splats: &mut SplatBuffer) -> Estimate {
        Bdpt::estimate(self, ray, rng, splats)
    }
}

impl Estimator for PathTracer<'_> {
    fn camera(&self) -> &Camera {
        PathTracer::camera(self)
    }

    fn estimate(&self, ray: &Ray, rng: &mut dyn RngCore, _splats: &mut SplatBuffer) -> Estimate {
        PathTracer::estimate(self, ray, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrator_names() {
        assert_eq!(Integrator::default(), Integrator::Bdpt);
        assert_eq!(serde_json::to_string(&Integrator::PathTracer).unwrap(), "\"path_tracer\"");
        let parsed: Integrator = serde_json::from_str("\"bdpt\"").unwrap();
        assert_eq!(parsed, Integrator::Bdpt);
        assert!(serde_json::from_str::<Integrator>("\"photon\"").is_err());
    }
}
