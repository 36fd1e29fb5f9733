//! Render setup errors.
//!
//! Numerical degeneracies inside the estimator never surface here; they
//! degrade to zero contributions instead.

use thiserror::Error;

/// Errors that can occur before rendering starts.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    #[error("Samples per pixel must be at least 1")]
    ZeroSamples,

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type RenderResult<T> = Result<T, RenderError>;
