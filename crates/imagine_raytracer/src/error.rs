//! Error types for render configuration and setup.
//!
//! Nothing on the per-ray path returns an error: degenerate geometry
//! resolves to a fallback value. Everything here is raised before the
//! first render task is dispatched.

use thiserror::Error;

/// Errors that can occur while configuring or starting a render.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid sample count for {name}: {value} (must be at least 1)")]
    InvalidSampleCount { name: &'static str, value: u32 },

    #[error("Invalid image size: {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },

    #[error("Invalid render setting: {0}")]
    InvalidSetting(String),

    #[error("Integrator used before initialise()")]
    NotInitialised,

    #[error("Failed to build render thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to parse render settings: {0}")]
    Config(#[from] serde_json::Error),
}

pub type RenderResult<T> = Result<T, RenderError>;
