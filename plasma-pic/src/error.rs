//! Error types for the particle-in-cell core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PicError {
    /// Missing or inconsistent mesh, timestep or species parameters.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("grid index {index} is out of bounds for shape {shape:?}")]
    OutOfBounds { index: String, shape: Vec<usize> },

    #[error("species '{species}' particle {index} at ({x}, {y}) lies outside the domain [0, {lx}) x [0, {ly})")]
    ParticleOutOfDomain {
        species: String,
        index: usize,
        x: f64,
        y: f64,
        lx: f64,
        ly: f64,
    },

    #[error("size mismatch: expected {expected} values, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("numerical fault at step {step}: {what}")]
    NumericalFault { step: u64, what: String },

    #[error("invalid simulation state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Output(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PicError>;
