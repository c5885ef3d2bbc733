//! # Trajectory module
//!
//! A trajectory is an immutable curve giving a target joint pose for each value of its time
//! parameter in `[0, duration)`. The control loop only relies on the [`Trajectory`] trait, the
//! piecewise polynomial trajectory is the concrete type loaded from trajectory files.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod piecewise;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::path::{Path, PathBuf};

use crate::pose::JointPose;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use piecewise::{Chunk, PiecewisePolyTraj, Polynomial};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A time parametrised joint space curve.
pub trait Trajectory {
    /// Number of joints in each pose produced by the trajectory.
    fn dimension(&self) -> usize;

    /// Length of the trajectory's time parameter.
    ///
    /// Units: seconds
    fn duration(&self) -> f64;

    /// Target pose at the given time parameter. Must return exactly `dimension()` values.
    fn eval(&self, s: f64) -> JointPose;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TrajError {
    #[error("The trajectory contains no chunks")]
    EmptyTrajectory,

    #[error("Line {line}: {reason}")]
    ParseError { line: usize, reason: String },

    #[error("Chunk {chunk} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        chunk: usize,
        expected: usize,
        found: usize,
    },

    #[error("Chunk {chunk} has an invalid duration ({duration})")]
    InvalidDuration { chunk: usize, duration: f64 },

    #[error("Chunk {chunk} has no polynomials")]
    ZeroDimension { chunk: usize },

    #[error("Retime coefficient must be finite and positive, got {0}")]
    InvalidRetimeCoef(f64),

    #[error("Could not read the trajectory file {0:?}: {1}")]
    FileReadError(PathBuf, std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Load a piecewise polynomial trajectory from a trajectory file.
pub fn load_traj_file<P: AsRef<Path>>(path: P) -> Result<PiecewisePolyTraj, TrajError> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|e| TrajError::FileReadError(path.as_ref().to_path_buf(), e))?;

    text.parse()
}
