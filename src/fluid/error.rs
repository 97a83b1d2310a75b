//! Error type for operations that can fail at the API boundary.
//!
//! Numerical trouble inside a step (tiny densities, non-finite forces, particles
//! outside the grid) is recovered in place and never surfaces here.

/// Errors reported to the host application.
#[derive(Debug, Clone, PartialEq)]
pub enum SphError {
    /// A particle-add request would go past the store capacity.
    CapacityExceeded {
        /// Particles the request wanted to add.
        requested: usize,
        /// Free slots left at the time of the request.
        available: usize,
        /// Total capacity of the store.
        capacity: usize,
    },
    /// Simulation parameters failed validation.
    InvalidParams(String),
    /// A particle-add request carried a NaN or infinite value.
    InvalidParticle(String),
}

impl std::fmt::Display for SphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SphError::CapacityExceeded {
                requested,
                available,
                capacity,
            } => write!(
                f,
                "cannot add {requested} particle(s): {available} of {capacity} slots free"
            ),
            SphError::InvalidParams(reason) => write!(f, "invalid simulation parameters: {reason}"),
            SphError::InvalidParticle(reason) => write!(f, "invalid particle: {reason}"),
        }
    }
}

impl std::error::Error for SphError {}

pub type Result<T> = std::result::Result<T, SphError>;
