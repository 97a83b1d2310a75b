//! Smoothed Particle Hydrodynamics (SPH) fluid simulation module for Bevy.
//!
//! Weakly compressible SPH after Müller et al., "Particle-Based Fluid
//! Simulation for Interactive Applications" (2003). Neighbor search uses a
//! uniform grid with particles sorted by cell hash every step, so each
//! neighborhood is a handful of contiguous ranges.
//!
//! # Architecture
//!
//! - [`params`]: Simulation parameters and the GPU uniform
//! - [`kernels`]: Poly6, spiky and viscosity smoothing kernels
//! - [`spatial`]: Grid hashing, sorting and per-cell ranges
//! - [`neighbors`]: Neighbor queries over the sorted grid
//! - [`density`]: Density and pressure pass
//! - [`forces`]: Pressure, viscosity, surface tension and gravity
//! - [`integrator`]: Time integration
//! - [`boundary`]: Container geometry and collision response
//! - [`particle`]: Particle storage
//! - [`simulation`]: The [`simulation::Sph`] driver
//! - [`render`]: Visualization colors
//! - [`plugin`]: Bevy plugin
//!
//! # Example
//!
//! ```rust,no_run
//! use bevy::prelude::*;
//! use spira_sph::fluid::prelude::*;
//!
//! let mut sph = Sph::new(SphParams::water()).unwrap();
//! sph.generate_particle_cube(Vec3::new(-0.2, 0.2, 0.0), Vec3::new(0.3, 0.4, 0.3))
//!     .unwrap();
//! for _ in 0..100 {
//!     sph.update();
//! }
//! let positions: &[f32] = sph.positions();
//! ```

pub mod boundary;
pub mod density;
pub mod error;
pub mod forces;
pub mod integrator;
pub mod kernels;
pub mod neighbors;
pub mod params;
pub mod particle;
pub mod plugin;
pub mod render;
pub mod simulation;
pub mod spatial;

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::boundary::*;
    pub use super::error::SphError;
    pub use super::params::*;
    pub use super::plugin::*;
    pub use super::render::{ColorMode, WATER_COLOR};
    pub use super::simulation::*;
}
