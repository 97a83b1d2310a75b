//! Spira SPH - CPU particle fluid simulation for Bevy
//!
//! This library provides a Smoothed Particle Hydrodynamics (SPH) solver with
//! grid-sorted neighbor search, parallelized with Rayon.
//!
//! # Features
//!
//! - **SPH Simulation**: Müller-style density, pressure, viscosity and surface tension
//! - **Sorted Grid**: Morton-hashed uniform grid, neighbors read from contiguous ranges
//! - **Boundary Handling**: Box and sphere containers with damped reflection
//! - **Flat Buffers**: Positions, velocities and colors ready to upload to a renderer
//! - **Easy Integration**: Simple Bevy plugin interface
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use bevy::prelude::*;
//! use spira_sph::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(SphPlugin::new(SphParams::water()))
//!         .add_systems(Startup, setup)
//!         .run();
//! }
//!
//! fn setup(mut sph: ResMut<Sph>) {
//!     // Dam break: a block of water against one wall.
//!     let _ = sph.generate_particle_cube(Vec3::new(-0.25, 0.2, 0.0), Vec3::new(0.25, 0.4, 0.6));
//! }
//! ```
//!
//! # Architecture
//!
//! - [`fluid`]: Core fluid simulation module
//!   - [`fluid::params`]: Simulation parameters
//!   - [`fluid::kernels`]: Smoothing kernels
//!   - [`fluid::spatial`]: Sorted spatial grid
//!   - [`fluid::neighbors`]: Neighbor queries
//!   - [`fluid::density`], [`fluid::forces`], [`fluid::integrator`]: Step phases
//!   - [`fluid::boundary`]: Boundary handling
//!   - [`fluid::particle`]: Particle storage
//!   - [`fluid::simulation`]: Simulation driver
//!   - [`fluid::render`]: Visualization colors
//!   - [`fluid::plugin`]: Bevy plugin

pub mod fluid;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::fluid::prelude::*;
}
