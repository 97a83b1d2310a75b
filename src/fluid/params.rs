//! Fluid simulation parameters.
//!
//! These parameters control the behavior of the solver. Changes made through
//! [`crate::fluid::simulation::Sph`] take effect on the next step.

use bevy::prelude::*;

use super::boundary::Boundary;
use super::error::{Result, SphError};
use super::kernels::SmoothingKernels;
use super::render::ColorMode;

/// Default number of particle slots.
pub const DEFAULT_CAPACITY: usize = 100_000;

/// Largest accepted `grid_sort_bits`: 2^24 cells, 128 MiB of cell ranges.
pub const MAX_GRID_SORT_BITS: u32 = 24;

/// Parameters controlling the fluid simulation behavior.
///
/// The defaults describe water at room temperature with a smoothing length
/// of 4.57 cm (Kelager, "Lagrangian Fluid Dynamics Using Smoothed Particle
/// Hydrodynamics", 2006).
#[derive(Clone, Debug, PartialEq)]
pub struct SphParams {
    /// Gas stiffness `k` of the equation of state `p = k (ρ - ρ₀)`.
    pub gas_stiffness: f32,

    /// Rest density `ρ₀` in kg/m³.
    pub rest_density: f32,

    /// Mass of every particle in kg.
    pub particle_mass: f32,

    /// Particle radius used for collisions.
    /// Cube generation also places particles one radius apart.
    pub particle_radius: f32,

    /// Smoothing length `h`. Also the grid cell size.
    pub interaction_radius: f32,

    /// Fixed integration timestep in seconds.
    pub timestep: f32,

    /// Dynamic viscosity coefficient `μ`.
    pub viscosity: f32,

    /// Surface tension coefficient `σ`.
    pub surface_tension: f32,

    /// Minimum color-field gradient magnitude for the tension force to apply.
    /// Keeps interior particles, where the normal is noise, out of it.
    pub surface_threshold: f32,

    /// Gravity acceleration vector.
    pub gravity: Vec3,

    /// Container the fluid lives in. Its bounding box also anchors the grid.
    pub boundary: Boundary,

    /// Fraction of the inbound normal velocity kept after a wall hit.
    /// 0.0 = fully inelastic, 1.0 = fully elastic.
    pub boundary_damping: f32,

    /// Penalty stiffness pushing particles within one radius of a wall.
    /// Zero disables the penalty force.
    pub boundary_stiffness: f32,

    /// Densities below this (or non-finite) are replaced by it.
    pub density_floor: f32,

    /// Maximum number of particles.
    pub capacity: usize,

    /// Total width of a cell hash in bits, split evenly over three axes.
    /// 18 bits gives a 64³ grid. At most [`MAX_GRID_SORT_BITS`].
    pub grid_sort_bits: u32,

    /// How the color buffer is refreshed after each step.
    pub color_mode: ColorMode,
}

impl Default for SphParams {
    fn default() -> Self {
        Self {
            gas_stiffness: 3.0,
            rest_density: 998.29,
            particle_mass: 0.02,
            particle_radius: 0.0272,
            interaction_radius: 0.0457,
            timestep: 0.01,
            viscosity: 3.5,
            surface_tension: 0.0728,
            surface_threshold: 7.065,
            gravity: Vec3::new(0.0, -9.82, 0.0),
            boundary: Boundary::default(),
            boundary_damping: 0.5,
            boundary_stiffness: 0.0,
            density_floor: 1e-6,
            capacity: DEFAULT_CAPACITY,
            grid_sort_bits: 18,
            color_mode: ColorMode::default(),
        }
    }
}

impl SphParams {
    /// Parameters for water.
    pub fn water() -> Self {
        Self::default()
    }

    /// Parameters for a thick, mucus-like fluid.
    pub fn viscous() -> Self {
        Self {
            rest_density: 1000.0,
            gas_stiffness: 5.0,
            viscosity: 36.0,
            surface_tension: 6.0,
            surface_threshold: 5.0,
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_interaction_radius(mut self, h: f32) -> Self {
        self.interaction_radius = h;
        self
    }

    pub fn with_particle_radius(mut self, radius: f32) -> Self {
        self.particle_radius = radius;
        self
    }

    pub fn with_timestep(mut self, timestep: f32) -> Self {
        self.timestep = timestep;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_grid_sort_bits(mut self, bits: u32) -> Self {
        self.grid_sort_bits = bits;
        self
    }

    pub fn with_color_mode(mut self, mode: ColorMode) -> Self {
        self.color_mode = mode;
        self
    }

    /// Grid cell size. Equal to the smoothing length so that the 27
    /// surrounding cells always contain every neighbor.
    pub fn cell_size(&self) -> f32 {
        self.interaction_radius
    }

    /// Number of hash bits per axis.
    pub fn bits_per_axis(&self) -> u32 {
        self.grid_sort_bits / 3
    }

    /// Number of grid cells along each axis.
    pub fn grid_resolution(&self) -> UVec3 {
        UVec3::splat(1 << self.bits_per_axis())
    }

    /// Minimum corner of the grid.
    pub fn grid_origin(&self) -> Vec3 {
        self.boundary.aabb().0
    }

    /// World-space size of the whole grid.
    pub fn grid_extent(&self) -> Vec3 {
        self.grid_resolution().as_vec3() * self.cell_size()
    }

    /// Whether the container fits inside the grid. Particles outside the
    /// grid are clamped to border cells, which crowds those cells but never
    /// hides a neighbor.
    pub fn grid_covers_boundary(&self) -> bool {
        let (min, max) = self.boundary.aabb();
        (max - min).cmple(self.grid_extent()).all()
    }

    /// Checks the invariants the solver relies on.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("rest_density", self.rest_density),
            ("particle_mass", self.particle_mass),
            ("particle_radius", self.particle_radius),
            ("interaction_radius", self.interaction_radius),
            ("timestep", self.timestep),
            ("density_floor", self.density_floor),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SphError::InvalidParams(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }

        let non_negative = [
            ("gas_stiffness", self.gas_stiffness),
            ("viscosity", self.viscosity),
            ("surface_tension", self.surface_tension),
            ("surface_threshold", self.surface_threshold),
            ("boundary_stiffness", self.boundary_stiffness),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SphError::InvalidParams(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.boundary_damping) {
            return Err(SphError::InvalidParams(format!(
                "boundary_damping must be in [0, 1], got {}",
                self.boundary_damping
            )));
        }
        if !self.gravity.is_finite() {
            return Err(SphError::InvalidParams("gravity must be finite".into()));
        }
        if self.capacity == 0 || self.capacity > u32::MAX as usize {
            return Err(SphError::InvalidParams(format!(
                "capacity must be in 1..={}, got {}",
                u32::MAX,
                self.capacity
            )));
        }
        if self.grid_sort_bits % 3 != 0 || !(3..=MAX_GRID_SORT_BITS).contains(&self.grid_sort_bits) {
            return Err(SphError::InvalidParams(format!(
                "grid_sort_bits must be a multiple of 3 in 3..={MAX_GRID_SORT_BITS}, got {}",
                self.grid_sort_bits
            )));
        }
        self.boundary.validate(self.particle_radius)
    }

    /// Kernel constants for the current smoothing length.
    pub fn kernels(&self) -> SmoothingKernels {
        SmoothingKernels::new(self.interaction_radius)
    }
}

/// GPU-compatible uniform buffer for the per-step constants.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SphParamsUniform {
    pub gas_stiffness: f32,
    pub rest_density: f32,
    pub particle_mass: f32,
    pub particle_radius: f32,

    pub viscosity: f32,
    pub surface_tension: f32,
    pub surface_threshold: f32,
    pub timestep: f32,

    pub gravity: [f32; 3],
    pub num_particles: u32,

    pub grid_origin: [f32; 3],
    pub cell_size: f32,

    pub grid_resolution: [u32; 3],
    pub grid_sort_bits: u32,

    pub kernels: SmoothingKernels,
}

impl SphParamsUniform {
    pub fn from_params(params: &SphParams, num_particles: u32) -> Self {
        Self {
            gas_stiffness: params.gas_stiffness,
            rest_density: params.rest_density,
            particle_mass: params.particle_mass,
            particle_radius: params.particle_radius,

            viscosity: params.viscosity,
            surface_tension: params.surface_tension,
            surface_threshold: params.surface_threshold,
            timestep: params.timestep,

            gravity: params.gravity.to_array(),
            num_particles,

            grid_origin: params.grid_origin().to_array(),
            cell_size: params.cell_size(),

            grid_resolution: params.grid_resolution().to_array(),
            grid_sort_bits: params.grid_sort_bits,

            kernels: params.kernels(),
        }
    }
}
