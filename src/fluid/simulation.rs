//! Fluid simulation driver.
//!
//! [`Sph`] owns the parameters, the particle store and the spatial grid and
//! runs one full SPH step per [`Sph::update`]:
//!
//! 1. hash and sort particles into grid order
//! 2. gather position and velocity into the sorted buffers
//! 3. density and pressure
//! 4. pressure, viscosity and external forces
//! 5. integrate and resolve collisions into the back buffers, then flip
//! 6. scatter results back to the stable slots and refresh colors
//!
//! Every phase finishes before the next one starts. Nothing outside `Sph`
//! can observe the buffers in the middle of a step.

use bevy::prelude::*;

use super::density::{self, DensityField};
use super::error::{Result, SphError};
use super::forces::ForceInput;
use super::integrator;
use super::neighbors::NeighborQuery;
use super::params::{SphParams, SphParamsUniform};
use super::particle::{cube_lattice, lattice_counts, ParticleStore};
use super::render::{refresh_colors, WATER_COLOR};
use super::spatial::{GridConfig, SpatialGrid};

/// Counters from one step, mostly for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Particles outside the grid, clamped into border cells.
    pub clamped: usize,
    /// Densities raised to the floor.
    pub floored_densities: usize,
    /// Non-finite forces replaced by zero.
    pub zeroed_forces: usize,
    /// Wall collisions resolved.
    pub collisions: usize,
    /// Integration results discarded as non-finite.
    pub rejected: usize,
}

/// SPH fluid simulation.
#[derive(Resource, Debug)]
pub struct Sph {
    params: SphParams,
    store: ParticleStore,
    grid: SpatialGrid,
    frame: u64,
}

impl Sph {
    /// Validate `params` and allocate every buffer for `params.capacity`
    /// particles.
    pub fn new(params: SphParams) -> Result<Self> {
        params.validate()?;
        warn_if_grid_too_small(&params);

        let grid = SpatialGrid::new(GridConfig::from_params(&params), params.capacity);
        let store = ParticleStore::with_capacity(params.capacity);

        info!(
            "SPH initialized: capacity {}, h = {}, {}^3 grid cells",
            params.capacity,
            params.interaction_radius,
            params.grid_resolution().x
        );

        Ok(Self {
            params,
            store,
            grid,
            frame: 0,
        })
    }

    /// Add one particle at rest.
    pub fn add_particle(&mut self, position: Vec3) -> Result<usize> {
        self.add_particle_with_velocity(position, Vec3::ZERO)
    }

    /// Add one particle with an initial velocity. Returns its slot.
    pub fn add_particle_with_velocity(&mut self, position: Vec3, velocity: Vec3) -> Result<usize> {
        self.store.push(position, velocity, WATER_COLOR)
    }

    /// Fill the cuboid `center ± size / 2` with particles at rest, one
    /// particle radius apart.
    ///
    /// Either the whole cube is added or, when it would not fit, nothing is.
    /// Returns the number of particles added.
    pub fn generate_particle_cube(&mut self, center: Vec3, size: Vec3) -> Result<usize> {
        if !center.is_finite() || !size.is_finite() {
            return Err(SphError::InvalidParticle(format!(
                "cube center {center} and size {size} must be finite"
            )));
        }
        let spacing = self.params.particle_radius;
        let counts = lattice_counts(size, spacing);
        // Saturates so an oversized cube is reported as a capacity error.
        let count = (counts.x as usize)
            .checked_mul(counts.y as usize)
            .and_then(|xy| xy.checked_mul(counts.z as usize))
            .unwrap_or(usize::MAX);
        self.store.reserve(count)?;

        for position in cube_lattice(center, size, spacing) {
            self.store.push(position, Vec3::ZERO, WATER_COLOR)?;
        }

        debug!(
            "generated {}x{}x{} particle cube at {center}, {} particles total",
            counts.x,
            counts.y,
            counts.z,
            self.store.len()
        );
        Ok(count)
    }

    /// Advance the simulation by one timestep.
    pub fn update(&mut self) -> StepStats {
        let n = self.store.len();
        if n == 0 {
            return StepStats::default();
        }

        let Self {
            params,
            store,
            grid,
            frame,
        } = self;
        let params = &*params;

        let build = grid.build(&store.position);
        let grid = &*grid;

        let sorted = &mut store.sorted;
        sorted.resize(n);
        grid.gather(&store.position, sorted.position.front_mut(), |p| {
            Vec3::from_slice(p)
        });
        grid.gather(&store.velocity, sorted.velocity.front_mut(), |v| {
            Vec3::from_array(*v)
        });

        let kernels = params.kernels();
        let query = NeighborQuery::new(grid, sorted.position.front(), params.interaction_radius);

        let floored_densities = density::compute(
            &query,
            &kernels,
            params,
            &mut sorted.density,
            &mut sorted.pressure,
        );

        let input = ForceInput {
            query,
            velocities: sorted.velocity.front(),
            field: DensityField {
                density: &sorted.density,
                pressure: &sorted.pressure,
            },
            kernels: &kernels,
            params,
        };
        let zeroed_forces = input.compute(&mut sorted.force);

        let (positions, next_positions) = sorted.position.split();
        let (velocities, next_velocities) = sorted.velocity.split();
        let integration = integrator::advance(
            positions,
            velocities,
            &sorted.density,
            &sorted.force,
            params,
            next_positions,
            next_velocities,
        );
        sorted.position.flip();
        sorted.velocity.flip();

        grid.scatter(sorted.position.front(), &mut store.position, |p| {
            p.extend(1.0).to_array()
        });
        grid.scatter(sorted.velocity.front(), &mut store.velocity, |v| v.to_array());
        grid.scatter(&sorted.density, &mut store.density, |d| *d);
        grid.scatter(&sorted.pressure, &mut store.pressure, |p| *p);
        grid.scatter(&sorted.force, &mut store.force, |f| f.to_array());

        refresh_colors(params.color_mode, &store.velocity, &mut store.color);

        *frame += 1;

        let stats = StepStats {
            clamped: build.clamped,
            floored_densities,
            zeroed_forces,
            collisions: integration.collisions,
            rejected: integration.rejected,
        };
        if stats.floored_densities > 0 || stats.zeroed_forces > 0 || stats.rejected > 0 {
            debug!(
                "frame {}: recovered {} densities, {} forces, {} integrations",
                frame, stats.floored_densities, stats.zeroed_forces, stats.rejected
            );
        }
        trace!(
            "frame {}: {} particles in {} cells, {} clamped, {} collisions",
            frame,
            n,
            build.occupied_cells,
            stats.clamped,
            stats.collisions
        );
        stats
    }

    pub fn params(&self) -> &SphParams {
        &self.params
    }

    /// Replace every parameter at once.
    ///
    /// Capacity is fixed at construction and must not change.
    pub fn set_params(&mut self, params: SphParams) -> Result<()> {
        params.validate()?;
        if params.capacity != self.store.capacity() {
            return Err(SphError::InvalidParams(format!(
                "capacity is fixed at {}, got {}",
                self.store.capacity(),
                params.capacity
            )));
        }
        warn_if_grid_too_small(&params);

        let config = GridConfig::from_params(&params);
        if config != *self.grid.config() {
            self.grid.reconfigure(config);
        }
        self.params = params;
        Ok(())
    }

    /// Per-step constants in GPU uniform layout.
    pub fn params_uniform(&self) -> SphParamsUniform {
        SphParamsUniform::from_params(&self.params, self.store.len() as u32)
    }

    pub fn gas_stiffness(&self) -> f32 {
        self.params.gas_stiffness
    }

    pub fn set_gas_stiffness(&mut self, value: f32) {
        self.params.gas_stiffness = value;
    }

    pub fn rest_density(&self) -> f32 {
        self.params.rest_density
    }

    pub fn set_rest_density(&mut self, value: f32) {
        self.params.rest_density = value;
    }

    pub fn particle_mass(&self) -> f32 {
        self.params.particle_mass
    }

    pub fn set_particle_mass(&mut self, value: f32) {
        self.params.particle_mass = value;
    }

    pub fn viscosity(&self) -> f32 {
        self.params.viscosity
    }

    pub fn set_viscosity(&mut self, value: f32) {
        self.params.viscosity = value;
    }

    pub fn surface_tension(&self) -> f32 {
        self.params.surface_tension
    }

    pub fn set_surface_tension(&mut self, value: f32) {
        self.params.surface_tension = value;
    }

    pub fn timestep(&self) -> f32 {
        self.params.timestep
    }

    pub fn set_timestep(&mut self, value: f32) {
        self.params.timestep = value;
    }

    pub fn particle_radius(&self) -> f32 {
        self.params.particle_radius
    }

    pub fn set_particle_radius(&mut self, value: f32) {
        self.params.particle_radius = value;
    }

    pub fn interaction_radius(&self) -> f32 {
        self.params.interaction_radius
    }

    /// Change the smoothing length `h`. The grid cell size follows it.
    pub fn set_interaction_radius(&mut self, h: f32) -> Result<()> {
        let params = self.params.clone().with_interaction_radius(h);
        self.set_params(params)
    }

    /// Positions as `x, y, z, 1` per particle.
    pub fn positions(&self) -> &[f32] {
        bytemuck::cast_slice(self.store.positions())
    }

    /// Velocities as `x, y, z` per particle.
    pub fn velocities(&self) -> &[f32] {
        bytemuck::cast_slice(self.store.velocities())
    }

    /// Colors as `r, g, b, a` per particle.
    pub fn colors(&self) -> &[f32] {
        bytemuck::cast_slice(self.store.colors())
    }

    pub fn densities(&self) -> &[f32] {
        self.store.densities()
    }

    pub fn pressures(&self) -> &[f32] {
        self.store.pressures()
    }

    /// Forces from the last step as `x, y, z` per particle.
    pub fn forces(&self) -> &[f32] {
        bytemuck::cast_slice(self.store.forces())
    }

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    pub fn particle_count(&self) -> usize {
        self.store.len()
    }

    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Number of completed steps.
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

fn warn_if_grid_too_small(params: &SphParams) {
    if !params.grid_covers_boundary() {
        warn!(
            "grid extent {} does not cover the container; particles beyond it share border cells",
            params.grid_extent()
        );
    }
}
