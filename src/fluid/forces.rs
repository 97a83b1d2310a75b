//! Force pass.
//!
//! Internal forces (Müller et al. 2003):
//!
//! ```text
//! f_pressure_i  = -Σ_j m (p_i + p_j) / (2 ρ_j) ∇W_spiky(x_i - x_j)
//! f_viscosity_i =  μ Σ_j m (v_j - v_i) / ρ_j ∇²W_viscosity(x_i - x_j)
//! ```
//!
//! External forces: gravity `g·m`, surface tension from the color field and
//! an optional wall penalty. Everything is read from the finalized density
//! pass; each particle only writes its own force slot.

use bevy::prelude::*;
use rayon::prelude::*;

use super::density::DensityField;
use super::kernels::SmoothingKernels;
use super::neighbors::NeighborQuery;
use super::params::SphParams;

/// Inputs of the force pass.
#[derive(Clone, Copy)]
pub struct ForceInput<'a> {
    pub query: NeighborQuery<'a>,
    pub velocities: &'a [Vec3],
    pub field: DensityField<'a>,
    pub kernels: &'a SmoothingKernels,
    pub params: &'a SphParams,
}

impl ForceInput<'_> {
    /// Pressure plus viscosity force on particle `i`.
    pub fn internal_force(&self, i: usize) -> Vec3 {
        let mass = self.params.particle_mass;
        let density = self.field.density;
        let pressure = self.field.pressure;
        let p_i = pressure[i];
        let v_i = self.velocities[i];

        let mut f_pressure = Vec3::ZERO;
        let mut f_viscosity = Vec3::ZERO;

        self.query.for_each(i, |j, r, r_sq| {
            if j == i {
                return;
            }
            let rho_j = density[j];
            let grad = self.kernels.w_pressure_grad(r, r_sq);
            f_pressure -= grad * (mass * (p_i + pressure[j]) / (2.0 * rho_j));

            let laplacian = self.kernels.w_viscosity_laplacian(r_sq);
            f_viscosity += (self.velocities[j] - v_i) * (mass / rho_j * laplacian);
        });

        f_pressure + f_viscosity * self.params.viscosity
    }

    /// Surface tension force on particle `i` from the color field curvature.
    pub fn surface_tension_force(&self, i: usize) -> Vec3 {
        let sigma = self.params.surface_tension;
        if sigma <= 0.0 {
            return Vec3::ZERO;
        }

        let mass = self.params.particle_mass;
        let density = self.field.density;
        let mut normal = Vec3::ZERO;
        let mut laplacian = 0.0;

        self.query.for_each(i, |j, r, r_sq| {
            let volume = mass / density[j];
            normal += self.kernels.w_default_grad(r, r_sq) * volume;
            laplacian += self.kernels.w_default_laplacian(r_sq) * volume;
        });

        let length = normal.length();
        if length < self.params.surface_threshold || length <= f32::EPSILON {
            return Vec3::ZERO;
        }
        -sigma * laplacian * normal / length
    }

    /// Gravity, surface tension and wall penalty on particle `i`.
    pub fn external_force(&self, i: usize) -> Vec3 {
        let params = self.params;
        let mut force = params.gravity * params.particle_mass;
        force += self.surface_tension_force(i);

        if params.boundary_stiffness > 0.0 {
            let position = self.query.positions()[i];
            force += params.boundary.penetration(position, params.particle_radius)
                * params.boundary_stiffness;
        }
        force
    }

    /// Fill `forces` with the internal forces only.
    pub fn compute_internal(&self, forces: &mut [Vec3]) {
        forces
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, f)| *f = self.internal_force(i));
    }

    /// Fill `forces` with the total force on every particle.
    ///
    /// Returns how many non-finite results were replaced by zero.
    pub fn compute(&self, forces: &mut [Vec3]) -> usize {
        debug_assert_eq!(forces.len(), self.query.len());
        forces
            .par_iter_mut()
            .enumerate()
            .map(|(i, f)| {
                let total = self.internal_force(i) + self.external_force(i);
                if total.is_finite() {
                    *f = total;
                    0
                } else {
                    *f = Vec3::ZERO;
                    1
                }
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::density;
    use crate::fluid::particle::cube_lattice;
    use crate::fluid::spatial::{GridConfig, SpatialGrid};

    struct Fixture {
        grid: SpatialGrid,
        positions: Vec<Vec3>,
        velocities: Vec<Vec3>,
        density: Vec<f32>,
        pressure: Vec<f32>,
        params: SphParams,
        kernels: SmoothingKernels,
    }

    impl Fixture {
        fn new(positions: Vec<Vec3>, velocities: Vec<Vec3>, params: SphParams) -> Self {
            let config = GridConfig {
                origin: Vec3::ZERO,
                cell_size: params.interaction_radius,
                bits_per_axis: 5,
            };
            let n = positions.len();
            let mut grid = SpatialGrid::new(config, n);
            let homogeneous: Vec<[f32; 4]> =
                positions.iter().map(|p| p.extend(1.0).to_array()).collect();
            grid.build(&homogeneous);

            let mut sorted_positions = vec![Vec3::ZERO; n];
            let mut sorted_velocities = vec![Vec3::ZERO; n];
            grid.gather(&positions, &mut sorted_positions, |p| *p);
            grid.gather(&velocities, &mut sorted_velocities, |v| *v);

            let kernels = params.kernels();
            let mut density = vec![0.0; n];
            let mut pressure = vec![0.0; n];
            {
                let query = NeighborQuery::new(&grid, &sorted_positions, params.interaction_radius);
                density::compute(&query, &kernels, &params, &mut density, &mut pressure);
            }

            Self {
                grid,
                positions: sorted_positions,
                velocities: sorted_velocities,
                density,
                pressure,
                params,
                kernels,
            }
        }

        fn input(&self) -> ForceInput<'_> {
            ForceInput {
                query: NeighborQuery::new(&self.grid, &self.positions, self.params.interaction_radius),
                velocities: &self.velocities,
                field: DensityField {
                    density: &self.density,
                    pressure: &self.pressure,
                },
                kernels: &self.kernels,
                params: &self.params,
            }
        }
    }

    /// Compressed parameters so that pressure is positive for close pairs.
    fn stiff_params() -> SphParams {
        SphParams {
            rest_density: 1.0,
            gas_stiffness: 50.0,
            ..SphParams::default()
        }
    }

    #[test]
    fn test_pair_pressure_forces_equal_and_opposite() {
        let params = stiff_params();
        let h = params.interaction_radius;
        let a = Vec3::new(0.5, 0.5, 0.5);
        let b = a + Vec3::new(h / 2.0, 0.0, 0.0);
        let fixture = Fixture::new(vec![a, b], vec![Vec3::ZERO; 2], params);
        assert!(fixture.pressure.iter().all(|&p| p > 0.0));

        let input = fixture.input();
        let f0 = input.internal_force(0);
        let f1 = input.internal_force(1);
        assert!(f0.length() > 0.0);
        assert!((f0 + f1).length() <= 1e-5 * f0.length());

        // Repulsive: each particle is pushed away from the other.
        let r = fixture.positions[0] - fixture.positions[1];
        assert!(f0.dot(r) > 0.0);
    }

    #[test]
    fn test_internal_forces_conserve_momentum() {
        let params = SphParams {
            viscosity: 3.5,
            ..stiff_params()
        };
        let spacing = params.particle_radius * 0.6;
        let mut positions = Vec::new();
        let mut velocities = Vec::new();
        for x in 0..5 {
            for y in 0..5 {
                for z in 0..5 {
                    let i = (x * 25 + y * 5 + z) as f32;
                    let jitter = Vec3::new((i * 0.37).sin(), (i * 0.71).cos(), (i * 1.13).sin()) * 0.2 * spacing;
                    positions.push(Vec3::splat(0.3) + Vec3::new(x as f32, y as f32, z as f32) * spacing + jitter);
                    velocities.push(Vec3::new((i * 0.3).cos(), 0.0, (i * 0.5).sin()) * 0.1);
                }
            }
        }
        let fixture = Fixture::new(positions, velocities, params);
        let mut forces = vec![Vec3::ZERO; fixture.positions.len()];
        fixture.input().compute_internal(&mut forces);

        // Rate of change of total momentum: Σ m a_i with a_i = f_i / ρ_i.
        let mut total = Vec3::ZERO;
        let mut magnitude = 0.0;
        for (f, rho) in forces.iter().zip(&fixture.density) {
            let dp = *f * (fixture.params.particle_mass / rho);
            total += dp;
            magnitude += dp.length();
        }
        assert!(magnitude > 0.0);
        assert!(total.length() <= 1e-4 * magnitude, "net = {total}, scale = {magnitude}");
    }

    #[test]
    fn test_isolated_particle_feels_only_gravity() {
        let params = SphParams::default();
        let fixture = Fixture::new(vec![Vec3::splat(0.5)], vec![Vec3::ZERO], params.clone());
        let mut forces = vec![Vec3::ZERO; 1];
        assert_eq!(fixture.input().compute(&mut forces), 0);
        assert_eq!(forces[0], params.gravity * params.particle_mass);
    }

    #[test]
    fn test_viscosity_pulls_velocities_together() {
        let params = SphParams {
            gas_stiffness: 0.0,
            surface_tension: 0.0,
            ..SphParams::default()
        };
        let h = params.interaction_radius;
        let a = Vec3::splat(0.5);
        let b = a + Vec3::new(0.0, h / 3.0, 0.0);
        let fixture = Fixture::new(
            vec![a, b],
            vec![Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO],
            params,
        );
        let input = fixture.input();
        let moving = fixture.grid.sorted_index(0);
        let resting = fixture.grid.sorted_index(1);
        assert!(input.internal_force(moving).x < 0.0);
        assert!(input.internal_force(resting).x > 0.0);
    }

    #[test]
    fn test_surface_tension_pulls_corner_inward() {
        let params = SphParams::default();
        assert!(params.surface_tension > 0.0);
        let spacing = params.particle_radius;
        let positions: Vec<Vec3> =
            cube_lattice(Vec3::splat(0.5), Vec3::splat(7.0 * spacing), spacing).collect();
        assert_eq!(positions.len(), 343);
        let velocities = vec![Vec3::ZERO; positions.len()];
        let fixture = Fixture::new(positions, velocities, params);
        let input = fixture.input();

        // Lattice order is x, then y, then z, so slot 0 is the minimum corner.
        let corner = input.surface_tension_force(fixture.grid.sorted_index(0));
        assert!(corner.cmpgt(Vec3::ZERO).all(), "corner force {corner}");

        // The color field is flat at the center of the block.
        let center = input.surface_tension_force(fixture.grid.sorted_index(171));
        assert_eq!(center, Vec3::ZERO);
    }

    #[test]
    fn test_wall_penalty_pushes_inward() {
        let params = SphParams {
            boundary_stiffness: 1000.0,
            gravity: Vec3::ZERO,
            surface_tension: 0.0,
            ..SphParams::default()
        };
        // Default box floor is at y = 0.
        let near_floor = Vec3::new(0.0, params.particle_radius * 0.5, 0.0);
        let fixture = Fixture::new(vec![near_floor], vec![Vec3::ZERO], params);
        let force = fixture.input().external_force(0);
        assert!(force.y > 0.0);
        assert_eq!(force.x, 0.0);
    }
}
