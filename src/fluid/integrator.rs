//! Semi-implicit Euler integration and container collisions.

use bevy::prelude::*;
use rayon::prelude::*;

use super::params::SphParams;

/// Counts from one integration pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntegrationStats {
    /// Particles pushed back inside the container.
    pub collisions: usize,
    /// Particles whose update was non-finite and was discarded.
    pub rejected: usize,
}

/// Advance one particle: `v += f/ρ · dt`, `x += v · dt`, then resolve
/// container penetration.
///
/// Returns the new state and whether a collision was resolved. A
/// non-finite result keeps the old position and stops the particle.
#[inline]
pub fn advance_particle(
    position: Vec3,
    velocity: Vec3,
    density: f32,
    force: Vec3,
    params: &SphParams,
) -> (Vec3, Vec3, bool, bool) {
    let dt = params.timestep;
    let mut next_velocity = velocity + force / density * dt;
    let mut next_position = position + next_velocity * dt;

    if !(next_velocity.is_finite() && next_position.is_finite()) {
        return (position, Vec3::ZERO, false, true);
    }

    let collided = params.boundary.apply_collision(
        &mut next_position,
        &mut next_velocity,
        params.particle_radius,
        params.boundary_damping,
    );
    (next_position, next_velocity, collided, false)
}

/// Integrate every particle from the current (`positions`, `velocities`)
/// into `next_positions` / `next_velocities`.
pub fn advance(
    positions: &[Vec3],
    velocities: &[Vec3],
    densities: &[f32],
    forces: &[Vec3],
    params: &SphParams,
    next_positions: &mut [Vec3],
    next_velocities: &mut [Vec3],
) -> IntegrationStats {
    next_positions
        .par_iter_mut()
        .zip(next_velocities.par_iter_mut())
        .enumerate()
        .map(|(i, (x, v))| {
            let (position, velocity, collided, rejected) =
                advance_particle(positions[i], velocities[i], densities[i], forces[i], params);
            *x = position;
            *v = velocity;
            IntegrationStats {
                collisions: collided as usize,
                rejected: rejected as usize,
            }
        })
        .reduce(IntegrationStats::default, |a, b| IntegrationStats {
            collisions: a.collisions + b.collisions,
            rejected: a.rejected + b.rejected,
        })
}
