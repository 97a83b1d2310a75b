//! Density and pressure pass.
//!
//! `ρ_i = m Σ_j W(x_i - x_j, h)` over the neighbors of `i`, itself included,
//! followed by the equation of state `p_i = max(k (ρ_i - ρ₀), 0)`.

use rayon::prelude::*;

use super::kernels::SmoothingKernels;
use super::neighbors::NeighborQuery;
use super::params::SphParams;

/// Read-only result of the density pass, input to the force pass.
#[derive(Clone, Copy, Debug)]
pub struct DensityField<'a> {
    pub density: &'a [f32],
    pub pressure: &'a [f32],
}

/// Pressure from the stiffened equation of state.
///
/// Negative pressures are clamped to zero: under-dense regions would
/// otherwise attract particles into clumps.
#[inline]
pub fn equation_of_state(density: f32, params: &SphParams) -> f32 {
    let pressure = params.gas_stiffness * (density - params.rest_density);
    if pressure.is_finite() {
        pressure.max(0.0)
    } else {
        0.0
    }
}

/// Fill `density` and `pressure` for every particle of `query`.
///
/// Returns how many densities were raised to `params.density_floor`.
pub fn compute(
    query: &NeighborQuery<'_>,
    kernels: &SmoothingKernels,
    params: &SphParams,
    density: &mut [f32],
    pressure: &mut [f32],
) -> usize {
    debug_assert_eq!(density.len(), query.len());
    debug_assert_eq!(pressure.len(), query.len());

    let mass = params.particle_mass;
    let floor = params.density_floor;

    density
        .par_iter_mut()
        .zip(pressure.par_iter_mut())
        .enumerate()
        .map(|(i, (rho, p))| {
            let mut sum = 0.0;
            query.for_each(i, |_, _, r_sq| sum += kernels.w_default(r_sq));

            let raw = mass * sum;
            let floored = !(raw.is_finite() && raw >= floor);
            *rho = if floored { floor } else { raw };
            *p = equation_of_state(*rho, params);
            floored as usize
        })
        .sum()
}
