//! SPH smoothing kernels.
//!
//! All kernels have compact support: they return zero for `|r| > h`. The
//! offset `r` is `x_i - x_j` (particle minus neighbor) everywhere in the
//! solver.
//!
//! - Density: Poly6, `W(r, h) = 315 / (64πh⁹) · (h² - |r|²)³`
//! - Pressure: gradient of Spiky, `∇W(r, h) = -45 / (πh⁶) · (h - |r|)² · r̂`
//! - Viscosity: Laplacian of the viscosity kernel, `∇²W(r, h) = 45 / (πh⁶) · (h - |r|)`
//!
//! See "Particle-Based Fluid Simulation for Interactive Applications"
//! (Müller, Charypar & Gross, 2003).

use std::f32::consts::PI;

use bevy::prelude::*;

/// Below this distance the Spiky gradient has no usable direction.
const MIN_DISTANCE: f32 = 1e-6;

/// Poly6 density kernel.
#[inline]
pub fn w_default(r: Vec3, h: f32) -> f32 {
    SmoothingKernels::new(h).w_default(r.length_squared())
}

/// Gradient of the Poly6 kernel.
#[inline]
pub fn w_default_grad(r: Vec3, h: f32) -> Vec3 {
    SmoothingKernels::new(h).w_default_grad(r, r.length_squared())
}

/// Laplacian of the Poly6 kernel (surface tension curvature).
#[inline]
pub fn w_default_laplacian(r: Vec3, h: f32) -> f32 {
    SmoothingKernels::new(h).w_default_laplacian(r.length_squared())
}

/// Gradient of the Spiky kernel. Antisymmetric in `r`, zero at `|r| = h`.
#[inline]
pub fn w_pressure_grad(r: Vec3, h: f32) -> Vec3 {
    SmoothingKernels::new(h).w_pressure_grad(r, r.length_squared())
}

/// Laplacian of the viscosity kernel. Never negative inside the support.
#[inline]
pub fn w_viscosity_laplacian(r: Vec3, h: f32) -> f32 {
    SmoothingKernels::new(h).w_viscosity_laplacian(r.length_squared())
}

/// Kernels with their normalisation constants precomputed for one `h`.
///
/// Laid out for direct upload as a uniform buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SmoothingKernels {
    pub h: f32,
    pub h_sq: f32,
    pub poly6_coeff: f32,
    pub poly6_grad_coeff: f32,
    pub spiky_grad_coeff: f32,
    pub viscosity_laplacian_coeff: f32,
    pub _padding: [f32; 2],
}

impl SmoothingKernels {
    pub fn new(h: f32) -> Self {
        let h2 = h * h;
        let h3 = h2 * h;
        let h6 = h3 * h3;
        let h9 = h6 * h3;

        Self {
            h,
            h_sq: h2,
            poly6_coeff: 315.0 / (64.0 * PI * h9),
            poly6_grad_coeff: -945.0 / (32.0 * PI * h9),
            spiky_grad_coeff: -45.0 / (PI * h6),
            viscosity_laplacian_coeff: 45.0 / (PI * h6),
            _padding: [0.0; 2],
        }
    }

    /// Poly6 evaluated from a squared distance.
    #[inline]
    pub fn w_default(&self, r_sq: f32) -> f32 {
        if r_sq > self.h_sq {
            return 0.0;
        }
        let diff = self.h_sq - r_sq;
        self.poly6_coeff * diff * diff * diff
    }

    #[inline]
    pub fn w_default_grad(&self, r: Vec3, r_sq: f32) -> Vec3 {
        if r_sq > self.h_sq {
            return Vec3::ZERO;
        }
        let diff = self.h_sq - r_sq;
        r * (self.poly6_grad_coeff * diff * diff)
    }

    #[inline]
    pub fn w_default_laplacian(&self, r_sq: f32) -> f32 {
        if r_sq > self.h_sq {
            return 0.0;
        }
        let diff = self.h_sq - r_sq;
        self.poly6_grad_coeff * diff * (3.0 * self.h_sq - 7.0 * r_sq)
    }

    #[inline]
    pub fn w_pressure_grad(&self, r: Vec3, r_sq: f32) -> Vec3 {
        if r_sq > self.h_sq {
            return Vec3::ZERO;
        }
        let r_len = r_sq.sqrt();
        if r_len < MIN_DISTANCE {
            return Vec3::ZERO;
        }
        let diff = self.h - r_len;
        r * (self.spiky_grad_coeff * diff * diff / r_len)
    }

    #[inline]
    pub fn w_viscosity_laplacian(&self, r_sq: f32) -> f32 {
        if r_sq > self.h_sq {
            return 0.0;
        }
        self.viscosity_laplacian_coeff * (self.h - r_sq.sqrt())
    }
}
