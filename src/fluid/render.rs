//! Per-particle visualization colors.
//!
//! The solver never reads colors. They exist so a host renderer can draw the
//! color buffer directly:
//! - Uniform: keep the color each particle was created with
//! - Speed: blend from blue (slow) to red (fast) every step

use bevy::prelude::*;
use rayon::prelude::*;

/// Base color for new particles (linear RGBA).
pub const WATER_COLOR: [f32; 4] = [0.2, 0.5, 0.9, 1.0];

const SLOW_COLOR: Vec4 = Vec4::new(0.2, 0.4, 0.9, 1.0);
const FAST_COLOR: Vec4 = Vec4::new(0.9, 0.3, 0.2, 1.0);

/// How the color buffer is refreshed after each step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ColorMode {
    /// Colors are left as they were when the particle was added.
    #[default]
    Uniform,
    /// Colors follow the particle speed.
    Speed {
        /// Speed mapped to the fully "fast" color.
        max_speed: f32,
    },
}

/// Get a color based on velocity magnitude.
pub fn velocity_to_color(velocity: Vec3, max_speed: f32) -> [f32; 4] {
    let speed = velocity.length();
    let t = if max_speed > 0.0 {
        (speed / max_speed).clamp(0.0, 1.0)
    } else {
        1.0
    };
    SLOW_COLOR.lerp(FAST_COLOR, t).to_array()
}

/// Rewrite `colors` from `velocities` according to `mode`.
pub fn refresh_colors(mode: ColorMode, velocities: &[[f32; 3]], colors: &mut [[f32; 4]]) {
    match mode {
        ColorMode::Uniform => {}
        ColorMode::Speed { max_speed } => {
            colors
                .par_iter_mut()
                .zip(velocities.par_iter())
                .for_each(|(color, velocity)| {
                    *color = velocity_to_color(Vec3::from_array(*velocity), max_speed);
                });
        }
    }
}
