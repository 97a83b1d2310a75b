//! Particle storage.
//!
//! Two layouts are kept:
//!
//! - **unsorted**: host-visible buffers where a particle's slot never
//!   changes. Structure of Arrays, every buffer index aligned.
//! - **sorted**: working buffers in grid order, rebuilt every step. Position
//!   and velocity are ping-ponged so integration reads one copy and writes
//!   the other.
//!
//! All buffers are reserved for the full capacity up front and never grow
//! past it.

use bevy::prelude::*;

use super::error::{Result, SphError};
use super::render::WATER_COLOR;

/// A pair of buffers with an explicit front index.
#[derive(Debug, Default)]
pub struct PingPong<T> {
    buffers: [Vec<T>; 2],
    front: usize,
}

impl<T: Clone> PingPong<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffers: [Vec::with_capacity(capacity), Vec::with_capacity(capacity)],
            front: 0,
        }
    }

    /// Resize both buffers to `len`, filling new slots with `value`.
    pub fn resize(&mut self, len: usize, value: T) {
        for buffer in &mut self.buffers {
            buffer.resize(len, value.clone());
        }
    }
}

impl<T> PingPong<T> {
    pub fn front(&self) -> &[T] {
        &self.buffers[self.front]
    }

    pub fn front_mut(&mut self) -> &mut [T] {
        &mut self.buffers[self.front]
    }

    /// Read the front buffer while writing the back one.
    pub fn split(&mut self) -> (&[T], &mut [T]) {
        let [a, b] = &mut self.buffers;
        let (front, back) = if self.front == 0 { (a, b) } else { (b, a) };
        (front.as_slice(), back.as_mut_slice())
    }

    /// Make the back buffer the front one.
    pub fn flip(&mut self) {
        self.front ^= 1;
    }

    pub fn front_index(&self) -> usize {
        self.front
    }
}

/// Grid-ordered working buffers for one step.
#[derive(Debug)]
pub struct SortedParticles {
    pub position: PingPong<Vec3>,
    pub velocity: PingPong<Vec3>,
    pub density: Vec<f32>,
    pub pressure: Vec<f32>,
    pub force: Vec<Vec3>,
}

impl SortedParticles {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            position: PingPong::with_capacity(capacity),
            velocity: PingPong::with_capacity(capacity),
            density: Vec::with_capacity(capacity),
            pressure: Vec::with_capacity(capacity),
            force: Vec::with_capacity(capacity),
        }
    }

    /// Size every buffer for `len` particles.
    pub fn resize(&mut self, len: usize) {
        self.position.resize(len, Vec3::ZERO);
        self.velocity.resize(len, Vec3::ZERO);
        self.density.resize(len, 0.0);
        self.pressure.resize(len, 0.0);
        self.force.resize(len, Vec3::ZERO);
    }
}

/// Owned particle buffers with a fixed capacity.
#[derive(Debug)]
pub struct ParticleStore {
    capacity: usize,
    /// Position (x, y, z, w = 1).
    pub(crate) position: Vec<[f32; 4]>,
    pub(crate) velocity: Vec<[f32; 3]>,
    pub(crate) density: Vec<f32>,
    pub(crate) pressure: Vec<f32>,
    pub(crate) force: Vec<[f32; 3]>,
    /// Color (r, g, b, a), visualization only.
    pub(crate) color: Vec<[f32; 4]>,
    pub(crate) sorted: SortedParticles,
}

impl ParticleStore {
    /// Allocate every buffer for `capacity` particles.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            position: Vec::with_capacity(capacity),
            velocity: Vec::with_capacity(capacity),
            density: Vec::with_capacity(capacity),
            pressure: Vec::with_capacity(capacity),
            force: Vec::with_capacity(capacity),
            color: Vec::with_capacity(capacity),
            sorted: SortedParticles::with_capacity(capacity),
        }
    }

    /// Number of live particles.
    pub fn len(&self) -> usize {
        self.position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots.
    pub fn available(&self) -> usize {
        self.capacity - self.len()
    }

    /// Fail unless `count` more particles fit.
    pub fn reserve(&self, count: usize) -> Result<()> {
        let available = self.available();
        if count > available {
            return Err(SphError::CapacityExceeded {
                requested: count,
                available,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Append one particle and return its slot.
    ///
    /// Non-finite positions or velocities are rejected before any slot is used.
    pub fn push(&mut self, position: Vec3, velocity: Vec3, color: [f32; 4]) -> Result<usize> {
        if !position.is_finite() {
            return Err(SphError::InvalidParticle(format!(
                "position {position} is not finite"
            )));
        }
        if !velocity.is_finite() {
            return Err(SphError::InvalidParticle(format!(
                "velocity {velocity} is not finite"
            )));
        }
        self.reserve(1)?;
        let slot = self.len();
        self.position.push(position.extend(1.0).to_array());
        self.velocity.push(velocity.to_array());
        self.density.push(0.0);
        self.pressure.push(0.0);
        self.force.push([0.0; 3]);
        self.color.push(color);
        Ok(slot)
    }

    /// Append one particle at rest with the default color.
    pub fn push_at(&mut self, position: Vec3) -> Result<usize> {
        self.push(position, Vec3::ZERO, WATER_COLOR)
    }

    pub fn positions(&self) -> &[[f32; 4]] {
        &self.position
    }

    pub fn velocities(&self) -> &[[f32; 3]] {
        &self.velocity
    }

    pub fn densities(&self) -> &[f32] {
        &self.density
    }

    pub fn pressures(&self) -> &[f32] {
        &self.pressure
    }

    pub fn forces(&self) -> &[[f32; 3]] {
        &self.force
    }

    pub fn colors(&self) -> &[[f32; 4]] {
        &self.color
    }

    pub fn position(&self, slot: usize) -> Vec3 {
        Vec3::from_slice(&self.position[slot])
    }

    pub fn velocity(&self, slot: usize) -> Vec3 {
        Vec3::from_array(self.velocity[slot])
    }
}

impl Drop for ParticleStore {
    fn drop(&mut self) {
        debug!(
            "releasing particle store: {} of {} slots in use",
            self.len(),
            self.capacity
        );
    }
}

/// Lattice points filling the cuboid `center ± size / 2`.
///
/// `floor(size / spacing)` points per axis, spaced `spacing` apart and
/// centred in the cuboid.
pub fn cube_lattice(center: Vec3, size: Vec3, spacing: f32) -> impl Iterator<Item = Vec3> {
    let counts = lattice_counts(size, spacing);
    let start = center - (counts.as_vec3() - Vec3::ONE) * spacing * 0.5;

    (0..counts.x).flat_map(move |x| {
        (0..counts.y).flat_map(move |y| {
            (0..counts.z).map(move |z| start + UVec3::new(x, y, z).as_vec3() * spacing)
        })
    })
}

/// Number of lattice points per axis for a cuboid of `size`.
pub fn lattice_counts(size: Vec3, spacing: f32) -> UVec3 {
    if spacing.is_nan() || spacing <= 0.0 {
        return UVec3::ZERO;
    }
    // The epsilon absorbs rounding in sizes that are whole multiples of spacing.
    (size / spacing + Vec3::splat(1e-4))
        .floor()
        .max(Vec3::ZERO)
        .as_uvec3()
}
