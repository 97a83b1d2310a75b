//! Container boundaries and collision response.
//!
//! Two container shapes are supported:
//! - Box boundaries (AABB)
//! - Sphere boundaries
//!
//! Particles are kept one particle radius away from the container walls.

use bevy::prelude::*;

use super::error::{Result, SphError};

/// Box-shaped container (AABB).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxBoundary {
    /// Minimum corner of the box.
    pub min: Vec3,
    /// Maximum corner of the box.
    pub max: Vec3,
}

impl Default for BoxBoundary {
    fn default() -> Self {
        Self {
            min: Vec3::new(-0.4, 0.0, -0.4),
            max: Vec3::new(0.4, 0.8, 0.4),
        }
    }
}

impl BoxBoundary {
    /// Create a box boundary with custom bounds.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create a box boundary centered at origin.
    pub fn centered(half_extents: Vec3) -> Self {
        Self {
            min: -half_extents,
            max: half_extents,
        }
    }

    /// Check if a point is inside the boundary.
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Push a particle back inside and reflect its inbound velocity.
    ///
    /// Returns whether any axis was corrected.
    pub fn apply_collision(
        &self,
        position: &mut Vec3,
        velocity: &mut Vec3,
        particle_radius: f32,
        damping: f32,
    ) -> bool {
        let effective_min = self.min + Vec3::splat(particle_radius);
        let effective_max = self.max - Vec3::splat(particle_radius);
        let mut corrected = false;

        for axis in 0..3 {
            if position[axis] < effective_min[axis] {
                position[axis] = effective_min[axis];
                if velocity[axis] < 0.0 {
                    velocity[axis] = -velocity[axis] * damping;
                }
                corrected = true;
            } else if position[axis] > effective_max[axis] {
                position[axis] = effective_max[axis];
                if velocity[axis] > 0.0 {
                    velocity[axis] = -velocity[axis] * damping;
                }
                corrected = true;
            }
        }

        corrected
    }

    /// Sum of inward wall normals weighted by how far the particle has
    /// entered the one-radius skin of each wall.
    pub fn penetration(&self, position: Vec3, particle_radius: f32) -> Vec3 {
        let mut push = Vec3::ZERO;
        for axis in 0..3 {
            let to_min = position[axis] - self.min[axis];
            if to_min < particle_radius {
                push[axis] += particle_radius - to_min;
            }
            let to_max = self.max[axis] - position[axis];
            if to_max < particle_radius {
                push[axis] -= particle_radius - to_max;
            }
        }
        push
    }
}

/// Spherical container.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphereBoundary {
    /// Center of the sphere.
    pub center: Vec3,
    /// Radius of the sphere.
    pub radius: f32,
}

impl SphereBoundary {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Signed distance to the sphere surface.
    /// Negative = inside, positive = outside.
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        (point - self.center).length() - self.radius
    }

    pub fn apply_collision(
        &self,
        position: &mut Vec3,
        velocity: &mut Vec3,
        particle_radius: f32,
        damping: f32,
    ) -> bool {
        let offset = *position - self.center;
        let dist = offset.length();
        let effective_radius = self.radius - particle_radius;
        if dist <= effective_radius || dist < 1e-6 {
            return false;
        }

        let normal = offset / dist;
        *position = self.center + normal * effective_radius;

        let vn = normal.dot(*velocity);
        if vn > 0.0 {
            *velocity -= normal * vn * (1.0 + damping);
        }
        true
    }

    pub fn penetration(&self, position: Vec3, particle_radius: f32) -> Vec3 {
        let offset = position - self.center;
        let dist = offset.length();
        let depth = dist - (self.radius - particle_radius);
        if depth <= 0.0 || dist < 1e-6 {
            return Vec3::ZERO;
        }
        -offset / dist * depth
    }
}

/// The container the fluid is simulated in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Boundary {
    Box(BoxBoundary),
    Sphere(SphereBoundary),
}

impl Default for Boundary {
    fn default() -> Self {
        Boundary::Box(BoxBoundary::default())
    }
}

impl From<BoxBoundary> for Boundary {
    fn from(b: BoxBoundary) -> Self {
        Boundary::Box(b)
    }
}

impl From<SphereBoundary> for Boundary {
    fn from(b: SphereBoundary) -> Self {
        Boundary::Sphere(b)
    }
}

impl Boundary {
    /// Axis-aligned bounds as `(min, max)`.
    pub fn aabb(&self) -> (Vec3, Vec3) {
        match self {
            Boundary::Box(b) => (b.min, b.max),
            Boundary::Sphere(s) => (
                s.center - Vec3::splat(s.radius),
                s.center + Vec3::splat(s.radius),
            ),
        }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        match self {
            Boundary::Box(b) => b.contains(point),
            Boundary::Sphere(s) => s.signed_distance(point) <= 0.0,
        }
    }

    pub fn apply_collision(
        &self,
        position: &mut Vec3,
        velocity: &mut Vec3,
        particle_radius: f32,
        damping: f32,
    ) -> bool {
        match self {
            Boundary::Box(b) => b.apply_collision(position, velocity, particle_radius, damping),
            Boundary::Sphere(s) => s.apply_collision(position, velocity, particle_radius, damping),
        }
    }

    pub fn penetration(&self, position: Vec3, particle_radius: f32) -> Vec3 {
        match self {
            Boundary::Box(b) => b.penetration(position, particle_radius),
            Boundary::Sphere(s) => s.penetration(position, particle_radius),
        }
    }

    pub(crate) fn validate(&self, particle_radius: f32) -> Result<()> {
        let fits = match self {
            Boundary::Box(b) => {
                b.min.is_finite()
                    && b.max.is_finite()
                    && (b.max - b.min).cmpgt(Vec3::splat(2.0 * particle_radius)).all()
            }
            Boundary::Sphere(s) => {
                s.center.is_finite() && s.radius.is_finite() && s.radius > particle_radius
            }
        };
        if fits {
            Ok(())
        } else {
            Err(SphError::InvalidParams(format!(
                "boundary {self:?} leaves no room for particles of radius {particle_radius}"
            )))
        }
    }
}
