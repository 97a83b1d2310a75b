//! Whole-step scenarios through the public `Sph` API.

use bevy::prelude::*;
use spira_sph::fluid::kernels::SmoothingKernels;
use spira_sph::prelude::*;

fn assert_close(actual: f32, expected: f32, rel: f32) {
    let tolerance = expected.abs().max(1e-12) * rel;
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected}, got {actual}"
    );
}

fn vec3_at(buffer: &[f32], stride: usize, i: usize) -> Vec3 {
    Vec3::from_slice(&buffer[i * stride..i * stride + 3])
}

#[test]
fn test_single_particle_falls_under_gravity() {
    let params = SphParams::default().with_capacity(16);
    let mut sph = Sph::new(params.clone()).unwrap();
    let start = Vec3::new(0.0, 0.4, 0.0);
    sph.add_particle(start).unwrap();

    sph.update();

    // Alone, the particle only sees itself: ρ = m W(0), no pressure or
    // viscosity, and the force is g·m.
    let rho = params.particle_mass * SmoothingKernels::new(params.interaction_radius).w_default(0.0);
    assert_close(sph.densities()[0], rho, 1e-5);
    assert_eq!(sph.pressures()[0], 0.0);

    let force = vec3_at(sph.forces(), 3, 0);
    assert_close(force.y, params.gravity.y * params.particle_mass, 1e-6);

    let dv = params.gravity.y * params.particle_mass / rho * params.timestep;
    let velocity = vec3_at(sph.velocities(), 3, 0);
    assert_close(velocity.y, dv, 1e-4);
    assert_eq!(velocity.x, 0.0);
    assert_eq!(velocity.z, 0.0);

    let position = vec3_at(sph.positions(), 4, 0);
    assert_close(position.y, start.y + dv * params.timestep, 1e-6);
}

#[test]
fn test_pair_forces_balance_after_step() {
    let params = SphParams {
        rest_density: 1.0,
        gas_stiffness: 50.0,
        viscosity: 0.0,
        surface_tension: 0.0,
        gravity: Vec3::ZERO,
        ..SphParams::default()
    }
    .with_capacity(2);
    let h = params.interaction_radius;
    let mut sph = Sph::new(params).unwrap();
    sph.add_particle(Vec3::new(0.0, 0.4, 0.0)).unwrap();
    sph.add_particle(Vec3::new(h / 2.0, 0.4, 0.0)).unwrap();

    sph.update();

    assert!(sph.pressures().iter().all(|&p| p > 0.0));
    let f0 = vec3_at(sph.forces(), 3, 0);
    let f1 = vec3_at(sph.forces(), 3, 1);
    assert!(f0.x < 0.0, "left particle pushed left, got {f0}");
    assert!((f0 + f1).length() <= 1e-5 * f0.length());

    // And they move apart.
    let x0 = vec3_at(sph.positions(), 4, 0).x;
    let x1 = vec3_at(sph.positions(), 4, 1).x;
    assert!(x1 - x0 > h / 2.0);
}

#[test]
fn test_cube_generation_count_and_capacity() {
    let params = SphParams::default()
        .with_boundary(BoxBoundary::centered(Vec3::splat(1.5)).into())
        .with_particle_radius(0.25)
        .with_interaction_radius(0.5)
        .with_capacity(512);
    let mut sph = Sph::new(params).unwrap();

    let added = sph.generate_particle_cube(Vec3::ZERO, Vec3::splat(2.0)).unwrap();
    assert_eq!(added, 512);
    assert_eq!(sph.particle_count(), 512);

    // Every lattice point is inside the cuboid.
    for p in sph.positions().chunks_exact(4) {
        assert!(p[..3].iter().all(|c| c.abs() <= 1.0));
    }

    let before = sph.positions().to_vec();
    let err = sph.generate_particle_cube(Vec3::ZERO, Vec3::splat(0.5)).unwrap_err();
    assert_eq!(
        err,
        SphError::CapacityExceeded {
            requested: 8,
            available: 0,
            capacity: 512,
        }
    );
    assert!(sph.add_particle(Vec3::ZERO).is_err());
    assert_eq!(sph.particle_count(), 512);
    assert_eq!(sph.positions(), &before[..]);
}

#[test]
fn test_partial_cube_is_rejected_whole() {
    let params = SphParams::default().with_capacity(100);
    let mut sph = Sph::new(params.clone()).unwrap();
    let size = Vec3::splat(params.particle_radius * 5.0);

    assert!(sph.generate_particle_cube(Vec3::new(0.0, 0.3, 0.0), size).is_err());
    assert_eq!(sph.particle_count(), 0);

    let size = Vec3::splat(params.particle_radius * 4.0);
    assert_eq!(sph.generate_particle_cube(Vec3::new(0.0, 0.3, 0.0), size), Ok(64));
}

#[test]
fn test_particle_slots_keep_identity_across_update() {
    let params = SphParams {
        gravity: Vec3::ZERO,
        surface_tension: 0.0,
        ..SphParams::default()
    }
    .with_capacity(16);
    let dt = params.timestep;
    let mut sph = Sph::new(params).unwrap();

    // Far enough apart not to interact, and added in reverse grid order so
    // sorting has to move them.
    let mut expected = Vec::new();
    for i in 0..7 {
        let position = Vec3::new(0.3 - 0.1 * i as f32, 0.4, 0.1 * (i % 3) as f32 - 0.1);
        let velocity = Vec3::new(0.0, 0.0, 0.01 * (i + 1) as f32);
        sph.add_particle_with_velocity(position, velocity).unwrap();
        expected.push((position + velocity * dt, velocity));
    }

    sph.update();

    for (i, (position, velocity)) in expected.iter().enumerate() {
        let got_position = vec3_at(sph.positions(), 4, i);
        let got_velocity = vec3_at(sph.velocities(), 3, i);
        assert!(
            (got_position - *position).length() < 1e-6,
            "particle {i}: expected {position}, got {got_position}"
        );
        assert!((got_velocity - *velocity).length() < 1e-6);
    }
}

#[test]
fn test_dam_break_stays_finite_and_contained() {
    let params = SphParams::default()
        .with_capacity(4096)
        .with_color_mode(ColorMode::Speed { max_speed: 2.0 });
    let boundary = params.boundary;
    let mut sph = Sph::new(params).unwrap();
    sph.generate_particle_cube(Vec3::new(-0.25, 0.2, 0.0), Vec3::new(0.2, 0.3, 0.2))
        .unwrap();
    let n = sph.particle_count();

    for _ in 0..40 {
        sph.update();
    }

    assert_eq!(sph.frame(), 40);
    assert_eq!(sph.particle_count(), n);
    assert!(sph.positions().iter().all(|c| c.is_finite()));
    assert!(sph.velocities().iter().all(|c| c.is_finite()));
    assert!(sph.densities().iter().all(|&d| d > 0.0));
    assert!(sph.pressures().iter().all(|&p| p >= 0.0));

    for p in sph.positions().chunks_exact(4) {
        assert!(boundary.contains(Vec3::from_slice(p)), "escaped: {p:?}");
    }
    // Colors follow speed, so the falling block is no longer the base color.
    assert!(sph.colors().chunks_exact(4).any(|c| c != WATER_COLOR.as_slice()));
}
