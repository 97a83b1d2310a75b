//! Spira SPH - headless dam break demo
//!
//! Drops a block of water against one wall of the default container and logs
//! how the fluid spreads.

use bevy::log::LogPlugin;
use bevy::prelude::*;
use spira_sph::prelude::*;

const FRAMES: u64 = 600;
const REPORT_EVERY: u64 = 60;

fn main() {
    let params = SphParams::water()
        .with_capacity(20_000)
        .with_color_mode(ColorMode::Speed { max_speed: 2.0 });

    let mut app = App::new();
    app.add_plugins(LogPlugin::default())
        .add_plugins(SphPlugin::new(params))
        .add_systems(Startup, setup_dam_break)
        .add_systems(Update, report_progress);
    app.finish();
    app.cleanup();

    if app.world().get_resource::<Sph>().is_none() {
        return;
    }

    for _ in 0..FRAMES {
        app.update();
    }
}

/// Dam break scenario: a column of water on the -x side of the box.
fn setup_dam_break(mut sph: ResMut<Sph>) {
    match sph.generate_particle_cube(Vec3::new(-0.25, 0.21, 0.0), Vec3::new(0.28, 0.4, 0.5)) {
        Ok(count) => info!("spawned {count} particles"),
        Err(err) => warn!("could not spawn the water column: {err}"),
    }
}

fn report_progress(sph: Res<Sph>, state: Res<SimulationState>) {
    if state.frame == 0 || state.frame % REPORT_EVERY != 0 {
        return;
    }

    let n = sph.particle_count().max(1) as f32;
    let positions = sph.positions();
    let mut max_x = f32::MIN;
    let mut mean_height = 0.0;
    for p in positions.chunks_exact(4) {
        max_x = max_x.max(p[0]);
        mean_height += p[1];
    }
    let mean_density = sph.densities().iter().sum::<f32>() / n;

    info!(
        "frame {}: front at x = {:.3}, mean height {:.3}, mean density {:.1}",
        state.frame,
        max_x,
        mean_height / n,
        mean_density
    );
}
