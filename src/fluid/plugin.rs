//! Bevy plugin for the fluid simulation.

use bevy::prelude::*;

use super::params::SphParams;
use super::simulation::Sph;

/// Plugin that adds an SPH fluid simulation to a Bevy app.
///
/// Inserts the [`Sph`] and [`SimulationState`] resources and steps the
/// simulation once per `Update`.
///
/// # Example
///
/// ```rust,no_run
/// use bevy::prelude::*;
/// use spira_sph::prelude::*;
///
/// fn main() {
///     App::new()
///         .add_plugins(SphPlugin::new(SphParams::water()))
///         .add_systems(Startup, spawn_fluid)
///         .run();
/// }
///
/// fn spawn_fluid(mut sph: ResMut<Sph>) {
///     if let Err(err) = sph.generate_particle_cube(Vec3::new(0.0, 0.2, 0.0), Vec3::splat(0.2)) {
///         warn!("{err}");
///     }
/// }
/// ```
#[derive(Default)]
pub struct SphPlugin {
    pub params: SphParams,
}

impl SphPlugin {
    pub fn new(params: SphParams) -> Self {
        Self { params }
    }
}

impl Plugin for SphPlugin {
    fn build(&self, app: &mut App) {
        let sph = match Sph::new(self.params.clone()) {
            Ok(sph) => sph,
            Err(err) => {
                error!("fluid simulation disabled: {err}");
                return;
            }
        };

        app.insert_resource(sph)
            .init_resource::<SimulationState>()
            .add_systems(Update, step_simulation);
    }
}

/// Host-side control of the simulation loop.
#[derive(Resource, Debug, Default)]
pub struct SimulationState {
    /// Whether the simulation is paused.
    pub paused: bool,
    /// Run exactly one step on the next update while paused.
    pub step_requested: bool,
    /// Steps run through this state.
    pub frame: u64,
}

impl SimulationState {
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Request a single step while paused.
    pub fn request_step(&mut self) {
        self.step_requested = true;
    }

    /// Whether the next update should run a step. Consumes a step request.
    pub fn should_step(&mut self) -> bool {
        if !self.paused {
            return true;
        }
        std::mem::take(&mut self.step_requested)
    }
}

/// System running one simulation step per frame.
fn step_simulation(mut sph: ResMut<Sph>, mut state: ResMut<SimulationState>) {
    if !state.should_step() {
        return;
    }
    sph.update();
    state.frame = sph.frame();
}
