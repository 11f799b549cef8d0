//! Core host crate for the Worldloom staging server.
//!
//! Runs a single-writer world state (era, traits, atmosphere, landmarks)
//! inside a headless Bevy app, fed by a newline-delimited JSON command
//! channel. Socket I/O lives on a background thread; every mutation happens
//! on the app schedule, so commands apply in arrival order.

pub mod config;
pub mod dispatch;
pub mod framing;
pub mod metrics;
pub mod network;
pub mod placement;
pub mod state;
pub mod terrain;
pub mod visuals;

use bevy::prelude::*;

pub use config::{ConfigError, PlacementRules, TerrainSettings, WorldHostConfig, CONFIG_PATH_ENV};
pub use dispatch::{
    destroy_all_landmarks, destroy_landmark, pump_server_events, SpawnedLandmark, SpawnedLandmarks,
};
pub use framing::{FramingError, LineFramer};
pub use metrics::CommandMetrics;
pub use network::{CommandServer, ServerEndpoint, ServerEvent, TransportError};
pub use placement::{PlacementPlanner, PlannedSpot, SpawnAnchor};
pub use state::{DuplicateLandmark, EventBus, WorldEvent, WorldStateStore};
pub use terrain::{GroundProbe, TerrainField};
pub use visuals::{style_for, LandmarkVisual, VisualStyle};

/// Construct a headless Bevy [`App`] owning the staged world.
///
/// The app carries every state-side resource but no command channel yet;
/// attach one with [`start_command_channel`]. Without an endpoint the pump
/// system is a no-op, which keeps purely host-driven usage (tests, embedding)
/// free of sockets.
pub fn build_host_app(config: WorldHostConfig) -> App {
    let mut app = App::new();

    let events = EventBus::default();
    let terrain = TerrainField::generate(&config.terrain);

    app.insert_resource(WorldStateStore::new(events))
        .insert_resource(terrain)
        .insert_resource(PlacementPlanner::from_entropy())
        .insert_resource(SpawnAnchor::default())
        .insert_resource(SpawnedLandmarks::default())
        .insert_resource(CommandMetrics::default())
        .insert_resource(config)
        .add_plugins(MinimalPlugins)
        .add_systems(Update, dispatch::pump_server_events);

    app
}

/// Bind the command listener configured in the app's [`WorldHostConfig`] and
/// wire its endpoint into the app as a resource. The returned server owns the
/// socket thread; dropping it (or calling `stop`) joins the thread and closes
/// the sockets.
pub fn start_command_channel(app: &mut App) -> Result<CommandServer, TransportError> {
    let config = app.world.resource::<WorldHostConfig>().clone();
    let (server, endpoint) = CommandServer::start(&config)?;
    app.world.insert_resource(endpoint);
    Ok(server)
}

/// Subscribe to the host's world events. Each call gets an independent
/// receiver; dropping it unsubscribes on the next publish.
pub fn subscribe_world_events(app: &App) -> crossbeam_channel::Receiver<WorldEvent> {
    app.world.resource::<WorldStateStore>().events().subscribe()
}

/// Drive one host update: drain queued socket events, apply commands, run
/// the rest of the schedule.
pub fn run_host_update(app: &mut App) {
    app.update();
}
