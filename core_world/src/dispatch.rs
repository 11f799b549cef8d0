use std::collections::HashMap;

use bevy::prelude::*;
use tracing::{debug, info, warn};

use world_proto::{parse_envelope, Command, ControlFrame, Landmark, LandmarkSpec, WorldPosition};

use crate::{
    config::WorldHostConfig,
    metrics::CommandMetrics,
    network::{ServerEndpoint, ServerEvent},
    placement::{PlacementPlanner, SpawnAnchor},
    state::{WorldEvent, WorldStateStore},
    terrain::TerrainField,
    visuals::LandmarkVisual,
};

/// Entities backing spawned landmarks, keyed by landmark id. The dispatcher
/// is the only writer and keeps this in lockstep with the store's record
/// list.
#[derive(Resource, Debug, Default)]
pub struct SpawnedLandmarks {
    entries: HashMap<String, SpawnedLandmark>,
}

#[derive(Debug, Clone, Copy)]
pub struct SpawnedLandmark {
    pub entity: Entity,
    pub position: Vec3,
}

impl SpawnedLandmarks {
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&SpawnedLandmark> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.entries.values().map(|entry| entry.position).collect()
    }

    fn insert(&mut self, id: String, entry: SpawnedLandmark) {
        self.entries.insert(id, entry);
    }

    fn remove(&mut self, id: &str) -> Option<SpawnedLandmark> {
        self.entries.remove(id)
    }

    fn drain_all(&mut self) -> Vec<SpawnedLandmark> {
        self.entries.drain().map(|(_, entry)| entry).collect()
    }
}

/// Per-update pump: drain everything the socket thread queued, in arrival
/// order, apply it to the world, and acknowledge each processed line. Runs
/// on the state-owning schedule, so store writes are totally ordered.
#[allow(clippy::too_many_arguments)]
pub fn pump_server_events(
    mut commands: Commands,
    endpoint: Option<Res<ServerEndpoint>>,
    config: Res<WorldHostConfig>,
    terrain: Res<TerrainField>,
    anchor: Res<SpawnAnchor>,
    mut store: ResMut<WorldStateStore>,
    mut planner: ResMut<PlacementPlanner>,
    mut registry: ResMut<SpawnedLandmarks>,
    mut metrics: ResMut<CommandMetrics>,
) {
    let Some(endpoint) = endpoint else {
        return;
    };
    let mut processed = 0u32;
    while let Some(event) = endpoint.try_recv() {
        match event {
            ServerEvent::ClientConnected => {
                metrics.connections += 1;
                store.events().publish(&WorldEvent::ConnectionChanged(true));
            }
            ServerEvent::ClientDisconnected => {
                metrics.disconnections += 1;
                store.events().publish(&WorldEvent::ConnectionChanged(false));
            }
            ServerEvent::Message(line) => {
                process_line(
                    &line,
                    &mut commands,
                    &config,
                    &terrain,
                    &anchor,
                    &mut store,
                    &mut planner,
                    &mut registry,
                    &mut metrics,
                );
                // Receipt acknowledgment, deliberately fire-and-forget: sent
                // even for lines that failed decode or validation.
                endpoint.send_frame(ControlFrame::ack());
                metrics.acks_sent += 1;
                processed += 1;
            }
        }
    }
    if processed > 0 {
        debug!(target: "worldloom::dispatch", count = processed, "commands.drained");
    }
}

#[allow(clippy::too_many_arguments)]
fn process_line(
    line: &str,
    commands: &mut Commands,
    config: &WorldHostConfig,
    terrain: &TerrainField,
    anchor: &SpawnAnchor,
    store: &mut WorldStateStore,
    planner: &mut PlacementPlanner,
    registry: &mut SpawnedLandmarks,
    metrics: &mut CommandMetrics,
) {
    let raw = match parse_envelope(line) {
        Ok(raw) => raw,
        Err(err) => {
            metrics.decode_failures += 1;
            warn!(target: "worldloom::dispatch", error = %err, "command.rejected=malformed");
            return;
        }
    };
    store.events().publish(&WorldEvent::CommandReceived {
        kind: raw.kind.clone(),
        raw: line.to_owned(),
    });
    let command = match raw.decode() {
        Ok(command) => command,
        Err(err) => {
            metrics.validation_failures += 1;
            warn!(
                target: "worldloom::dispatch",
                kind = %raw.kind,
                error = %err,
                "command.rejected=validation"
            );
            return;
        }
    };
    match command {
        Command::SetEra(era) => {
            info!(target: "worldloom::dispatch", id = %era.id, name = %era.name, "era.applied");
            store.set_era(era);
            metrics.commands_applied += 1;
        }
        Command::SetTrait { kind, value } => {
            store.set_trait(kind, value);
            debug!(
                target: "worldloom::dispatch",
                kind = kind.name(),
                value = f64::from(store.trait_value(kind)),
                "trait.applied"
            );
            metrics.commands_applied += 1;
        }
        Command::SetAtmosphere(atmosphere) => {
            store.set_atmosphere(atmosphere);
            debug!(target: "worldloom::dispatch", atmosphere = atmosphere.name(), "atmosphere.applied");
            metrics.commands_applied += 1;
        }
        Command::SyncWorldState(patch) => {
            store.apply_patch(&patch);
            debug!(target: "worldloom::dispatch", "state.synced");
            metrics.commands_applied += 1;
        }
        Command::SpawnLandmark(spec) => {
            spawn_requested_landmark(
                spec, commands, config, terrain, anchor, store, planner, registry, metrics,
            );
        }
        Command::Unrecognized { kind } => {
            metrics.unrecognized += 1;
            debug!(target: "worldloom::dispatch", kind = %kind, "command.ignored=unrecognized");
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_requested_landmark(
    spec: LandmarkSpec,
    commands: &mut Commands,
    config: &WorldHostConfig,
    terrain: &TerrainField,
    anchor: &SpawnAnchor,
    store: &mut WorldStateStore,
    planner: &mut PlacementPlanner,
    registry: &mut SpawnedLandmarks,
    metrics: &mut CommandMetrics,
) {
    if registry.contains(&spec.id) || store.contains_landmark(&spec.id) {
        metrics.duplicates_rejected += 1;
        warn!(target: "worldloom::dispatch", id = %spec.id, "landmark.rejected=duplicate");
        return;
    }

    let occupied = registry.positions();
    let spot = planner.find_spot(anchor.center(), &occupied, terrain, &config.placement);
    if spot.degraded {
        metrics.placements_degraded += 1;
    }

    let entity = commands
        .spawn((
            LandmarkVisual {
                landmark_id: spec.id.clone(),
                kind: spec.kind,
                label: spec.name.clone(),
            },
            Transform::from_translation(spot.position),
        ))
        .id();
    registry.insert(
        spec.id.clone(),
        SpawnedLandmark {
            entity,
            position: spot.position,
        },
    );

    let landmark = Landmark {
        id: spec.id,
        name: spec.name,
        kind: spec.kind,
        description: spec.description,
        position: WorldPosition::new(spot.position.x, spot.position.y, spot.position.z),
    };
    info!(
        target: "worldloom::dispatch",
        id = %landmark.id,
        kind = landmark.kind.name(),
        x = f64::from(spot.position.x),
        y = f64::from(spot.position.y),
        z = f64::from(spot.position.z),
        degraded = spot.degraded,
        "landmark.spawned"
    );
    if let Err(err) = store.add_landmark(landmark) {
        // The registry check above makes this unreachable unless the two
        // fell out of step; restore lockstep instead of leaving a stray
        // entity behind.
        warn!(target: "worldloom::dispatch", error = %err, "landmark.rejected=store_conflict");
        registry.remove(&err.id);
        commands.entity(entity).despawn();
        metrics.duplicates_rejected += 1;
        return;
    }
    metrics.landmarks_spawned += 1;
    metrics.commands_applied += 1;
}

/// Host-facing removal of one landmark: entity, registry entry, and store
/// record. Not reachable from the wire. Returns whether anything was
/// removed.
pub fn destroy_landmark(
    commands: &mut Commands,
    registry: &mut SpawnedLandmarks,
    store: &mut WorldStateStore,
    id: &str,
) -> bool {
    let mut removed = false;
    if let Some(entry) = registry.remove(id) {
        commands.entity(entry.entity).despawn();
        removed = true;
    }
    if store.remove_landmark(id) {
        removed = true;
    }
    if removed {
        info!(target: "worldloom::dispatch", id = %id, "landmark.destroyed");
    }
    removed
}

/// Host-facing bulk removal. Returns how many entities were despawned.
pub fn destroy_all_landmarks(
    commands: &mut Commands,
    registry: &mut SpawnedLandmarks,
    store: &mut WorldStateStore,
) -> usize {
    let entries = registry.drain_all();
    for entry in &entries {
        commands.entity(entry.entity).despawn();
    }
    store.clear_landmarks();
    if !entries.is_empty() {
        info!(target: "worldloom::dispatch", count = entries.len(), "landmarks.cleared");
    }
    entries.len()
}
