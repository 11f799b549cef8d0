mod common;

use bevy::ecs::system::RunSystemOnce;
use bevy::prelude::*;
use common::{start_host, Controller};
use core_world::{
    destroy_all_landmarks, destroy_landmark, CommandMetrics, SpawnedLandmarks, WorldStateStore,
};
use serde_json::json;
use world_proto::LandmarkKind;

fn spawn_line(id: &str, kind: &str) -> String {
    json!({
        "type": "SPAWN_SETTLEMENT",
        "settlement": { "id": id, "name": id, "type": kind, "description": "" },
    })
    .to_string()
}

#[test]
fn spawn_creates_record_registry_entry_and_entity() {
    let mut host = start_host();
    let mut controller = Controller::connect(host.addr).expect("connect");

    controller
        .send_line(&spawn_line("fort-1", "fortress"))
        .expect("send spawn");
    host.pump_until("the landmark to spawn", |app| {
        app.world.resource::<CommandMetrics>().landmarks_spawned == 1
    });

    let entry = *host
        .app
        .world
        .resource::<SpawnedLandmarks>()
        .get("fort-1")
        .expect("registry entry");
    let store = host.app.world.resource::<WorldStateStore>();
    let records = store.landmarks();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "fort-1");
    assert_eq!(records[0].kind, LandmarkKind::Fortress);
    assert_eq!(records[0].position.x, entry.position.x);
    assert_eq!(records[0].position.z, entry.position.z);
    assert!(host.app.world.get_entity(entry.entity).is_some());
    controller.expect_acks(1).expect("ack");
}

#[test]
fn duplicate_spawn_is_rejected_but_acked() {
    let mut host = start_host();
    let mut controller = Controller::connect(host.addr).expect("connect");

    controller
        .send_line(&spawn_line("dup", "settlement"))
        .expect("first spawn");
    controller
        .send_line(&spawn_line("dup", "settlement"))
        .expect("second spawn");

    host.pump_until("the duplicate to be rejected", |app| {
        app.world.resource::<CommandMetrics>().duplicates_rejected == 1
    });
    assert_eq!(host.app.world.resource::<SpawnedLandmarks>().len(), 1);
    assert_eq!(
        host.app.world.resource::<WorldStateStore>().landmarks().len(),
        1,
        "collection length unchanged after the rejected spawn"
    );
    controller.expect_acks(2).expect("both lines acked");
}

#[test]
fn wire_spawns_keep_the_minimum_spacing() {
    let mut host = start_host();
    let mut controller = Controller::connect(host.addr).expect("connect");

    controller
        .send_line(&spawn_line("a", "settlement"))
        .expect("spawn a");
    controller
        .send_line(&spawn_line("b", "ruin"))
        .expect("spawn b");
    host.pump_until("both landmarks to spawn", |app| {
        app.world.resource::<CommandMetrics>().landmarks_spawned == 2
    });

    let registry = host.app.world.resource::<SpawnedLandmarks>();
    let a = registry.get("a").expect("a registered").position;
    let b = registry.get("b").expect("b registered").position;
    assert!(
        a.truncate().distance(b.truncate()) >= 500.0,
        "default spacing rule violated: {a:?} vs {b:?}"
    );
    controller.expect_acks(2).expect("two acks");
}

#[test]
fn destroying_landmarks_keeps_registry_and_store_in_lockstep() {
    let mut host = start_host();
    let mut controller = Controller::connect(host.addr).expect("connect");

    for (id, kind) in [("one", "monastery"), ("two", "natural"), ("three", "ruin")] {
        controller.send_line(&spawn_line(id, kind)).expect("spawn");
    }
    host.pump_until("all three landmarks to spawn", |app| {
        app.world.resource::<CommandMetrics>().landmarks_spawned == 3
    });
    controller.expect_acks(3).expect("three acks");

    let removed = host.app.world.run_system_once(
        |mut commands: Commands,
         mut registry: ResMut<SpawnedLandmarks>,
         mut store: ResMut<WorldStateStore>| {
            destroy_landmark(&mut commands, &mut registry, &mut store, "two")
        },
    );
    assert!(removed);
    assert_eq!(host.app.world.resource::<SpawnedLandmarks>().len(), 2);
    assert!(host
        .app
        .world
        .resource::<WorldStateStore>()
        .landmarks()
        .iter()
        .all(|landmark| landmark.id != "two"));

    let cleared = host.app.world.run_system_once(
        |mut commands: Commands,
         mut registry: ResMut<SpawnedLandmarks>,
         mut store: ResMut<WorldStateStore>| {
            destroy_all_landmarks(&mut commands, &mut registry, &mut store)
        },
    );
    assert_eq!(cleared, 2);
    assert!(host.app.world.resource::<SpawnedLandmarks>().is_empty());
    assert!(host
        .app
        .world
        .resource::<WorldStateStore>()
        .landmarks()
        .is_empty());
}
