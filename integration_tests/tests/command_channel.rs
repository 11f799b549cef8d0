mod common;

use common::{start_host, Controller};
use core_world::{CommandMetrics, WorldStateStore};
use world_proto::{Atmosphere, TraitKind, WorldState};

#[test]
fn greeting_then_trait_command_applies_and_acks() {
    let mut host = start_host();
    let mut controller = Controller::connect(host.addr).expect("connect");

    controller
        .send_line(r#"{"type":"SET_TRAIT","trait":"lawfulness","value":0.75}"#)
        .expect("send");
    host.pump_until("lawfulness to reach 0.75", |app| {
        app.world
            .resource::<WorldStateStore>()
            .trait_value(TraitKind::Lawfulness)
            == 0.75
    });
    controller.expect_acks(1).expect("one ack");
}

#[test]
fn tiny_write_chunks_preserve_command_order() {
    let mut host = start_host();
    let mut controller = Controller::connect(host.addr).expect("connect");

    let stream = concat!(
        r#"{"type":"SET_TRAIT","trait":"militarism","value":0.9}"#,
        "\n",
        r#"{"type":"SET_TRAIT","trait":"militarism","value":0.2}"#,
        "\n",
    );
    for chunk in stream.as_bytes().chunks(3) {
        controller.send_bytes(chunk).expect("send chunk");
    }

    host.pump_until("both trait writes to land", |app| {
        app.world.resource::<CommandMetrics>().commands_applied == 2
    });
    assert_eq!(
        host.app
            .world
            .resource::<WorldStateStore>()
            .trait_value(TraitKind::Militarism),
        0.2,
        "later write must win regardless of chunk boundaries"
    );
    controller.expect_acks(2).expect("two acks");
}

#[test]
fn malformed_line_is_dropped_but_still_acked() {
    let mut host = start_host();
    let mut controller = Controller::connect(host.addr).expect("connect");

    controller.send_line("{definitely not json").expect("send");
    host.pump_until("the malformed line to be processed", |app| {
        app.world.resource::<CommandMetrics>().decode_failures == 1
    });
    controller.expect_acks(1).expect("receipt ack despite drop");
    assert_eq!(
        host.app.world.resource::<WorldStateStore>().snapshot(),
        WorldState::default(),
        "malformed input must not touch state"
    );
}

#[test]
fn unknown_atmosphere_leaves_state_unchanged() {
    let mut host = start_host();
    let mut controller = Controller::connect(host.addr).expect("connect");

    controller
        .send_line(r#"{"type":"SET_ATMOSPHERE","atmosphere":"glowing"}"#)
        .expect("send");
    host.pump_until("validation to reject the atmosphere", |app| {
        app.world.resource::<CommandMetrics>().validation_failures == 1
    });
    assert_eq!(
        host.app.world.resource::<WorldStateStore>().atmosphere(),
        Atmosphere::default()
    );
    controller.expect_acks(1).expect("ack");
}

#[test]
fn sync_merges_only_the_fields_present() {
    let mut host = start_host();
    let mut controller = Controller::connect(host.addr).expect("connect");

    controller
        .send_line(r#"{"type":"SET_ERA","era":{"id":"era-1","name":"First Light","period":"0-100","description":"dawn"}}"#)
        .expect("send era");
    controller
        .send_line(r#"{"type":"SYNC_WORLD_STATE","state":{"traits":{"openness":0.8}}}"#)
        .expect("send sync");

    host.pump_until("both commands to apply", |app| {
        app.world.resource::<CommandMetrics>().commands_applied == 2
    });
    let store = host.app.world.resource::<WorldStateStore>();
    assert_eq!(store.trait_value(TraitKind::Openness), 0.8);
    assert_eq!(store.trait_value(TraitKind::Prosperity), 0.5, "untouched");
    assert_eq!(store.era().name, "First Light", "era survives the sync");
    assert_eq!(store.atmosphere(), Atmosphere::default());
    controller.expect_acks(2).expect("two acks");
}

#[test]
fn unrecognized_command_is_acked_and_ignored() {
    let mut host = start_host();
    let mut controller = Controller::connect(host.addr).expect("connect");

    controller
        .send_line(r#"{"type":"ADD_FACTION","faction":{"id":"f1"}}"#)
        .expect("send");
    host.pump_until("the unknown verb to be counted", |app| {
        app.world.resource::<CommandMetrics>().unrecognized == 1
    });
    controller.expect_acks(1).expect("ack");
    assert_eq!(
        host.app.world.resource::<WorldStateStore>().snapshot(),
        WorldState::default()
    );
}
