//! Integration tests for beacon presence: raw advertisements → registry →
//! periodic snapshot publication.

use lockhub::presence::registry::{DISABLED_SNAPSHOT, EMPTY_SNAPSHOT};
use lockhub::presence::{Advertisement, BeaconAddress, PresenceRegistry};

use crate::mocks::{self, MockBroker, MockTransport, Rig};

fn addr(s: &str) -> BeaconAddress {
    s.parse().unwrap()
}

/// Complete local name AD structure.
fn name_ad(name: &str) -> Vec<u8> {
    let mut ad = vec![name.len() as u8 + 1, 0x09];
    ad.extend_from_slice(name.as_bytes());
    ad
}

/// `0x181A` service data in the 15-byte little-endian layout.
fn sensor_ad(temp_centi: i16, hum_centi: u16, mv: u16, level: u8) -> Vec<u8> {
    let mut payload = vec![0u8; 6];
    payload.extend_from_slice(&temp_centi.to_le_bytes());
    payload.extend_from_slice(&hum_centi.to_le_bytes());
    payload.extend_from_slice(&mv.to_le_bytes());
    payload.push(level);
    payload.extend_from_slice(&[0, 0]);

    let mut ad = vec![payload.len() as u8 + 3, 0x16, 0x1A, 0x18];
    ad.extend_from_slice(&payload);
    ad
}

// ── Registry ──────────────────────────────────────────────────

#[test]
fn two_advertisements_merge_into_one_line() {
    let reg = PresenceRegistry::new(60_000);
    let a = addr("AA:BB:CC:DD:EE:FF");

    reg.on_advertisement(&Advertisement::from_raw(a, Some(-60), &name_ad("door")), 1_000);
    reg.on_advertisement(
        &Advertisement::from_raw(a, None, &sensor_ad(2153, 4520, 2950, 87)),
        2_000,
    );

    assert_eq!(reg.len(), 1);
    assert_eq!(
        reg.snapshot(60_000, 3_000).as_str(),
        "aa:bb:cc:dd:ee:ff;door;-60;21.53;45.20;2.950;87"
    );
}

#[test]
fn hostile_name_cannot_forge_records() {
    let reg = PresenceRegistry::new(60_000);
    let a = addr("AA:BB:CC:DD:EE:FF");

    let ad = name_ad("x\n11:22:33:44:55:66;fake;-1");
    reg.on_advertisement(&Advertisement::from_raw(a, Some(-60), &ad), 1_000);

    let snap = reg.snapshot(60_000, 2_000);
    assert_eq!(snap.lines().count(), 1);
    assert_eq!(
        snap.as_str(),
        "aa:bb:cc:dd:ee:ff;x_11:22:33:44:55:66_fake_-1;-60"
    );
}

#[test]
fn stale_beacons_drop_out_of_the_snapshot() {
    let reg = PresenceRegistry::new(10_000);
    reg.on_advertisement(&Advertisement::new(addr("01:02:03:04:05:06")).with_rssi(-50), 0);
    reg.on_advertisement(&Advertisement::new(addr("0a:0b:0c:0d:0e:0f")).with_rssi(-80), 8_000);

    assert_eq!(reg.snapshot(10_000, 12_000).as_str(), "0a:0b:0c:0d:0e:0f;-;-80");
    assert_eq!(reg.snapshot(10_000, 18_000).as_str(), EMPTY_SNAPSHOT);
    assert_eq!(reg.len(), 2, "stale records are kept, only hidden");
}

#[test]
fn most_recent_sighting_comes_first() {
    let reg = PresenceRegistry::new(60_000);
    reg.on_advertisement(&Advertisement::new(addr("01:00:00:00:00:01")).with_rssi(-40), 100);
    reg.on_advertisement(&Advertisement::new(addr("01:00:00:00:00:02")).with_rssi(-41), 200);

    let snap = reg.snapshot(60_000, 300);
    let lines: Vec<&str> = snap.lines().collect();
    assert_eq!(
        lines,
        vec!["01:00:00:00:00:02;-;-41", "01:00:00:00:00:01;-;-40"]
    );
}

#[test]
fn capacity_evicts_least_recently_seen() {
    let reg = PresenceRegistry::with_capacity(60_000, 2);
    let first = addr("01:00:00:00:00:01");
    let second = addr("01:00:00:00:00:02");
    let third = addr("01:00:00:00:00:03");

    reg.on_advertisement(&Advertisement::new(first), 10);
    reg.on_advertisement(&Advertisement::new(second), 20);
    reg.on_advertisement(&Advertisement::new(first), 30);
    reg.on_advertisement(&Advertisement::new(third), 40);

    assert_eq!(reg.len(), 2);
    assert!(reg.get(second).is_none());
    assert!(reg.get(first).is_some());
    assert!(reg.get(third).is_some());
}

#[test]
fn disabled_registry_ignores_sightings() {
    let reg = PresenceRegistry::new(0);
    reg.on_advertisement(&Advertisement::new(addr("01:02:03:04:05:06")), 0);
    assert!(reg.is_empty());
    assert_eq!(reg.snapshot(0, 10).as_str(), DISABLED_SNAPSHOT);
}

// ── Publication ───────────────────────────────────────────────

#[test]
fn snapshot_is_published_on_the_presence_interval() {
    let mut rig = Rig::new(&[], 60_000);
    let (mut manager, clock) = mocks::manager(
        mocks::settings(&mocks::config()),
        MockTransport::up(),
        MockBroker::accepting(),
    );
    let topic = mocks::topic("/presence/devices");

    rig.presence.on_advertisement(
        &Advertisement::new(addr("AA:BB:CC:DD:EE:FF")).with_rssi(-60),
        0,
    );

    clock.set(0);
    rig.step(&mut manager);
    assert!(manager.broker().payloads(&topic).is_empty(), "sync cycle first");

    clock.set(100);
    rig.step(&mut manager);
    assert_eq!(manager.broker().payloads(&topic), vec!["aa:bb:cc:dd:ee:ff;-;-60"]);
    assert!(!manager.broker().last(&topic).unwrap().retain);

    clock.set(4_000);
    rig.step(&mut manager);
    assert_eq!(manager.broker().payloads(&topic).len(), 1, "interval not elapsed");

    clock.set(5_100);
    rig.step(&mut manager);
    assert_eq!(manager.broker().payloads(&topic).len(), 2);
}

#[test]
fn disabled_marker_is_published_once_per_session() {
    let mut rig = Rig::new(&[], 0);
    let (mut manager, clock) = mocks::manager(
        mocks::settings(&mocks::config()),
        MockTransport::up(),
        MockBroker::accepting(),
    );
    let topic = mocks::topic("/presence/devices");

    for t in [0, 100, 10_000, 20_000] {
        clock.set(t);
        rig.step(&mut manager);
    }
    assert_eq!(manager.broker().payloads(&topic), vec![DISABLED_SNAPSHOT]);

    // Session drops and comes back: reported again.
    manager.broker_mut().session = false;
    clock.set(30_000);
    rig.step(&mut manager);
    clock.set(30_100);
    rig.step(&mut manager);
    assert_eq!(
        manager.broker().payloads(&topic),
        vec![DISABLED_SNAPSHOT, DISABLED_SNAPSHOT]
    );
}
