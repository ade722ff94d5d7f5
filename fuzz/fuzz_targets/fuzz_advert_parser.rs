//! Fuzz target: `Advertisement::from_raw`
//!
//! Drives arbitrary advertising payloads through the AD structure walker
//! and into the presence registry, asserting that nothing panics and the
//! beacon renders as a single line within the per-record bound.
//!
//! cargo fuzz run fuzz_advert_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use lockhub::presence::registry::MAX_RECORD_LEN;
use lockhub::presence::{Advertisement, BeaconAddress, PresenceRegistry};

fuzz_target!(|data: &[u8]| {
    let address = BeaconAddress::from_bytes([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);
    let adv = Advertisement::from_raw(address, Some(-42), data);

    let registry = PresenceRegistry::new(60_000);
    registry.on_advertisement(&adv, 1);

    let snapshot = registry.snapshot(60_000, 2);
    assert!(!snapshot.is_empty());
    assert_eq!(snapshot.lines().count(), 1, "one beacon, one line");
    assert!(snapshot.len() < MAX_RECORD_LEN, "record exceeds bound");
});
