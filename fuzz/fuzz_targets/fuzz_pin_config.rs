//! Fuzz target: `PinConfiguration::from_bytes`
//!
//! Feeds arbitrary stored blobs to the pin role decoder. The decoded
//! configuration must be unique by pin, contain no disabled entries and
//! survive an encode/decode cycle unchanged.
//!
//! cargo fuzz run fuzz_pin_config

#![no_main]

use libfuzzer_sys::fuzz_target;
use lockhub::gpio::{PinConfiguration, PinRole};
use lockhub::pins::NetworkHardware;

fuzz_target!(|data: &[u8]| {
    for hardware in [NetworkHardware::Wifi, NetworkHardware::Lan8720Olimex] {
        let config = PinConfiguration::from_bytes(data, hardware);

        let entries = config.entries();
        for (i, a) in entries.iter().enumerate() {
            assert_ne!(a.role, PinRole::Disabled);
            assert!(entries[i + 1..].iter().all(|b| b.pin != a.pin), "duplicate pin");
        }

        let again = PinConfiguration::from_bytes(&config.to_bytes(hardware), hardware);
        assert_eq!(again, config);
    }
});
