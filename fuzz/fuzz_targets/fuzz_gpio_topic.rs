//! Fuzz target: `topics::parse_gpio_state`
//!
//! Arbitrary inbound topic strings must never panic the parser, and any
//! pin it yields must rebuild into a topic that parses back to the same
//! pin.
//!
//! cargo fuzz run fuzz_gpio_topic

#![no_main]

use libfuzzer_sys::fuzz_target;
use lockhub::network::topics;

const ROOT: &str = "lockhub";

fuzz_target!(|data: &[u8]| {
    let Ok(topic) = core::str::from_utf8(data) else {
        return;
    };
    if let Some(pin) = topics::parse_gpio_state(ROOT, topic) {
        let rebuilt = topics::gpio(ROOT, pin, topics::GPIO_STATE).expect("root fits");
        assert_eq!(topics::parse_gpio_state(ROOT, &rebuilt), Some(pin));
    }
});
