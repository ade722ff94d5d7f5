//! Broker topic layout, relative to the configured root path.
//!
//! ```text
//!   <root>/gpio/pin_<N>/state        "1" / "0"  (inputs publish, outputs subscribe)
//!   <root>/gpio/pin_<N>/role         "input" / "output"
//!   <root>/presence/devices          beacon snapshot
//!   <root>/maintenance/...           liveness and diagnostics
//!   <root>/info/...                  address and version info
//! ```

use core::fmt::Write as _;

use heapless::String;

use crate::app::ports::MAX_TOPIC_LEN;

pub type Topic = String<MAX_TOPIC_LEN>;

// ── Maintenance ─────────────────────────────────────────────────
pub const CONNECTION_STATE: &str = "/maintenance/mqttConnectionState";
pub const NETWORK_DEVICE: &str = "/maintenance/networkDevice";
pub const RESET: &str = "/maintenance/reset";
pub const UPTIME: &str = "/maintenance/uptime";
pub const WIFI_RSSI: &str = "/maintenance/wifiRssi";
pub const FREE_HEAP: &str = "/maintenance/freeHeap";
pub const RESTART_REASON: &str = "/maintenance/restartReason";
pub const RESTART_REASON_ESP: &str = "/maintenance/restartReasonEsp";

// ── Info ────────────────────────────────────────────────────────
pub const INFO_IP: &str = "/info/ip";
pub const INFO_VERSION: &str = "/info/version";
pub const INFO_BUILD: &str = "/info/build";
pub const INFO_LATEST_VERSION: &str = "/info/latestVersion";

// ── Presence ────────────────────────────────────────────────────
pub const PRESENCE_DEVICES: &str = "/presence/devices";

// ── GPIO ────────────────────────────────────────────────────────
const GPIO_PIN_PREFIX: &str = "/gpio/pin_";
pub const GPIO_STATE: &str = "/state";
pub const GPIO_ROLE: &str = "/role";

pub const ONLINE: &str = "online";
pub const OFFLINE: &str = "offline";

/// `<root><suffix>`; `None` when the result does not fit a topic buffer.
pub fn build(root: &str, suffix: &str) -> Option<Topic> {
    let mut topic = Topic::new();
    topic.push_str(root).ok()?;
    topic.push_str(suffix).ok()?;
    Some(topic)
}

/// `<root>/gpio/pin_<pin><leaf>`, with `leaf` one of [`GPIO_STATE`] /
/// [`GPIO_ROLE`].
pub fn gpio(root: &str, pin: u8, leaf: &str) -> Option<Topic> {
    let mut topic = Topic::new();
    write!(topic, "{}{}{}{}", root, GPIO_PIN_PREFIX, pin, leaf).ok()?;
    Some(topic)
}

/// Pin number of a `<root>/gpio/pin_<N>/state` topic.
///
/// Anything else, including out-of-range numbers, leading signs and
/// trailing path segments, yields `None`.
pub fn parse_gpio_state(root: &str, topic: &str) -> Option<u8> {
    let rest = topic.strip_prefix(root)?;
    let rest = rest.strip_prefix(GPIO_PIN_PREFIX)?;
    let digits = rest.strip_suffix(GPIO_STATE)?;
    if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
