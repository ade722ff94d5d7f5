//! Gateway configuration parameters
//!
//! Broker endpoint, device identity, transport selection and the timing
//! knobs of the connectivity layer. Persisted through [`ConfigPort`]
//! (see [`crate::adapters::nvs`]).
//!
//! [`ConfigPort`]: crate::app::ports::ConfigPort

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::pins::NetworkHardware;

/// Presence timeout written back when the stored value is zero (first use).
pub const DEFAULT_PRESENCE_TIMEOUT_SECS: i32 = 60;

/// Core gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    // --- Identity ---
    /// Network hostname, also used as the broker client id
    pub hostname: String<32>,

    // --- Broker ---
    /// Broker host name or address; empty disables connection attempts
    pub broker_host: String<64>,
    pub broker_port: u16,
    pub broker_user: String<32>,
    pub broker_password: String<64>,
    /// Root path every topic is published under
    pub root_path: String<64>,

    // --- Network ---
    pub network_hardware: NetworkHardware,
    pub wifi_ssid: String<32>,
    pub wifi_password: String<64>,
    /// Restart when the link is down after the first minute of uptime
    pub restart_on_disconnect: bool,
    /// Restart when no broker session existed for this many seconds (-1 disables)
    pub network_timeout_secs: i32,

    // --- Presence ---
    /// Beacon freshness window in seconds (<= 0 disables presence detection)
    pub presence_timeout_secs: i32,
    /// Interval between presence snapshot publications (seconds)
    pub presence_publish_interval_secs: u32,

    // --- Maintenance ---
    /// Maintenance telemetry interval (seconds)
    pub maintenance_interval_secs: u32,
    /// Signal strength publish interval (seconds, 0 disables)
    pub rssi_publish_interval_secs: u32,
    /// Publish free heap with the maintenance telemetry
    pub publish_debug_info: bool,
    /// Poll the release manifest once a day
    pub check_for_updates: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            hostname: String::try_from("lockhub").unwrap_or_default(),

            broker_host: String::new(),
            broker_port: 1883,
            broker_user: String::new(),
            broker_password: String::new(),
            root_path: String::try_from("lockhub").unwrap_or_default(),

            network_hardware: NetworkHardware::Wifi,
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            restart_on_disconnect: false,
            network_timeout_secs: -1,

            presence_timeout_secs: DEFAULT_PRESENCE_TIMEOUT_SECS,
            presence_publish_interval_secs: 5,

            maintenance_interval_secs: 30,
            rssi_publish_interval_secs: 60,
            publish_debug_info: false,
            check_for_updates: false,
        }
    }
}

impl GatewayConfig {
    /// Replace a zero presence timeout with the default.
    ///
    /// Returns `true` when the configuration changed and should be saved.
    pub fn normalize(&mut self) -> bool {
        if self.presence_timeout_secs == 0 {
            self.presence_timeout_secs = DEFAULT_PRESENCE_TIMEOUT_SECS;
            return true;
        }
        false
    }

    /// Presence freshness window in milliseconds (<= 0 when disabled).
    pub fn presence_timeout_ms(&self) -> i64 {
        i64::from(self.presence_timeout_secs) * 1000
    }

    pub fn broker_configured(&self) -> bool {
        !self.broker_host.is_empty()
    }
}
