//! Wi-Fi station transport.
//!
//! Implements [`NetworkTransport`] on top of the ESP-IDF Wi-Fi driver. Used
//! when Wi-Fi is the configured hardware and as the fallback after an
//! Ethernet controller failed critically.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi` in station
//!   mode. `connect()` is non-blocking; the link counts as up once the STA
//!   netif has an address.
//! - **all other targets**: a simulated link the tests can raise and drop.
//!
//! The adapter never retries on its own: the connectivity manager decides
//! when to call [`NetworkTransport::attempt_reconnect`].

use core::net::Ipv4Addr;

use log::{info, warn};

use crate::app::ports::{NetworkTransport, ReconnectStatus};
use crate::error::NetworkError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

const DEVICE_NAME: &str = "Wi-Fi";

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

/// Space through tilde.
fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), NetworkError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(NetworkError::InvalidCredentials);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), NetworkError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(NetworkError::InvalidCredentials);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Wi-Fi transport
// ───────────────────────────────────────────────────────────────

pub struct WifiTransport {
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(target_os = "espidf")]
    started: bool,

    #[cfg(not(target_os = "espidf"))]
    sim_link: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_rssi: i8,
    #[cfg(not(target_os = "espidf"))]
    sim_attempts: u32,

    ssid: heapless::String<32>,
    was_connected: bool,
}

impl WifiTransport {
    #[cfg(target_os = "espidf")]
    pub fn new(
        wifi: EspWifi<'static>,
        ssid: &str,
        password: &str,
    ) -> Result<Self, NetworkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;

        let mut wifi = wifi;
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| NetworkError::InvalidCredentials)?,
            password: password
                .try_into()
                .map_err(|_| NetworkError::InvalidCredentials)?,
            auth_method,
            ..Default::default()
        };
        wifi.set_configuration(&Configuration::Client(client))
            .map_err(|_| NetworkError::DriverInitFailed)?;
        info!("Wi-Fi: station configured for '{}'", ssid);

        Ok(Self {
            wifi,
            started: false,
            ssid: heapless::String::try_from(ssid).map_err(|_| NetworkError::InvalidCredentials)?,
            was_connected: false,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(ssid: &str, password: &str) -> Result<Self, NetworkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        info!("Wi-Fi(sim): station configured for '{}'", ssid);
        Ok(Self {
            sim_link: false,
            sim_rssi: -60,
            sim_attempts: 0,
            ssid: heapless::String::try_from(ssid).map_err(|_| NetworkError::InvalidCredentials)?,
            was_connected: false,
        })
    }

    /// Simulation: drop the link as if the access point went away.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_link(&mut self) {
        self.sim_link = false;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_rssi(&mut self, rssi: i8) {
        self.sim_rssi = rssi;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_attempts(&self) -> u32 {
        self.sim_attempts
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.sta_netif().is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connected(&self) -> bool {
        self.sim_link
    }

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> bool {
        if !self.started {
            if let Err(e) = self.wifi.start() {
                warn!("Wi-Fi: start failed: {}", e);
                return false;
            }
            self.started = true;
        }
        if let Err(e) = self.wifi.connect() {
            warn!("Wi-Fi: connect to '{}' failed: {}", self.ssid, e);
            return false;
        }
        self.platform_connected()
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> bool {
        self.sim_attempts += 1;
        self.sim_link = true;
        true
    }
}

impl NetworkTransport for WifiTransport {
    fn device_name(&self) -> &str {
        DEVICE_NAME
    }

    fn update(&mut self) {
        let connected = self.platform_connected();
        if connected != self.was_connected {
            self.was_connected = connected;
            if connected {
                info!("Wi-Fi: connected to '{}'", self.ssid);
            } else {
                warn!("Wi-Fi: disconnected from '{}'", self.ssid);
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.platform_connected()
    }

    fn attempt_reconnect(&mut self) -> ReconnectStatus {
        if self.platform_connect() {
            ReconnectStatus::Success
        } else {
            ReconnectStatus::Failure
        }
    }

    #[cfg(target_os = "espidf")]
    fn signal_strength(&self) -> Option<i8> {
        if !self.platform_connected() {
            return None;
        }
        let mut info: esp_idf_svc::sys::wifi_ap_record_t = unsafe { core::mem::zeroed() };
        // SAFETY: `info` is a valid, writable record for the call's duration.
        let rc = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut info) };
        (rc == esp_idf_svc::sys::ESP_OK).then_some(info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn signal_strength(&self) -> Option<i8> {
        self.sim_link.then_some(self.sim_rssi)
    }

    #[cfg(target_os = "espidf")]
    fn local_address(&self) -> Option<Ipv4Addr> {
        let info = self.wifi.sta_netif().get_ip_info().ok()?;
        (!info.ip.is_unspecified()).then_some(info.ip)
    }

    #[cfg(not(target_os = "espidf"))]
    fn local_address(&self) -> Option<Ipv4Addr> {
        self.sim_link.then_some(Ipv4Addr::new(192, 168, 1, 50))
    }
}
