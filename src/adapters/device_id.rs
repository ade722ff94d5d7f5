//! Device identity derived from the factory MAC address.
//!
//! The default hostname is `lockhub-xxyyzz` (last three MAC bytes,
//! lowercase). It doubles as the broker client id, so two gateways on the
//! same broker never collide out of the box.

use core::fmt::Write;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: a fixed, locally administered MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0x02, 0x4C, 0x48, 0x0A, 0x0B, 0x0C]
}

pub fn default_hostname(mac: &MacAddress) -> heapless::String<32> {
    let mut name = heapless::String::new();
    let _ = write!(name, "lockhub-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    name
}
