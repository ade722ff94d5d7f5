//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements        | Connects to                   |
//! |-------------|-------------------|-------------------------------|
//! | `ble_scan`  | (registry feed)   | Bluedroid GAP scan            |
//! | `device_id` | -                 | eFuse MAC                     |
//! | `ethernet`  | NetworkTransport  | W5500 (SPI) / LAN8720 (RMII)  |
//! | `manifest`  | ManifestSource    | HTTPS release manifest        |
//! | `mqtt`      | BrokerClient      | ESP-MQTT                      |
//! | `nvs`       | ConfigPort        | NVS / in-memory store         |
//! |             | StoragePort       |                               |
//! | `rtc`       | RetainedMemory    | RTC no-init RAM               |
//! | `system`    | SystemPort        | esp_restart, heap, reset cause|
//! | `time`      | Clock             | ESP32 system timer            |
//! | `wifi`      | NetworkTransport  | ESP-IDF WiFi STA              |

pub mod ble_scan;
pub mod device_id;
pub mod ethernet;
pub mod manifest;
pub mod mqtt;
pub mod nvs;
pub mod rtc;
pub mod system;
pub mod time;
pub mod wifi;
