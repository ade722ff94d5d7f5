//! GPIO availability per chip and pins claimed by the network hardware.
//!
//! Single source of truth for "may this pin carry a user role?". The GPIO
//! dispatcher and the pin role store both validate against this module.

use serde::{Deserialize, Serialize};

/// Highest GPIO number on any supported chip, plus one.
pub const MAX_PINS: usize = 64;

// ---------------------------------------------------------------------------
// Pins exposed to user roles
// ---------------------------------------------------------------------------

#[cfg(esp32s3)]
const AVAILABLE_PINS: &[u8] = &[
    1, 2, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 21, 38, 39, 40, 41, 42,
];

#[cfg(esp32c3)]
const AVAILABLE_PINS: &[u8] = &[2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 18, 19, 20, 21];

#[cfg(not(any(esp32s3, esp32c3)))]
const AVAILABLE_PINS: &[u8] = &[
    2, 4, 5, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 32, 33,
];

/// Pins the running chip exposes for user roles.
pub fn available_pins() -> &'static [u8] {
    AVAILABLE_PINS
}

pub fn is_available(pin: u8) -> bool {
    AVAILABLE_PINS.contains(&pin)
}

// ---------------------------------------------------------------------------
// Network hardware
// ---------------------------------------------------------------------------

/// Network interface selected at boot.
///
/// The discriminants are persisted in the gateway configuration, so they
/// must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum NetworkHardware {
    /// Built-in Wi-Fi station.
    #[default]
    Wifi = 1,
    /// Generic W5500 SPI module.
    W5500 = 2,
    /// M5Stack Atom PoE (W5500).
    M5AtomPoe = 3,
    /// Olimex ESP32-POE (LAN8720, PHY power on GPIO 12).
    Lan8720Olimex = 4,
    /// WT32-ETH01 (LAN8720, PHY power on GPIO 16).
    Lan8720Wt32Eth01 = 5,
}

impl NetworkHardware {
    pub fn is_ethernet(self) -> bool {
        self != Self::Wifi
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Wifi => "Built-in Wi-Fi",
            Self::W5500 => "Generic W5500",
            Self::M5AtomPoe => "M5Stack Atom PoE",
            Self::Lan8720Olimex => "Olimex ESP32-POE",
            Self::Lan8720Wt32Eth01 => "WT32-ETH01",
        }
    }
}

// ── W5500 (SPI) ───────────────────────────────────────────────
pub const W5500_CS: u8 = 5;
pub const W5500_IRQ: u8 = 3;
pub const W5500_RST: u8 = 4;
pub const W5500_SCK: u8 = 8;
pub const W5500_MISO: u8 = 9;
pub const W5500_MOSI: u8 = 10;

pub const M5_W5500_CS: u8 = 19;
pub const M5_W5500_SCK: u8 = 22;
pub const M5_W5500_MISO: u8 = 23;
pub const M5_W5500_MOSI: u8 = 33;

// ── LAN8720 (RMII) ────────────────────────────────────────────
pub const LAN8720_RESET: u8 = 1;
pub const LAN8720_MDC: u8 = 23;
pub const LAN8720_MDIO: u8 = 18;
pub const LAN8720_PHY_ADDR: u32 = 0;
pub const OLIMEX_PHY_POWER: u8 = 12;
pub const WT32_PHY_POWER: u8 = 16;

/// Pins claimed by `hardware`. A stored role on one of these is always
/// replaced by the transport-owned role.
pub fn reserved_pins(hardware: NetworkHardware) -> &'static [u8] {
    match hardware {
        NetworkHardware::Wifi => &[],
        NetworkHardware::W5500 => &[W5500_CS, W5500_IRQ, W5500_RST, W5500_SCK, W5500_MISO, W5500_MOSI],
        NetworkHardware::M5AtomPoe => &[M5_W5500_CS, M5_W5500_SCK, M5_W5500_MISO, M5_W5500_MOSI],
        NetworkHardware::Lan8720Olimex => &[OLIMEX_PHY_POWER, LAN8720_RESET, LAN8720_MDC, LAN8720_MDIO],
        NetworkHardware::Lan8720Wt32Eth01 => &[WT32_PHY_POWER, LAN8720_RESET, LAN8720_MDC, LAN8720_MDIO],
    }
}
